//! Catalog access for storefront pages.

use std::str::FromStr;

use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, UpdateProductRequest},
    models::Product,
    storefront::error::{ClientError, ClientResult},
};

pub const NOT_FOUND_MESSAGE: &str = "Product not found";

const SECTION_SIZE: usize = 8;

#[automock]
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// All products, newest first.
    async fn list_products(&self) -> ClientResult<Vec<Product>>;

    async fn product_by_slug(&self, slug: &str) -> ClientResult<Product>;

    async fn create_product(
        &self,
        token: &str,
        request: &CreateProductRequest,
    ) -> ClientResult<Product>;

    async fn update_product(
        &self,
        token: &str,
        id: Uuid,
        request: &UpdateProductRequest,
    ) -> ClientResult<Product>;

    async fn delete_product(&self, token: &str, id: Uuid) -> ClientResult<()>;
}

/// Home page sections, computed in memory over the full product list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Featured,
    Men,
    Women,
    New,
    All,
}

impl FromStr for Section {
    type Err = std::convert::Infallible;

    /// Unknown names show the whole catalog.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "featured" | "" => Section::Featured,
            "men" => Section::Men,
            "women" => Section::Women,
            "new" => Section::New,
            _ => Section::All,
        })
    }
}

impl Section {
    pub fn heading(&self) -> &'static str {
        match self {
            Section::Featured => "Featured Watches",
            Section::Men => "Men's Collection",
            Section::Women => "Women's Collection",
            Section::New => "New Arrivals",
            Section::All => "All Watches",
        }
    }

    pub fn select<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        match self {
            Section::Featured => products.iter().take(SECTION_SIZE).collect(),
            Section::New => {
                let mut newest: Vec<&Product> = products.iter().collect();
                newest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                newest.truncate(SECTION_SIZE);
                newest
            }
            Section::Men => products.iter().filter(|p| in_category(p, "men")).collect(),
            Section::Women => products.iter().filter(|p| in_category(p, "women")).collect(),
            Section::All => products.iter().collect(),
        }
    }
}

/// Whole-word match so "women" does not fall into the men's section.
fn in_category(product: &Product, word: &str) -> bool {
    product.category.as_deref().is_some_and(|category| {
        category
            .to_lowercase()
            .split(|c: char| !c.is_alphabetic())
            .any(|token| token == word)
    })
}

/// State of a product detail page.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductPage {
    Loaded(Product),
    NotFound,
}

impl ProductPage {
    pub fn heading(&self) -> &str {
        match self {
            ProductPage::Loaded(product) => &product.title,
            ProductPage::NotFound => NOT_FOUND_MESSAGE,
        }
    }

    /// The add-to-cart control is disabled for missing or sold-out products.
    pub fn can_add_to_cart(&self) -> bool {
        matches!(self, ProductPage::Loaded(product) if product.in_stock())
    }
}

/// Load a product page; an unknown slug is a page state, not an error.
pub async fn load_product_page<G>(gateway: &G, slug: &str) -> ClientResult<ProductPage>
where
    G: CatalogGateway + ?Sized,
{
    match gateway.product_by_slug(slug).await {
        Ok(product) => Ok(ProductPage::Loaded(product)),
        Err(ClientError::NotFound(_)) => {
            tracing::debug!(slug, "product not found");
            Ok(ProductPage::NotFound)
        }
        Err(err) => Err(err),
    }
}
