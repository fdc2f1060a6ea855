//! Admin catalog editor.
//!
//! The local list reflects server state only: every mutation is applied after the
//! server confirms it, so a rejected request never leaves a phantom edit behind.

use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, UpdateProductRequest},
    models::Product,
    storefront::{
        catalog::CatalogGateway,
        error::{ClientError, ClientResult},
        session::Session,
    },
};

pub struct AdminCatalogEditor<'a, G: CatalogGateway + ?Sized> {
    gateway: &'a G,
    session: &'a Session,
    products: Vec<Product>,
}

impl<'a, G: CatalogGateway + ?Sized> AdminCatalogEditor<'a, G> {
    /// Open the editor. Non-admin sessions are turned away before any request is made.
    pub async fn open(gateway: &'a G, session: &'a Session) -> ClientResult<Self> {
        session.require_admin()?;
        let products = gateway.list_products().await?;
        Ok(Self {
            gateway,
            session,
            products,
        })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub async fn refresh(&mut self) -> ClientResult<()> {
        self.products = self.gateway.list_products().await?;
        Ok(())
    }

    pub async fn create(&mut self, request: &CreateProductRequest) -> ClientResult<&Product> {
        let created = self
            .gateway
            .create_product(&self.session.token, request)
            .await?;
        tracing::info!(product_id = %created.id, slug = %created.slug, "product created");
        self.products.insert(0, created);
        Ok(&self.products[0])
    }

    pub async fn update(
        &mut self,
        id: Uuid,
        request: &UpdateProductRequest,
    ) -> ClientResult<&Product> {
        let updated = self
            .gateway
            .update_product(&self.session.token, id, request)
            .await?;

        let index = match self.products.iter().position(|p| p.id == id) {
            Some(index) => {
                self.products[index] = updated;
                index
            }
            None => {
                self.products.insert(0, updated);
                0
            }
        };
        Ok(&self.products[index])
    }

    pub async fn delete(&mut self, id: Uuid) -> ClientResult<()> {
        match self.gateway.delete_product(&self.session.token, id).await {
            Ok(()) | Err(ClientError::NotFound(_)) => {
                self.products.retain(|p| p.id != id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
