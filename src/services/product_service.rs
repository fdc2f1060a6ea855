use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    state::AppState,
};

const SLUG_TAKEN: &str = "Slug already exists";

pub async fn list_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items: Vec<Product> = Products::find()
        .order_by_desc(Column::CreatedAt)
        .all(state.db())
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(items.len() as i64);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product_by_slug(state: &AppState, slug: &str) -> AppResult<ApiResponse<Product>> {
    let product = Products::find()
        .filter(Column::Slug.eq(slug))
        .one(state.db())
        .await?
        .map(product_from_entity)
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("title is required".into()));
    }
    validate_amounts(Some(payload.price), Some(payload.count_in_stock))?;
    let slug = match payload.slug.filter(|s| !s.trim().is_empty()) {
        Some(slug) => checked_slug(slug.trim())?,
        None => slugify(&title)
            .ok_or_else(|| AppError::BadRequest("cannot derive a slug from title".into()))?,
    };

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        slug: Set(slug),
        description: Set(payload.description),
        brand: Set(payload.brand),
        category: Set(payload.category),
        price: Set(payload.price),
        count_in_stock: Set(payload.count_in_stock),
        images: Set(serde_json::json!(payload.images)),
        rating: Set(0.0),
        num_reviews: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(state.db())
    .await
    .map_err(|err| AppError::conflict_on_unique(err, SLUG_TAKEN))?;

    audit::record(
        state.db(),
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id, "slug": product.slug }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Partial update; concurrent edits are last-write-wins.
pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_amounts(payload.price, payload.count_in_stock)?;

    let existing = Products::find_by_id(id)
        .one(state.db())
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("title must not be empty".into()));
        }
        active.title = Set(title);
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(checked_slug(slug.trim())?);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(brand) = payload.brand {
        active.brand = Set(Some(brand));
    }
    if let Some(category) = payload.category {
        active.category = Set(Some(category));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(count_in_stock) = payload.count_in_stock {
        active.count_in_stock = Set(count_in_stock);
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active
        .update(state.db())
        .await
        .map_err(|err| AppError::conflict_on_unique(err, SLUG_TAKEN))?;

    audit::record(
        state.db(),
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(state.db()).await?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product"));
    }

    audit::record(
        state.db(),
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

/// Derive a URL-safe slug: lower-case ASCII alphanumeric runs joined by `-`.
pub fn slugify(title: &str) -> Option<String> {
    let slug = title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() { None } else { Some(slug) }
}

pub fn is_url_safe_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .split('-')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

fn checked_slug(slug: &str) -> AppResult<String> {
    if is_url_safe_slug(slug) {
        Ok(slug.to_string())
    } else {
        Err(AppError::BadRequest(
            "slug must contain only lower-case letters, digits and single dashes".into(),
        ))
    }
}

fn validate_amounts(price: Option<i64>, count_in_stock: Option<i32>) -> AppResult<()> {
    if price.is_some_and(|p| p < 0) {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if count_in_stock.is_some_and(|c| c < 0) {
        return Err(AppError::BadRequest("countInStock must not be negative".into()));
    }
    Ok(())
}

pub fn product_from_entity(model: ProductModel) -> Product {
    let images = match model.images {
        serde_json::Value::Array(values) => values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    Product {
        id: model.id,
        title: model.title,
        slug: model.slug,
        description: model.description,
        brand: model.brand,
        category: model.category,
        price: model.price,
        count_in_stock: model.count_in_stock,
        images,
        rating: model.rating,
        num_reviews: model.num_reviews,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
