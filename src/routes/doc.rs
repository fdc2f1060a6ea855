use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        orders::{CreateOrderRequest, OrderList},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
    },
    models::{Order, OrderItem, Product, Role, ShippingAddress, User},
    response::{ApiResponse, Meta},
    routes::{auth, health, orders, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::create_order,
        orders::list_my_orders,
        orders::get_order,
    ),
    components(
        schemas(
            User,
            Role,
            Product,
            Order,
            OrderItem,
            ShippingAddress,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            CreateOrderRequest,
            ProductList,
            OrderList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<User>,
            ApiResponse<LoginResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
