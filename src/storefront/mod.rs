//! Client-side storefront core: the per-session cart, checkout, catalog pages and the
//! admin editor, talking to the API through gateway traits.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod client;
pub mod error;
pub mod session;

pub use admin::AdminCatalogEditor;
pub use cart::{CartAction, CartLine, CartState, CartStore, ProductSnapshot};
pub use catalog::{CatalogGateway, ProductPage, Section, load_product_page};
pub use checkout::{CheckoutError, CheckoutFlow, CheckoutState, OrderGateway, ShippingForm};
pub use client::{ApiClient, ClientConfig};
pub use error::{ClientError, ClientResult, ErrorKind};
pub use session::{Session, SessionProvider};
