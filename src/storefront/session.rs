//! Signed-in shopper or admin.

use async_trait::async_trait;
use mockall::automock;

use crate::{
    dto::auth::{LoginResponse, RegisterRequest},
    models::{Role, User},
    storefront::{
        cart::CartStore,
        error::{ClientError, ClientResult},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
    /// Opaque bearer credential sent on every protected call.
    pub token: String,
}

impl Session {
    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub fn require_admin(&self) -> ClientResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ClientError::Forbidden("Admin access required".into()))
        }
    }

    /// End the session; the shopper's cart does not outlive it.
    pub fn sign_out(self, cart: &CartStore) {
        tracing::debug!(user_id = %self.user.id, "signing out");
        cart.reset();
    }
}

impl From<LoginResponse> for Session {
    fn from(resp: LoginResponse) -> Self {
        Self {
            user: resp.user,
            token: resp.token,
        }
    }
}

/// Issues sessions.
#[automock]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> ClientResult<Session>;

    async fn register(&self, request: &RegisterRequest) -> ClientResult<User>;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::storefront::cart::{CartAction, ProductSnapshot};

    fn session(role: Role) -> Session {
        Session {
            user: User {
                id: Uuid::new_v4(),
                name: "Bilal".into(),
                email: "bilal@example.com".into(),
                role,
                created_at: Utc::now(),
            },
            token: "token".into(),
        }
    }

    #[test]
    fn only_admins_pass_the_admin_gate() {
        assert!(session(Role::Admin).require_admin().is_ok());
        assert!(matches!(
            session(Role::User).require_admin(),
            Err(ClientError::Forbidden(_))
        ));
    }

    #[test]
    fn sign_out_clears_the_cart() {
        let cart = CartStore::new();
        cart.dispatch(CartAction::add(ProductSnapshot {
            product_id: Uuid::new_v4(),
            title: "Casio".into(),
            price: 100,
            images: vec![],
        }));

        session(Role::User).sign_out(&cart);
        assert!(cart.snapshot().is_empty());
    }

    #[tokio::test]
    async fn provider_can_be_mocked() {
        let mut provider = MockSessionProvider::new();
        provider
            .expect_login()
            .withf(|email, password| email == "bilal@example.com" && password == "secret1")
            .return_once(|_, _| Ok(session(Role::User)));

        let signed_in = provider.login("bilal@example.com", "secret1").await.unwrap();
        assert_eq!(signed_in.role(), Role::User);
    }
}
