use std::sync::Arc;

use crate::{config::AppConfig, db::OrmConn};

#[derive(Clone)]
pub struct AppState {
    pub orm: Arc<OrmConn>,
    pub auth: Arc<AuthSettings>,
}

/// Token signing parameters shared by the login service and the auth extractor.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
}

impl AuthSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            jwt_ttl_hours: config.jwt_ttl_hours,
        }
    }
}

impl AppState {
    pub fn new(orm: OrmConn, auth: AuthSettings) -> Self {
        Self {
            orm: Arc::new(orm),
            auth: Arc::new(auth),
        }
    }

    /// Connection for sea-orm queries and transactions.
    pub fn db(&self) -> &OrmConn {
        &self.orm
    }
}
