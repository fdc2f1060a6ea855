use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    /// Origin allowed by CORS, the storefront's own URL.
    pub client_url: String,
    pub body_limit_bytes: usize,
    pub concurrency_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let jwt_ttl_hours = parse_or("JWT_TTL_HOURS", 24);
        let client_url =
            env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let body_limit_bytes = parse_or("BODY_LIMIT_BYTES", 10 * 1024 * 1024);
        let concurrency_limit = parse_or("CONCURRENCY_LIMIT", 100);
        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours,
            client_url,
            body_limit_bytes,
            concurrency_limit,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
