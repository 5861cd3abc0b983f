//! Server configuration

use fhir_term_core::content_type::DEFAULT_ROOT_URL;

/// Server configuration loaded from environment variables
pub struct Config {
    /// Postgres connection string; cache-only mode when unset
    pub database_url: Option<String>,
    pub bind_address: String,
    /// Public base URL used for `fullUrl` and `Location` values
    pub base_url: String,
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            base_url: std::env::var("BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_ROOT_URL.into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }
}
