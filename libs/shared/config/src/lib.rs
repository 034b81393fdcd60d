use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_api_key: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub field_encryption_key: String,
    pub listen_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            store_url: env::var("STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("STORE_URL not set, using empty value");
                    String::new()
                }),
            store_api_key: env::var("STORE_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("STORE_API_KEY not set, using empty value");
                    String::new()
                }),
            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .unwrap_or_else(|_| {
                    warn!("ACCESS_TOKEN_SECRET not set, using empty value");
                    String::new()
                }),
            refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                .unwrap_or_else(|_| {
                    warn!("REFRESH_TOKEN_SECRET not set, using empty value");
                    String::new()
                }),
            field_encryption_key: env::var("FIELD_ENCRYPTION_KEY")
                .unwrap_or_else(|_| {
                    warn!("FIELD_ENCRYPTION_KEY not set, using empty value");
                    String::new()
                }),
            listen_port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.store_url.is_empty()
            && !self.store_api_key.is_empty()
            && !self.access_token_secret.is_empty()
            && !self.refresh_token_secret.is_empty()
            // Stored-field encryption requires a 256-bit key minimum.
            && self.field_encryption_key.len() >= 32
    }

    // Access and refresh tokens must not share a signing key.
    pub fn has_distinct_signing_keys(&self) -> bool {
        self.access_token_secret != self.refresh_token_secret
    }
}
