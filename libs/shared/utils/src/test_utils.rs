use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AccessClaims, RefreshClaims, Role};

use crate::digest::{device_fingerprint, random_token_id};
use crate::jwt::mint_token;

pub struct TestConfig {
    pub store_url: String,
    pub access_secret: String,
    pub refresh_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            store_url: "http://localhost:54321".to_string(),
            access_secret: "test-access-secret-key-that-is-long-enough".to_string(),
            refresh_secret: "test-refresh-secret-key-that-is-long-enough".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_store_url(store_url: &str) -> Self {
        Self {
            store_url: store_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            store_url: self.store_url.clone(),
            store_api_key: "test-api-key".to_string(),
            access_token_secret: self.access_secret.clone(),
            refresh_token_secret: self.refresh_secret.clone(),
            field_encryption_key: "0123456789abcdef0123456789abcdef".to_string(),
            listen_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestPrincipal {
    pub id: Uuid,
    pub role: Role,
    pub email: String,
    pub session_id: Uuid,
}

impl TestPrincipal {
    pub fn provider(email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Provider,
            email: email.to_string(),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Patient,
            email: email.to_string(),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn access_token(&self, secret: &str) -> String {
        self.access_token_with_expiry(secret, Duration::hours(1))
    }

    pub fn expired_access_token(&self, secret: &str) -> String {
        self.access_token_with_expiry(secret, Duration::hours(-1))
    }

    fn access_token_with_expiry(&self, secret: &str, ttl: Duration) -> String {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: self.id,
            role: self.role,
            email: self.email.clone(),
            email_verified: true,
            phone_verified: true,
            sid: self.session_id,
            fp: device_fingerprint("test-agent", "127.0.0.1", "test-device"),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        mint_token(&claims, secret).expect("test token mint")
    }

    pub fn refresh_token(&self, secret: &str) -> String {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: self.id,
            role: self.role,
            sid: self.session_id,
            jti: random_token_id(),
            fp: device_fingerprint("test-agent", "127.0.0.1", "test-device"),
            iat: now.timestamp(),
            exp: (now + Duration::days(7)).timestamp(),
        };
        mint_token(&claims, secret).expect("test token mint")
    }
}
