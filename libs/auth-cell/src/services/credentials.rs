// libs/auth-cell/src/services/credentials.rs
use chrono::{Duration, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AccessClaims, RefreshClaims, Role};
use shared_utils::digest::random_token_id;
use shared_utils::jwt::{mint_token, validate_token};

use crate::models::{AuthError, PrincipalRecord};

/// Mints and verifies the two token kinds. Access and refresh tokens are
/// signed with separate secrets so one leaked key cannot forge the other.
pub struct CredentialService {
    access_secret: String,
    refresh_secret: String,
}

pub struct MintedPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_in: i64,
}

impl CredentialService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
        }
    }

    pub fn mint_pair(
        &self,
        principal: &PrincipalRecord,
        role: Role,
        session_id: Uuid,
        fingerprint: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<MintedPair, AuthError> {
        let now = Utc::now();

        let access_claims = AccessClaims {
            sub: principal.id,
            role,
            email: principal.email.clone(),
            email_verified: principal.email_verified,
            phone_verified: principal.phone_verified,
            sid: session_id,
            fp: fingerprint.to_string(),
            iat: now.timestamp(),
            exp: (now + access_ttl).timestamp(),
        };

        let refresh_claims = RefreshClaims {
            sub: principal.id,
            role,
            sid: session_id,
            jti: random_token_id(),
            fp: fingerprint.to_string(),
            iat: now.timestamp(),
            exp: (now + refresh_ttl).timestamp(),
        };

        let access_token =
            mint_token(&access_claims, &self.access_secret).map_err(AuthError::TokenError)?;
        let refresh_token =
            mint_token(&refresh_claims, &self.refresh_secret).map_err(AuthError::TokenError)?;

        Ok(MintedPair {
            access_token,
            refresh_token,
            access_expires_in: access_ttl.num_seconds(),
        })
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        validate_token(token, &self.refresh_secret).map_err(|_| AuthError::InvalidRefreshToken)
    }
}
