use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Provider,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Provider => write!(f, "provider"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

/// Claims carried by short-lived access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub role: Role,
    pub email: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub sid: Uuid,
    pub fp: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by refresh tokens. `jti` is a random 32-byte identifier
/// minted per rotation; the session row stores a digest of the whole token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub role: Role,
    pub sid: Uuid,
    pub jti: String,
    pub fp: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller identity, inserted into request extensions by the
/// auth middleware after access-token verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub email: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub session_id: Uuid,
    pub fingerprint: String,
}

impl AuthUser {
    pub fn from_claims(claims: &AccessClaims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            email: claims.email.clone(),
            email_verified: claims.email_verified,
            phone_verified: claims.phone_verified,
            session_id: claims.sid,
            fingerprint: claims.fp.clone(),
        }
    }
}

/// Wire shape of a successful login or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Redaction-free session projection returned by the session listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub device: String,
    pub ip_address: String,
    pub user_agent: String,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub location: Option<String>,
    pub is_current: bool,
}
