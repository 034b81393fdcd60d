// libs/auth-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::auth::Role;

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
    pub device_descriptor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutAllRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub principal: PrincipalSummary,
}

// ==============================================================================
// PRINCIPAL & SESSION RECORDS
// ==============================================================================

/// The authentication capability surface shared by both principal kinds:
/// everything the login state machine needs, nothing domain-specific.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub id: Uuid,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub is_active: bool,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub phone_verified: bool,
    #[serde(default)]
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// One (principal, device) authenticated context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub refresh_hash: String,
    pub device: String,
    pub ip_address: String,
    pub user_agent: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub last_used_at: DateTime<Utc>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

// ==============================================================================
// PER-ROLE AUTH POLICY
// ==============================================================================

/// Lockout, TTL and capping knobs for one principal kind. The auth manager
/// itself is role-agnostic; all variation lives here.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub role: Role,
    pub session_table: &'static str,
    pub lockout_threshold: i32,
    pub lockout_duration: Duration,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub refresh_ttl_remembered: Duration,
    pub session_cap: Option<usize>,
    pub requires_email_verification: bool,
}

impl AuthPolicy {
    pub fn patient() -> Self {
        Self {
            role: Role::Patient,
            session_table: "patient_sessions",
            lockout_threshold: 3,
            lockout_duration: Duration::hours(1),
            access_ttl: Duration::minutes(30),
            refresh_ttl: Duration::days(7),
            refresh_ttl_remembered: Duration::days(30),
            session_cap: Some(3),
            requires_email_verification: true,
        }
    }

    pub fn provider() -> Self {
        Self {
            role: Role::Provider,
            session_table: "provider_sessions",
            lockout_threshold: 5,
            lockout_duration: Duration::minutes(30),
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::hours(1),
            refresh_ttl_remembered: Duration::hours(24),
            session_cap: None,
            requires_email_verification: false,
        }
    }

    pub fn refresh_ttl_for(&self, remember_me: bool) -> Duration {
        if remember_me {
            self.refresh_ttl_remembered
        } else {
            self.refresh_ttl
        }
    }

    /// Access tokens live twice as long on remembered devices.
    pub fn access_ttl_for(&self, remember_me: bool) -> Duration {
        if remember_me {
            self.access_ttl * 2
        } else {
            self.access_ttl
        }
    }
}

/// Request-scoped caller context, passed explicitly into every auth
/// operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub source_addr: String,
    pub user_agent: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked")]
    AccountLocked(DateTime<Utc>),

    #[error("Account deactivated")]
    AccountDeactivated,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Store error: {0}")]
    StoreError(String),
}
