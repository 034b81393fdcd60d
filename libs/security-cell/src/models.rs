use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Events older than this may be purged by the store's retention job.
pub const EVENT_RETENTION_YEARS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    LoginSuccess,
    LoginFailed,
    AccountLockout,
    RefreshTokenUsed,
    Logout,
    LogoutAll,
    SessionRevoked,
    RegistrationRejected,
    RateLimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Append-only security event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub principal_id: Option<Uuid>,
    pub kind: SecurityEventKind,
    pub severity: Severity,
    pub source_addr: String,
    pub user_agent: String,
    pub detail: Option<Value>,
    pub risk_score: u8,
    pub suspicious: bool,
    pub created_at: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(
        kind: SecurityEventKind,
        principal_id: Option<Uuid>,
        source_addr: &str,
        user_agent: &str,
    ) -> Self {
        let severity = Self::default_severity(kind);
        let risk_score = Self::base_risk(kind);
        Self {
            id: Uuid::new_v4(),
            principal_id,
            kind,
            severity,
            source_addr: source_addr.to_string(),
            user_agent: user_agent.to_string(),
            detail: None,
            risk_score,
            suspicious: risk_score >= 70,
            created_at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    fn default_severity(kind: SecurityEventKind) -> Severity {
        match kind {
            SecurityEventKind::LoginSuccess
            | SecurityEventKind::Logout
            | SecurityEventKind::LogoutAll
            | SecurityEventKind::RefreshTokenUsed
            | SecurityEventKind::SessionRevoked => Severity::Info,
            SecurityEventKind::LoginFailed | SecurityEventKind::RegistrationRejected => {
                Severity::Warning
            }
            SecurityEventKind::AccountLockout | SecurityEventKind::RateLimitExceeded => {
                Severity::Critical
            }
        }
    }

    fn base_risk(kind: SecurityEventKind) -> u8 {
        match kind {
            SecurityEventKind::LoginSuccess => 0,
            SecurityEventKind::Logout | SecurityEventKind::LogoutAll => 0,
            SecurityEventKind::RefreshTokenUsed => 10,
            SecurityEventKind::SessionRevoked => 20,
            SecurityEventKind::LoginFailed => 40,
            SecurityEventKind::RegistrationRejected => 30,
            SecurityEventKind::AccountLockout => 80,
            SecurityEventKind::RateLimitExceeded => 75,
        }
    }
}
