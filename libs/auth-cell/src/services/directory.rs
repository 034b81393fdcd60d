// libs/auth-cell/src/services/directory.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::StoreClient;

use crate::models::{AuthError, AuthPolicy, PrincipalRecord};

/// Capability surface the auth manager needs from a principal directory.
/// Provider and patient rows differ in shape; both project onto
/// `PrincipalRecord` so the login state machine exists exactly once.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    fn policy(&self) -> &AuthPolicy;

    /// Look up by case-folded email or by phone number.
    async fn lookup_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PrincipalRecord>, AuthError>;

    async fn lookup_by_id(&self, id: Uuid) -> Result<Option<PrincipalRecord>, AuthError>;

    /// Persist a failed attempt: bumped counter and, past the threshold,
    /// the lockout deadline.
    async fn record_failed_login(
        &self,
        id: Uuid,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError>;

    /// Reset the failure ladder and stamp the login time.
    async fn record_successful_login(&self, id: Uuid) -> Result<(), AuthError>;
}

/// Store-backed directory over one principal collection. The two
/// constructors differ only in collection name and policy.
pub struct StoreDirectory {
    store: StoreClient,
    table: &'static str,
    policy: AuthPolicy,
}

impl StoreDirectory {
    pub fn provider(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            table: "providers",
            policy: AuthPolicy::provider(),
        }
    }

    pub fn patient(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            table: "patients",
            policy: AuthPolicy::patient(),
        }
    }
}

#[async_trait]
impl PrincipalDirectory for StoreDirectory {
    fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    async fn lookup_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<PrincipalRecord>, AuthError> {
        let folded = identifier.trim().to_lowercase();
        debug!("Principal lookup in {}", self.table);

        let path = format!(
            "/rest/v1/{}?or=(email.eq.{},phone_number.eq.{})",
            self.table,
            urlencoding::encode(&folded),
            urlencoding::encode(identifier.trim())
        );
        let result: Vec<PrincipalRecord> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    async fn lookup_by_id(&self, id: Uuid) -> Result<Option<PrincipalRecord>, AuthError> {
        let path = format!("/rest/v1/{}?id=eq.{}", self.table, id);
        let result: Vec<PrincipalRecord> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError> {
        let patch = json!({
            "failed_login_attempts": failed_attempts,
            "locked_until": locked_until.map(|t| t.to_rfc3339()),
        });
        let path = format!("/rest/v1/{}?id=eq.{}", self.table, id);
        let _: Value = self
            .store
            .request(Method::PATCH, &path, Some(patch))
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn record_successful_login(&self, id: Uuid) -> Result<(), AuthError> {
        let patch = json!({
            "failed_login_attempts": 0,
            "locked_until": null,
            "last_login_at": Utc::now().to_rfc3339(),
        });
        let path = format!("/rest/v1/{}?id=eq.{}", self.table, id);
        let _: Value = self
            .store
            .request(Method::PATCH, &path, Some(patch))
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;
        Ok(())
    }
}
