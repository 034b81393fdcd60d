// libs/auth-cell/src/services/session.rs
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::StoreClient;

use crate::models::{AuthError, SessionRecord};

/// Store access for per-(principal, device) session records. Provider and
/// patient sessions live in separate partitions; the table name comes from
/// the caller's policy.
pub struct SessionService {
    store: StoreClient,
}

impl SessionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    pub async fn create(
        &self,
        table: &str,
        principal_id: Uuid,
        session_id: Uuid,
        refresh_hash: &str,
        device: &str,
        ip_address: &str,
        user_agent: &str,
        ttl: Duration,
    ) -> Result<SessionRecord, AuthError> {
        let now = Utc::now();
        let row = json!({
            "id": session_id,
            "principal_id": principal_id,
            "refresh_hash": refresh_hash,
            "device": device,
            "ip_address": ip_address,
            "user_agent": user_agent,
            "expires_at": (now + ttl).to_rfc3339(),
            "revoked": false,
            "last_used_at": now.to_rfc3339(),
            "location": null,
            "created_at": now.to_rfc3339(),
        });

        let path = format!("/rest/v1/{}", table);
        let result: Vec<SessionRecord> = self
            .store
            .request_with_headers(
                Method::POST,
                &path,
                Some(row),
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::StoreError("Session insert returned no row".to_string()))
    }

    pub async fn find(&self, table: &str, session_id: Uuid) -> Result<Option<SessionRecord>, AuthError> {
        let path = format!("/rest/v1/{}?id=eq.{}", table, session_id);
        let result: Vec<SessionRecord> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;

        Ok(result.into_iter().next())
    }

    /// Rotate the refresh credential. The update is conditioned on the
    /// current hash still matching, so two racing refreshes of the same
    /// token cannot both succeed.
    pub async fn rotate(
        &self,
        table: &str,
        session_id: Uuid,
        old_hash: &str,
        new_hash: &str,
    ) -> Result<SessionRecord, AuthError> {
        let path = format!(
            "/rest/v1/{}?id=eq.{}&refresh_hash=eq.{}&revoked=eq.false",
            table, session_id, old_hash
        );
        let patch = json!({
            "refresh_hash": new_hash,
            "last_used_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<SessionRecord> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(patch),
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;

        result.into_iter().next().ok_or(AuthError::InvalidRefreshToken)
    }

    /// Revoke one session. Scoped to the owning principal; revoking an
    /// already-revoked session is a no-op, which keeps logout idempotent.
    pub async fn revoke(
        &self,
        table: &str,
        session_id: Uuid,
        principal_id: Uuid,
    ) -> Result<usize, AuthError> {
        let path = format!(
            "/rest/v1/{}?id=eq.{}&principal_id=eq.{}",
            table, session_id, principal_id
        );
        let result: Vec<Value> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(json!({ "revoked": true })),
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;

        debug!("Revoked {} session rows", result.len());
        Ok(result.len())
    }

    pub async fn revoke_all(&self, table: &str, principal_id: Uuid) -> Result<usize, AuthError> {
        let path = format!(
            "/rest/v1/{}?principal_id=eq.{}&revoked=eq.false",
            table, principal_id
        );
        let result: Vec<Value> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(json!({ "revoked": true })),
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))?;

        info!(
            "Revoked all {} live sessions for principal {}",
            result.len(),
            principal_id
        );
        Ok(result.len())
    }

    pub async fn list_live(
        &self,
        table: &str,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, AuthError> {
        let path = format!(
            "/rest/v1/{}?principal_id=eq.{}&revoked=eq.false&expires_at=gt.{}&order=last_used_at.desc",
            table,
            principal_id,
            now.to_rfc3339()
        );
        self.store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AuthError::StoreError(e.to_string()))
    }

    /// Evict least-recently-used sessions beyond the cap. Called after a
    /// login created its session, so the newest one is always kept.
    pub async fn enforce_cap(
        &self,
        table: &str,
        principal_id: Uuid,
        cap: usize,
    ) -> Result<usize, AuthError> {
        let live = self.list_live(table, principal_id, Utc::now()).await?;
        if live.len() <= cap {
            return Ok(0);
        }

        let mut evicted = 0usize;
        for stale in &live[cap..] {
            evicted += self.revoke(table, stale.id, principal_id).await?;
        }

        info!(
            "Evicted {} sessions beyond cap {} for principal {}",
            evicted, cap, principal_id
        );
        Ok(evicted)
    }
}
