use anyhow::Result;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use shared_config::AppConfig;
use shared_database::postgrest::StoreClient;

use crate::models::{SecurityEvent, Severity};

/// Append-only writer for the security event log. Events are mirrored to
/// structured logging before they hit the store so a store outage never
/// loses the trace entirely.
pub struct SecurityEventService {
    store: StoreClient,
}

impl SecurityEventService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    #[instrument(skip(self, event))]
    pub async fn record(&self, event: SecurityEvent) -> Result<()> {
        self.log_to_tracing(&event);

        let row = json!({
            "id": event.id,
            "principal_id": event.principal_id,
            "kind": event.kind,
            "severity": event.severity,
            "source_addr": event.source_addr,
            "user_agent": event.user_agent,
            "detail": event.detail,
            "risk_score": event.risk_score,
            "suspicious": event.suspicious,
            "created_at": event.created_at.to_rfc3339(),
        });

        let _: Value = self
            .store
            .request(Method::POST, "/rest/v1/security_events", Some(row))
            .await?;

        Ok(())
    }

    /// Record without surfacing store failures. Auth flows call this so an
    /// event-log outage cannot block a login.
    pub async fn record_best_effort(&self, event: SecurityEvent) {
        if let Err(e) = self.record(event).await {
            error!("Failed to persist security event: {}", e);
        }
    }

    fn log_to_tracing(&self, event: &SecurityEvent) {
        match event.severity {
            Severity::Info => {
                info!(
                    event_id = %event.id,
                    kind = ?event.kind,
                    principal_id = ?event.principal_id,
                    source_addr = %event.source_addr,
                    risk_score = event.risk_score,
                    "SECURITY: {:?}", event.kind
                );
            }
            Severity::Warning => {
                warn!(
                    event_id = %event.id,
                    kind = ?event.kind,
                    principal_id = ?event.principal_id,
                    source_addr = %event.source_addr,
                    risk_score = event.risk_score,
                    "SECURITY: {:?}", event.kind
                );
            }
            Severity::Critical => {
                error!(
                    event_id = %event.id,
                    kind = ?event.kind,
                    principal_id = ?event.principal_id,
                    source_addr = %event.source_addr,
                    risk_score = event.risk_score,
                    "SECURITY ALERT: {:?}", event.kind
                );
            }
        }
    }
}
