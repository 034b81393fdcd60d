// libs/patient-cell/src/services/verification.rs
use chrono::{Duration, Utc};
use rand::Rng;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::StoreClient;

use crate::models::{PatientError, VerificationKind, VerificationToken};

const EMAIL_TOKEN_TTL_HOURS: i64 = 24;
const PHONE_OTP_TTL_MINUTES: i64 = 5;

/// Issues and consumes single-use verification tokens. Consumption is a
/// conditional update on `used = false`, so a token can be redeemed at
/// most once even under concurrent submissions.
pub struct VerificationService {
    store: StoreClient,
}

impl VerificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    /// UUID token, 24 hour lifetime. Delivery belongs to the mail
    /// transport.
    pub async fn issue_email_token(&self, patient_id: Uuid) -> Result<VerificationToken, PatientError> {
        self.issue(
            patient_id,
            Uuid::new_v4().to_string(),
            VerificationKind::Email,
            Duration::hours(EMAIL_TOKEN_TTL_HOURS),
        )
        .await
    }

    /// 6-digit OTP, 5 minute lifetime.
    pub async fn issue_phone_token(&self, patient_id: Uuid) -> Result<VerificationToken, PatientError> {
        let otp = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.issue(
            patient_id,
            otp,
            VerificationKind::Phone,
            Duration::minutes(PHONE_OTP_TTL_MINUTES),
        )
        .await
    }

    pub async fn verify_email(&self, token: &str) -> Result<Uuid, PatientError> {
        let patient_id = self.consume(token, VerificationKind::Email).await?;
        self.mark_verified(patient_id, "email_verified").await?;
        info!("Email verified for patient {}", patient_id);
        Ok(patient_id)
    }

    pub async fn verify_phone(&self, token: &str) -> Result<Uuid, PatientError> {
        let patient_id = self.consume(token, VerificationKind::Phone).await?;
        self.mark_verified(patient_id, "phone_verified").await?;
        info!("Phone verified for patient {}", patient_id);
        Ok(patient_id)
    }

    async fn issue(
        &self,
        patient_id: Uuid,
        token: String,
        kind: VerificationKind,
        ttl: Duration,
    ) -> Result<VerificationToken, PatientError> {
        let now = Utc::now();
        let row = json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "token": token,
            "kind": kind,
            "expires_at": (now + ttl).to_rfc3339(),
            "used": false,
            "created_at": now.to_rfc3339(),
        });

        let result: Vec<VerificationToken> = self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/verification_tokens",
                Some(row),
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| PatientError::StoreError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::StoreError("Token insert returned no row".to_string()))
    }

    /// Burn the token. The filter carries kind, expiry and the unused flag;
    /// zero affected rows means invalid, expired or already redeemed.
    async fn consume(&self, token: &str, kind: VerificationKind) -> Result<Uuid, PatientError> {
        let kind_str = match kind {
            VerificationKind::Email => "email",
            VerificationKind::Phone => "phone",
        };
        let path = format!(
            "/rest/v1/verification_tokens?token=eq.{}&kind=eq.{}&used=eq.false&expires_at=gt.{}",
            urlencoding::encode(token),
            kind_str,
            Utc::now().to_rfc3339()
        );

        let result: Vec<VerificationToken> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(json!({ "used": true })),
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| PatientError::StoreError(e.to_string()))?;

        let Some(consumed) = result.into_iter().next() else {
            debug!("Verification token rejected ({})", kind_str);
            return Err(PatientError::InvalidVerificationToken);
        };

        Ok(consumed.patient_id)
    }

    async fn mark_verified(&self, patient_id: Uuid, field: &str) -> Result<(), PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let _: Value = self
            .store
            .request(Method::PATCH, &path, Some(json!({ field: true })))
            .await
            .map_err(|e| PatientError::StoreError(e.to_string()))?;
        Ok(())
    }
}
