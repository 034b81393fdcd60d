// libs/patient-cell/src/services/patient.rs
use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use security_cell::services::password::PasswordService;
use shared_config::AppConfig;
use shared_database::postgrest::StoreClient;
use shared_models::error::FieldErrors;

use crate::models::{Patient, PatientError, RegisterPatientRequest};
use crate::services::verification::VerificationService;

pub struct PatientService {
    store: StoreClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    /// Register a patient. The account starts unverified; login is gated
    /// on email verification, so registration also seeds the verification
    /// tokens (their delivery is the mail/SMS transport's concern).
    pub async fn register(
        &self,
        request: RegisterPatientRequest,
        verification: &VerificationService,
    ) -> Result<Patient, PatientError> {
        debug!("Registering patient {}", request.email);

        validate_registration(&request)?;

        let email = request.email.trim().to_lowercase();
        let phone = request.phone_number.trim().to_string();

        self.check_unique("email", &email).await?;
        self.check_unique("phone_number", &phone).await?;

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| PatientError::StoreError(e.to_string()))?;

        let patient_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let row = json!({
            "id": patient_id,
            "first_name": request.first_name.trim(),
            "last_name": request.last_name.trim(),
            "email": email,
            "phone_number": phone,
            "password_hash": password_hash,
            "date_of_birth": request.date_of_birth,
            "gender": request.gender,
            "address_street": request.address.street.trim(),
            "address_city": request.address.city.trim(),
            "address_state": request.address.state.trim(),
            "address_zip": request.address.zip.trim(),
            "emergency_contact": request.emergency_contact,
            "medical_history": request.medical_history,
            "insurance_info": request.insurance_info,
            "marketing_consent": request.marketing_consent,
            "data_retention_consent": request.data_retention_consent,
            "hipaa_consent": request.hipaa_consent,
            "email_verified": false,
            "phone_verified": false,
            "is_active": true,
            "failed_login_attempts": 0,
            "locked_until": null,
            "last_login_at": null,
            "created_at": now,
            "updated_at": now,
        });

        let result: Vec<Patient> = self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(row),
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| {
                if e.to_string().contains("constraint") {
                    PatientError::Duplicate("identity")
                } else {
                    PatientError::StoreError(e.to_string())
                }
            })?;

        let patient = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::StoreError("Insert returned no row".to_string()))?;

        verification.issue_email_token(patient.id).await?;
        verification.issue_phone_token(patient.id).await?;

        info!("Patient {} registered (verification pending)", patient.id);
        Ok(patient)
    }

    async fn check_unique(&self, field: &'static str, value: &str) -> Result<(), PatientError> {
        let path = format!(
            "/rest/v1/patients?{}=eq.{}&select=id",
            field,
            urlencoding::encode(value)
        );
        let existing: Vec<Value> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| PatientError::StoreError(e.to_string()))?;

        if existing.is_empty() {
            Ok(())
        } else {
            Err(PatientError::Duplicate(field))
        }
    }
}

fn validate_registration(request: &RegisterPatientRequest) -> Result<(), PatientError> {
    let mut errors = FieldErrors::new();

    if request.first_name.trim().is_empty() {
        errors.push("first_name", "Required");
    }
    if request.last_name.trim().is_empty() {
        errors.push("last_name", "Required");
    }

    let email_re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex");
    if !email_re.is_match(request.email.trim()) {
        errors.push("email", "Invalid email address");
    }

    let phone_re = Regex::new(r"^\+\d{1,15}$").expect("static regex");
    if !phone_re.is_match(request.phone_number.trim()) {
        errors.push("phone_number", "Phone must be E.164 (+ followed by up to 15 digits)");
    }

    for issue in PasswordService::strength_issues(&request.password) {
        errors.push("password", issue);
    }
    if request.password != request.confirm_password {
        errors.push("confirm_password", "Passwords do not match");
    }

    match chrono::NaiveDate::parse_from_str(&request.date_of_birth, "%Y-%m-%d") {
        Ok(dob) => {
            if dob >= Utc::now().date_naive() {
                errors.push("date_of_birth", "Must be in the past");
            }
        }
        Err(_) => errors.push("date_of_birth", "Date must be YYYY-MM-DD"),
    }

    let zip_re = Regex::new(r"^\d{5}(-\d{4})?$").expect("static regex");
    if !zip_re.is_match(request.address.zip.trim()) {
        errors.push("address.zip", "ZIP must be 5 digits or ZIP+4");
    }

    if !request.hipaa_consent {
        errors.push("hipaa_consent", "Consent is required to create an account");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(PatientError::ValidationFailed(errors.into_map()))
    }
}
