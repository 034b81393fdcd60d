// libs/provider-cell/src/services/provider.rs
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

use crate::models::{Provider, ProviderError, RegisterProviderRequest};

pub struct ProviderService {
    store: StoreClient,
}

impl ProviderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    /// Register a provider. Email is stored case-folded to lowercase and
    /// the license to uppercase; uniqueness rides on those folded forms.
    pub async fn register(&self, request: RegisterProviderRequest) -> Result<Provider, ProviderError> {
        debug!("Registering provider {}", request.email);

        validate_registration(&request)?;

        let email = request.email.trim().to_lowercase();
        let license = request.license_number.trim().to_uppercase();
        let phone = request.phone_number.trim().to_string();

        self.check_unique("email", &email).await?;
        self.check_unique("phone_number", &phone).await?;
        self.check_unique("license_number", &license).await?;

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| ProviderError::StoreError(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "id": Uuid::new_v4(),
            "first_name": request.first_name.trim(),
            "last_name": request.last_name.trim(),
            "email": email,
            "phone_number": phone,
            "password_hash": password_hash,
            "specialization": request.specialization.trim(),
            "license_number": license,
            "years_of_experience": request.years_of_experience,
            "clinic_street": request.clinic_address.street.trim(),
            "clinic_city": request.clinic_address.city.trim(),
            "clinic_state": request.clinic_address.state.trim(),
            "clinic_zip": request.clinic_address.zip.trim(),
            "is_active": true,
            "email_verified": true,
            "phone_verified": false,
            "failed_login_attempts": 0,
            "locked_until": null,
            "last_login_at": null,
            "created_at": now,
            "updated_at": now,
        });

        let result: Vec<Provider> = self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/providers",
                Some(row),
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| {
                // A lost uniqueness race surfaces as a store constraint.
                if e.to_string().contains("constraint") {
                    ProviderError::Duplicate("identity")
                } else {
                    ProviderError::StoreError(e.to_string())
                }
            })?;

        let provider = result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::StoreError("Insert returned no row".to_string()))?;

        info!("Provider {} registered", provider.id);
        Ok(provider)
    }

    async fn check_unique(&self, field: &'static str, value: &str) -> Result<(), ProviderError> {
        let path = format!(
            "/rest/v1/providers?{}=eq.{}&select=id",
            field,
            urlencoding::encode(value)
        );
        let existing: Vec<Value> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| ProviderError::StoreError(e.to_string()))?;

        if existing.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::Duplicate(field))
        }
    }
}

fn validate_registration(request: &RegisterProviderRequest) -> Result<(), ProviderError> {
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

    if request.specialization.trim().is_empty() {
        errors.push("specialization", "Required");
    }

    let license_re = Regex::new(r"^[A-Z0-9]+$").expect("static regex");
    if !license_re.is_match(&request.license_number.trim().to_uppercase()) {
        errors.push("license_number", "License must be alphanumeric");
    }

    if !(0..=50).contains(&request.years_of_experience) {
        errors.push("years_of_experience", "Must be between 0 and 50");
    }

    if request.clinic_address.street.trim().is_empty() {
        errors.push("clinic_address.street", "Required");
    }
    if request.clinic_address.city.trim().is_empty() {
        errors.push("clinic_address.city", "Required");
    }
    if request.clinic_address.state.trim().is_empty() {
        errors.push("clinic_address.state", "Required");
    }
    let zip_re = Regex::new(r"^\d{5}(-\d{4})?$").expect("static regex");
    if !zip_re.is_match(request.clinic_address.zip.trim()) {
        errors.push("clinic_address.zip", "ZIP must be 5 digits or ZIP+4");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::ValidationFailed(errors.into_map()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> RegisterProviderRequest {
        RegisterProviderRequest {
            first_name: "Maria".to_string(),
            last_name: "Alvarez".to_string(),
            email: "maria@example.com".to_string(),
            phone_number: "+15551234567".to_string(),
            password: "Str0ngPassw0rd".to_string(),
            confirm_password: "Str0ngPassw0rd".to_string(),
            specialization: "Cardiology".to_string(),
            license_number: "MD12345".to_string(),
            years_of_experience: 12,
            clinic_address: crate::models::ClinicAddress {
                street: "12 Harbor Way".to_string(),
                city: "Boston".to_string(),
                state: "MA".to_string(),
                zip: "02110".to_string(),
            },
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(validate_registration(&valid_request()).is_ok());
    }

    #[test]
    fn bad_phone_and_zip_are_both_reported() {
        let mut request = valid_request();
        request.phone_number = "555-1234".to_string();
        request.clinic_address.zip = "2110".to_string();

        let Err(ProviderError::ValidationFailed(fields)) = validate_registration(&request) else {
            panic!("expected validation failure");
        };
        assert!(fields.contains_key("phone_number"));
        assert!(fields.contains_key("clinic_address.zip"));
    }

    #[test]
    fn experience_bounds_are_enforced() {
        let mut request = valid_request();
        request.years_of_experience = 51;
        assert!(validate_registration(&request).is_err());

        request.years_of_experience = -1;
        assert!(validate_registration(&request).is_err());

        request.years_of_experience = 0;
        assert!(validate_registration(&request).is_ok());
    }

    #[test]
    fn password_mismatch_is_rejected() {
        let mut request = valid_request();
        request.confirm_password = "Different1".to_string();
        assert!(validate_registration(&request).is_err());
    }
}
