// libs/availability-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE AVAILABILITY MODELS
// ==============================================================================

/// A provider-declared local time window on one date. Concrete bookable
/// slots are derived from it at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityTemplate {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub timezone: String,
    pub slot_duration_minutes: i32,
    pub break_duration_minutes: i32,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub recurrence_end_date: Option<NaiveDate>,
    pub max_appointments_per_slot: i32,
    pub current_appointments: i32,
    pub appointment_type: AppointmentType,
    pub status: TemplateStatus,
    pub location: LocationInfo,
    pub pricing: Option<PricingInfo>,
    pub special_requirements: Option<Vec<String>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The atomic unit a patient books. Start/end are absolute UTC instants
/// derived from the parent template's local window and timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub availability_id: Uuid,
    pub provider_id: Uuid,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub status: SlotStatus,
    pub patient_id: Option<Uuid>,
    pub appointment_type: AppointmentType,
    pub booking_reference: String,
    pub pricing: Option<PricingInfo>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Cancelled,
    Blocked,
    Maintenance,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
            SlotStatus::Cancelled => write!(f, "cancelled"),
            SlotStatus::Blocked => write!(f, "blocked"),
            SlotStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Active,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Consultation,
    FollowUp,
    Emergency,
    Telemedicine,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Consultation => write!(f, "consultation"),
            AppointmentType::FollowUp => write!(f, "follow_up"),
            AppointmentType::Emergency => write!(f, "emergency"),
            AppointmentType::Telemedicine => write!(f, "telemedicine"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Clinic,
    Hospital,
    Telemedicine,
    HomeVisit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationInfo {
    pub location_type: LocationType,
    pub address: Option<String>,
    pub room_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingInfo {
    pub base_fee: f64,
    pub insurance_accepted: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Create-availability body. Date and times arrive as strings so format
/// problems surface as per-field validation errors rather than 422s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub timezone: String,
    pub slot_duration_minutes: i32,
    #[serde(default)]
    pub break_duration_minutes: i32,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub recurrence_end_date: Option<String>,
    #[serde(default = "default_max_per_slot")]
    pub max_appointments_per_slot: i32,
    pub appointment_type: AppointmentType,
    pub location: LocationInfo,
    pub pricing: Option<PricingInfo>,
    pub special_requirements: Option<Vec<String>>,
    pub notes: Option<String>,
}

fn default_max_per_slot() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityResponse {
    pub availability_ids: Vec<Uuid>,
    pub slots_created: usize,
    pub date_range: DateRange,
    pub total_appointments_available: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Slot patch. Start/end rewrites are not supported; delete and recreate
/// the template instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    pub status: Option<SlotStatus>,
    pub notes: Option<String>,
    pub pricing: Option<PricingInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteSlotQuery {
    #[serde(default)]
    pub delete_recurring: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityViewQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<SlotStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub timezone: Option<String>,
}

/// Grouped-by-date provider availability view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityDayView {
    pub date: NaiveDate,
    pub slots: Vec<SlotProjection>,
    pub summary: DaySummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaySummary {
    pub total: usize,
    pub available: usize,
    pub booked: usize,
    pub unavailable: usize,
}

/// Slot rendered for a caller, times formatted in the display timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotProjection {
    pub slot_id: Uuid,
    pub availability_id: Uuid,
    pub provider_id: Uuid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub timezone: String,
    pub status: SlotStatus,
    pub appointment_type: AppointmentType,
    pub booking_reference: Option<String>,
    pub pricing: Option<PricingInfo>,
}

// ==============================================================================
// SEARCH MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub specialization: Option<String>,
    pub location: Option<String>,
    pub appointment_type: Option<AppointmentType>,
    pub insurance_accepted: Option<bool>,
    pub max_price: Option<f64>,
    pub timezone: Option<String>,
    pub available_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub provider_id: Uuid,
    pub name: String,
    pub specialization: String,
    pub clinic_address: String,
    pub years_of_experience: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSearchResult {
    pub provider: ProviderSummary,
    pub available_slots: Vec<SlotProjection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ProviderSearchResult>,
    pub total_providers: usize,
    pub total_slots: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed")]
    ValidationFailed(BTreeMap<String, Vec<String>>),

    #[error("Schedule conflict: {0}")]
    ScheduleConflict(String),

    #[error("Cannot modify booked slot")]
    BookedSlot,

    #[error("Recurring delete blocked: {0}")]
    BookedSibling(String),

    #[error("Store error: {0}")]
    StoreError(String),
}

// ==============================================================================
// PROVIDER DIRECTORY PROJECTION
// ==============================================================================

/// Subset of the provider row the scheduling paths need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub years_of_experience: i32,
    pub clinic_street: String,
    pub clinic_city: String,
    pub clinic_state: String,
    pub clinic_zip: String,
    pub is_active: bool,
}

impl ProviderRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn clinic_address(&self) -> String {
        format!(
            "{}, {}, {} {}",
            self.clinic_street, self.clinic_city, self.clinic_state, self.clinic_zip
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted_slots: usize,
    pub cascaded: bool,
}
