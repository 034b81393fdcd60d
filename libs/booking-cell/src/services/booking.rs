// libs/booking-cell/src/services/booking.rs
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::models::{AvailabilitySlot, SlotStatus};
use shared_config::AppConfig;
use shared_database::postgrest::StoreClient;

use crate::models::{
    AppointmentView, BookAppointmentRequest, BookingConfirmation, BookingError,
    PatientAppointmentsPage, PatientAppointmentsQuery,
};

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct PatientProbe {
    #[allow(dead_code)]
    id: Uuid,
    is_active: bool,
}

/// Owner of the slot state machine. The only writer that may move a slot
/// into `booked`, and the only one that may move `booked` out again.
pub struct BookingService {
    store: StoreClient,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    /// Reserve a slot for a patient.
    ///
    /// The decision point is the `reserve_slot` store function: a single
    /// conditional `UPDATE ... WHERE status = 'available'` that also bumps
    /// the parent template's occupancy, in one transaction. Of N concurrent
    /// reservers exactly one sees an affected row; the rest get
    /// `SlotNotAvailable`. The preflight reads below only shape error
    /// messages, they carry no authority.
    pub async fn reserve(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<BookingConfirmation, BookingError> {
        info!(
            "Reserving slot {} for patient {}",
            request.slot_id, request.patient_id
        );

        self.verify_patient(request.patient_id).await?;

        let slot = self.fetch_slot(request.slot_id).await?;

        if slot.slot_start <= Utc::now() {
            return Err(BookingError::InvalidRequest(
                "Cannot book a slot in the past".to_string(),
            ));
        }
        if slot.status != SlotStatus::Available {
            return Err(BookingError::SlotNotAvailable);
        }

        let reserved: Vec<AvailabilitySlot> = self
            .store
            .rpc(
                "reserve_slot",
                json!({
                    "p_slot_id": request.slot_id,
                    "p_patient_id": request.patient_id,
                    "p_appointment_type": request.appointment_type,
                    "p_notes": request.notes,
                }),
            )
            .await
            .map_err(|e| BookingError::StoreError(e.to_string()))?;

        let Some(slot) = reserved.into_iter().next() else {
            // Lost the race: someone else moved the slot out of `available`
            // between the preflight read and the conditional update.
            warn!("Reservation race lost for slot {}", request.slot_id);
            return Err(BookingError::SlotNotAvailable);
        };

        info!(
            "Slot {} booked for patient {} ({})",
            slot.id, request.patient_id, slot.booking_reference
        );

        Ok(BookingConfirmation {
            appointment_id: slot.id,
            booking_reference: slot.booking_reference.clone(),
            provider_id: slot.provider_id,
            availability_id: slot.availability_id,
            slot_start: slot.slot_start,
            slot_end: slot.slot_end,
            appointment_type: slot.appointment_type,
        })
    }

    /// Cancel a booked appointment. The transition and the occupancy
    /// decrement commit together in the `release_slot` store function,
    /// conditioned on the slot still being booked by this patient.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), BookingError> {
        debug!(
            "Cancelling appointment {} for patient {}",
            appointment_id, patient_id
        );

        let slot = self.fetch_slot(appointment_id).await?;

        match slot.status {
            SlotStatus::Cancelled => {
                return Err(BookingError::InvalidRequest(
                    "Appointment is already cancelled".to_string(),
                ));
            }
            SlotStatus::Booked => {}
            _ => {
                return Err(BookingError::InvalidRequest(
                    "Appointment is not booked".to_string(),
                ));
            }
        }

        // Foreign bookings are indistinguishable from missing ones.
        if slot.patient_id != Some(patient_id) {
            return Err(BookingError::SlotNotFound);
        }

        if slot.slot_start <= Utc::now() {
            return Err(BookingError::InvalidRequest(
                "Past appointments cannot be cancelled".to_string(),
            ));
        }

        let released: Vec<AvailabilitySlot> = self
            .store
            .rpc(
                "release_slot",
                json!({
                    "p_slot_id": appointment_id,
                    "p_patient_id": patient_id,
                }),
            )
            .await
            .map_err(|e| BookingError::StoreError(e.to_string()))?;

        if released.is_empty() {
            // The slot changed under us between the read and the update.
            return Err(BookingError::InvalidRequest(
                "Appointment is no longer cancellable".to_string(),
            ));
        }

        info!(
            "Appointment {} cancelled by patient {} (reason: {})",
            appointment_id,
            patient_id,
            reason.as_deref().unwrap_or("none")
        );

        Ok(())
    }

    /// A patient's appointments, newest first, with a total count for
    /// pagination.
    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        query: PatientAppointmentsQuery,
    ) -> Result<PatientAppointmentsPage, BookingError> {
        let page = query.page.unwrap_or(1);
        if page < 1 {
            return Err(BookingError::InvalidRequest("page must be >= 1".to_string()));
        }
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit < 1 || limit > MAX_PAGE_SIZE {
            return Err(BookingError::InvalidRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let filters = self.build_patient_filters(patient_id, &query);

        // Count first, then the page. The count query projects only ids.
        let count_path = format!("/rest/v1/slots?{}&select=id", filters);
        let matching: Vec<serde_json::Value> = self
            .store
            .request(Method::GET, &count_path, None)
            .await
            .map_err(|e| BookingError::StoreError(e.to_string()))?;
        let total = matching.len();

        let offset = (page - 1) * limit;
        let page_path = format!(
            "/rest/v1/slots?{}&order=slot_start.desc&limit={}&offset={}",
            filters, limit, offset
        );
        let slots: Vec<AvailabilitySlot> = self
            .store
            .request(Method::GET, &page_path, None)
            .await
            .map_err(|e| BookingError::StoreError(e.to_string()))?;

        let appointments = slots
            .into_iter()
            .map(|slot| AppointmentView {
                appointment_id: slot.id,
                booking_reference: slot.booking_reference,
                provider_id: slot.provider_id,
                availability_id: slot.availability_id,
                slot_start: slot.slot_start,
                slot_end: slot.slot_end,
                status: slot.status,
                appointment_type: slot.appointment_type,
                notes: slot.notes,
            })
            .collect();

        Ok(PatientAppointmentsPage {
            total,
            page,
            limit,
            appointments,
        })
    }

    // ------------------------------------------------------------------
    // Private helpers
    // ------------------------------------------------------------------

    async fn verify_patient(&self, patient_id: Uuid) -> Result<(), BookingError> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id,is_active", patient_id);
        let result: Vec<PatientProbe> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| BookingError::StoreError(e.to_string()))?;

        match result.into_iter().next() {
            Some(patient) if patient.is_active => Ok(()),
            _ => Err(BookingError::PatientNotFound),
        }
    }

    async fn fetch_slot(&self, slot_id: Uuid) -> Result<AvailabilitySlot, BookingError> {
        let path = format!("/rest/v1/slots?id=eq.{}", slot_id);
        let result: Vec<AvailabilitySlot> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| BookingError::StoreError(e.to_string()))?;

        result.into_iter().next().ok_or(BookingError::SlotNotFound)
    }

    fn build_patient_filters(&self, patient_id: Uuid, query: &PatientAppointmentsQuery) -> String {
        let mut filters = format!("patient_id=eq.{}", patient_id);

        if let Some(start) = query.start_date {
            filters.push_str(&format!("&slot_start=gte.{}T00:00:00Z", start));
        }
        if let Some(end) = query.end_date {
            filters.push_str(&format!("&slot_start=lte.{}T23:59:59Z", end));
        }
        if let Some(status) = query.status {
            filters.push_str(&format!("&status=eq.{}", status));
        }
        if let Some(kind) = query.appointment_type {
            filters.push_str(&format!("&appointment_type=eq.{}", kind));
        }

        filters
    }
}
