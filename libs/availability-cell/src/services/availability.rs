// libs/availability-cell/src/services/availability.rs
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::StoreClient;
use shared_models::error::FieldErrors;

use crate::models::{
    AvailabilityDayView, AvailabilityError, AvailabilitySlot, AvailabilityTemplate,
    AvailabilityViewQuery, CreateAvailabilityRequest, CreateAvailabilityResponse, DateRange,
    DaySummary, DeleteOutcome, ProviderRecord, RecurrencePattern, SlotProjection, SlotStatus,
    UpdateSlotRequest,
};
use crate::services::timegrid;

pub struct AvailabilityService {
    store: StoreClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    /// Create availability for one date or a recurring family of dates.
    /// Every target date is conflict-checked against the provider's existing
    /// templates before anything is written; each date's template and its
    /// generated slots then commit in a single store transaction.
    pub async fn create_availability(
        &self,
        provider_id: Uuid,
        request: CreateAvailabilityRequest,
    ) -> Result<CreateAvailabilityResponse, AvailabilityError> {
        info!("Creating availability for provider {}", provider_id);

        let provider = self.fetch_provider(provider_id).await?;
        if !provider.is_active {
            return Err(AvailabilityError::ProviderNotFound);
        }

        let plan = self.validate_create_request(&request)?;

        let target_dates = if request.is_recurring {
            timegrid::expand_recurrence(plan.date, plan.recurrence_end, plan.pattern)?
        } else {
            vec![plan.date]
        };

        // Conflict pass first: nothing is written when any target date
        // overlaps an existing window.
        for target in &target_dates {
            self.check_date_conflicts(provider_id, *target, &request).await?;
        }

        let slot_starts = timegrid::enumerate_slots(
            plan.start,
            plan.end,
            request.slot_duration_minutes as i64,
            request.break_duration_minutes as i64,
        );
        if slot_starts.is_empty() {
            return Err(AvailabilityError::InvalidInput(
                "Time window does not fit a single slot".to_string(),
            ));
        }

        let mut availability_ids = Vec::with_capacity(target_dates.len());
        let mut slots_created = 0usize;

        for target in &target_dates {
            let (template_id, count) = self
                .persist_template_block(provider_id, *target, &request, &slot_starts, &plan)
                .await?;
            availability_ids.push(template_id);
            slots_created += count;
        }

        info!(
            "Created {} templates with {} slots for provider {}",
            availability_ids.len(),
            slots_created,
            provider_id
        );

        Ok(CreateAvailabilityResponse {
            availability_ids,
            slots_created,
            date_range: DateRange {
                start_date: *target_dates.first().unwrap_or(&plan.date),
                end_date: *target_dates.last().unwrap_or(&plan.date),
            },
            total_appointments_available: slots_created,
        })
    }

    /// Grouped-by-date schedule view for one provider.
    pub async fn provider_schedule(
        &self,
        provider_id: Uuid,
        query: AvailabilityViewQuery,
    ) -> Result<Vec<AvailabilityDayView>, AvailabilityError> {
        debug!("Fetching schedule for provider {}", provider_id);

        let mut path = format!(
            "/rest/v1/availability_templates?provider_id=eq.{}&status=eq.active&order=date.asc",
            provider_id
        );
        if let Some(start) = query.start_date {
            path.push_str(&format!("&date=gte.{}", start));
        }
        if let Some(end) = query.end_date {
            path.push_str(&format!("&date=lte.{}", end));
        }
        if let Some(kind) = query.appointment_type {
            path.push_str(&format!("&appointment_type=eq.{}", kind));
        }

        let templates: Vec<AvailabilityTemplate> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        if templates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = templates.iter().map(|t| t.id.to_string()).collect();
        let mut slot_path = format!(
            "/rest/v1/slots?availability_id=in.({})&order=slot_start.asc",
            ids.join(",")
        );
        if let Some(status) = query.status {
            slot_path.push_str(&format!("&status=eq.{}", status));
        }

        let slots: Vec<AvailabilitySlot> = self
            .store
            .request(Method::GET, &slot_path, None)
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        let by_template: BTreeMap<Uuid, &AvailabilityTemplate> =
            templates.iter().map(|t| (t.id, t)).collect();

        let mut days: BTreeMap<NaiveDate, AvailabilityDayView> = BTreeMap::new();

        for slot in &slots {
            let Some(template) = by_template.get(&slot.availability_id) else {
                continue;
            };
            let display_tz = query.timezone.as_deref().unwrap_or(&template.timezone);
            let projection = project_slot(slot, display_tz, true)?;

            let day = days.entry(template.date).or_insert_with(|| AvailabilityDayView {
                date: template.date,
                slots: Vec::new(),
                summary: DaySummary::default(),
            });

            day.summary.total += 1;
            match slot.status {
                SlotStatus::Available => day.summary.available += 1,
                SlotStatus::Booked => day.summary.booked += 1,
                _ => day.summary.unavailable += 1,
            }
            day.slots.push(projection);
        }

        Ok(days.into_values().collect())
    }

    /// Patch a slot's status, notes or pricing. Time rewrites are not
    /// supported; booked slots cannot be touched here at all.
    pub async fn update_slot(
        &self,
        slot_id: Uuid,
        provider_id: Uuid,
        patch: UpdateSlotRequest,
    ) -> Result<AvailabilitySlot, AvailabilityError> {
        debug!("Updating slot {} for provider {}", slot_id, provider_id);

        let slot = self.fetch_owned_slot(slot_id, provider_id).await?;

        if slot.status == SlotStatus::Booked {
            return Err(AvailabilityError::BookedSlot);
        }

        if patch.status == Some(SlotStatus::Booked) {
            return Err(AvailabilityError::InvalidInput(
                "Slot status cannot be set to booked directly".to_string(),
            ));
        }

        let mut update_data = serde_json::Map::new();
        if let Some(status) = patch.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(notes) = patch.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(pricing) = patch.pricing {
            update_data.insert("pricing".to_string(), json!(pricing));
        }
        if update_data.is_empty() {
            return Err(AvailabilityError::InvalidInput("Empty update".to_string()));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/slots?id=eq.{}&provider_id=eq.{}",
            slot_id, provider_id
        );
        let result: Vec<AvailabilitySlot> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(Value::Object(update_data)),
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        result.into_iter().next().ok_or(AvailabilityError::SlotNotFound)
    }

    /// Delete one slot, or with `delete_recurring` the slot's entire
    /// recurring template family. The cascade is refused when any sibling
    /// slot is booked; the check runs inside the store transaction.
    pub async fn delete_slot(
        &self,
        slot_id: Uuid,
        provider_id: Uuid,
        delete_recurring: bool,
    ) -> Result<DeleteOutcome, AvailabilityError> {
        let slot = self.fetch_owned_slot(slot_id, provider_id).await?;

        if slot.status == SlotStatus::Booked {
            return Err(AvailabilityError::BookedSlot);
        }

        if delete_recurring {
            let template = self.fetch_template(slot.availability_id).await?;
            if template.is_recurring {
                return self.cascade_delete(template.id, provider_id).await;
            }
        }

        let path = format!(
            "/rest/v1/slots?id=eq.{}&provider_id=eq.{}&status=neq.booked",
            slot_id, provider_id
        );
        let deleted: Vec<Value> = self
            .store
            .request_with_headers(
                Method::DELETE,
                &path,
                None,
                Some(StoreClient::returning_headers()),
            )
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        if deleted.is_empty() {
            // The slot was booked or removed between the read and the
            // conditional delete.
            return Err(AvailabilityError::SlotNotFound);
        }

        info!("Deleted slot {} for provider {}", slot_id, provider_id);
        Ok(DeleteOutcome {
            deleted_slots: deleted.len(),
            cascaded: false,
        })
    }

    // ------------------------------------------------------------------
    // Private helpers
    // ------------------------------------------------------------------

    async fn fetch_provider(&self, provider_id: Uuid) -> Result<ProviderRecord, AvailabilityError> {
        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let result: Vec<ProviderRecord> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        result.into_iter().next().ok_or(AvailabilityError::ProviderNotFound)
    }

    async fn fetch_owned_slot(
        &self,
        slot_id: Uuid,
        provider_id: Uuid,
    ) -> Result<AvailabilitySlot, AvailabilityError> {
        // Ownership rides in the filter so foreign slots are
        // indistinguishable from missing ones.
        let path = format!(
            "/rest/v1/slots?id=eq.{}&provider_id=eq.{}",
            slot_id, provider_id
        );
        let result: Vec<AvailabilitySlot> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        result.into_iter().next().ok_or(AvailabilityError::SlotNotFound)
    }

    async fn fetch_template(
        &self,
        template_id: Uuid,
    ) -> Result<AvailabilityTemplate, AvailabilityError> {
        let path = format!("/rest/v1/availability_templates?id=eq.{}", template_id);
        let result: Vec<AvailabilityTemplate> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        result.into_iter().next().ok_or(AvailabilityError::SlotNotFound)
    }

    fn validate_create_request(
        &self,
        request: &CreateAvailabilityRequest,
    ) -> Result<CreatePlan, AvailabilityError> {
        let mut errors = FieldErrors::new();

        let date = match timegrid::parse_date(&request.date) {
            Ok(d) => Some(d),
            Err(_) => {
                errors.push("date", "Date must be YYYY-MM-DD");
                None
            }
        };
        let start = match timegrid::parse_hm(&request.start_time) {
            Ok(t) => Some(t),
            Err(_) => {
                errors.push("start_time", "Time must be HH:MM");
                None
            }
        };
        let end = match timegrid::parse_hm(&request.end_time) {
            Ok(t) => Some(t),
            Err(_) => {
                errors.push("end_time", "Time must be HH:MM");
                None
            }
        };

        if let (Some(s), Some(e)) = (start, end) {
            if s >= e {
                errors.push("end_time", "End time must be after start time");
            }
        }

        if !(15..=480).contains(&request.slot_duration_minutes) {
            errors.push(
                "slot_duration_minutes",
                "Slot duration must be between 15 and 480 minutes",
            );
        }
        if !(0..=120).contains(&request.break_duration_minutes) {
            errors.push(
                "break_duration_minutes",
                "Break duration must be between 0 and 120 minutes",
            );
        }

        // Single-booking semantics: one patient per slot. Capacity above one
        // is modelled by creating more slots, not by sharing one.
        if request.max_appointments_per_slot != 1 {
            errors.push(
                "max_appointments_per_slot",
                "Multiple bookings per slot are not supported; each slot admits one booking",
            );
        }

        let zone_ok = request.timezone.parse::<Tz>().is_ok();
        if !zone_ok {
            errors.push("timezone", "Unknown IANA timezone");
        }

        if let (Some(d), true) = (date, zone_ok) {
            if let Ok(tz) = request.timezone.parse::<Tz>() {
                let today_local = Utc::now().with_timezone(&tz).date_naive();
                if d < today_local {
                    errors.push("date", "Date must not be in the past");
                }
            }
        }

        let mut pattern = None;
        let mut recurrence_end = None;
        if request.is_recurring {
            match request.recurrence_pattern {
                Some(p) => pattern = Some(p),
                None => errors.push("recurrence_pattern", "Required for recurring availability"),
            }
            match request.recurrence_end_date.as_deref() {
                Some(raw) => match timegrid::parse_date(raw) {
                    Ok(d) => recurrence_end = Some(d),
                    Err(_) => errors.push("recurrence_end_date", "Date must be YYYY-MM-DD"),
                },
                None => errors.push("recurrence_end_date", "Required for recurring availability"),
            }
            if let (Some(d), Some(e)) = (date, recurrence_end) {
                if e < d {
                    errors.push("recurrence_end_date", "Must not precede the start date");
                }
            }
        } else if request.recurrence_pattern.is_some() || request.recurrence_end_date.is_some() {
            errors.push("is_recurring", "Recurrence fields given without is_recurring");
        }

        if !errors.is_empty() {
            return Err(AvailabilityError::ValidationFailed(errors.into_map()));
        }

        Ok(CreatePlan {
            date: date.unwrap_or_default(),
            start: start.unwrap_or_default(),
            end: end.unwrap_or_default(),
            pattern: pattern.unwrap_or(RecurrencePattern::Daily),
            recurrence_end: recurrence_end.unwrap_or_else(|| date.unwrap_or_default()),
        })
    }

    async fn check_date_conflicts(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        request: &CreateAvailabilityRequest,
    ) -> Result<(), AvailabilityError> {
        let path = format!(
            "/rest/v1/availability_templates?provider_id=eq.{}&date=eq.{}&status=eq.active",
            provider_id, date
        );
        let existing: Vec<AvailabilityTemplate> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        let new_start = timegrid::parse_hm(&request.start_time)?;
        let new_end = timegrid::parse_hm(&request.end_time)?;

        for template in existing {
            let existing_start = timegrid::parse_hm(&template.start_time)?;
            let existing_end = timegrid::parse_hm(&template.end_time)?;

            if timegrid::conflict(new_start, new_end, existing_start, existing_end) {
                warn!(
                    "Availability conflict for provider {} on {}: {}-{} overlaps {}-{}",
                    provider_id,
                    date,
                    request.start_time,
                    request.end_time,
                    template.start_time,
                    template.end_time
                );
                return Err(AvailabilityError::ScheduleConflict(format!(
                    "Overlaps existing availability on {}",
                    date
                )));
            }
        }

        Ok(())
    }

    async fn persist_template_block(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        request: &CreateAvailabilityRequest,
        slot_starts: &[chrono::NaiveTime],
        plan: &CreatePlan,
    ) -> Result<(Uuid, usize), AvailabilityError> {
        let template_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let recurrence_end = request.is_recurring.then_some(plan.recurrence_end);

        let template = json!({
            "id": template_id,
            "provider_id": provider_id,
            "date": date,
            "start_time": plan.start.format("%H:%M").to_string(),
            "end_time": plan.end.format("%H:%M").to_string(),
            "timezone": request.timezone,
            "slot_duration_minutes": request.slot_duration_minutes,
            "break_duration_minutes": request.break_duration_minutes,
            "is_recurring": request.is_recurring,
            "recurrence_pattern": request.recurrence_pattern,
            "recurrence_end_date": recurrence_end,
            "max_appointments_per_slot": request.max_appointments_per_slot,
            "current_appointments": 0,
            "appointment_type": request.appointment_type,
            "status": "active",
            "location": request.location,
            "pricing": request.pricing,
            "special_requirements": request.special_requirements,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now,
        });

        let mut slot_rows = Vec::with_capacity(slot_starts.len());
        for start in slot_starts {
            let start_utc = timegrid::to_utc(date, *start, &request.timezone)?;
            let local_end = date.and_time(*start)
                + Duration::minutes(request.slot_duration_minutes as i64);
            let end_utc =
                timegrid::to_utc(local_end.date(), local_end.time(), &request.timezone)?;

            slot_rows.push(json!({
                "id": Uuid::new_v4(),
                "availability_id": template_id,
                "provider_id": provider_id,
                "slot_start": start_utc.to_rfc3339(),
                "slot_end": end_utc.to_rfc3339(),
                "status": "available",
                "patient_id": null,
                "appointment_type": request.appointment_type,
                "booking_reference": timegrid::booking_reference(),
                "pricing": request.pricing,
                "notes": null,
                "created_at": now,
                "updated_at": now,
            }));
        }

        let slots_created = slot_rows.len();

        // Template and child slots commit in one transaction on the store
        // side; a failure leaves no partial family behind.
        let result: Value = self
            .store
            .rpc(
                "create_availability_block",
                json!({ "p_template": template, "p_slots": slot_rows }),
            )
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        let committed = result
            .get("slots_created")
            .and_then(|v| v.as_u64())
            .unwrap_or(slots_created as u64) as usize;

        Ok((template_id, committed))
    }

    async fn cascade_delete(
        &self,
        template_id: Uuid,
        provider_id: Uuid,
    ) -> Result<DeleteOutcome, AvailabilityError> {
        let result: Value = self
            .store
            .rpc(
                "delete_template_cascade",
                json!({ "p_template_id": template_id, "p_provider_id": provider_id }),
            )
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))?;

        let booked_siblings = result
            .get("booked_siblings")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        if booked_siblings > 0 {
            return Err(AvailabilityError::BookedSibling(format!(
                "{} booked slots in the recurring family",
                booked_siblings
            )));
        }

        let deleted_slots = result
            .get("deleted_slots")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        info!(
            "Cascade deleted template {} ({} slots) for provider {}",
            template_id, deleted_slots, provider_id
        );

        Ok(DeleteOutcome {
            deleted_slots,
            cascaded: true,
        })
    }
}

struct CreatePlan {
    date: NaiveDate,
    start: chrono::NaiveTime,
    end: chrono::NaiveTime,
    pattern: RecurrencePattern,
    recurrence_end: NaiveDate,
}

/// Render a slot for a caller in a display timezone.
pub fn project_slot(
    slot: &AvailabilitySlot,
    display_tz: &str,
    include_reference: bool,
) -> Result<SlotProjection, AvailabilityError> {
    let (date, start_time) = timegrid::to_local(slot.slot_start, display_tz)?;
    let (_, end_time) = timegrid::to_local(slot.slot_end, display_tz)?;

    Ok(SlotProjection {
        slot_id: slot.id,
        availability_id: slot.availability_id,
        provider_id: slot.provider_id,
        date: date.format("%Y-%m-%d").to_string(),
        start_time: start_time.format("%H:%M").to_string(),
        end_time: end_time.format("%H:%M").to_string(),
        timezone: display_tz.to_string(),
        status: slot.status,
        appointment_type: slot.appointment_type,
        booking_reference: if include_reference {
            Some(slot.booking_reference.clone())
        } else {
            None
        },
        pricing: slot.pricing.clone(),
    })
}
