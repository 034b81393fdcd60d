// libs/availability-cell/src/services/search.rs
use std::collections::BTreeMap;

use chrono::NaiveDate;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::StoreClient;

use crate::models::{
    AvailabilityError, AvailabilitySlot, AvailabilityTemplate, ProviderRecord,
    ProviderSearchResult, ProviderSummary, SearchQuery, SearchResponse, SlotStatus,
};
use crate::services::availability::project_slot;

pub struct SearchService {
    store: StoreClient,
}

impl SearchService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    /// Multi-criteria search over materialized slots. Temporal and type
    /// filters run in the store query; substring and pricing filters run
    /// in memory against the joined provider rows. Providers are ordered
    /// by available-slot count descending; slots ascend by start within a
    /// provider.
    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse, AvailabilityError> {
        let (range_start, range_end) = resolve_date_range(&query)?;

        debug!(
            "Searching availability between {:?} and {:?}",
            range_start, range_end
        );

        let templates = self.query_templates(&query, range_start, range_end).await?;
        if templates.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                total_providers: 0,
                total_slots: 0,
            });
        }

        let provider_ids: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = templates.iter().map(|t| t.provider_id).collect();
            ids.sort();
            ids.dedup();
            ids
        };

        let providers = self.query_providers(&provider_ids).await?;

        // Substring filters against the provider directory, case-insensitive.
        let matching_providers: BTreeMap<Uuid, ProviderRecord> = providers
            .into_iter()
            .filter(|p| p.is_active)
            .filter(|p| match &query.specialization {
                Some(needle) => p
                    .specialization
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                None => true,
            })
            .filter(|p| match &query.location {
                Some(needle) => p
                    .clinic_address()
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                None => true,
            })
            .map(|p| (p.id, p))
            .collect();

        let surviving_templates: Vec<&AvailabilityTemplate> = templates
            .iter()
            .filter(|t| matching_providers.contains_key(&t.provider_id))
            .filter(|t| match (query.insurance_accepted, &t.pricing) {
                (Some(wanted), Some(pricing)) => pricing.insurance_accepted == wanted,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|t| match (query.max_price, &t.pricing) {
                (Some(cap), Some(pricing)) => pricing.base_fee <= cap,
                // Unpriced availability is not excluded by a price cap.
                (Some(_), None) => true,
                (None, _) => true,
            })
            .collect();

        if surviving_templates.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                total_providers: 0,
                total_slots: 0,
            });
        }

        let slots = self
            .query_slots(&surviving_templates, query.available_only.unwrap_or(true))
            .await?;

        let template_tz: BTreeMap<Uuid, &str> = surviving_templates
            .iter()
            .map(|t| (t.id, t.timezone.as_str()))
            .collect();

        let mut grouped: BTreeMap<Uuid, Vec<&AvailabilitySlot>> = BTreeMap::new();
        for slot in &slots {
            grouped.entry(slot.provider_id).or_default().push(slot);
        }

        let mut results = Vec::new();
        let mut total_slots = 0usize;

        for (provider_id, provider_slots) in grouped {
            let Some(provider) = matching_providers.get(&provider_id) else {
                continue;
            };

            let mut projections = Vec::with_capacity(provider_slots.len());
            for slot in provider_slots {
                let display_tz = query
                    .timezone
                    .as_deref()
                    .or_else(|| template_tz.get(&slot.availability_id).copied())
                    .unwrap_or("UTC");
                projections.push(project_slot(slot, display_tz, false)?);
            }

            total_slots += projections.len();
            results.push(ProviderSearchResult {
                provider: ProviderSummary {
                    provider_id,
                    name: provider.full_name(),
                    specialization: provider.specialization.clone(),
                    clinic_address: provider.clinic_address(),
                    years_of_experience: provider.years_of_experience,
                },
                available_slots: projections,
            });
        }

        results.sort_by(|a, b| b.available_slots.len().cmp(&a.available_slots.len()));

        Ok(SearchResponse {
            total_providers: results.len(),
            total_slots,
            results,
        })
    }

    async fn query_templates(
        &self,
        query: &SearchQuery,
        range_start: Option<NaiveDate>,
        range_end: Option<NaiveDate>,
    ) -> Result<Vec<AvailabilityTemplate>, AvailabilityError> {
        let mut path =
            "/rest/v1/availability_templates?status=eq.active&order=date.asc".to_string();

        if let Some(start) = range_start {
            path.push_str(&format!("&date=gte.{}", start));
        }
        if let Some(end) = range_end {
            path.push_str(&format!("&date=lte.{}", end));
        }
        if let Some(kind) = query.appointment_type {
            path.push_str(&format!("&appointment_type=eq.{}", kind));
        }

        self.store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))
    }

    async fn query_providers(&self, ids: &[Uuid]) -> Result<Vec<ProviderRecord>, AvailabilityError> {
        let id_list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let path = format!("/rest/v1/providers?id=in.({})", id_list.join(","));

        self.store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))
    }

    async fn query_slots(
        &self,
        templates: &[&AvailabilityTemplate],
        available_only: bool,
    ) -> Result<Vec<AvailabilitySlot>, AvailabilityError> {
        let ids: Vec<String> = templates.iter().map(|t| t.id.to_string()).collect();
        let mut path = format!(
            "/rest/v1/slots?availability_id=in.({})&order=slot_start.asc",
            ids.join(",")
        );
        if available_only {
            path.push_str(&format!("&status=eq.{}", SlotStatus::Available));
        }

        self.store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AvailabilityError::StoreError(e.to_string()))
    }
}

fn resolve_date_range(
    query: &SearchQuery,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), AvailabilityError> {
    if let Some(single) = query.date {
        if query.start_date.is_some() || query.end_date.is_some() {
            return Err(AvailabilityError::InvalidInput(
                "Give either date or start_date/end_date, not both".to_string(),
            ));
        }
        return Ok((Some(single), Some(single)));
    }

    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if end < start {
            return Err(AvailabilityError::InvalidInput(
                "end_date precedes start_date".to_string(),
            ));
        }
    }

    Ok((query.start_date, query.end_date))
}
