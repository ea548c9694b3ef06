//! Slot enrichment and availability building
//!
//! Expands a provider's recurring templates into dated, priced slot windows:
//! catalogue options and currency are merged in, remaining capacity is
//! derived per pricing model from live counters, and low-capacity warnings
//! are attached. Read-only; the allocator owns all counter mutations.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AvailabilityConfig;
use crate::domain::{
    BookingError, BookingResult, Provider, SlotModel, TimeSlot, UnitType,
};
use crate::infrastructure::storage::Storage;

/// A catalogue option priced against the slot's next unit
#[derive(Debug, Clone, Serialize)]
pub struct PricedOption {
    pub option_id: String,
    pub name: String,
    /// Next-unit price with the option multiplier applied, minor units
    pub unit_price_minor: i64,
}

/// One bookable window offered to seekers
#[derive(Debug, Clone, Serialize)]
pub struct AvailableSlot {
    pub slot_id: String,
    pub provider_id: String,
    pub date: NaiveDate,
    pub start_minute: u16,
    pub end_minute: u16,
    pub model: SlotModel,
    pub currency: String,
    pub capacity: u32,
    pub remaining_standard: u32,
    pub remaining_priority: u32,
    /// Price of the next standard unit, before options, minor units
    pub next_unit_price_minor: i64,
    /// Price of the next priority unit on urgency slots
    pub next_priority_price_minor: Option<i64>,
    pub options: Vec<PricedOption>,
    /// Low-capacity message, set when remaining/capacity falls below the
    /// configured ratio
    pub warning: Option<String>,
}

/// Service for building dated availability from provider schedules
pub struct AvailabilityService {
    storage: Arc<dyn Storage>,
    config: AvailabilityConfig,
}

impl AvailabilityService {
    pub fn new(storage: Arc<dyn Storage>, config: AvailabilityConfig) -> Self {
        Self { storage, config }
    }

    /// Build the provider's bookable windows over `[from, to]`.
    ///
    /// Slots whose start has already passed relative to `now`, blocked
    /// slots and exhausted slots are skipped.
    pub async fn build_availability(
        &self,
        provider_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> BookingResult<Vec<AvailableSlot>> {
        let provider = self
            .storage
            .get_provider(provider_id)
            .await?
            .ok_or(BookingError::NotFound {
                entity: "Provider",
                field: "id",
                value: provider_id.to_string(),
            })?;

        let mut available = Vec::new();
        let mut date = from;
        while date <= to {
            for template in provider.templates_on(date) {
                // overlay the stored instance when one exists; a fresh
                // template carries no usage yet
                let slot = match self.storage.get_slot(&template.id, date).await? {
                    Some(instance) => instance,
                    None => template.instantiate(&provider.id, date),
                };

                if slot.blocked {
                    debug!(slot_id = slot.id.as_str(), %date, "Skipping blocked slot");
                    continue;
                }
                if slot.is_elapsed(now) {
                    continue;
                }
                if slot.remaining_total() == 0 {
                    continue;
                }

                available.push(self.enrich(&provider, slot));
            }
            date = match date.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(available)
    }

    /// Merge catalogue currency/options into one slot instance and derive
    /// its live prices and warnings.
    fn enrich(&self, provider: &Provider, slot: TimeSlot) -> AvailableSlot {
        let next_unit_price_minor = slot.next_unit_price_minor(UnitType::Standard);
        let next_priority_price_minor = match slot.model {
            SlotModel::Urgency => Some(slot.next_unit_price_minor(UnitType::Priority)),
            _ => None,
        };

        let options = provider
            .catalogue
            .options
            .iter()
            .map(|option| PricedOption {
                option_id: option.id.clone(),
                name: option.name.clone(),
                unit_price_minor: crate::domain::slot::round_minor(
                    next_unit_price_minor as f64 * option.price_multiplier,
                ),
            })
            .collect();

        let warning = if slot.remaining_ratio() < self.config.low_capacity_ratio {
            warn!(
                slot_id = slot.id.as_str(),
                date = %slot.date,
                remaining = slot.remaining_total(),
                capacity = slot.capacity,
                "Slot close to capacity"
            );
            Some(format!(
                "Only {} of {} units left",
                slot.remaining_total(),
                slot.capacity
            ))
        } else {
            None
        };

        AvailableSlot {
            slot_id: slot.id.clone(),
            provider_id: slot.provider_id.clone(),
            date: slot.date,
            start_minute: slot.start_minute,
            end_minute: slot.end_minute,
            model: slot.model,
            currency: provider.catalogue.currency.clone(),
            capacity: slot.capacity,
            remaining_standard: slot.remaining(UnitType::Standard),
            remaining_priority: slot.remaining(UnitType::Priority),
            next_unit_price_minor,
            next_priority_price_minor,
            options,
            warning,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::domain::slot::{CapacityMode, SlotModelConfig};
    use crate::domain::{ProviderProfile, ServiceCatalogue, ServiceOption, SlotTemplate};
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::shared::geo::GeoPoint;
    use chrono::{TimeZone, Weekday};
    use uuid::Uuid;

    fn monday() -> NaiveDate {
        "2026-09-07".parse().unwrap()
    }

    fn early_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 7, 6, 0, 0).unwrap()
    }

    fn provider(model: SlotModel, capacity: u32, config: SlotModelConfig) -> Provider {
        Provider {
            id: "p1".into(),
            display_name: "Clean Co".into(),
            service_types: vec!["cleaning".into()],
            profile: ProviderProfile {
                location: GeoPoint::new(69.24, 41.29),
                rating: 4.5,
                verified: true,
                completed_bookings: 10,
            },
            catalogue: ServiceCatalogue {
                currency: "UZS".into(),
                options: vec![ServiceOption {
                    id: "deep".into(),
                    name: "Deep clean".into(),
                    price_multiplier: 1.5,
                }],
            },
            templates: vec![SlotTemplate {
                id: "tpl-1".into(),
                weekdays: vec![Weekday::Mon],
                start_minute: 540,
                end_minute: 660,
                capacity,
                capacity_mode: CapacityMode::UnitBased,
                model,
                config,
            }],
        }
    }

    async fn service_for(provider: Provider) -> (AvailabilityService, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        storage.save_provider(provider).await.unwrap();
        (
            AvailabilityService::new(storage.clone(), AppConfig::default().availability),
            storage,
        )
    }

    fn earlybird_config() -> SlotModelConfig {
        SlotModelConfig {
            base_price_minor: 100,
            discount_rate: 0.25,
            surcharge_rate: 0.10,
            reserved_priority: 0,
        }
    }

    #[tokio::test]
    async fn fresh_template_is_fully_open() {
        let (svc, _) = service_for(provider(SlotModel::EarlyBird, 10, earlybird_config())).await;
        let slots = svc
            .build_availability("p1", monday(), monday(), early_morning())
            .await
            .unwrap();
        assert_eq!(slots.len(), 1);
        let s = &slots[0];
        assert_eq!(s.remaining_standard, 10);
        assert_eq!(s.next_unit_price_minor, 75); // first earlybird tier
        assert_eq!(s.currency, "UZS");
        assert!(s.warning.is_none());
    }

    #[tokio::test]
    async fn option_prices_multiply_and_round() {
        let (svc, _) = service_for(provider(SlotModel::EarlyBird, 10, earlybird_config())).await;
        let slots = svc
            .build_availability("p1", monday(), monday(), early_morning())
            .await
            .unwrap();
        let opt = &slots[0].options[0];
        assert_eq!(opt.option_id, "deep");
        // 75 * 1.5 = 112.5 → 113
        assert_eq!(opt.unit_price_minor, 113);
    }

    #[tokio::test]
    async fn live_usage_moves_next_price_and_warns_low_capacity() {
        let (svc, storage) =
            service_for(provider(SlotModel::EarlyBird, 10, earlybird_config())).await;
        let p = storage.get_provider("p1").await.unwrap().unwrap();
        let mut instance = p.templates[0].instantiate("p1", monday());
        instance.booked_units_standard = 8;
        storage.ensure_slot(instance).await.unwrap();

        let slots = svc
            .build_availability("p1", monday(), monday(), early_morning())
            .await
            .unwrap();
        let s = &slots[0];
        assert_eq!(s.remaining_standard, 2);
        assert_eq!(s.next_unit_price_minor, 110); // surcharged tier
        assert!(s.warning.is_some());
    }

    #[tokio::test]
    async fn urgency_slot_reports_split_pools_and_priority_price() {
        let (svc, _) = service_for(provider(
            SlotModel::Urgency,
            20,
            SlotModelConfig {
                base_price_minor: 1_000,
                discount_rate: 0.0,
                surcharge_rate: 0.5,
                reserved_priority: 5,
            },
        ))
        .await;
        let slots = svc
            .build_availability("p1", monday(), monday(), early_morning())
            .await
            .unwrap();
        let s = &slots[0];
        assert_eq!(s.remaining_standard, 15);
        assert_eq!(s.remaining_priority, 5);
        assert_eq!(s.next_unit_price_minor, 1_000);
        assert_eq!(s.next_priority_price_minor, Some(1_500));
    }

    #[tokio::test]
    async fn elapsed_blocked_and_exhausted_slots_are_skipped() {
        let (svc, storage) =
            service_for(provider(SlotModel::EarlyBird, 10, earlybird_config())).await;

        // elapsed: same day but past the 09:00 start
        let afternoon = Utc.with_ymd_and_hms(2026, 9, 7, 12, 0, 0).unwrap();
        let slots = svc
            .build_availability("p1", monday(), monday(), afternoon)
            .await
            .unwrap();
        assert!(slots.is_empty());

        // blocked
        let p = storage.get_provider("p1").await.unwrap().unwrap();
        storage
            .ensure_slot(p.templates[0].instantiate("p1", monday()))
            .await
            .unwrap();
        storage
            .block_slot("tpl-1", monday(), "capacity reached")
            .await
            .unwrap();
        let slots = svc
            .build_availability("p1", monday(), monday(), early_morning())
            .await
            .unwrap();
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn single_use_slot_disappears_once_held() {
        let mut p = provider(SlotModel::FlatRate, 1, earlybird_config());
        p.templates[0].capacity_mode = CapacityMode::SingleUse;
        let (svc, storage) = service_for(p).await;

        let prov = storage.get_provider("p1").await.unwrap().unwrap();
        let mut instance = prov.templates[0].instantiate("p1", monday());
        instance.booking_refs.push(Uuid::new_v4());
        storage.ensure_slot(instance).await.unwrap();

        let slots = svc
            .build_availability("p1", monday(), monday(), early_morning())
            .await
            .unwrap();
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn window_spans_multiple_matching_dates() {
        let (svc, _) = service_for(provider(SlotModel::EarlyBird, 10, earlybird_config())).await;
        // two Mondays in the window
        let to: NaiveDate = "2026-09-14".parse().unwrap();
        let slots = svc
            .build_availability("p1", monday(), to, early_morning())
            .await
            .unwrap();
        assert_eq!(slots.len(), 2);
    }
}
