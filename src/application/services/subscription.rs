//! Subscription series orchestration
//!
//! Expands a recurrence into dates and books every date concurrently, one
//! task per date. Dates are independent slot instances, so tasks share
//! nothing but the first-success cell; a transient failure on one date is
//! retried in place and a permanent failure never aborts the rest of the
//! series.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::application::services::allocation::{AllocationService, BookingRequest};
use crate::config::SubscriptionConfig;
use crate::domain::{Booking, BookingResult, Recurrence};
use crate::shared::retry::{retry_with_backoff, RetryConfig};

/// Per-date result of a series booking
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum SeriesOutcome {
    Booked { date: NaiveDate, booking: Booking },
    Failed { date: NaiveDate, error: String },
}

impl SeriesOutcome {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Booked { date, .. } | Self::Failed { date, .. } => *date,
        }
    }

    pub fn is_booked(&self) -> bool {
        matches!(self, Self::Booked { .. })
    }
}

/// Outcome of a whole series, per-date results in date order
#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub requested_dates: usize,
    pub booked: usize,
    /// First booking to land anywhere in the series; available as soon as
    /// one date succeeds, independent of date order
    pub first_confirmed: Option<Booking>,
    pub outcomes: Vec<SeriesOutcome>,
}

/// Service for booking recurring series
pub struct SubscriptionService {
    allocator: Arc<AllocationService>,
    config: SubscriptionConfig,
}

impl SubscriptionService {
    pub fn new(allocator: Arc<AllocationService>, config: SubscriptionConfig) -> Self {
        Self { allocator, config }
    }

    /// Book one slot per recurrence date, concurrently.
    ///
    /// `template` carries everything but the date; each expanded date gets
    /// its own request. Per-date transient failures (version conflicts,
    /// store blips) are retried with a fixed delay; business rejections are
    /// final for that date only.
    pub async fn book_series(
        &self,
        template: BookingRequest,
        recurrence: &Recurrence,
    ) -> BookingResult<SeriesReport> {
        let dates = recurrence.expand();
        if dates.is_empty() {
            return Err(crate::domain::BookingError::Validation(
                "recurrence yields no dates".into(),
            ));
        }

        info!(
            provider_id = template.provider_id.as_str(),
            slot_id = template.slot_id.as_str(),
            dates = dates.len(),
            "Booking subscription series"
        );

        let first_confirmed: Arc<OnceCell<Booking>> = Arc::new(OnceCell::new());
        let retry = RetryConfig::fixed(
            self.config.max_attempts,
            Duration::from_millis(self.config.retry_delay_ms),
        );

        let tasks: Vec<_> = dates
            .into_iter()
            .map(|date| {
                let allocator = self.allocator.clone();
                let first = first_confirmed.clone();
                let retry = retry.clone();
                let mut request = template.clone();
                request.date = date;
                tokio::spawn(async move {
                    let attempt = retry_with_backoff(
                        retry,
                        || allocator.book_slot(request.clone()),
                        |e| e.is_transient(),
                        "series_booking",
                    )
                    .await;

                    match attempt {
                        Ok(booking) => {
                            // only the first task to finish wins the cell
                            let _ = first.set(booking.clone());
                            SeriesOutcome::Booked { date, booking }
                        }
                        Err(e) => {
                            warn!(%date, error = %e, "Series date not booked");
                            SeriesOutcome::Failed {
                                date,
                                error: e.to_string(),
                            }
                        }
                    }
                })
            })
            .collect();

        let mut outcomes: Vec<SeriesOutcome> = join_all(tasks)
            .await
            .into_iter()
            .filter_map(|joined| joined.ok())
            .collect();
        outcomes.sort_by_key(|o| o.date());

        let booked = outcomes.iter().filter(|o| o.is_booked()).count();
        info!(
            booked,
            requested = outcomes.len(),
            "Subscription series completed"
        );

        Ok(SeriesReport {
            requested_dates: outcomes.len(),
            booked,
            first_confirmed: first_confirmed.get().cloned(),
            outcomes,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::payment::PaymentService;
    use crate::config::AppConfig;
    use crate::domain::ports::{
        Identity, IdentityPatch, PaymentGateway, ProviderDirectory, PushNotifier,
    };
    use crate::domain::slot::{CapacityMode, SlotModelConfig};
    use crate::domain::{
        BookingError, Invoice, InvoiceStatus, PaymentAction, PaymentMethod, Provider,
        ProviderProfile, RecurrencePattern, ServiceCatalogue, SlotModel, SlotTemplate, UnitType,
    };
    use crate::infrastructure::storage::traits::Storage;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::shared::geo::GeoPoint;
    use async_trait::async_trait;
    use chrono::Weekday;
    use uuid::Uuid;

    struct StaticDirectory;

    #[async_trait]
    impl ProviderDirectory for StaticDirectory {
        async fn get_by_id(&self, id: &str) -> BookingResult<Option<Identity>> {
            Ok(Some(Identity {
                id: id.to_string(),
                display_name: id.to_string(),
                push_target: None,
            }))
        }

        async fn update(&self, _id: &str, _patch: IdentityPatch) -> BookingResult<()> {
            Ok(())
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl PushNotifier for SilentNotifier {
        async fn send_push(
            &self,
            _target_id: &str,
            _title: &str,
            _body: &str,
            _data: serde_json::Value,
        ) -> BookingResult<()> {
            Ok(())
        }
    }

    struct HappyGateway;

    #[async_trait]
    impl PaymentGateway for HappyGateway {
        async fn process_payment(
            &self,
            booking_id: Uuid,
            user_id: &str,
            amount_minor: i64,
            currency: &str,
            method: PaymentMethod,
            action: PaymentAction,
        ) -> BookingResult<Invoice> {
            Ok(Invoice::new(
                booking_id,
                user_id,
                amount_minor,
                currency,
                method,
                action,
                InvoiceStatus::Captured,
                Some("gw-ok".into()),
            ))
        }
    }

    fn provider(capacity: u32, weekdays: Vec<Weekday>) -> Provider {
        Provider {
            id: "p1".into(),
            display_name: "Clean Co".into(),
            service_types: vec!["cleaning".into()],
            profile: ProviderProfile {
                location: GeoPoint::new(69.24, 41.29),
                rating: 4.5,
                verified: true,
                completed_bookings: 42,
            },
            catalogue: ServiceCatalogue {
                currency: "UZS".into(),
                options: vec![],
            },
            templates: vec![SlotTemplate {
                id: "tpl-1".into(),
                weekdays,
                start_minute: 540,
                end_minute: 660,
                capacity,
                capacity_mode: CapacityMode::UnitBased,
                model: SlotModel::FlatRate,
                config: SlotModelConfig {
                    base_price_minor: 1_000,
                    discount_rate: 0.0,
                    surcharge_rate: 0.0,
                    reserved_priority: 0,
                },
            }],
        }
    }

    async fn service_for(p: Provider) -> (SubscriptionService, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        storage.save_provider(p).await.unwrap();
        let payments = Arc::new(PaymentService::new(
            storage.clone(),
            Arc::new(HappyGateway),
            AppConfig::default().payment.capture_timeout(),
        ));
        let allocator = Arc::new(AllocationService::new(
            storage.clone(),
            payments,
            Arc::new(StaticDirectory),
            Arc::new(SilentNotifier),
        ));
        (
            SubscriptionService::new(allocator, AppConfig::default().subscription),
            storage,
        )
    }

    fn template() -> BookingRequest {
        BookingRequest {
            provider_id: "p1".into(),
            user_id: "user-1".into(),
            slot_id: "tpl-1".into(),
            date: "2026-09-07".parse().unwrap(), // overwritten per expanded date
            start_minute: 540,
            end_minute: 660,
            units: 1,
            unit_type: UnitType::Standard,
            option_id: None,
            quoted_price_minor: None,
            prepay: false,
            method: PaymentMethod::Cash,
        }
    }

    fn weekly_mondays() -> Recurrence {
        Recurrence {
            pattern: RecurrencePattern::Weekly {
                weekday: Weekday::Mon,
            },
            start_date: "2026-09-01".parse().unwrap(),
            end_date: "2026-09-30".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn weekly_series_books_every_matching_date() {
        let (svc, storage) = service_for(provider(5, vec![Weekday::Mon])).await;

        let report = svc.book_series(template(), &weekly_mondays()).await.unwrap();

        assert_eq!(report.requested_dates, 4); // Mondays in Sep 2026: 7, 14, 21, 28
        assert_eq!(report.booked, 4);
        assert!(report.first_confirmed.is_some());
        // outcomes come back in date order regardless of completion order
        let dates: Vec<NaiveDate> = report.outcomes.iter().map(|o| o.date()).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);

        for date in &dates {
            let slot = storage.get_slot("tpl-1", *date).await.unwrap().unwrap();
            assert_eq!(slot.booked_units_standard, 1);
        }
    }

    #[tokio::test]
    async fn first_confirmed_is_one_of_the_booked_outcomes() {
        let (svc, _) = service_for(provider(5, vec![Weekday::Mon])).await;
        let report = svc.book_series(template(), &weekly_mondays()).await.unwrap();

        let first = report.first_confirmed.unwrap();
        assert!(report.outcomes.iter().any(
            |o| matches!(o, SeriesOutcome::Booked { booking, .. } if booking.id == first.id)
        ));
    }

    #[tokio::test]
    async fn dates_the_template_skips_fail_without_aborting_the_rest() {
        // daily recurrence over one week against a Monday-only template
        let (svc, _) = service_for(provider(5, vec![Weekday::Mon])).await;
        let recurrence = Recurrence {
            pattern: RecurrencePattern::Daily {
                exempt_weekdays: vec![],
            },
            start_date: "2026-09-07".parse().unwrap(),
            end_date: "2026-09-13".parse().unwrap(),
        };

        let report = svc.book_series(template(), &recurrence).await.unwrap();

        assert_eq!(report.requested_dates, 7);
        assert_eq!(report.booked, 1);
        assert!(report.first_confirmed.is_some());
        assert!(report
            .outcomes
            .iter()
            .filter(|o| !o.is_booked())
            .all(|o| matches!(o, SeriesOutcome::Failed { .. })));
    }

    #[tokio::test]
    async fn full_slots_fail_their_date_only() {
        let (svc, storage) = service_for(provider(1, vec![Weekday::Mon])).await;

        // fill the first Monday ahead of the series
        let p = storage.get_provider("p1").await.unwrap().unwrap();
        let first_monday: NaiveDate = "2026-09-07".parse().unwrap();
        storage
            .ensure_slot(p.templates[0].instantiate("p1", first_monday))
            .await
            .unwrap();
        storage
            .conditional_increment_slot_counters(
                "tpl-1",
                first_monday,
                0,
                1,
                0,
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let report = svc.book_series(template(), &weekly_mondays()).await.unwrap();

        assert_eq!(report.requested_dates, 4);
        assert_eq!(report.booked, 3);
        assert!(matches!(
            &report.outcomes[0],
            SeriesOutcome::Failed { date, .. } if *date == first_monday
        ));
    }

    #[tokio::test]
    async fn empty_expansion_is_rejected() {
        let (svc, _) = service_for(provider(5, vec![Weekday::Mon])).await;
        let recurrence = Recurrence {
            pattern: RecurrencePattern::Weekly {
                weekday: Weekday::Mon,
            },
            start_date: "2026-09-10".parse().unwrap(),
            end_date: "2026-09-01".parse().unwrap(),
        };

        let err = svc.book_series(template(), &recurrence).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn prepaid_series_confirms_each_booking() {
        let (svc, _) = service_for(provider(5, vec![Weekday::Mon])).await;
        let mut t = template();
        t.prepay = true;
        t.method = PaymentMethod::Card;

        let report = svc.book_series(t, &weekly_mondays()).await.unwrap();
        assert_eq!(report.booked, 4);
        for outcome in &report.outcomes {
            if let SeriesOutcome::Booked { booking, .. } = outcome {
                assert_eq!(booking.status, crate::domain::BookingStatus::Confirmed);
            }
        }
    }
}
