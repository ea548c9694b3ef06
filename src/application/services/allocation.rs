//! Capacity allocation — the booking transaction
//!
//! Validates a booking request against the live slot, persists the booking,
//! then commits the capacity take with a conditional counter increment on
//! `(slot_id, date, version)`. Arbitrarily many concurrent requests may
//! target one slot; the first writer to observe a version wins and everyone
//! else gets a distinct concurrency conflict to re-quote. Each completed
//! stage has a compensating action, so no path leaves a booking persisted
//! without its counter increment.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::application::services::payment::PaymentService;
use crate::domain::ports::{ProviderDirectory, PushNotifier};
use crate::domain::slot::BlockedInterval;
use crate::domain::{
    Booking, BookingError, BookingResult, PaymentMethod, SlotModel, TimeSlot, UnitType,
};
use crate::infrastructure::storage::Storage;

/// One allocation request against a specific dated slot
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BookingRequest {
    #[validate(length(min = 1))]
    pub provider_id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    /// Slot template id; with `date` it names the dated instance
    #[validate(length(min = 1))]
    pub slot_id: String,
    pub date: NaiveDate,
    /// Requested interval, minutes from midnight
    pub start_minute: u16,
    pub end_minute: u16,
    #[validate(range(min = 1))]
    pub units: u32,
    pub unit_type: UnitType,
    pub option_id: Option<String>,
    /// Client-quoted total; rejected when it no longer matches the live
    /// price
    pub quoted_price_minor: Option<i64>,
    /// Capture payment synchronously before confirming
    pub prepay: bool,
    pub method: PaymentMethod,
}

/// Denormalized counters vs. recounted bookings for one slot instance
#[derive(Debug, Clone, Serialize)]
pub struct UsageAudit {
    pub slot_id: String,
    pub date: NaiveDate,
    pub counter_standard: u32,
    pub counter_priority: u32,
    pub recount_standard: u32,
    pub recount_priority: u32,
    pub consistent: bool,
}

/// Service for committing and cancelling bookings
pub struct AllocationService {
    storage: Arc<dyn Storage>,
    payments: Arc<PaymentService>,
    directory: Arc<dyn ProviderDirectory>,
    notifier: Arc<dyn PushNotifier>,
}

impl AllocationService {
    pub fn new(
        storage: Arc<dyn Storage>,
        payments: Arc<PaymentService>,
        directory: Arc<dyn ProviderDirectory>,
        notifier: Arc<dyn PushNotifier>,
    ) -> Self {
        Self {
            storage,
            payments,
            directory,
            notifier,
        }
    }

    /// Commit a booking against the slot's live state.
    ///
    /// Fails with [`BookingError::ConcurrencyConflict`] when another writer
    /// advanced the slot version between the read and the conditional
    /// increment; the caller must re-quote. Business rejections
    /// (capacity, price drift) are final for the quoted state.
    pub async fn book_slot(&self, request: BookingRequest) -> BookingResult<Booking> {
        request
            .validate()
            .map_err(|e| BookingError::Validation(e.to_string()))?;

        let provider = self
            .storage
            .get_provider(&request.provider_id)
            .await?
            .ok_or(BookingError::NotFound {
                entity: "Provider",
                field: "id",
                value: request.provider_id.clone(),
            })?;

        let template = provider
            .template(&request.slot_id)
            .ok_or(BookingError::NotFound {
                entity: "SlotTemplate",
                field: "id",
                value: request.slot_id.clone(),
            })?;
        if !template.applies_on(request.date) {
            return Err(BookingError::Validation(format!(
                "slot {} does not run on {}",
                request.slot_id, request.date
            )));
        }

        // live instance; materialized on first touch
        let slot = self
            .storage
            .ensure_slot(template.instantiate(&provider.id, request.date))
            .await?;

        // 1. bounds check
        if !slot.contains_interval(request.start_minute, request.end_minute) {
            return Err(BookingError::Validation(format!(
                "requested interval {}..{} lies outside slot {}..{}",
                request.start_minute, request.end_minute, slot.start_minute, slot.end_minute
            )));
        }

        let multiplier = match &request.option_id {
            Some(id) => {
                provider
                    .catalogue
                    .option(id)
                    .ok_or_else(|| {
                        BookingError::Validation(format!("unknown catalogue option: {id}"))
                    })?
                    .price_multiplier
            }
            None => 1.0,
        };

        if slot.blocked {
            return Err(BookingError::CapacityExceeded {
                slot_id: slot.id.clone(),
                requested: request.units,
                remaining: 0,
            });
        }

        let remaining = slot.remaining(request.unit_type);
        if request.units > remaining {
            return Err(BookingError::CapacityExceeded {
                slot_id: slot.id.clone(),
                requested: request.units,
                remaining,
            });
        }

        // 2. reprice from live state; prices drift between quote and commit
        let total = slot.price_for(request.units, request.unit_type, multiplier);
        if let Some(quoted) = request.quoted_price_minor {
            if quoted != total {
                return Err(price_drift_rejection(&slot, quoted, total));
            }
        }

        let mut booking = Booking::new(
            provider.id.clone(),
            request.user_id.clone(),
            slot.id.clone(),
            request.date,
            request.start_minute,
            request.end_minute,
            request.units,
            request.unit_type,
            request.option_id.clone(),
            total,
            provider.catalogue.currency.clone(),
        );

        // 3. persist, then take the capacity with a conditional write
        self.storage.create_booking(booking.clone()).await?;

        let (standard_delta, priority_delta) = booking.unit_deltas();
        let updated = match self
            .storage
            .conditional_increment_slot_counters(
                &slot.id,
                request.date,
                slot.version,
                standard_delta,
                priority_delta,
                booking.id,
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                // compensate the persist stage; the increment never landed
                if let Err(del) = self.storage.cancel_booking(booking.id).await {
                    warn!(booking_id = %booking.id, error = %del, "Failed to delete booking after conflict");
                }
                return Err(e);
            }
        };
        let observed_version = updated.version;

        // 4. re-derive usage; block the slot once exhausted
        if updated.is_exhausted() {
            self.block_exhausted(&updated).await;
        }

        // 5. payment
        if request.prepay {
            self.payments
                .capture_prepayment(&mut booking, request.method, observed_version)
                .await?;
        } else {
            booking.accept_pay_on_service();
            self.storage.update_booking(booking.clone()).await?;
        }

        info!(
            booking_id = %booking.id,
            slot_id = booking.slot_id.as_str(),
            date = %booking.date,
            units = booking.units,
            unit_type = %booking.unit_type,
            status = %booking.status,
            total = booking.total_price_minor,
            "Booking committed"
        );

        self.push_to(
            &booking.user_id,
            "Booking received",
            &format!("{} on {}", provider.display_name, booking.date),
            serde_json::json!({ "booking_id": booking.id, "status": booking.status }),
        );

        Ok(booking)
    }

    /// Cancel a booking strictly before the slot's start instant.
    ///
    /// Deletes the booking, releases its units and lifts a capacity block
    /// the booking caused.
    pub async fn cancel_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> BookingResult<Booking> {
        let booking = self
            .storage
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound {
                entity: "Booking",
                field: "id",
                value: booking_id.to_string(),
            })?;

        if now >= booking.starts_at() {
            return Err(BookingError::Validation(
                "cancellation is only allowed before the slot starts".into(),
            ));
        }

        let mut cancelled = self
            .storage
            .cancel_booking(booking_id)
            .await?
            .unwrap_or(booking);
        cancelled.cancel();

        let (standard_delta, priority_delta) = cancelled.unit_deltas();
        match self
            .storage
            .rollback_slot_counters(
                &cancelled.slot_id,
                cancelled.date,
                cancelled.id,
                standard_delta,
                priority_delta,
                0,
            )
            .await
        {
            Ok(Some(slot)) if !slot.blocked => {
                if let Err(e) = self
                    .storage
                    .remove_blocked_interval(
                        &slot.provider_id,
                        slot.date,
                        slot.start_minute,
                        slot.end_minute,
                    )
                    .await
                {
                    warn!(booking_id = %cancelled.id, error = %e, "Failed to clear blocked interval");
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(booking_id = %cancelled.id, error = %e, "Counter release failed; usage audit will reconcile");
            }
        }

        info!(booking_id = %cancelled.id, "Booking cancelled, capacity released");

        self.push_to(
            &cancelled.user_id,
            "Booking cancelled",
            &format!("Your booking on {} was cancelled", cancelled.date),
            serde_json::json!({ "booking_id": cancelled.id }),
        );

        Ok(cancelled)
    }

    /// Mark a booking completed after the service was rendered.
    pub async fn complete_booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        let mut booking = self
            .storage
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound {
                entity: "Booking",
                field: "id",
                value: booking_id.to_string(),
            })?;
        if !booking.complete() {
            return Err(BookingError::Validation(format!(
                "booking in state {} cannot be completed",
                booking.status
            )));
        }
        self.storage.update_booking(booking.clone()).await?;
        Ok(booking)
    }

    /// Compare denormalized counters against a recount of persisted
    /// bookings overlapping the slot. Divergence is logged, not repaired.
    pub async fn audit_slot_usage(
        &self,
        slot_id: &str,
        date: NaiveDate,
    ) -> BookingResult<UsageAudit> {
        let slot = self
            .storage
            .get_slot(slot_id, date)
            .await?
            .ok_or(BookingError::NotFound {
                entity: "TimeSlot",
                field: "id",
                value: format!("{slot_id}@{date}"),
            })?;

        let recount_standard = self
            .storage
            .sum_overlapping_bookings(
                &slot.provider_id,
                date,
                slot.start_minute,
                slot.end_minute,
                Some(UnitType::Standard),
            )
            .await?;
        let recount_priority = self
            .storage
            .sum_overlapping_bookings(
                &slot.provider_id,
                date,
                slot.start_minute,
                slot.end_minute,
                Some(UnitType::Priority),
            )
            .await?;

        let audit = UsageAudit {
            slot_id: slot.id.clone(),
            date,
            counter_standard: slot.booked_units_standard,
            counter_priority: slot.booked_units_priority,
            recount_standard,
            recount_priority,
            consistent: slot.booked_units_standard == recount_standard
                && slot.booked_units_priority == recount_priority,
        };

        if !audit.consistent {
            warn!(
                slot_id = slot.id.as_str(),
                %date,
                counter_standard = audit.counter_standard,
                recount_standard = audit.recount_standard,
                counter_priority = audit.counter_priority,
                recount_priority = audit.recount_priority,
                "Denormalized counters diverge from booking recount"
            );
        }

        Ok(audit)
    }

    /// Block an exhausted slot so availability builds skip it. Failures
    /// here only cost a recheck later; they never abort the booking.
    async fn block_exhausted(&self, slot: &TimeSlot) {
        if let Err(e) = self
            .storage
            .block_slot(&slot.id, slot.date, "capacity reached")
            .await
        {
            warn!(slot_id = slot.id.as_str(), error = %e, "Failed to block exhausted slot");
            return;
        }
        if let Err(e) = self
            .storage
            .create_blocked_interval(BlockedInterval::capacity_reached(slot))
            .await
        {
            warn!(slot_id = slot.id.as_str(), error = %e, "Failed to record blocked interval");
        }
        info!(
            slot_id = slot.id.as_str(),
            date = %slot.date,
            "Slot exhausted, blocked for further booking"
        );
    }

    /// Fire-and-forget push; resolves the target via the directory and
    /// logs failures without ever blocking the booking path.
    fn push_to(&self, user_id: &str, title: &str, body: &str, data: serde_json::Value) {
        let directory = self.directory.clone();
        let notifier = self.notifier.clone();
        let user_id = user_id.to_string();
        let title = title.to_string();
        let body = body.to_string();
        tokio::spawn(async move {
            let target = match directory.get_by_id(&user_id).await {
                Ok(Some(identity)) => identity.push_target,
                Ok(None) => None,
                Err(e) => {
                    warn!(user_id = user_id.as_str(), error = %e, "Directory lookup failed");
                    None
                }
            };
            let Some(target) = target else { return };
            if let Err(e) = notifier.send_push(&target, &title, &body, data).await {
                warn!(user_id = user_id.as_str(), error = %e, "Push delivery failed");
            }
        });
    }
}

/// Model-specific explanation for a price that drifted between quote and
/// commit.
fn price_drift_rejection(slot: &TimeSlot, quoted: i64, current: i64) -> BookingError {
    let reason = match slot.model {
        SlotModel::FlatRate => "the base price changed since your quote",
        SlotModel::EarlyBird => "units sold since your quote moved the early-bird tier",
        SlotModel::Urgency => "the urgency surcharge changed since your quote",
    };
    BookingError::Validation(format!(
        "quoted price {quoted} no longer matches current price {current}: {reason}"
    ))
}

// ── Tests ──────────────────────────────────────────────────────
