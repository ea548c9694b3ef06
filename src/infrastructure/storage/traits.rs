//! Storage trait definitions

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    BlockedInterval, Booking, BookingResult, Invoice, Provider, TimeSlot, UnitType,
};

/// Storage trait for persistence operations.
///
/// Slot counters carry a monotonically increasing `version`; the two
/// conditional operations are the only writers of those counters and give
/// linearizable mutation order per slot instance. No other locking is used
/// on the booking hot path.
#[async_trait]
pub trait Storage: Send + Sync {
    // Provider operations
    async fn save_provider(&self, provider: Provider) -> BookingResult<()>;
    async fn get_provider(&self, id: &str) -> BookingResult<Option<Provider>>;
    async fn list_providers(&self) -> BookingResult<Vec<Provider>>;

    // Slot instance operations
    async fn get_slot(&self, slot_id: &str, date: NaiveDate) -> BookingResult<Option<TimeSlot>>;

    /// Insert the given fresh instance unless one already exists; returns
    /// the stored instance either way.
    async fn ensure_slot(&self, slot: TimeSlot) -> BookingResult<TimeSlot>;

    async fn list_slots_for_provider(
        &self,
        provider_id: &str,
        date: NaiveDate,
    ) -> BookingResult<Vec<TimeSlot>>;

    /// Atomically add booked units, conditioned on `(slot_id, date,
    /// version = expected_version)`.
    ///
    /// On a match the counters are incremented, `booking_id` is attached
    /// and `version` is bumped; the updated slot is returned. A version
    /// mismatch yields [`BookingError::ConcurrencyConflict`] and changes
    /// nothing.
    async fn conditional_increment_slot_counters(
        &self,
        slot_id: &str,
        date: NaiveDate,
        expected_version: u64,
        standard_delta: u32,
        priority_delta: u32,
        booking_id: Uuid,
    ) -> BookingResult<TimeSlot>;

    /// Undo one booking's counter increment.
    ///
    /// The write matches only while `version >= min_version` **and**
    /// `booking_id` is still attached to the slot; repeating a rollback is
    /// therefore a no-op (`Ok(None)`). A capacity block that no longer
    /// holds after the decrement is lifted. Returns the updated slot when
    /// the rollback applied.
    async fn rollback_slot_counters(
        &self,
        slot_id: &str,
        date: NaiveDate,
        booking_id: Uuid,
        standard_delta: u32,
        priority_delta: u32,
        min_version: u64,
    ) -> BookingResult<Option<TimeSlot>>;

    /// Mark a slot blocked so availability builds skip it cheaply.
    async fn block_slot(&self, slot_id: &str, date: NaiveDate, reason: &str) -> BookingResult<()>;

    // Booking operations
    async fn create_booking(&self, booking: Booking) -> BookingResult<()>;
    async fn get_booking(&self, id: Uuid) -> BookingResult<Option<Booking>>;
    async fn update_booking(&self, booking: Booking) -> BookingResult<()>;

    /// Remove a booking record; returns it when it existed.
    async fn cancel_booking(&self, id: Uuid) -> BookingResult<Option<Booking>>;

    /// Fallback aggregate: recount booked units from persisted bookings
    /// overlapping `[start, end)`, used when denormalized counters are
    /// distrusted.
    async fn sum_overlapping_bookings(
        &self,
        provider_id: &str,
        date: NaiveDate,
        start_minute: u16,
        end_minute: u16,
        unit_type: Option<UnitType>,
    ) -> BookingResult<u32>;

    // Blocked interval operations
    async fn create_blocked_interval(&self, interval: BlockedInterval) -> BookingResult<()>;
    async fn remove_blocked_interval(
        &self,
        provider_id: &str,
        date: NaiveDate,
        start_minute: u16,
        end_minute: u16,
    ) -> BookingResult<()>;
    async fn list_blocked_intervals(
        &self,
        provider_id: &str,
        date: NaiveDate,
    ) -> BookingResult<Vec<BlockedInterval>>;

    // Invoice operations
    async fn save_invoice(&self, invoice: Invoice) -> BookingResult<()>;
    async fn list_invoices_for_booking(&self, booking_id: Uuid) -> BookingResult<Vec<Invoice>>;
}
