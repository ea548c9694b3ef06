//! In-memory storage implementation
//!
//! Versioned records in `DashMap`s. The conditional counter operations run
//! under the map's per-shard entry lock, which makes the compare-and-swap
//! on `(slot_id, date, version)` atomic without any long-lived locks.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use uuid::Uuid;

use super::Storage;
use crate::domain::{
    BlockedInterval, Booking, BookingError, BookingResult, Invoice, Provider, TimeSlot, UnitType,
};

type SlotKey = (String, NaiveDate);

/// In-memory storage for development and testing
#[derive(Default)]
pub struct InMemoryStorage {
    providers: DashMap<String, Provider>,
    slots: DashMap<SlotKey, TimeSlot>,
    bookings: DashMap<Uuid, Booking>,
    blocked: DashMap<SlotKey, Vec<BlockedInterval>>,
    invoices: DashMap<Uuid, Vec<Invoice>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_provider(&self, provider: Provider) -> BookingResult<()> {
        self.providers.insert(provider.id.clone(), provider);
        Ok(())
    }

    async fn get_provider(&self, id: &str) -> BookingResult<Option<Provider>> {
        Ok(self.providers.get(id).map(|p| p.clone()))
    }

    async fn list_providers(&self) -> BookingResult<Vec<Provider>> {
        Ok(self.providers.iter().map(|e| e.value().clone()).collect())
    }

    async fn get_slot(&self, slot_id: &str, date: NaiveDate) -> BookingResult<Option<TimeSlot>> {
        let key = (slot_id.to_string(), date);
        Ok(self.slots.get(&key).map(|s| s.clone()))
    }

    async fn ensure_slot(&self, slot: TimeSlot) -> BookingResult<TimeSlot> {
        let key = (slot.id.clone(), slot.date);
        let entry = self.slots.entry(key).or_insert(slot);
        Ok(entry.clone())
    }

    async fn list_slots_for_provider(
        &self,
        provider_id: &str,
        date: NaiveDate,
    ) -> BookingResult<Vec<TimeSlot>> {
        Ok(self
            .slots
            .iter()
            .filter(|e| e.provider_id == provider_id && e.date == date)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn conditional_increment_slot_counters(
        &self,
        slot_id: &str,
        date: NaiveDate,
        expected_version: u64,
        standard_delta: u32,
        priority_delta: u32,
        booking_id: Uuid,
    ) -> BookingResult<TimeSlot> {
        let key = (slot_id.to_string(), date);
        let mut entry = self.slots.get_mut(&key).ok_or(BookingError::NotFound {
            entity: "TimeSlot",
            field: "id",
            value: format!("{slot_id}@{date}"),
        })?;

        if entry.version != expected_version {
            return Err(BookingError::ConcurrencyConflict {
                slot_id: slot_id.to_string(),
                date: date.to_string(),
            });
        }

        entry.booked_units_standard += standard_delta;
        entry.booked_units_priority += priority_delta;
        entry.booking_refs.push(booking_id);
        entry.version += 1;

        Ok(entry.clone())
    }

    async fn rollback_slot_counters(
        &self,
        slot_id: &str,
        date: NaiveDate,
        booking_id: Uuid,
        standard_delta: u32,
        priority_delta: u32,
        min_version: u64,
    ) -> BookingResult<Option<TimeSlot>> {
        let key = (slot_id.to_string(), date);
        let Some(mut entry) = self.slots.get_mut(&key) else {
            return Ok(None);
        };

        if entry.version < min_version {
            return Ok(None);
        }
        let Some(pos) = entry.booking_refs.iter().position(|b| *b == booking_id) else {
            // already rolled back: the guard finds no match
            return Ok(None);
        };

        entry.booking_refs.remove(pos);
        entry.booked_units_standard = entry.booked_units_standard.saturating_sub(standard_delta);
        entry.booked_units_priority = entry.booked_units_priority.saturating_sub(priority_delta);
        entry.version += 1;

        if entry.blocked && !entry.is_exhausted() {
            entry.blocked = false;
            entry.blocked_reason = None;
        }

        Ok(Some(entry.clone()))
    }

    async fn block_slot(&self, slot_id: &str, date: NaiveDate, reason: &str) -> BookingResult<()> {
        let key = (slot_id.to_string(), date);
        let mut entry = self.slots.get_mut(&key).ok_or(BookingError::NotFound {
            entity: "TimeSlot",
            field: "id",
            value: format!("{slot_id}@{date}"),
        })?;
        entry.blocked = true;
        entry.blocked_reason = Some(reason.to_string());
        entry.version += 1;
        Ok(())
    }

    async fn create_booking(&self, booking: Booking) -> BookingResult<()> {
        self.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> BookingResult<Option<Booking>> {
        Ok(self.bookings.get(&id).map(|b| b.clone()))
    }

    async fn update_booking(&self, booking: Booking) -> BookingResult<()> {
        if !self.bookings.contains_key(&booking.id) {
            return Err(BookingError::NotFound {
                entity: "Booking",
                field: "id",
                value: booking.id.to_string(),
            });
        }
        self.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn cancel_booking(&self, id: Uuid) -> BookingResult<Option<Booking>> {
        Ok(self.bookings.remove(&id).map(|(_, b)| b))
    }

    async fn sum_overlapping_bookings(
        &self,
        provider_id: &str,
        date: NaiveDate,
        start_minute: u16,
        end_minute: u16,
        unit_type: Option<UnitType>,
    ) -> BookingResult<u32> {
        Ok(self
            .bookings
            .iter()
            .filter(|b| b.provider_id == provider_id)
            .filter(|b| b.overlaps(date, start_minute, end_minute))
            .filter(|b| unit_type.map_or(true, |t| b.unit_type == t))
            .map(|b| b.units)
            .sum())
    }

    async fn create_blocked_interval(&self, interval: BlockedInterval) -> BookingResult<()> {
        let key = (interval.provider_id.clone(), interval.date);
        self.blocked.entry(key).or_default().push(interval);
        Ok(())
    }

    async fn remove_blocked_interval(
        &self,
        provider_id: &str,
        date: NaiveDate,
        start_minute: u16,
        end_minute: u16,
    ) -> BookingResult<()> {
        let key = (provider_id.to_string(), date);
        if let Some(mut entry) = self.blocked.get_mut(&key) {
            entry.retain(|i| !i.covers(date, start_minute, end_minute));
        }
        Ok(())
    }

    async fn list_blocked_intervals(
        &self,
        provider_id: &str,
        date: NaiveDate,
    ) -> BookingResult<Vec<BlockedInterval>> {
        let key = (provider_id.to_string(), date);
        Ok(self.blocked.get(&key).map(|v| v.clone()).unwrap_or_default())
    }

    async fn save_invoice(&self, invoice: Invoice) -> BookingResult<()> {
        self.invoices
            .entry(invoice.booking_id)
            .or_default()
            .push(invoice);
        Ok(())
    }

    async fn list_invoices_for_booking(&self, booking_id: Uuid) -> BookingResult<Vec<Invoice>> {
        Ok(self
            .invoices
            .get(&booking_id)
            .map(|v| v.clone())
            .unwrap_or_default())
    }
}

// ── Tests ──────────────────────────────────────────────────────
