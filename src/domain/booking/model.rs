//! Booking domain entity

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which capacity pool a booking draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Standard,
    Priority,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Priority => "priority",
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment progress on a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Pay-on-service, or capture not yet attempted
    Pending,
    /// Funds captured
    Captured,
    /// Capture failed or timed out
    Failed,
}

/// Booking lifecycle.
///
/// `created → {confirmed | payment_required | pending} → {cancelled |
/// completed}`. `cancelled` and `completed` are terminal. `payment_required`
/// holds the slot while payment is retried out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Created,
    Confirmed,
    PaymentRequired,
    /// Accepted, paid on service
    Pending,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Confirmed => "confirmed",
            Self::PaymentRequired => "payment_required",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Whether the state machine permits moving to `next`.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match self {
            Created => matches!(next, Confirmed | PaymentRequired | Pending | Cancelled),
            Confirmed | PaymentRequired | Pending => matches!(next, Cancelled | Completed),
            Cancelled | Completed => false,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Committed booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub provider_id: String,
    pub user_id: String,
    /// Slot instance this booking holds capacity on
    pub slot_id: String,
    pub date: NaiveDate,
    /// Minutes from midnight
    pub start_minute: u16,
    pub end_minute: u16,
    pub units: u32,
    pub unit_type: UnitType,
    pub priority: bool,
    pub option_id: Option<String>,
    /// Server-computed total in the smallest currency unit
    pub total_price_minor: i64,
    pub currency: String,
    pub payment_state: PaymentState,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider_id: impl Into<String>,
        user_id: impl Into<String>,
        slot_id: impl Into<String>,
        date: NaiveDate,
        start_minute: u16,
        end_minute: u16,
        units: u32,
        unit_type: UnitType,
        option_id: Option<String>,
        total_price_minor: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: provider_id.into(),
            user_id: user_id.into(),
            slot_id: slot_id.into(),
            date,
            start_minute,
            end_minute,
            units,
            unit_type,
            priority: unit_type == UnitType::Priority,
            option_id,
            total_price_minor,
            currency: currency.into(),
            payment_state: PaymentState::Pending,
            status: BookingStatus::Created,
            created_at: Utc::now(),
        }
    }

    fn transition(&mut self, next: BookingStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Payment captured (or not required); booking holds.
    pub fn confirm(&mut self) -> bool {
        self.transition(BookingStatus::Confirmed)
    }

    /// Capture declined but retriable; slot stays held.
    pub fn require_payment(&mut self) -> bool {
        self.transition(BookingStatus::PaymentRequired)
    }

    /// Accepted with payment due on service.
    pub fn accept_pay_on_service(&mut self) -> bool {
        self.transition(BookingStatus::Pending)
    }

    pub fn cancel(&mut self) -> bool {
        self.transition(BookingStatus::Cancelled)
    }

    pub fn complete(&mut self) -> bool {
        self.transition(BookingStatus::Completed)
    }

    /// Absolute start instant of the booked interval (UTC).
    pub fn starts_at(&self) -> DateTime<Utc> {
        let midnight = self.date.and_hms_opt(0, 0, 0).expect("midnight exists");
        Utc.from_utc_datetime(&midnight) + chrono::Duration::minutes(self.start_minute as i64)
    }

    /// Booked units per pool as `(standard, priority)` counter deltas.
    pub fn unit_deltas(&self) -> (u32, u32) {
        match self.unit_type {
            UnitType::Standard => (self.units, 0),
            UnitType::Priority => (0, self.units),
        }
    }

    /// Whether `[start, end)` overlaps this booking's interval on `date`.
    pub fn overlaps(&self, date: NaiveDate, start_minute: u16, end_minute: u16) -> bool {
        self.date == date && self.start_minute < end_minute && start_minute < self.end_minute
    }
}

// ── Tests ──────────────────────────────────────────────────────
