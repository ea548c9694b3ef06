//! Time slot domain entity and pricing rules

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking::UnitType;

/// Pricing/priority model of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotModel {
    /// Every unit at the base price
    FlatRate,
    /// First quarter of units discounted, last quarter surcharged
    EarlyBird,
    /// Reserved priority sub-pool, surcharged; standard pool at base price
    Urgency,
}

impl SlotModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlatRate => "flatrate",
            Self::EarlyBird => "earlybird",
            Self::Urgency => "urgency",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "flatrate" => Some(Self::FlatRate),
            "earlybird" => Some(Self::EarlyBird),
            "urgency" => Some(Self::Urgency),
            _ => None,
        }
    }
}

impl std::fmt::Display for SlotModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a slot is divisible into units or exclusively booked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityMode {
    /// One exclusive booking takes the whole slot
    SingleUse,
    /// Many partial bookings up to `capacity` units
    UnitBased,
}

/// Model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotModelConfig {
    /// Base price per unit in the smallest currency unit
    pub base_price_minor: i64,
    /// Earlybird discount rate (e.g. 0.25 = 25% off the first quarter)
    pub discount_rate: f64,
    /// Earlybird last-quarter / urgency priority surcharge rate
    pub surcharge_rate: f64,
    /// Urgency: units held back for priority demand
    pub reserved_priority: u32,
}

/// Snapshot of the two booked-unit counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotUsage {
    pub standard: u32,
    pub priority: u32,
}

impl SlotUsage {
    pub fn total(&self) -> u32 {
        self.standard + self.priority
    }
}

/// A bookable time interval on a specific date.
///
/// The denormalized counters plus `version` are the only shared mutable
/// state on the booking hot path; they change exclusively through the
/// store's conditional writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Template id; `(id, date)` identifies the dated instance
    pub id: String,
    pub provider_id: String,
    pub date: NaiveDate,
    /// Minutes from midnight
    pub start_minute: u16,
    pub end_minute: u16,
    pub capacity: u32,
    pub capacity_mode: CapacityMode,
    pub model: SlotModel,
    pub config: SlotModelConfig,
    pub booked_units_standard: u32,
    pub booked_units_priority: u32,
    /// Optimistic concurrency version, strictly increasing on every
    /// accepted counter mutation
    pub version: u64,
    pub blocked: bool,
    pub blocked_reason: Option<String>,
    /// Bookings currently holding capacity on this instance
    pub booking_refs: Vec<Uuid>,
}

impl TimeSlot {
    pub fn usage(&self) -> SlotUsage {
        SlotUsage {
            standard: self.booked_units_standard,
            priority: self.booked_units_priority,
        }
    }

    /// Capacity available to standard demand.
    ///
    /// Urgency slots strictly partition: standard demand never consumes the
    /// reserved priority pool, even while it sits idle.
    pub fn standard_capacity(&self) -> u32 {
        match self.model {
            SlotModel::Urgency => self.capacity.saturating_sub(self.config.reserved_priority),
            _ => self.capacity,
        }
    }

    /// Remaining units for the given demand type.
    ///
    /// Single-use slots short-circuit to 0/1 on whether any booking holds
    /// the slot.
    pub fn remaining(&self, unit_type: UnitType) -> u32 {
        if self.capacity_mode == CapacityMode::SingleUse {
            return if self.booking_refs.is_empty() { 1 } else { 0 };
        }
        match (self.model, unit_type) {
            (SlotModel::Urgency, UnitType::Standard) => self
                .standard_capacity()
                .saturating_sub(self.booked_units_standard),
            (SlotModel::Urgency, UnitType::Priority) => self
                .config
                .reserved_priority
                .saturating_sub(self.booked_units_priority),
            // flatrate/earlybird draw standard and priority from one pool
            _ => self.capacity.saturating_sub(self.usage().total()),
        }
    }

    /// Total remaining units regardless of demand type.
    pub fn remaining_total(&self) -> u32 {
        if self.capacity_mode == CapacityMode::SingleUse {
            return if self.booking_refs.is_empty() { 1 } else { 0 };
        }
        match self.model {
            SlotModel::Urgency => {
                self.remaining(UnitType::Standard) + self.remaining(UnitType::Priority)
            }
            _ => self.capacity.saturating_sub(self.usage().total()),
        }
    }

    /// Whether no further demand of any type can be accepted.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_total() == 0
    }

    /// Counter invariant check (`booked ≤ capacity`, respecting the urgency
    /// split). Used by tests and the usage audit.
    pub fn invariant_holds(&self) -> bool {
        match self.model {
            SlotModel::Urgency => {
                self.booked_units_standard <= self.standard_capacity()
                    && self.booked_units_priority <= self.config.reserved_priority
            }
            _ => self.usage().total() <= self.capacity,
        }
    }

    /// Price of one unit at 1-based position `position`, before options.
    ///
    /// Earlybird prices are a function of the unit's position in the sale:
    /// the first `ceil(capacity × 0.25)` units are discounted, units beyond
    /// `ceil(capacity × 0.75)` are surcharged, the middle is at base price.
    /// Always recomputed from live usage, never cached.
    pub fn unit_price_minor(&self, position: u32, unit_type: UnitType) -> i64 {
        let base = self.config.base_price_minor;
        match self.model {
            SlotModel::FlatRate => base,
            SlotModel::EarlyBird => {
                let discount_cutoff = ceil_quarter(self.capacity);
                let surcharge_after = ceil_three_quarters(self.capacity);
                if position <= discount_cutoff {
                    round_minor(base as f64 * (1.0 - self.config.discount_rate))
                } else if position > surcharge_after {
                    round_minor(base as f64 * (1.0 + self.config.surcharge_rate))
                } else {
                    base
                }
            }
            SlotModel::Urgency => match unit_type {
                UnitType::Standard => base,
                UnitType::Priority => round_minor(base as f64 * (1.0 + self.config.surcharge_rate)),
            },
        }
    }

    /// Price of the next sellable unit for the given demand type.
    pub fn next_unit_price_minor(&self, unit_type: UnitType) -> i64 {
        self.unit_price_minor(self.usage().total() + 1, unit_type)
    }

    /// Total for `units` starting at the current live usage, with the
    /// option multiplier applied multiplicatively per unit and each unit
    /// rounded to the smallest currency unit.
    pub fn price_for(&self, units: u32, unit_type: UnitType, option_multiplier: f64) -> i64 {
        let sold = self.usage().total();
        (1..=units)
            .map(|i| {
                let unit = self.unit_price_minor(sold + i, unit_type);
                round_minor(unit as f64 * option_multiplier)
            })
            .sum()
    }

    /// Ratio of remaining to total capacity, 0.0 when capacity is zero.
    pub fn remaining_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.remaining_total() as f64 / self.capacity as f64
    }

    /// Whether the slot's start has already passed relative to `now`.
    pub fn is_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at()
    }

    /// Absolute start instant (date + start minutes, UTC).
    pub fn starts_at(&self) -> DateTime<Utc> {
        let midnight = self.date.and_hms_opt(0, 0, 0).expect("midnight exists");
        Utc.from_utc_datetime(&midnight) + chrono::Duration::minutes(self.start_minute as i64)
    }

    /// Whether `[start, end)` lies within the slot bounds.
    pub fn contains_interval(&self, start_minute: u16, end_minute: u16) -> bool {
        start_minute < end_minute
            && start_minute >= self.start_minute
            && end_minute <= self.end_minute
    }
}

/// `ceil(capacity × 0.25)` in integer arithmetic
fn ceil_quarter(capacity: u32) -> u32 {
    capacity.div_ceil(4)
}

/// `ceil(capacity × 0.75)` in integer arithmetic
fn ceil_three_quarters(capacity: u32) -> u32 {
    (capacity * 3).div_ceil(4)
}

/// Round a fractional price to the smallest currency unit.
pub fn round_minor(value: f64) -> i64 {
    value.round() as i64
}

/// Interval blocked for further booking, created when capacity is exhausted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedInterval {
    pub provider_id: String,
    pub date: NaiveDate,
    pub start_minute: u16,
    pub end_minute: u16,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl BlockedInterval {
    pub fn capacity_reached(slot: &TimeSlot) -> Self {
        Self {
            provider_id: slot.provider_id.clone(),
            date: slot.date,
            start_minute: slot.start_minute,
            end_minute: slot.end_minute,
            reason: "capacity reached".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn covers(&self, date: NaiveDate, start_minute: u16, end_minute: u16) -> bool {
        self.date == date && self.start_minute == start_minute && self.end_minute == end_minute
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(model: SlotModel, capacity: u32, config: SlotModelConfig) -> TimeSlot {
        TimeSlot {
            id: "s1".into(),
            provider_id: "p1".into(),
            date: "2026-09-07".parse().unwrap(),
            start_minute: 540,
            end_minute: 660,
            capacity,
            capacity_mode: CapacityMode::UnitBased,
            model,
            config,
            booked_units_standard: 0,
            booked_units_priority: 0,
            version: 0,
            blocked: false,
            blocked_reason: None,
            booking_refs: Vec::new(),
        }
    }

    fn earlybird_10() -> TimeSlot {
        slot(
            SlotModel::EarlyBird,
            10,
            SlotModelConfig {
                base_price_minor: 100,
                discount_rate: 0.25,
                surcharge_rate: 0.10,
                reserved_priority: 0,
            },
        )
    }

    #[test]
    fn earlybird_position_prices() {
        let s = earlybird_10();
        // thresholds: ceil(10*0.25)=3, ceil(10*0.75)=8
        assert_eq!(s.unit_price_minor(1, UnitType::Standard), 75);
        assert_eq!(s.unit_price_minor(3, UnitType::Standard), 75);
        assert_eq!(s.unit_price_minor(4, UnitType::Standard), 100);
        assert_eq!(s.unit_price_minor(6, UnitType::Standard), 100);
        assert_eq!(s.unit_price_minor(8, UnitType::Standard), 100);
        assert_eq!(s.unit_price_minor(9, UnitType::Standard), 110);
        assert_eq!(s.unit_price_minor(10, UnitType::Standard), 110);
    }

    #[test]
    fn earlybird_next_unit_tracks_live_usage() {
        let mut s = earlybird_10();
        assert_eq!(s.next_unit_price_minor(UnitType::Standard), 75);
        s.booked_units_standard = 5;
        assert_eq!(s.next_unit_price_minor(UnitType::Standard), 100);
        s.booked_units_standard = 8;
        assert_eq!(s.next_unit_price_minor(UnitType::Standard), 110);
    }

    #[test]
    fn earlybird_multi_unit_total_crosses_thresholds() {
        let s = earlybird_10();
        // units 1..=4: 75+75+75+100
        assert_eq!(s.price_for(4, UnitType::Standard, 1.0), 325);
    }

    #[test]
    fn flatrate_price_and_remaining() {
        let mut s = slot(
            SlotModel::FlatRate,
            8,
            SlotModelConfig {
                base_price_minor: 2_500,
                discount_rate: 0.0,
                surcharge_rate: 0.0,
                reserved_priority: 0,
            },
        );
        s.booked_units_standard = 3;
        assert_eq!(s.remaining(UnitType::Standard), 5);
        assert_eq!(s.price_for(2, UnitType::Standard, 1.0), 5_000);
    }

    #[test]
    fn urgency_strict_partition() {
        let mut s = slot(
            SlotModel::Urgency,
            20,
            SlotModelConfig {
                base_price_minor: 1_000,
                discount_rate: 0.0,
                surcharge_rate: 0.5,
                reserved_priority: 5,
            },
        );
        assert_eq!(s.standard_capacity(), 15);
        assert_eq!(s.remaining(UnitType::Standard), 15);
        assert_eq!(s.remaining(UnitType::Priority), 5);

        s.booked_units_standard = 15;
        // standard pool exhausted; priority pool untouched
        assert_eq!(s.remaining(UnitType::Standard), 0);
        assert_eq!(s.remaining(UnitType::Priority), 5);
        assert!(!s.is_exhausted());

        s.booked_units_priority = 5;
        assert!(s.is_exhausted());
        assert!(s.invariant_holds());
    }

    #[test]
    fn urgency_priority_units_are_surcharged() {
        let s = slot(
            SlotModel::Urgency,
            10,
            SlotModelConfig {
                base_price_minor: 1_000,
                discount_rate: 0.0,
                surcharge_rate: 0.5,
                reserved_priority: 2,
            },
        );
        assert_eq!(s.unit_price_minor(1, UnitType::Standard), 1_000);
        assert_eq!(s.unit_price_minor(1, UnitType::Priority), 1_500);
    }

    #[test]
    fn option_multiplier_rounds_per_unit() {
        let s = slot(
            SlotModel::FlatRate,
            10,
            SlotModelConfig {
                base_price_minor: 333,
                discount_rate: 0.0,
                surcharge_rate: 0.0,
                reserved_priority: 0,
            },
        );
        // 333 * 1.5 = 499.5 → 500 per unit
        assert_eq!(s.price_for(2, UnitType::Standard, 1.5), 1_000);
    }

    #[test]
    fn single_use_remaining_is_binary() {
        let mut s = slot(
            SlotModel::FlatRate,
            4,
            SlotModelConfig {
                base_price_minor: 100,
                discount_rate: 0.0,
                surcharge_rate: 0.0,
                reserved_priority: 0,
            },
        );
        s.capacity_mode = CapacityMode::SingleUse;
        assert_eq!(s.remaining(UnitType::Standard), 1);
        s.booking_refs.push(Uuid::new_v4());
        assert_eq!(s.remaining(UnitType::Standard), 0);
        assert!(s.is_exhausted());
    }

    #[test]
    fn remaining_ratio_flags_low_capacity() {
        let mut s = earlybird_10();
        s.booked_units_standard = 8;
        assert!(s.remaining_ratio() < 0.3);
        s.booked_units_standard = 6;
        assert!(s.remaining_ratio() >= 0.3);
    }

    #[test]
    fn interval_bounds() {
        let s = earlybird_10();
        assert!(s.contains_interval(540, 660));
        assert!(s.contains_interval(560, 600));
        assert!(!s.contains_interval(500, 600));
        assert!(!s.contains_interval(540, 700));
        assert!(!s.contains_interval(600, 600));
    }

    #[test]
    fn starts_at_combines_date_and_minutes() {
        let s = earlybird_10();
        let starts = s.starts_at();
        assert_eq!(starts.to_rfc3339(), "2026-09-07T09:00:00+00:00");
        assert!(s.is_elapsed(starts));
        assert!(!s.is_elapsed(starts - chrono::Duration::minutes(1)));
    }
}
