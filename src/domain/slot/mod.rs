//! Time slot aggregate
//!
//! Dated slot instances with capacity counters, pricing models and the
//! optimistic-concurrency version, plus the blocked-interval record written
//! when a slot fills up.

pub mod model;

pub use model::{
    round_minor, BlockedInterval, CapacityMode, SlotModel, SlotModelConfig, SlotUsage, TimeSlot,
};
