//! Service plan aggregate
//!
//! The ephemeral search/booking request a service seeker submits.

pub mod model;

pub use model::{Recurrence, RecurrencePattern, ServiceMode, ServicePlan};
