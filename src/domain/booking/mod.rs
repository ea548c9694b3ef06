//! Booking aggregate
//!
//! The committed booking record and its status state machine.

pub mod model;

pub use model::{Booking, BookingStatus, PaymentState, UnitType};
