//! # Slotbook booking core
//!
//! Matching, availability and capacity-allocation engine for a service
//! marketplace: service seekers are matched to providers, provider schedules
//! are expanded into priced, bookable slot windows, and bookings are
//! committed with strict at-most-capacity guarantees under concurrent demand.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Core business entities, pricing rules and collaborator ports
//! - **application**: Business logic services (matching, availability,
//!   allocation, payment compensation, subscription orchestration)
//! - **infrastructure**: Storage (versioned in-memory store with conditional
//!   counter updates)
//! - **shared**: Errors, retry, geo helpers
//!
//! HTTP routing, authentication, push delivery and admin screens live in
//! sibling services; this crate only consumes their contracts via the traits
//! in [`domain::ports`].

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use config::{default_config_path, AppConfig};
pub use infrastructure::storage::{InMemoryStorage, Storage};
pub use shared::errors::{BookingError, BookingResult};
