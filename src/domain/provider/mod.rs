//! Provider aggregate
//!
//! Provider identity, profile, service catalogue and recurring slot
//! templates.

pub mod model;

pub use model::{Provider, ProviderProfile, ServiceCatalogue, ServiceOption, SlotTemplate};
