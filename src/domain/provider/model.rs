//! Provider domain entity

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::slot::{CapacityMode, SlotModel, SlotModelConfig, TimeSlot};
use crate::shared::geo::GeoPoint;

/// Public profile attributes used by the matcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub location: GeoPoint,
    /// Average rating, 0.0..=5.0 (values above 5 are capped when scored)
    pub rating: f64,
    pub verified: bool,
    pub completed_bookings: u32,
}

/// A purchasable option on the provider's catalogue.
///
/// The multiplier is applied multiplicatively to the slot's unit price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOption {
    pub id: String,
    pub name: String,
    pub price_multiplier: f64,
}

/// Service catalogue: currency plus priced options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCatalogue {
    /// Currency code (ISO 4217) for all of the provider's prices
    pub currency: String,
    pub options: Vec<ServiceOption>,
}

impl ServiceCatalogue {
    pub fn option(&self, id: &str) -> Option<&ServiceOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// Recurring slot template from the provider's schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotTemplate {
    pub id: String,
    /// Weekdays this template applies to
    pub weekdays: Vec<Weekday>,
    /// Minutes from midnight
    pub start_minute: u16,
    pub end_minute: u16,
    pub capacity: u32,
    pub capacity_mode: CapacityMode,
    pub model: SlotModel,
    pub config: SlotModelConfig,
}

impl SlotTemplate {
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.weekdays.contains(&date.weekday())
    }

    /// Materialize a fresh dated instance of this template.
    ///
    /// Counters start at zero and `version` at 0; the store's conditional
    /// writes take over from there.
    pub fn instantiate(&self, provider_id: &str, date: NaiveDate) -> TimeSlot {
        TimeSlot {
            id: self.id.clone(),
            provider_id: provider_id.to_string(),
            date,
            start_minute: self.start_minute,
            end_minute: self.end_minute,
            capacity: self.capacity,
            capacity_mode: self.capacity_mode,
            model: self.model,
            config: self.config.clone(),
            booked_units_standard: 0,
            booked_units_priority: 0,
            version: 0,
            blocked: false,
            blocked_reason: None,
            booking_refs: Vec::new(),
        }
    }
}

/// Service provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub display_name: String,
    /// Service types this provider offers
    pub service_types: Vec<String>,
    pub profile: ProviderProfile,
    pub catalogue: ServiceCatalogue,
    pub templates: Vec<SlotTemplate>,
}

impl Provider {
    pub fn offers(&self, service_type: &str) -> bool {
        self.service_types.iter().any(|s| s == service_type)
    }

    pub fn template(&self, id: &str) -> Option<&SlotTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Templates applicable on the given date.
    pub fn templates_on(&self, date: NaiveDate) -> impl Iterator<Item = &SlotTemplate> {
        self.templates.iter().filter(move |t| t.applies_on(date))
    }
}
