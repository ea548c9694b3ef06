pub mod booking;
pub mod invoice;
pub mod plan;
pub mod ports;
pub mod provider;
pub mod slot;

// Re-export commonly used types
pub use booking::{Booking, BookingStatus, PaymentState, UnitType};
pub use invoice::{Invoice, InvoiceStatus, PaymentAction, PaymentMethod};
pub use plan::{Recurrence, RecurrencePattern, ServiceMode, ServicePlan};
pub use provider::{Provider, ProviderProfile, ServiceCatalogue, ServiceOption, SlotTemplate};
pub use slot::{BlockedInterval, CapacityMode, SlotModel, SlotModelConfig, TimeSlot};

// Re-export the error types for convenience
pub use crate::shared::errors::{BookingError, BookingResult};
