//! Invoice aggregate
//!
//! One payment attempt against the gateway.

pub mod model;

pub use model::{Invoice, InvoiceStatus, PaymentAction, PaymentMethod};
