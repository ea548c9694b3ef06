//! Outbound ports — contracts of external collaborators
//!
//! HTTP handlers, auth, push delivery and the user/provider directory live
//! in sibling services. The booking core only depends on these traits;
//! adapters are wired in by the embedding application.

pub mod directory;
pub mod notify;
pub mod payment;

pub use directory::{Identity, IdentityPatch, ProviderDirectory};
pub use notify::PushNotifier;
pub use payment::PaymentGateway;
