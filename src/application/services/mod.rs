//! Application services
//!
//! One service per stage of the booking pipeline, in dependency order:
//! matching, availability building, capacity allocation, payment
//! compensation, subscription orchestration.

pub mod allocation;
pub mod availability;
pub mod matcher;
pub mod payment;
pub mod subscription;

pub use allocation::{AllocationService, BookingRequest, UsageAudit};
pub use availability::{AvailabilityService, AvailableSlot, PricedOption};
pub use matcher::{MatchService, RankedCandidate, ScoreBreakdown};
pub use payment::PaymentService;
pub use subscription::{SeriesOutcome, SeriesReport, SubscriptionService};
