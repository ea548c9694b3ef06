use thiserror::Error;

/// Error taxonomy for the booking core.
///
/// The allocator distinguishes concurrency conflicts (the caller must
/// re-quote and may retry) from business rejections (capacity exceeded,
/// price drift), which must never be retried automatically.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// Malformed input, rejected before anything is persisted.
    #[error("Validation: {0}")]
    Validation(String),

    /// Conditional write on `(slot, date, version)` found no match.
    #[error("Concurrent update on slot {slot_id} for {date}: please re-quote")]
    ConcurrencyConflict { slot_id: String, date: String },

    /// Business rejection: not enough remaining units. Nothing persisted.
    #[error("Capacity exceeded on slot {slot_id}: requested {requested}, remaining {remaining}")]
    CapacityExceeded {
        slot_id: String,
        requested: u32,
        remaining: u32,
    },

    /// Gateway failure or capture timeout; triggers compensation.
    #[error("Payment failed: {0}")]
    Payment(String),

    /// Store unreachable; the operation is not considered committed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl BookingError {
    /// Whether the error is likely transient and the operation may succeed
    /// if retried. Business rejections are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BookingError::ConcurrencyConflict { .. } | BookingError::Persistence(_)
        )
    }
}

/// Result type for booking-core operations
pub type BookingResult<T> = Result<T, BookingError>;
