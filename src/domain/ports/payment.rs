//! Payment gateway port

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::invoice::{Invoice, PaymentAction, PaymentMethod};
use crate::shared::errors::BookingResult;

/// External payment gateway.
///
/// Every call yields at most one [`Invoice`]. The gateway may block up to
/// its own internal deadline; callers bound the wait with a hard timeout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn process_payment(
        &self,
        booking_id: Uuid,
        user_id: &str,
        amount_minor: i64,
        currency: &str,
        method: PaymentMethod,
        action: PaymentAction,
    ) -> BookingResult<Invoice>;
}
