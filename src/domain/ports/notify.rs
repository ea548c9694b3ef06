//! Push notification dispatcher port

use async_trait::async_trait;

use crate::shared::errors::BookingResult;

/// Fire-and-forget push delivery.
///
/// Failures are logged by the caller and never block or fail the booking
/// path.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send_push(
        &self,
        target_id: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> BookingResult<()>;
}
