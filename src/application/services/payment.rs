//! Payment capture with saga-style compensation
//!
//! The only blocking call on the booking path: a synchronous capture
//! bounded by a hard timeout. Success confirms the booking; a hard failure
//! or timeout unwinds the completed saga stages — the persisted booking is
//! cancelled and the slot counters are rolled back by the same units.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::domain::ports::PaymentGateway;
use crate::domain::{
    Booking, BookingError, BookingResult, Invoice, InvoiceStatus, PaymentAction, PaymentMethod,
    PaymentState,
};
use crate::infrastructure::storage::Storage;

/// Service for pre-payment capture and compensation
pub struct PaymentService {
    storage: Arc<dyn Storage>,
    gateway: Arc<dyn PaymentGateway>,
    capture_timeout: Duration,
}

impl PaymentService {
    pub fn new(
        storage: Arc<dyn Storage>,
        gateway: Arc<dyn PaymentGateway>,
        capture_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            gateway,
            capture_timeout,
        }
    }

    /// Attempt to capture the booking total, bounded by the configured
    /// timeout.
    ///
    /// - Captured: booking → confirmed, invoice saved as captured.
    /// - Retriable decline: booking → payment_required, the slot stays
    ///   held while payment is retried out of band.
    /// - Hard failure or timeout: compensation — the booking is cancelled
    ///   and the counters rolled back — then [`BookingError::Payment`].
    ///
    /// `observed_version` is the slot version written by this booking's
    /// counter increment; the rollback is conditioned on the version being
    /// at least that value.
    pub async fn capture_prepayment(
        &self,
        booking: &mut Booking,
        method: PaymentMethod,
        observed_version: u64,
    ) -> BookingResult<()> {
        let attempt = tokio::time::timeout(
            self.capture_timeout,
            self.gateway.process_payment(
                booking.id,
                &booking.user_id,
                booking.total_price_minor,
                &booking.currency,
                method,
                PaymentAction::Charge,
            ),
        )
        .await;

        match attempt {
            Ok(Ok(invoice)) if invoice.status == InvoiceStatus::Captured => {
                self.storage.save_invoice(invoice).await?;
                booking.payment_state = PaymentState::Captured;
                booking.confirm();
                self.storage.update_booking(booking.clone()).await?;
                info!(
                    booking_id = %booking.id,
                    amount = booking.total_price_minor,
                    currency = booking.currency.as_str(),
                    "Payment captured, booking confirmed"
                );
                Ok(())
            }
            Ok(Ok(invoice)) if invoice.status == InvoiceStatus::RequiresAction => {
                self.storage.save_invoice(invoice).await?;
                booking.require_payment();
                self.storage.update_booking(booking.clone()).await?;
                info!(
                    booking_id = %booking.id,
                    "Capture needs user action; slot held in payment_required"
                );
                Ok(())
            }
            Ok(Ok(invoice)) => {
                // hard decline
                if let Err(e) = self.storage.save_invoice(invoice).await {
                    warn!(booking_id = %booking.id, error = %e, "Failed to record declined invoice");
                }
                self.compensate(booking, observed_version).await;
                Err(BookingError::Payment("gateway declined the charge".into()))
            }
            Ok(Err(e)) => {
                self.compensate(booking, observed_version).await;
                Err(BookingError::Payment(e.to_string()))
            }
            Err(_elapsed) => {
                self.compensate(booking, observed_version).await;
                Err(BookingError::Payment(format!(
                    "capture timed out after {:?}",
                    self.capture_timeout
                )))
            }
        }
    }

    /// Record an out-of-band payment (e.g. cash collected on service) and
    /// complete the booking's payment state.
    pub async fn record_offline_payment(
        &self,
        booking: &mut Booking,
        method: PaymentMethod,
    ) -> BookingResult<()> {
        let invoice = Invoice::new(
            booking.id,
            booking.user_id.clone(),
            booking.total_price_minor,
            booking.currency.clone(),
            method,
            PaymentAction::Record,
            InvoiceStatus::Captured,
            None,
        );
        self.storage.save_invoice(invoice).await?;
        booking.payment_state = PaymentState::Captured;
        self.storage.update_booking(booking.clone()).await?;
        Ok(())
    }

    /// Unwind the completed stages of the booking saga: delete the booking
    /// and roll back its counter increment. Idempotent; local failures are
    /// logged and recovered, never escalated to the caller.
    pub async fn compensate(&self, booking: &mut Booking, observed_version: u64) {
        booking.payment_state = PaymentState::Failed;
        booking.cancel();

        if let Err(e) = self.storage.cancel_booking(booking.id).await {
            // reconciled later by the usage audit; do not surface
            error!(booking_id = %booking.id, error = %e, "Failed to delete booking during compensation");
        }

        let (standard, priority) = booking.unit_deltas();
        match self
            .storage
            .rollback_slot_counters(
                &booking.slot_id,
                booking.date,
                booking.id,
                standard,
                priority,
                observed_version,
            )
            .await
        {
            Ok(Some(slot)) => {
                if !slot.blocked {
                    // the decrement may have lifted a capacity block
                    if let Err(e) = self
                        .storage
                        .remove_blocked_interval(
                            &slot.provider_id,
                            slot.date,
                            slot.start_minute,
                            slot.end_minute,
                        )
                        .await
                    {
                        warn!(booking_id = %booking.id, error = %e, "Failed to clear blocked interval");
                    }
                }
                info!(
                    booking_id = %booking.id,
                    slot_id = booking.slot_id.as_str(),
                    "Compensated booking, counters rolled back"
                );
            }
            Ok(None) => {
                debug!(booking_id = %booking.id, "Counters already rolled back");
            }
            Err(e) => {
                error!(
                    booking_id = %booking.id,
                    error = %e,
                    "Counter rollback failed; usage audit will reconcile"
                );
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
