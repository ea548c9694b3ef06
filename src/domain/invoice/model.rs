//! Invoice domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Gateway action requested for a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAction {
    /// Authorize and capture in one step
    Charge,
    /// Capture a prior authorization
    Capture,
    /// Cancel/void an attempt
    Cancel,
    /// Record an out-of-band payment (e.g. cash on service)
    Record,
}

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Wallet,
    Cash,
}

/// Outcome of one gateway attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Funds captured
    Captured,
    /// Declined but retriable (e.g. 3DS challenge pending); the booking
    /// stays held in `payment_required`
    RequiresAction,
    /// Hard decline; triggers compensation
    Failed,
    /// Voided during compensation
    Cancelled,
}

/// One payment attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: String,
    /// Amount in the smallest currency unit
    pub amount_minor: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub action: PaymentAction,
    pub status: InvoiceStatus,
    /// Reference issued by the gateway, when it got that far
    pub gateway_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(
        booking_id: Uuid,
        user_id: impl Into<String>,
        amount_minor: i64,
        currency: impl Into<String>,
        method: PaymentMethod,
        action: PaymentAction,
        status: InvoiceStatus,
        gateway_ref: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            user_id: user_id.into(),
            amount_minor,
            currency: currency.into(),
            method,
            action,
            status,
            gateway_ref,
            created_at: Utc::now(),
        }
    }

    pub fn is_captured(&self) -> bool {
        self.status == InvoiceStatus::Captured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_invoice() {
        let inv = Invoice::new(
            Uuid::new_v4(),
            "user-1",
            12_500,
            "UZS",
            PaymentMethod::Card,
            PaymentAction::Charge,
            InvoiceStatus::Captured,
            Some("gw-123".into()),
        );
        assert!(inv.is_captured());
        assert_eq!(inv.amount_minor, 12_500);
    }

    #[test]
    fn requires_action_is_not_captured() {
        let inv = Invoice::new(
            Uuid::new_v4(),
            "user-1",
            100,
            "UZS",
            PaymentMethod::Card,
            PaymentAction::Charge,
            InvoiceStatus::RequiresAction,
            None,
        );
        assert!(!inv.is_captured());
    }
}
