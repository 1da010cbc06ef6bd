//! # Payment Reconciliation
//!
//! Payments are recorded against an invoice and drive its balance once
//! completed.
//!
//! ## Payment Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │            ┌──► completed ──► cancelled                             │
//! │  pending ──┼──► failed                  (terminal)                  │
//! │            └──► cancelled               (terminal)                  │
//! │                                                                     │
//! │  completed emits PaymentCompleted; the invoice's paid_amount only   │
//! │  ever changes through that event.                                   │
//! │  refunded exists in the status set but no transition reaches it.    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Completing a payment yields a [`PaymentCompleted`] event; the
//! persistence layer consumes it in the same transaction that updates the
//! invoice balance. Cancelling a completed payment does NOT reverse the
//! applied amount; refund bookkeeping is left to the adopting system.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::invoice::{Invoice, InvoiceStatus};
use crate::money::Money;

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    Check,
    BankTransfer,
    Card,
    Paypal,
    Other,
}

impl PaymentMethod {
    /// Stable `code → display label` mapping for UI rendering.
    pub const fn choices() -> &'static [(&'static str, &'static str)] {
        &[
            ("cash", "Espèces"),
            ("mobile_money", "Mobile Money"),
            ("check", "Chèque"),
            ("bank_transfer", "Virement bancaire"),
            ("card", "Carte bancaire"),
            ("paypal", "PayPal"),
            ("other", "Autre"),
        ]
    }

    pub const fn code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Check => "check",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Other => "other",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Espèces",
            PaymentMethod::MobileMoney => "Mobile Money",
            PaymentMethod::Check => "Chèque",
            PaymentMethod::BankTransfer => "Virement bancaire",
            PaymentMethod::Card => "Carte bancaire",
            PaymentMethod::Paypal => "PayPal",
            PaymentMethod::Other => "Autre",
        }
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// The status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Stable `code → display label` mapping for UI rendering.
    pub const fn choices() -> &'static [(&'static str, &'static str)] {
        &[
            ("pending", "En attente"),
            ("completed", "Complété"),
            ("failed", "Échoué"),
            ("cancelled", "Annulé"),
            ("refunded", "Remboursé"),
        ]
    }

    pub const fn code(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "En attente",
            PaymentStatus::Completed => "Complété",
            PaymentStatus::Failed => "Échoué",
            PaymentStatus::Cancelled => "Annulé",
            PaymentStatus::Refunded => "Remboursé",
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Payment Completed Event
// =============================================================================

/// Emitted when a payment transitions to `completed`.
///
/// The invoice ledger consumes this event to apply the amount to the
/// invoice balance; it is the only write path for `paid_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    pub payment_id: String,
    pub payment_number: String,
    pub invoice_id: String,
    pub amount_cents: i64,
    pub processed_at: DateTime<Utc>,
}

impl PaymentCompleted {
    /// Returns the applied amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment recorded against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business number: PAY + YYYYMMDD + 3-digit daily sequence.
    pub payment_number: String,

    pub invoice_id: String,

    /// Must equal the invoice's customer.
    pub customer_id: String,

    /// Amount in cents (> 0, ≤ invoice remaining at creation time).
    pub amount_cents: i64,

    pub payment_method: PaymentMethod,

    pub status: PaymentStatus,

    /// Value date declared by the customer (≤ today at creation).
    #[ts(as = "String")]
    pub payment_date: NaiveDate,

    /// Set when the payment is completed.
    #[ts(as = "Option<String>")]
    pub processed_date: Option<DateTime<Utc>>,

    /// Opaque gateway transaction identifier.
    pub transaction_id: Option<String>,

    /// Opaque reference (check number, transfer reference, ...).
    pub reference: Option<String>,

    pub notes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Whether the payment can still be processed.
    pub fn can_be_processed(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    /// Whether the payment can be cancelled.
    pub fn can_be_cancelled(&self) -> bool {
        matches!(self.status, PaymentStatus::Pending | PaymentStatus::Completed)
    }

    /// Marks the payment completed and emits the reconciliation event.
    ///
    /// Only legal from `pending`. Sets `processed_date`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> CoreResult<PaymentCompleted> {
        if !self.can_be_processed() {
            return Err(CoreError::InvalidTransition {
                entity: "Payment",
                from: self.status.code().to_string(),
                to: PaymentStatus::Completed.code().to_string(),
            });
        }

        self.status = PaymentStatus::Completed;
        self.processed_date = Some(now);

        Ok(PaymentCompleted {
            payment_id: self.id.clone(),
            payment_number: self.payment_number.clone(),
            invoice_id: self.invoice_id.clone(),
            amount_cents: self.amount_cents,
            processed_at: now,
        })
    }

    /// Marks the payment failed. Only legal from `pending`.
    pub fn fail(&mut self) -> CoreResult<()> {
        if self.status != PaymentStatus::Pending {
            return Err(CoreError::InvalidTransition {
                entity: "Payment",
                from: self.status.code().to_string(),
                to: PaymentStatus::Failed.code().to_string(),
            });
        }

        self.status = PaymentStatus::Failed;
        Ok(())
    }

    /// Marks the payment cancelled. Legal from `pending` or `completed`.
    ///
    /// Cancelling a completed payment does not reverse the amount already
    /// applied to the invoice.
    pub fn cancel(&mut self) -> CoreResult<()> {
        if !self.can_be_cancelled() {
            return Err(CoreError::InvalidTransition {
                entity: "Payment",
                from: self.status.code().to_string(),
                to: PaymentStatus::Cancelled.code().to_string(),
            });
        }

        self.status = PaymentStatus::Cancelled;
        Ok(())
    }
}

// =============================================================================
// Creation Validation
// =============================================================================

/// Validates a payment submission against its invoice, before any mutation.
///
/// Checks, in order:
/// - invoice not cancelled
/// - payment customer equals invoice customer
/// - amount strictly positive
/// - amount does not exceed the invoice's remaining balance
/// - payment date not in the future
pub fn validate_creation(
    invoice: &Invoice,
    customer_id: &str,
    amount: Money,
    payment_date: NaiveDate,
    today: NaiveDate,
) -> CoreResult<()> {
    if invoice.status == InvoiceStatus::Cancelled {
        return Err(CoreError::InvoiceNotPayable {
            invoice_number: invoice.invoice_number.clone(),
            status: invoice.status.code().to_string(),
        });
    }

    if invoice.customer_id != customer_id {
        return Err(CoreError::CustomerMismatch {
            expected: invoice.customer_id.clone(),
            actual: customer_id.to_string(),
        });
    }

    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }

    if amount > invoice.remaining_amount() {
        return Err(CoreError::InsufficientBalance {
            invoice_number: invoice.invoice_number.clone(),
            remaining_cents: invoice.remaining_amount_cents,
            requested_cents: amount.cents(),
        });
    }

    if payment_date > today {
        return Err(ValidationError::FutureDate {
            field: "payment_date".to_string(),
        }
        .into());
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
