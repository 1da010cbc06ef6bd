//! # Error Types
//!
//! Domain-specific error types for gescom-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  gescom-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                    │
//! │  └── ValidationError  - Field-level input failures                  │
//! │                                                                     │
//! │  gescom-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                 │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → DbError → host application     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All checks run before any mutation; an `Err` means nothing changed.
//! Every variant carries the field or entity context needed to render a
//! field-level message.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Illegal state transition (order, invoice or payment status).
    #[error("{entity} cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Order has no line items (confirmation and invoicing both need one).
    #[error("Order {order_number} has no line items")]
    EmptyOrder { order_number: String },

    /// Order status does not allow the requested operation.
    #[error("Order {order_number} is '{status}', cannot perform operation")]
    InvalidOrderState {
        order_number: String,
        status: String,
    },

    /// An invoice already exists for this order (1:1 invariant).
    #[error("Order {order_number} already has an invoice")]
    InvoiceExists { order_number: String },

    /// Invoice status does not allow recording a payment.
    #[error("Invoice {invoice_number} is '{status}', cannot record payment")]
    InvoiceNotPayable {
        invoice_number: String,
        status: String,
    },

    /// Cross-reference inconsistency: the payment or invoice names a
    /// different customer than the document it is applied to.
    #[error("Customer mismatch: expected {expected}, got {actual}")]
    CustomerMismatch { expected: String, actual: String },

    /// Insufficient stock to add an order line for a physical product.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Payment amount exceeds the invoice's outstanding balance.
    #[error(
        "Amount {requested_cents} exceeds remaining balance {remaining_cents} on invoice {invoice_number}"
    )]
    InsufficientBalance {
        invoice_number: String,
        remaining_cents: i64,
        requested_cents: i64,
    },

    /// Product is inactive and cannot be ordered.
    #[error("Product {product} is inactive")]
    ProductInactive { product: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when user input doesn't meet requirements, before business
/// logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid SKU).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Date must not lie in the future (payment dates).
    #[error("{field} cannot be in the future")]
    FutureDate { field: String },

    /// Date must not lie in the past (expected delivery dates).
    #[error("{field} cannot be in the past")]
    PastDate { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
