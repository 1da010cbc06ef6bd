//! # gescom-core: Pure Business Logic for the Order-to-Cash Engine
//!
//! This crate is the heart of the system: every financial rule lives here
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   Order-to-Cash Architecture                        │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │           Host application (CRUD, rendering, auth)          │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │               ★ gescom-core (THIS CRATE) ★                  │   │
//! │  │                                                             │   │
//! │  │  ┌────────┐ ┌───────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │  │ types  │ │ money │ │  order  │ │ invoice │ │ payment │  │   │
//! │  │  │Catalog │ │ Money │ │ Engine  │ │Derivati.│ │Reconcil.│  │   │
//! │  │  └────────┘ └───────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                             │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS          │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │              gescom-db (SQLite persistence)                 │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog and shared types (Customer, Category, Product)
//! - [`money`] - Money type with integer-cent arithmetic
//! - [`order`] - Order engine: lines, status machine, totals derivation
//! - [`invoice`] - Invoice derivation and balance tracking
//! - [`payment`] - Payment reconciliation and the PaymentCompleted event
//! - [`numbering`] - Document number formatting
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: "now" and "today" are always arguments
//! 2. **Integer Money**: all amounts are cents (i64), rates basis points
//! 3. **Explicit Errors**: typed errors, never strings or panics
//! 4. **Snapshot Semantics**: lines pin product prices; invoices pin order
//!    totals

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod invoice;
pub mod money;
pub mod numbering;
pub mod order;
pub mod payment;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use invoice::{Invoice, InvoiceStatus, PaymentTerms};
pub use money::Money;
pub use numbering::DocumentKind;
pub use order::{compute_totals, Order, OrderLine, OrderStatus, OrderTotals};
pub use payment::{Payment, PaymentCompleted, PaymentMethod, PaymentStatus};
pub use types::{
    Category, Customer, CustomerRef, CustomerType, Product, ProductType, StockStatus, TaxRate,
};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity on a single order line.
///
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
