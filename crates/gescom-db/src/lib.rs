//! # gescom-db: Database Layer
//!
//! SQLite persistence for the order-to-cash backend, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Host application (CRUD endpoints, rendering, auth)                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │                  gescom-db (THIS CRATE)                     │   │
//! │  │                                                             │   │
//! │  │  ┌────────────┐   ┌───────────────┐   ┌──────────────┐     │   │
//! │  │  │  Database  │   │ Repositories  │   │  Migrations  │     │   │
//! │  │  │ (pool.rs)  │   │ order/invoice │   │  (embedded)  │     │   │
//! │  │  │ SqlitePool │◄──│ payment/...   │   │ 001_init.sql │     │   │
//! │  │  └────────────┘   └───────────────┘   └──────────────┘     │   │
//! │  │                                                             │   │
//! │  │  Transaction scoping lives here: number allocation, line    │   │
//! │  │  mutation + totals, payment completion + invoice balance.   │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite Database (WAL, foreign keys on)                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gescom_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/gescom.db")).await?;
//!
//! let order = db.orders().create(&customer_id, None, None).await?;
//! db.orders().add_line(&order.id, &product_id, 2, None, None, None).await?;
//! db.orders().transition_status(&order.id, OrderStatus::Confirmed).await?;
//!
//! let invoice = db.invoices()
//!     .create_from_order(&order.id, PaymentTerms::Days30, None, None, None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::customer::{CustomerRepository, NewCustomer};
pub use repository::invoice::InvoiceRepository;
pub use repository::order::OrderRepository;
pub use repository::payment::{NewPayment, PaymentRepository};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::sequence::SequenceRepository;
