//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Host application                                                   │
//! │       │  db.orders().add_line(order_id, product_id, 2, ...)         │
//! │       ▼                                                             │
//! │  OrderRepository                                                    │
//! │  ├── validates input (gescom-core validation)                       │
//! │  ├── loads the aggregate rows inside a transaction                  │
//! │  ├── applies the domain rules (gescom-core)                         │
//! │  └── writes the outcome atomically                                  │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite Database                                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`customer::CustomerRepository`] - Customer records and lookups
//! - [`product::ProductRepository`] - Catalog: categories, products, stock
//! - [`order::OrderRepository`] - Orders, lines, status transitions
//! - [`invoice::InvoiceRepository`] - Invoice derivation and balance ledger
//! - [`payment::PaymentRepository`] - Payment reconciliation write path
//! - [`sequence::SequenceRepository`] - Atomic document number allocation

pub mod customer;
pub mod invoice;
pub mod order;
pub mod payment;
pub mod product;
pub mod sequence;
