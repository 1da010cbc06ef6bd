//! # Document Numbering
//!
//! Business numbers follow `PREFIX + YYYYMMDD + NNN`: a per-kind prefix,
//! the document date, and a zero-padded 3-digit daily sequence, e.g.
//! `CMD20240115003`.
//!
//! This module only formats numbers; sequence allocation is transactional
//! and lives in `gescom-db` (per-kind, per-date atomic counter), so two
//! concurrent creations can never compute the same sequence.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// =============================================================================
// Document Kind
// =============================================================================

/// The kind of numbered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Order,
    Invoice,
    Payment,
}

impl DocumentKind {
    /// Number prefix for this document kind.
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Order => "CMD",
            DocumentKind::Invoice => "FAC",
            DocumentKind::Payment => "PAY",
        }
    }

    /// Stable key used by the sequence table.
    pub const fn key(&self) -> &'static str {
        match self {
            DocumentKind::Order => "order",
            DocumentKind::Invoice => "invoice",
            DocumentKind::Payment => "payment",
        }
    }
}

/// Formats a document number from its kind, date and daily sequence.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use gescom_core::numbering::{format_number, DocumentKind};
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// assert_eq!(format_number(DocumentKind::Order, date, 3), "CMD20240115003");
/// ```
pub fn format_number(kind: DocumentKind, date: NaiveDate, sequence: u32) -> String {
    format!("{}{}{:03}", kind.prefix(), date.format("%Y%m%d"), sequence)
}

// =============================================================================
// Unit Tests
// =============================================================================
