//! # Document Sequence Repository
//!
//! Atomic per-(kind, date) counters backing order/invoice/payment numbers.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  INSERT INTO document_sequences (kind, seq_date, next_seq)          │
//! │  VALUES (?, ?, 1)                                                   │
//! │  ON CONFLICT (kind, seq_date)                                       │
//! │    DO UPDATE SET next_seq = next_seq + 1                            │
//! │  RETURNING next_seq                                                 │
//! │                                                                     │
//! │  One statement, atomic: two concurrent creations always receive     │
//! │  distinct sequences. Counting existing rows would not be atomic —   │
//! │  the unique index on the number column is only a backstop.          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Allocation runs on the caller's transaction (`next_on`) so the number
//! and the document insert commit or roll back together.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use gescom_core::numbering::{format_number, DocumentKind};

/// Repository for document number allocation.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    /// Creates a new SequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Allocates the next sequence for (kind, date) on the pool.
    pub async fn next(&self, kind: DocumentKind, date: NaiveDate) -> DbResult<u32> {
        let mut conn = self.pool.acquire().await?;
        next_on(&mut conn, kind, date).await
    }

    /// Allocates and formats the next document number on the pool.
    pub async fn next_number(&self, kind: DocumentKind, date: NaiveDate) -> DbResult<String> {
        let seq = self.next(kind, date).await?;
        Ok(format_number(kind, date, seq))
    }
}

/// Allocates the next sequence for (kind, date) on an existing connection.
///
/// Pass the caller's transaction connection so the allocation is rolled
/// back with the document insert on failure.
pub(crate) async fn next_on(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    date: NaiveDate,
) -> DbResult<u32> {
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (kind, seq_date, next_seq)
        VALUES (?1, ?2, 1)
        ON CONFLICT (kind, seq_date) DO UPDATE SET next_seq = next_seq + 1
        RETURNING next_seq
        "#,
    )
    .bind(kind.key())
    .bind(date)
    .fetch_one(conn)
    .await?;

    debug!(kind = kind.key(), %date, seq, "Allocated document sequence");

    Ok(seq as u32)
}

/// Allocates and formats the next document number on an existing connection.
pub(crate) async fn next_number_on(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    date: NaiveDate,
) -> DbResult<String> {
    let seq = next_on(conn, kind, date).await?;
    Ok(format_number(kind, date, seq))
}

// =============================================================================
// Unit Tests
// =============================================================================
