//! # Order Engine
//!
//! Orders own an ordered collection of line items, each pinned to the
//! product's price and tax rate at add time, and derive their monetary
//! totals from those lines.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  draft ──► confirmed ──► in_progress ──► ready ──► delivered        │
//! │    │           │             │             │           │            │
//! │    │           └────────────►└────────────►┘──────────►│            │
//! │    │                                                   ▼            │
//! │    └──────────────► cancelled ◄────────────────────  closed         │
//! │                         │                              ▲            │
//! │                         └──────────────────────────────┘            │
//! │                                                                     │
//! │  Forward-only. Terminal: closed, cancelled (both may still close).  │
//! │  draft → confirmed requires at least one line item.                 │
//! │  delivered sets delivered_date when unset.                          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are never set directly: they are recomputed from the current
//! lines after every line mutation, in the same transaction as the line
//! write (see `gescom-db`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::TaxRate;

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    InProgress,
    Ready,
    Delivered,
    Cancelled,
    Closed,
}

impl OrderStatus {
    /// Stable `code → display label` mapping for UI rendering.
    pub const fn choices() -> &'static [(&'static str, &'static str)] {
        &[
            ("draft", "Brouillon"),
            ("confirmed", "Confirmée"),
            ("in_progress", "En cours"),
            ("ready", "Prête"),
            ("delivered", "Livrée"),
            ("cancelled", "Annulée"),
            ("closed", "Clôturée"),
        ]
    }

    pub const fn code(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Closed => "closed",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "Brouillon",
            OrderStatus::Confirmed => "Confirmée",
            OrderStatus::InProgress => "En cours",
            OrderStatus::Ready => "Prête",
            OrderStatus::Delivered => "Livrée",
            OrderStatus::Cancelled => "Annulée",
            OrderStatus::Closed => "Clôturée",
        }
    }

    /// Terminal states permit no further transition.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Closed)
    }

    /// Whether the forward-only state machine permits `self → to`.
    ///
    /// A same-status "transition" is always permitted (no-op).
    pub fn can_transition(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;

        if *self == to {
            return true;
        }

        match (*self, to) {
            (Draft, Confirmed) => true,
            (Confirmed, InProgress | Ready | Delivered) => true,
            (InProgress, Ready | Delivered) => true,
            (Ready, Delivered) => true,
            // Any non-terminal state may be cancelled; no un-cancel.
            (Draft | Confirmed | InProgress | Ready | Delivered, Cancelled) => true,
            (Delivered | Cancelled, Closed) => true,
            _ => false,
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Draft
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// A line item on an order.
///
/// Uses the snapshot pattern: `unit_price_cents` and `tax_rate_bps` are
/// captured from the product when the line is created, so a later price
/// change on the product never alters existing lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Quantity ordered (≥ 1).
    pub quantity: i64,
    /// Unit price before tax at time of ordering (frozen).
    pub unit_price_cents: i64,
    /// Tax rate in basis points at time of ordering (frozen).
    pub tax_rate_bps: u32,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the tax rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Line total before tax: unit_price × quantity.
    pub fn line_total_ht(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    /// Tax amount for this line, rounded half-up.
    pub fn line_tax_amount(&self) -> Money {
        self.line_total_ht().tax_amount(self.tax_rate())
    }

    /// Line total including tax.
    pub fn line_total_ttc(&self) -> Money {
        self.line_total_ht() + self.line_tax_amount()
    }
}

// =============================================================================
// Order Totals
// =============================================================================

/// Derived order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal_ht_cents: i64,
    pub tax_amount_cents: i64,
    pub total_amount_cents: i64,
}

/// Computes order totals as the sum over the given lines.
///
/// Invariant: `total_amount == subtotal_ht + tax_amount`, with each side
/// equal to the corresponding sum over lines.
pub fn compute_totals(lines: &[OrderLine]) -> OrderTotals {
    let subtotal: Money = lines
        .iter()
        .fold(Money::zero(), |acc, line| acc + line.line_total_ht());
    let tax: Money = lines
        .iter()
        .fold(Money::zero(), |acc, line| acc + line.line_tax_amount());

    OrderTotals {
        subtotal_ht_cents: subtotal.cents(),
        tax_amount_cents: tax.cents(),
        total_amount_cents: (subtotal + tax).cents(),
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business number: CMD + YYYYMMDD + 3-digit daily sequence.
    pub order_number: String,

    pub customer_id: String,

    pub status: OrderStatus,

    #[ts(as = "String")]
    pub order_date: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub expected_delivery_date: Option<NaiveDate>,

    /// Actual delivery date, set on transition to `delivered`.
    #[ts(as = "Option<String>")]
    pub delivered_date: Option<NaiveDate>,

    /// Derived: sum of line totals before tax. Never set directly.
    pub subtotal_ht_cents: i64,

    /// Derived: sum of line tax amounts. Never set directly.
    pub tax_amount_cents: i64,

    /// Derived: subtotal_ht + tax_amount. Never set directly.
    pub total_amount_cents: i64,

    pub notes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the subtotal before tax as Money.
    #[inline]
    pub fn subtotal_ht(&self) -> Money {
        Money::from_cents(self.subtotal_ht_cents)
    }

    /// Returns the tax amount as Money.
    #[inline]
    pub fn tax_amount(&self) -> Money {
        Money::from_cents(self.tax_amount_cents)
    }

    /// Returns the total including tax as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// Writes recomputed totals onto the order.
    pub fn apply_totals(&mut self, totals: OrderTotals) {
        self.subtotal_ht_cents = totals.subtotal_ht_cents;
        self.tax_amount_cents = totals.tax_amount_cents;
        self.total_amount_cents = totals.total_amount_cents;
    }

    /// Whether line items may currently be added, updated or removed.
    ///
    /// Mutation is limited to the pre-fulfilment window.
    pub fn lines_mutable(&self) -> bool {
        matches!(self.status, OrderStatus::Draft | OrderStatus::Confirmed)
    }

    /// Whether an invoice may be derived from this order.
    pub fn invoiceable(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Confirmed | OrderStatus::InProgress | OrderStatus::Ready | OrderStatus::Delivered
        )
    }

    /// Applies a status transition, enforcing the forward-only machine.
    ///
    /// ## Arguments
    /// * `to` - Target status
    /// * `today` - Current date, recorded as `delivered_date` when the
    ///   order transitions to `delivered` and none is set
    /// * `line_count` - Number of lines currently on the order; `draft →
    ///   confirmed` requires at least one
    pub fn transition(&mut self, to: OrderStatus, today: NaiveDate, line_count: usize) -> CoreResult<()> {
        if self.status == to {
            return Ok(());
        }

        if !self.status.can_transition(to) {
            return Err(CoreError::InvalidTransition {
                entity: "Order",
                from: self.status.code().to_string(),
                to: to.code().to_string(),
            });
        }

        if self.status == OrderStatus::Draft && to == OrderStatus::Confirmed && line_count == 0 {
            return Err(CoreError::InvalidTransition {
                entity: "Order",
                from: self.status.code().to_string(),
                to: to.code().to_string(),
            });
        }

        if to == OrderStatus::Delivered && self.delivered_date.is_none() {
            self.delivered_date = Some(today);
        }

        self.status = to;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i64, unit_price_cents: i64, tax_rate_bps: u32) -> OrderLine {
        OrderLine {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: "o-1".to_string(),
            product_id: "p-1".to_string(),
            quantity,
            unit_price_cents,
            tax_rate_bps,
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: "o-1".to_string(),
            order_number: "CMD20240101001".to_string(),
            customer_id: "c-1".to_string(),
            status,
            order_date: now,
            expected_delivery_date: None,
            delivered_date: None,
            subtotal_ht_cents: 0,
            tax_amount_cents: 0,
            total_amount_cents: 0,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_line_derivations() {
        // qty=2 × 100.00 € at 18 % → 200.00 HT, 36.00 tax, 236.00 TTC
        let l = line(2, 10_000, 1800);
        assert_eq!(l.line_total_ht().cents(), 20_000);
        assert_eq!(l.line_tax_amount().cents(), 3_600);
        assert_eq!(l.line_total_ttc().cents(), 23_600);
    }

    #[test]
    fn test_compute_totals_sums_lines() {
        let lines = vec![line(2, 10_000, 1800), line(1, 5_000, 1000), line(3, 333, 0)];

        let totals = compute_totals(&lines);
        assert_eq!(totals.subtotal_ht_cents, 20_000 + 5_000 + 999);
        assert_eq!(totals.tax_amount_cents, 3_600 + 500);
        assert_eq!(
            totals.total_amount_cents,
            totals.subtotal_ht_cents + totals.tax_amount_cents
        );
    }

    #[test]
    fn test_compute_totals_empty() {
        assert_eq!(compute_totals(&[]), OrderTotals::default());
    }

    #[test]
    fn test_totals_invariant_after_mutations() {
        let mut lines = vec![line(2, 10_000, 1800)];
        let mut o = order(OrderStatus::Draft);

        o.apply_totals(compute_totals(&lines));
        assert_eq!(o.total_amount_cents, 23_600);

        // add
        lines.push(line(4, 2_500, 1800));
        o.apply_totals(compute_totals(&lines));
        assert_eq!(o.subtotal_ht_cents, 30_000);
        assert_eq!(o.total_amount_cents, o.subtotal_ht_cents + o.tax_amount_cents);

        // update
        lines[0].quantity = 1;
        o.apply_totals(compute_totals(&lines));
        assert_eq!(o.subtotal_ht_cents, 20_000);
        assert_eq!(o.total_amount_cents, o.subtotal_ht_cents + o.tax_amount_cents);

        // remove
        lines.remove(1);
        o.apply_totals(compute_totals(&lines));
        assert_eq!(o.subtotal_ht_cents, 10_000);
        assert_eq!(o.total_amount_cents, 11_800);
    }

    #[test]
    fn test_confirm_requires_lines() {
        let mut o = order(OrderStatus::Draft);

        let err = o.transition(OrderStatus::Confirmed, today(), 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(o.status, OrderStatus::Draft);

        o.transition(OrderStatus::Confirmed, today(), 1).unwrap();
        assert_eq!(o.status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_forward_only_machine() {
        let mut o = order(OrderStatus::Delivered);
        let err = o.transition(OrderStatus::Confirmed, today(), 1).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        // no un-cancel
        let mut o = order(OrderStatus::Cancelled);
        assert!(o.transition(OrderStatus::Draft, today(), 1).is_err());
        assert!(o.transition(OrderStatus::Delivered, today(), 1).is_err());

        // closed is terminal
        let mut o = order(OrderStatus::Closed);
        assert!(o.transition(OrderStatus::Cancelled, today(), 1).is_err());
    }

    #[test]
    fn test_delivered_sets_date_once() {
        let mut o = order(OrderStatus::Confirmed);
        o.transition(OrderStatus::Delivered, today(), 1).unwrap();
        assert_eq!(o.delivered_date, Some(today()));

        // An explicit delivery date is not overwritten.
        let mut o = order(OrderStatus::Ready);
        let earlier = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        o.delivered_date = Some(earlier);
        o.transition(OrderStatus::Delivered, today(), 1).unwrap();
        assert_eq!(o.delivered_date, Some(earlier));
    }

    #[test]
    fn test_cancel_from_any_non_terminal() {
        for status in [
            OrderStatus::Draft,
            OrderStatus::Confirmed,
            OrderStatus::InProgress,
            OrderStatus::Ready,
            OrderStatus::Delivered,
        ] {
            let mut o = order(status);
            o.transition(OrderStatus::Cancelled, today(), 1).unwrap();
            assert_eq!(o.status, OrderStatus::Cancelled);
        }
    }

    #[test]
    fn test_close_from_delivered_or_cancelled() {
        let mut o = order(OrderStatus::Delivered);
        o.transition(OrderStatus::Closed, today(), 1).unwrap();
        assert_eq!(o.status, OrderStatus::Closed);

        let mut o = order(OrderStatus::Cancelled);
        o.transition(OrderStatus::Closed, today(), 1).unwrap();

        let mut o = order(OrderStatus::Confirmed);
        assert!(o.transition(OrderStatus::Closed, today(), 1).is_err());
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut o = order(OrderStatus::Cancelled);
        o.transition(OrderStatus::Cancelled, today(), 0).unwrap();
        assert_eq!(o.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_lines_mutable_window() {
        assert!(order(OrderStatus::Draft).lines_mutable());
        assert!(order(OrderStatus::Confirmed).lines_mutable());
        assert!(!order(OrderStatus::Delivered).lines_mutable());
        assert!(!order(OrderStatus::Cancelled).lines_mutable());
    }

    #[test]
    fn test_invoiceable_window() {
        assert!(!order(OrderStatus::Draft).invoiceable());
        assert!(order(OrderStatus::Confirmed).invoiceable());
        assert!(order(OrderStatus::Delivered).invoiceable());
        assert!(!order(OrderStatus::Cancelled).invoiceable());
    }

    #[test]
    fn test_status_choices() {
        assert_eq!(OrderStatus::choices().len(), 7);
        assert_eq!(OrderStatus::Draft.label(), "Brouillon");
        assert_eq!(OrderStatus::Closed.code(), "closed");
    }
}
