//! # Invoice Derivation
//!
//! Exactly one invoice per order. The invoice copies the order's totals at
//! creation time (point-in-time snapshot: later order edits never propagate),
//! derives its due date from the payment terms, and tracks a running paid /
//! remaining balance fed exclusively by completed payments.
//!
//! ## Balance Invariant
//! ```text
//! remaining_amount + paid_amount == total_amount     (after every update)
//! remaining_amount >= 0                              (overdraft rejected)
//! ```

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::order::{Order, OrderLine};

// =============================================================================
// Payment Terms
// =============================================================================

/// Payment terms: the day-count added to the invoice date to obtain the
/// due date. Persisted under the French label strings ("30 jours").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum PaymentTerms {
    #[serde(rename = "7 jours")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "7 jours"))]
    Days7,
    #[serde(rename = "15 jours")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "15 jours"))]
    Days15,
    #[serde(rename = "30 jours")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "30 jours"))]
    Days30,
    #[serde(rename = "45 jours")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "45 jours"))]
    Days45,
    #[serde(rename = "60 jours")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "60 jours"))]
    Days60,
}

impl PaymentTerms {
    /// Stable `code → display label` mapping for UI rendering.
    pub const fn choices() -> &'static [(&'static str, &'static str)] {
        &[
            ("7 jours", "7 jours"),
            ("15 jours", "15 jours"),
            ("30 jours", "30 jours"),
            ("45 jours", "45 jours"),
            ("60 jours", "60 jours"),
        ]
    }

    /// Number of days until the invoice falls due.
    pub const fn days(&self) -> u64 {
        match self {
            PaymentTerms::Days7 => 7,
            PaymentTerms::Days15 => 15,
            PaymentTerms::Days30 => 30,
            PaymentTerms::Days45 => 45,
            PaymentTerms::Days60 => 60,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            PaymentTerms::Days7 => "7 jours",
            PaymentTerms::Days15 => "15 jours",
            PaymentTerms::Days30 => "30 jours",
            PaymentTerms::Days45 => "45 jours",
            PaymentTerms::Days60 => "60 jours",
        }
    }

    /// Due date derived from an invoice date under these terms.
    pub fn due_date_from(&self, invoice_date: NaiveDate) -> NaiveDate {
        invoice_date
            .checked_add_days(Days::new(self.days()))
            .unwrap_or(invoice_date)
    }

    /// Parses free-form terms text; unrecognized terms default to 30 days.
    ///
    /// Matches on the contained day-count, so "paiement sous 15 jours"
    /// resolves to `Days15`.
    pub fn parse(terms: &str) -> Self {
        if terms.contains("7 jours") {
            PaymentTerms::Days7
        } else if terms.contains("15 jours") {
            PaymentTerms::Days15
        } else if terms.contains("45 jours") {
            PaymentTerms::Days45
        } else if terms.contains("60 jours") {
            PaymentTerms::Days60
        } else {
            PaymentTerms::Days30
        }
    }
}

impl Default for PaymentTerms {
    fn default() -> Self {
        PaymentTerms::Days30
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// The status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Cancelled,
    Overdue,
}

impl InvoiceStatus {
    /// Stable `code → display label` mapping for UI rendering.
    pub const fn choices() -> &'static [(&'static str, &'static str)] {
        &[
            ("pending", "En attente de paiement"),
            ("partially_paid", "Partiellement payée"),
            ("paid", "Payée"),
            ("cancelled", "Annulée"),
            ("overdue", "En retard"),
        ]
    }

    pub const fn code(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "En attente de paiement",
            InvoiceStatus::PartiallyPaid => "Partiellement payée",
            InvoiceStatus::Paid => "Payée",
            InvoiceStatus::Cancelled => "Annulée",
            InvoiceStatus::Overdue => "En retard",
        }
    }

    /// `paid` and `cancelled` are absorbing: once reached, no edit may move
    /// the invoice to another status.
    pub const fn is_absorbing(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Pending
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice derived from an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business number: FAC + YYYYMMDD + 3-digit daily sequence.
    pub invoice_number: String,

    /// The order this invoice bills. Unique: one invoice per order.
    pub order_id: String,

    /// Must equal the order's customer.
    pub customer_id: String,

    pub status: InvoiceStatus,

    #[ts(as = "String")]
    pub invoice_date: NaiveDate,

    /// invoice_date + payment_terms, unless explicitly supplied.
    #[ts(as = "String")]
    pub due_date: NaiveDate,

    /// Set when the invoice becomes fully paid.
    #[ts(as = "Option<String>")]
    pub paid_date: Option<NaiveDate>,

    /// Copied from the order at creation (snapshot).
    pub subtotal_ht_cents: i64,

    /// Copied from the order at creation (snapshot).
    pub tax_amount_cents: i64,

    /// Copied from the order at creation (snapshot).
    pub total_amount_cents: i64,

    /// Running sum of completed payments.
    pub paid_amount_cents: i64,

    /// total_amount - paid_amount. Never negative.
    pub remaining_amount_cents: i64,

    pub payment_terms: PaymentTerms,

    pub notes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Derives a new invoice from an order.
    ///
    /// Copies the order totals verbatim (point-in-time snapshot), sets
    /// `remaining = total`, and computes `due_date = invoice_date + terms`
    /// when no explicit due date is given.
    ///
    /// Fails when the order has no lines or is not in an invoiceable state.
    /// The 1:1 order↔invoice invariant is enforced by the persistence layer
    /// (unique index on `order_id`).
    #[allow(clippy::too_many_arguments)]
    pub fn from_order(
        order: &Order,
        lines: &[OrderLine],
        invoice_number: String,
        invoice_date: NaiveDate,
        terms: PaymentTerms,
        due_date: Option<NaiveDate>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<Invoice> {
        if lines.is_empty() {
            return Err(CoreError::EmptyOrder {
                order_number: order.order_number.clone(),
            });
        }

        if !order.invoiceable() {
            return Err(CoreError::InvalidOrderState {
                order_number: order.order_number.clone(),
                status: order.status.code().to_string(),
            });
        }

        let due_date = due_date.unwrap_or_else(|| terms.due_date_from(invoice_date));

        Ok(Invoice {
            id: uuid::Uuid::new_v4().to_string(),
            invoice_number,
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            status: InvoiceStatus::Pending,
            invoice_date,
            due_date,
            paid_date: None,
            subtotal_ht_cents: order.subtotal_ht_cents,
            tax_amount_cents: order.tax_amount_cents,
            total_amount_cents: order.total_amount_cents,
            paid_amount_cents: 0,
            remaining_amount_cents: order.total_amount_cents,
            payment_terms: terms,
            notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the total including tax as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// Returns the amount paid so far as Money.
    #[inline]
    pub fn paid_amount(&self) -> Money {
        Money::from_cents(self.paid_amount_cents)
    }

    /// Returns the outstanding balance as Money.
    #[inline]
    pub fn remaining_amount(&self) -> Money {
        Money::from_cents(self.remaining_amount_cents)
    }

    /// Applies a completed payment to the balance.
    ///
    /// Rejects non-positive amounts and amounts exceeding the outstanding
    /// balance before any mutation. On success:
    /// - `paid_amount += amount`, `remaining = total - paid`
    /// - fully paid → `status = paid`, `paid_date = today`
    /// - partially paid → `status = partially_paid`
    pub fn apply_payment(&mut self, amount: Money, today: NaiveDate) -> CoreResult<()> {
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }

        if amount > self.remaining_amount() {
            return Err(CoreError::InsufficientBalance {
                invoice_number: self.invoice_number.clone(),
                remaining_cents: self.remaining_amount_cents,
                requested_cents: amount.cents(),
            });
        }

        self.paid_amount_cents += amount.cents();
        self.remaining_amount_cents = self.total_amount_cents - self.paid_amount_cents;

        if self.is_fully_paid() {
            self.status = InvoiceStatus::Paid;
            self.paid_date = Some(today);
        } else if self.paid_amount_cents > 0 {
            self.status = InvoiceStatus::PartiallyPaid;
        }

        Ok(())
    }

    /// Computed predicate: the invoice is past due and not settled.
    ///
    /// Callers must recompute this rather than trust a stored `overdue`
    /// status value.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        if self.status.is_absorbing() {
            return false;
        }
        today > self.due_date
    }

    /// Whether the paid amount covers the full total.
    pub fn is_fully_paid(&self) -> bool {
        self.paid_amount_cents >= self.total_amount_cents
    }

    /// Percentage of the total already paid (0-100).
    pub fn payment_percentage(&self) -> f64 {
        if self.total_amount_cents == 0 {
            return 0.0;
        }
        self.paid_amount_cents as f64 * 100.0 / self.total_amount_cents as f64
    }

    /// Days past due; 0 when not overdue.
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_overdue(today) {
            (today - self.due_date).num_days()
        } else {
            0
        }
    }

    /// Applies a manual status edit.
    ///
    /// `paid` and `cancelled` are absorbing at this boundary: once reached
    /// the only permitted "edit" is staying in the same state.
    pub fn set_status(&mut self, to: InvoiceStatus) -> CoreResult<()> {
        if self.status == to {
            return Ok(());
        }

        if self.status.is_absorbing() {
            return Err(CoreError::InvalidTransition {
                entity: "Invoice",
                from: self.status.code().to_string(),
                to: to.code().to_string(),
            });
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
    use crate::order::{compute_totals, OrderStatus};

    fn order_with_lines() -> (Order, Vec<OrderLine>) {
        let now = Utc::now();
        let lines = vec![OrderLine {
            id: "l-1".to_string(),
            order_id: "o-1".to_string(),
            product_id: "p-1".to_string(),
            quantity: 2,
            unit_price_cents: 10_000,
            tax_rate_bps: 1800,
            notes: None,
            created_at: now,
        }];
        let mut order = Order {
            id: "o-1".to_string(),
            order_number: "CMD20240101001".to_string(),
            customer_id: "c-1".to_string(),
            status: OrderStatus::Confirmed,
            order_date: now,
            expected_delivery_date: None,
            delivered_date: None,
            subtotal_ht_cents: 0,
            tax_amount_cents: 0,
            total_amount_cents: 0,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        order.apply_totals(compute_totals(&lines));
        (order, lines)
    }

    fn invoice() -> Invoice {
        let (order, lines) = order_with_lines();
        Invoice::from_order(
            &order,
            &lines,
            "FAC20240101001".to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            PaymentTerms::Days30,
            None,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_payment_terms_parse() {
        assert_eq!(PaymentTerms::parse("7 jours"), PaymentTerms::Days7);
        assert_eq!(PaymentTerms::parse("15 jours"), PaymentTerms::Days15);
        assert_eq!(PaymentTerms::parse("30 jours"), PaymentTerms::Days30);
        assert_eq!(PaymentTerms::parse("paiement sous 45 jours"), PaymentTerms::Days45);
        assert_eq!(PaymentTerms::parse("60 jours fin de mois"), PaymentTerms::Days60);
        // unrecognized terms default to 30 days
        assert_eq!(PaymentTerms::parse("à réception"), PaymentTerms::Days30);
        assert_eq!(PaymentTerms::parse(""), PaymentTerms::Days30);
    }

    #[test]
    fn test_due_date_per_terms() {
        let invoice_date = d(2024, 1, 1);
        assert_eq!(PaymentTerms::Days7.due_date_from(invoice_date), d(2024, 1, 8));
        assert_eq!(PaymentTerms::Days15.due_date_from(invoice_date), d(2024, 1, 16));
        assert_eq!(PaymentTerms::Days30.due_date_from(invoice_date), d(2024, 1, 31));
        assert_eq!(PaymentTerms::Days45.due_date_from(invoice_date), d(2024, 2, 15));
        assert_eq!(PaymentTerms::Days60.due_date_from(invoice_date), d(2024, 3, 1));
    }

    #[test]
    fn test_from_order_snapshot() {
        let inv = invoice();
        assert_eq!(inv.subtotal_ht_cents, 20_000);
        assert_eq!(inv.tax_amount_cents, 3_600);
        assert_eq!(inv.total_amount_cents, 23_600);
        assert_eq!(inv.paid_amount_cents, 0);
        assert_eq!(inv.remaining_amount_cents, 23_600);
        assert_eq!(inv.status, InvoiceStatus::Pending);
        assert_eq!(inv.due_date, d(2024, 1, 31));
        assert_eq!(inv.customer_id, "c-1");
    }

    #[test]
    fn test_from_order_is_point_in_time() {
        let (mut order, lines) = order_with_lines();
        let inv = Invoice::from_order(
            &order,
            &lines,
            "FAC20240101001".to_string(),
            d(2024, 1, 1),
            PaymentTerms::default(),
            None,
            None,
            Utc::now(),
        )
        .unwrap();

        // Later order edits never propagate to the created invoice.
        order.subtotal_ht_cents = 0;
        order.total_amount_cents = 0;
        assert_eq!(inv.total_amount_cents, 23_600);
    }

    #[test]
    fn test_from_order_rejects_empty_order() {
        let (mut order, _) = order_with_lines();
        order.apply_totals(compute_totals(&[]));

        let err = Invoice::from_order(
            &order,
            &[],
            "FAC20240101001".to_string(),
            d(2024, 1, 1),
            PaymentTerms::default(),
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::EmptyOrder { .. }));
    }

    #[test]
    fn test_from_order_rejects_draft_order() {
        let (mut order, lines) = order_with_lines();
        order.status = OrderStatus::Draft;

        let err = Invoice::from_order(
            &order,
            &lines,
            "FAC20240101001".to_string(),
            d(2024, 1, 1),
            PaymentTerms::default(),
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOrderState { .. }));
    }

    #[test]
    fn test_explicit_due_date_wins() {
        let (order, lines) = order_with_lines();
        let inv = Invoice::from_order(
            &order,
            &lines,
            "FAC20240101001".to_string(),
            d(2024, 1, 1),
            PaymentTerms::Days30,
            Some(d(2024, 2, 20)),
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(inv.due_date, d(2024, 2, 20));
    }

    #[test]
    fn test_apply_payment_partial_then_full() {
        let mut inv = invoice();
        let today = d(2024, 1, 10);

        inv.apply_payment(Money::from_cents(10_000), today).unwrap();
        assert_eq!(inv.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(inv.paid_amount_cents, 10_000);
        assert_eq!(inv.remaining_amount_cents, 13_600);
        assert!(inv.paid_date.is_none());

        inv.apply_payment(Money::from_cents(13_600), today).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert_eq!(inv.remaining_amount_cents, 0);
        assert_eq!(inv.paid_date, Some(today));
    }

    #[test]
    fn test_apply_payment_boundary() {
        // amount exactly equal to remaining → paid, remaining 0
        let mut inv = invoice();
        inv.apply_payment(Money::from_cents(23_600), d(2024, 1, 10)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert_eq!(inv.remaining_amount_cents, 0);

        // one cent less → partially_paid
        let mut inv = invoice();
        inv.apply_payment(Money::from_cents(23_599), d(2024, 1, 10)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(inv.remaining_amount_cents, 1);
    }

    #[test]
    fn test_apply_payment_rejects_overdraft() {
        let mut inv = invoice();
        let err = inv
            .apply_payment(Money::from_cents(23_601), d(2024, 1, 10))
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientBalance { .. }));
        // no partial state change
        assert_eq!(inv.paid_amount_cents, 0);
        assert_eq!(inv.remaining_amount_cents, 23_600);
        assert_eq!(inv.status, InvoiceStatus::Pending);
    }

    #[test]
    fn test_apply_payment_rejects_non_positive() {
        let mut inv = invoice();
        assert!(inv.apply_payment(Money::zero(), d(2024, 1, 10)).is_err());
        assert!(inv.apply_payment(Money::from_cents(-100), d(2024, 1, 10)).is_err());
    }

    #[test]
    fn test_balance_round_trip_invariant() {
        let mut inv = invoice();
        let today = d(2024, 1, 10);
        for amount in [1, 99, 10_000, 13_500] {
            inv.apply_payment(Money::from_cents(amount), today).unwrap();
            assert_eq!(
                inv.paid_amount_cents + inv.remaining_amount_cents,
                inv.total_amount_cents
            );
        }
    }

    #[test]
    fn test_is_overdue_is_computed() {
        let mut inv = invoice(); // due 2024-01-31
        assert!(!inv.is_overdue(d(2024, 1, 31)));
        assert!(inv.is_overdue(d(2024, 2, 1)));
        assert_eq!(inv.days_overdue(d(2024, 2, 11)), 11);
        assert_eq!(inv.days_overdue(d(2024, 1, 20)), 0);

        // settled or cancelled invoices are never overdue
        inv.status = InvoiceStatus::Paid;
        assert!(!inv.is_overdue(d(2024, 3, 1)));
        inv.status = InvoiceStatus::Cancelled;
        assert!(!inv.is_overdue(d(2024, 3, 1)));
    }

    #[test]
    fn test_paid_and_cancelled_are_absorbing() {
        let mut inv = invoice();
        inv.status = InvoiceStatus::Paid;
        assert!(inv.set_status(InvoiceStatus::Pending).is_err());
        assert!(inv.set_status(InvoiceStatus::Cancelled).is_err());
        assert!(inv.set_status(InvoiceStatus::Paid).is_ok());

        let mut inv = invoice();
        inv.status = InvoiceStatus::Cancelled;
        assert!(inv.set_status(InvoiceStatus::Pending).is_err());
        assert!(inv.set_status(InvoiceStatus::Cancelled).is_ok());

        let mut inv = invoice();
        inv.set_status(InvoiceStatus::Cancelled).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Cancelled);
    }

    #[test]
    fn test_payment_percentage() {
        let mut inv = invoice();
        assert_eq!(inv.payment_percentage(), 0.0);
        inv.apply_payment(Money::from_cents(11_800), d(2024, 1, 10)).unwrap();
        assert!((inv.payment_percentage() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_choices() {
        assert_eq!(InvoiceStatus::choices().len(), 5);
        assert_eq!(InvoiceStatus::PartiallyPaid.label(), "Partiellement payée");
        assert_eq!(PaymentTerms::choices().len(), 5);
    }
}
