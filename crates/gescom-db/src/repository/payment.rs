//! # Payment Repository
//!
//! Database operations for payments and the reconciliation write path.
//!
//! ## Reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  create()            payment row inserted as 'pending'              │
//! │       │              (validated against the invoice balance)        │
//! │       ▼                                                             │
//! │  mark_completed()    ONE transaction:                               │
//! │       │                1. payment: pending → completed (guarded)    │
//! │       │                2. PaymentCompleted event → invoice ledger   │
//! │       │                   (balance guard, see invoice repository)   │
//! │       ▼                                                             │
//! │  invoice.paid_amount / remaining_amount / status updated            │
//! │                                                                     │
//! │  mark_failed() / mark_cancelled(): status only — cancelling a       │
//! │  completed payment leaves the applied amount on the invoice.        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{invoice, sequence};
use gescom_core::payment::validate_creation;
use gescom_core::validation::validate_payment_amount;
use gescom_core::{
    CoreError, DocumentKind, Invoice, Money, Payment, PaymentMethod, PaymentStatus,
};

/// Fields accepted when recording a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub invoice_id: String,
    pub customer_id: String,
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    /// Value date; defaults to today. Must not lie in the future.
    pub payment_date: Option<NaiveDate>,
    pub transaction_id: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

const PAYMENT_COLUMNS: &str = r#"
    id, payment_number, invoice_id, customer_id, amount_cents,
    payment_method, status, payment_date, processed_date,
    transaction_id, reference, notes, created_at, updated_at
"#;

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a pending payment against an invoice.
    ///
    /// Validates before any write: positive amount within the invoice's
    /// remaining balance, matching customer, invoice not cancelled,
    /// payment date not in the future. Allocates the PAY number and
    /// inserts in one transaction.
    pub async fn create(&self, new: NewPayment) -> DbResult<Payment> {
        validate_payment_amount(new.amount_cents).map_err(CoreError::from)?;

        let now = Utc::now();
        let today = now.date_naive();
        let payment_date = new.payment_date.unwrap_or(today);

        let mut tx = self.pool.begin().await?;

        let invoice = invoice::get_invoice_on(&mut tx, &new.invoice_id).await?;
        validate_creation(
            &invoice,
            &new.customer_id,
            Money::from_cents(new.amount_cents),
            payment_date,
            today,
        )?;

        let payment_number =
            sequence::next_number_on(&mut *tx, DocumentKind::Payment, payment_date).await?;

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            payment_number,
            invoice_id: new.invoice_id,
            customer_id: new.customer_id,
            amount_cents: new.amount_cents,
            payment_method: new.payment_method,
            status: PaymentStatus::Pending,
            payment_date,
            processed_date: None,
            transaction_id: new.transaction_id,
            reference: new.reference,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %payment.id, payment_number = %payment.payment_number, "Creating payment");

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, payment_number, invoice_id, customer_id, amount_cents,
                payment_method, status, payment_date, processed_date,
                transaction_id, reference, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.payment_number)
        .bind(&payment.invoice_id)
        .bind(&payment.customer_id)
        .bind(payment.amount_cents)
        .bind(payment.payment_method)
        .bind(payment.status)
        .bind(payment.payment_date)
        .bind(payment.processed_date)
        .bind(&payment.transaction_id)
        .bind(&payment.reference)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            payment_number = %payment.payment_number,
            invoice_id = %payment.invoice_id,
            amount = payment.amount_cents,
            "Payment recorded"
        );

        Ok(payment)
    }

    /// Gets a payment by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Lists payments recorded against an invoice, oldest first.
    pub async fn list_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = ?1 ORDER BY created_at, id"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Completes a pending payment and applies it to the invoice.
    ///
    /// The status flip and the invoice balance update share one
    /// transaction; an invoice's `paid_amount` only ever changes through
    /// this path. Racing completions that would jointly overpay the
    /// invoice: the second fails on the balance check and the payment
    /// stays pending.
    ///
    /// Returns the completed payment and the updated invoice.
    pub async fn mark_completed(&self, payment_id: &str) -> DbResult<(Payment, Invoice)> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let mut payment = get_payment_on(&mut tx, payment_id).await?;
        let event = payment.complete(now)?;

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?2, processed_date = ?3, updated_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(payment_id)
        .bind(payment.status)
        .bind(payment.processed_date)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict {
                entity: "Payment".to_string(),
                id: payment_id.to_string(),
            });
        }

        let invoice = invoice::apply_event_on(&mut tx, &event).await?;

        tx.commit().await?;

        info!(
            payment_number = %payment.payment_number,
            invoice_number = %invoice.invoice_number,
            amount = payment.amount_cents,
            invoice_status = invoice.status.code(),
            "Payment completed"
        );

        payment.updated_at = now;
        Ok((payment, invoice))
    }

    /// Marks a pending payment as failed.
    pub async fn mark_failed(&self, payment_id: &str) -> DbResult<Payment> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let mut payment = get_payment_on(&mut tx, payment_id).await?;
        payment.fail()?;

        let result = sqlx::query(
            "UPDATE payments SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = 'pending'",
        )
        .bind(payment_id)
        .bind(payment.status)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict {
                entity: "Payment".to_string(),
                id: payment_id.to_string(),
            });
        }

        tx.commit().await?;

        info!(payment_number = %payment.payment_number, "Payment failed");

        payment.updated_at = now;
        Ok(payment)
    }

    /// Cancels a pending or completed payment.
    ///
    /// Cancelling a completed payment does not reverse the amount already
    /// applied to the invoice; the gap is logged for refund follow-up.
    pub async fn mark_cancelled(&self, payment_id: &str) -> DbResult<Payment> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let mut payment = get_payment_on(&mut tx, payment_id).await?;
        let was_completed = payment.status == PaymentStatus::Completed;
        payment.cancel()?;

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?2, updated_at = ?3
            WHERE id = ?1 AND status IN ('pending', 'completed')
            "#,
        )
        .bind(payment_id)
        .bind(payment.status)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict {
                entity: "Payment".to_string(),
                id: payment_id.to_string(),
            });
        }

        tx.commit().await?;

        if was_completed {
            warn!(
                payment_number = %payment.payment_number,
                invoice_id = %payment.invoice_id,
                amount = payment.amount_cents,
                "Completed payment cancelled; amount stays applied to the invoice"
            );
        } else {
            info!(payment_number = %payment.payment_number, "Payment cancelled");
        }

        payment.updated_at = now;
        Ok(payment)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn get_payment_on(conn: &mut SqliteConnection, id: &str) -> DbResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Payment", id))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::customer::NewCustomer;
    use crate::repository::product::NewProduct;
    use gescom_core::{CustomerType, InvoiceStatus, OrderStatus, PaymentTerms, ProductType};

    /// Full order→invoice chain: one line, qty=2 × 100.00 € at 18 % →
    /// invoice total 236.00 €.
    async fn setup_invoice() -> (Database, Invoice, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let customer = db
            .customers()
            .insert(NewCustomer {
                customer_type: CustomerType::Individual,
                first_name: "Awa".to_string(),
                last_name: "Diop".to_string(),
                company_name: None,
                email: "awa@example.com".to_string(),
                phone: None,
            })
            .await
            .unwrap();
        let category = db
            .products()
            .insert_category("Fournitures", None)
            .await
            .unwrap();
        let product = db
            .products()
            .insert(NewProduct {
                name: "Papier A4 80g".to_string(),
                description: None,
                category_id: category.id,
                product_type: ProductType::Physical,
                unit_price_cents: 10_000,
                tax_rate_bps: Some(1800),
                stock_quantity: 50,
                min_stock_level: 5,
                sku: None,
            })
            .await
            .unwrap();

        let order = db.orders().create(&customer.id, None, None).await.unwrap();
        db.orders()
            .add_line(&order.id, &product.id, 2, None, None, None)
            .await
            .unwrap();
        db.orders()
            .transition_status(&order.id, OrderStatus::Confirmed)
            .await
            .unwrap();

        let invoice = db
            .invoices()
            .create_from_order(&order.id, PaymentTerms::Days30, None, None, None)
            .await
            .unwrap();

        (db, invoice, customer.id)
    }

    fn new_payment(invoice: &Invoice, customer_id: &str, amount_cents: i64) -> NewPayment {
        NewPayment {
            invoice_id: invoice.id.clone(),
            customer_id: customer_id.to_string(),
            amount_cents,
            payment_method: PaymentMethod::BankTransfer,
            payment_date: None,
            transaction_id: None,
            reference: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_full_payment_settles_invoice() {
        let (db, invoice, customer_id) = setup_invoice().await;

        let payment = db
            .payments()
            .create(new_payment(&invoice, &customer_id, 23_600))
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.payment_number.starts_with("PAY"));

        let (payment, invoice) = db.payments().mark_completed(&payment.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.processed_date.is_some());

        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.paid_amount_cents, 23_600);
        assert_eq!(invoice.remaining_amount_cents, 0);
        assert_eq!(
            invoice.paid_date,
            Some(payment.processed_date.unwrap().date_naive())
        );
    }

    #[tokio::test]
    async fn test_partial_payment() {
        let (db, invoice, customer_id) = setup_invoice().await;

        let payment = db
            .payments()
            .create(new_payment(&invoice, &customer_id, 10_000))
            .await
            .unwrap();
        let (_, invoice) = db.payments().mark_completed(&payment.id).await.unwrap();

        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.paid_amount_cents, 10_000);
        assert_eq!(invoice.remaining_amount_cents, 13_600);
        assert!(invoice.paid_date.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_amount_over_remaining() {
        let (db, invoice, customer_id) = setup_invoice().await;

        let err = db
            .payments()
            .create(new_payment(&invoice, &customer_id, 23_601))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientBalance { .. })));
    }

    #[tokio::test]
    async fn test_create_rejects_customer_mismatch() {
        let (db, invoice, _) = setup_invoice().await;

        let other = db
            .customers()
            .insert(NewCustomer {
                customer_type: CustomerType::Individual,
                first_name: "Moussa".to_string(),
                last_name: "Ba".to_string(),
                company_name: None,
                email: "moussa@example.com".to_string(),
                phone: None,
            })
            .await
            .unwrap();

        let err = db
            .payments()
            .create(new_payment(&invoice, &other.id, 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CustomerMismatch { .. })));
    }

    #[tokio::test]
    async fn test_create_rejects_cancelled_invoice() {
        let (db, invoice, customer_id) = setup_invoice().await;
        db.invoices()
            .set_status(&invoice.id, InvoiceStatus::Cancelled)
            .await
            .unwrap();

        let err = db
            .payments()
            .create(new_payment(&invoice, &customer_id, 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvoiceNotPayable { .. })));
    }

    #[tokio::test]
    async fn test_create_rejects_future_payment_date() {
        let (db, invoice, customer_id) = setup_invoice().await;

        let mut new = new_payment(&invoice, &customer_id, 1_000);
        new.payment_date = Some(Utc::now().date_naive().succ_opt().unwrap());

        let err = db.payments().create(new).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_two_payments_cannot_jointly_overpay() {
        let (db, invoice, customer_id) = setup_invoice().await;

        // remaining 236.00: two pending payments of 150.00 each both pass
        // the creation check (stale reads), but only one may complete.
        let first = db
            .payments()
            .create(new_payment(&invoice, &customer_id, 15_000))
            .await
            .unwrap();
        let second = db
            .payments()
            .create(new_payment(&invoice, &customer_id, 15_000))
            .await
            .unwrap();

        let (_, invoice_after) = db.payments().mark_completed(&first.id).await.unwrap();
        assert_eq!(invoice_after.remaining_amount_cents, 8_600);

        let err = db.payments().mark_completed(&second.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientBalance { .. })));

        // the failed completion rolled back: payment still pending,
        // invoice untouched
        let second = db.payments().get_by_id(&second.id).await.unwrap().unwrap();
        assert_eq!(second.status, PaymentStatus::Pending);
        let invoice = db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.paid_amount_cents, 15_000);
        assert!(invoice.paid_amount_cents <= invoice.total_amount_cents);
    }

    #[tokio::test]
    async fn test_mark_completed_only_once() {
        let (db, invoice, customer_id) = setup_invoice().await;

        let payment = db
            .payments()
            .create(new_payment(&invoice, &customer_id, 5_000))
            .await
            .unwrap();
        db.payments().mark_completed(&payment.id).await.unwrap();

        let err = db.payments().mark_completed(&payment.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));

        // applied exactly once
        let invoice = db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.paid_amount_cents, 5_000);
    }

    #[tokio::test]
    async fn test_mark_failed() {
        let (db, invoice, customer_id) = setup_invoice().await;

        let payment = db
            .payments()
            .create(new_payment(&invoice, &customer_id, 5_000))
            .await
            .unwrap();
        let payment = db.payments().mark_failed(&payment.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);

        // failed payments never touch the invoice
        let invoice = db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.paid_amount_cents, 0);
        assert_eq!(invoice.status, InvoiceStatus::Pending);

        // failed is terminal
        assert!(db.payments().mark_cancelled(&payment.id).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_completed_keeps_invoice_balance() {
        let (db, invoice, customer_id) = setup_invoice().await;

        let payment = db
            .payments()
            .create(new_payment(&invoice, &customer_id, 10_000))
            .await
            .unwrap();
        db.payments().mark_completed(&payment.id).await.unwrap();

        let payment = db.payments().mark_cancelled(&payment.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Cancelled);

        // the applied amount is not reversed
        let invoice = db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(invoice.paid_amount_cents, 10_000);
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
    }

    #[tokio::test]
    async fn test_list_for_invoice() {
        let (db, invoice, customer_id) = setup_invoice().await;

        db.payments()
            .create(new_payment(&invoice, &customer_id, 5_000))
            .await
            .unwrap();
        db.payments()
            .create(new_payment(&invoice, &customer_id, 7_000))
            .await
            .unwrap();

        let payments = db.payments().list_for_invoice(&invoice.id).await.unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].amount_cents, 5_000);
    }

    #[tokio::test]
    async fn test_invoice_delete_blocked_by_payments() {
        let (db, invoice, customer_id) = setup_invoice().await;

        db.payments()
            .create(new_payment(&invoice, &customer_id, 5_000))
            .await
            .unwrap();

        let err = db.invoices().delete(&invoice.id).await.unwrap_err();
        assert!(matches!(err, DbError::DeleteBlocked { .. }));
    }
}
