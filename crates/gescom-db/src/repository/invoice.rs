//! # Invoice Repository
//!
//! Database operations for invoices: 1:1 derivation from orders and the
//! balance ledger fed by completed payments.
//!
//! ## Balance Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  PaymentRepository::mark_completed (single transaction)             │
//! │       │                                                             │
//! │       ├── payment: pending → completed (guarded UPDATE)             │
//! │       │                                                             │
//! │       └── apply_event_on(PaymentCompleted)  ← this module           │
//! │             ├── read invoice row                                    │
//! │             ├── gescom-core Invoice::apply_payment (validates)      │
//! │             └── guarded UPDATE .. WHERE remaining >= amount         │
//! │                                                                     │
//! │  Two racing completions: exactly one passes the balance guard.      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::sequence;
use gescom_core::{
    CoreError, DocumentKind, Invoice, InvoiceStatus, OrderLine, PaymentCompleted, PaymentTerms,
};

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, order_id, customer_id, status,
    invoice_date, due_date, paid_date,
    subtotal_ht_cents, tax_amount_cents, total_amount_cents,
    paid_amount_cents, remaining_amount_cents,
    payment_terms, notes, created_at, updated_at
"#;

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Derives the invoice for an order.
    ///
    /// Copies the order totals at this instant (point-in-time snapshot),
    /// allocates the FAC number and inserts — one transaction. The order
    /// must have lines and be in an invoiceable state; the unique index on
    /// `order_id` enforces 1:1 even against a racing creation.
    ///
    /// ## Arguments
    /// * `invoice_date` - Defaults to today
    /// * `due_date` - Defaults to `invoice_date + terms`
    pub async fn create_from_order(
        &self,
        order_id: &str,
        terms: PaymentTerms,
        invoice_date: Option<NaiveDate>,
        due_date: Option<NaiveDate>,
        notes: Option<&str>,
    ) -> DbResult<Invoice> {
        let now = Utc::now();
        let invoice_date = invoice_date.unwrap_or_else(|| now.date_naive());

        let mut tx = self.pool.begin().await?;

        let order = super::order::get_order_on(&mut tx, order_id).await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM invoices WHERE order_id = ?1")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(CoreError::InvoiceExists {
                order_number: order.order_number.clone(),
            }
            .into());
        }

        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price_cents, tax_rate_bps,
                   notes, created_at
            FROM order_lines WHERE order_id = ?1 ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        let invoice_number =
            sequence::next_number_on(&mut *tx, DocumentKind::Invoice, invoice_date).await?;

        let invoice = Invoice::from_order(
            &order,
            &lines,
            invoice_number,
            invoice_date,
            terms,
            due_date,
            notes.map(str::to_string),
            now,
        )?;

        debug!(id = %invoice.id, invoice_number = %invoice.invoice_number, "Creating invoice");

        let insert = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, order_id, customer_id, status,
                invoice_date, due_date, paid_date,
                subtotal_ht_cents, tax_amount_cents, total_amount_cents,
                paid_amount_cents, remaining_amount_cents,
                payment_terms, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.order_id)
        .bind(&invoice.customer_id)
        .bind(invoice.status)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .bind(invoice.subtotal_ht_cents)
        .bind(invoice.tax_amount_cents)
        .bind(invoice.total_amount_cents)
        .bind(invoice.paid_amount_cents)
        .bind(invoice.remaining_amount_cents)
        .bind(invoice.payment_terms)
        .bind(&invoice.notes)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await;

        // A creation racing past the pre-check lands on the unique index.
        if let Err(err) = insert {
            let db_err = DbError::from(err);
            if let DbError::UniqueViolation { field, .. } = &db_err {
                if field.contains("order_id") {
                    return Err(CoreError::InvoiceExists {
                        order_number: order.order_number.clone(),
                    }
                    .into());
                }
            }
            return Err(db_err);
        }

        tx.commit().await?;

        info!(
            invoice_number = %invoice.invoice_number,
            order_number = %order.order_number,
            total = invoice.total_amount_cents,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// Gets an invoice by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Gets the invoice derived from an order, if any.
    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE order_id = ?1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Lists invoices past their due date that are not settled.
    ///
    /// Overdue is computed from `due_date` against the given day, never
    /// read from the stored status.
    pub async fn list_overdue(&self, today: NaiveDate) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE status NOT IN ('paid', 'cancelled') AND due_date < ?1
            ORDER BY due_date
            "#
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Applies a manual status edit (e.g. cancelling an invoice).
    ///
    /// `paid` and `cancelled` are absorbing: the edit is rejected once the
    /// invoice has reached either.
    pub async fn set_status(&self, id: &str, to: InvoiceStatus) -> DbResult<Invoice> {
        let mut tx = self.pool.begin().await?;

        let mut invoice = get_invoice_on(&mut tx, id).await?;
        let previous = invoice.status;
        invoice.set_status(to)?;

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE invoices SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(id)
        .bind(invoice.status)
        .bind(now)
        .bind(previous)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict {
                entity: "Invoice".to_string(),
                id: id.to_string(),
            });
        }

        tx.commit().await?;

        info!(
            invoice_number = %invoice.invoice_number,
            from = previous.code(),
            to = invoice.status.code(),
            "Invoice status updated"
        );

        invoice.updated_at = now;
        Ok(invoice)
    }

    /// Deletes an invoice.
    ///
    /// Blocked while payments reference it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let payment_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE invoice_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if payment_count > 0 {
            return Err(DbError::delete_blocked(
                "Invoice",
                id,
                "payments reference this invoice",
            ));
        }

        let result = sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        info!(invoice_id = %id, "Invoice deleted");

        Ok(())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn get_invoice_on(conn: &mut SqliteConnection, id: &str) -> DbResult<Invoice> {
    sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Invoice", id))
}

/// Applies a `PaymentCompleted` event to the invoice balance.
///
/// Runs on the payment-completion transaction: reads the invoice row,
/// validates and derives the new balance in gescom-core, then writes it
/// back under a balance guard. This is the only write path for
/// `paid_amount`.
pub(crate) async fn apply_event_on(
    conn: &mut SqliteConnection,
    event: &PaymentCompleted,
) -> DbResult<Invoice> {
    let mut invoice = get_invoice_on(conn, &event.invoice_id).await?;

    invoice.apply_payment(event.amount(), event.processed_at.date_naive())?;

    let now = Utc::now();
    // The WHERE clause re-asserts the balance: a concurrent completion
    // that got in between would make this match no row.
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET paid_amount_cents = ?2, remaining_amount_cents = ?3,
            status = ?4, paid_date = ?5, updated_at = ?6
        WHERE id = ?1 AND total_amount_cents - paid_amount_cents >= ?7
        "#,
    )
    .bind(&invoice.id)
    .bind(invoice.paid_amount_cents)
    .bind(invoice.remaining_amount_cents)
    .bind(invoice.status)
    .bind(invoice.paid_date)
    .bind(now)
    .bind(event.amount_cents)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict {
            entity: "Invoice".to_string(),
            id: invoice.id.clone(),
        });
    }

    debug!(
        invoice_number = %invoice.invoice_number,
        paid = invoice.paid_amount_cents,
        remaining = invoice.remaining_amount_cents,
        status = invoice.status.code(),
        "Applied payment to invoice"
    );

    invoice.updated_at = now;
    Ok(invoice)
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
    use gescom_core::{CustomerType, OrderStatus, ProductType};

    async fn setup_confirmed_order() -> (Database, String) {
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

        (db, order.id)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_create_copies_totals_and_derives_due_date() {
        let (db, order_id) = setup_confirmed_order().await;

        let invoice = db
            .invoices()
            .create_from_order(&order_id, PaymentTerms::Days30, Some(d(2024, 1, 1)), None, None)
            .await
            .unwrap();

        assert_eq!(invoice.invoice_number, "FAC20240101001");
        assert_eq!(invoice.subtotal_ht_cents, 20_000);
        assert_eq!(invoice.tax_amount_cents, 3_600);
        assert_eq!(invoice.total_amount_cents, 23_600);
        assert_eq!(invoice.remaining_amount_cents, 23_600);
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.due_date, d(2024, 1, 31));

        let stored = db.invoices().get_by_order(&order_id).await.unwrap().unwrap();
        assert_eq!(stored.id, invoice.id);
    }

    #[tokio::test]
    async fn test_second_invoice_rejected_first_untouched() {
        let (db, order_id) = setup_confirmed_order().await;

        let first = db
            .invoices()
            .create_from_order(&order_id, PaymentTerms::Days30, Some(d(2024, 1, 1)), None, None)
            .await
            .unwrap();

        let err = db
            .invoices()
            .create_from_order(&order_id, PaymentTerms::Days15, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvoiceExists { .. })));

        let stored = db.invoices().get_by_id(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.total_amount_cents, 23_600);
        assert_eq!(stored.payment_terms, PaymentTerms::Days30);
    }

    #[tokio::test]
    async fn test_snapshot_is_point_in_time() {
        let (db, order_id) = setup_confirmed_order().await;

        let invoice = db
            .invoices()
            .create_from_order(&order_id, PaymentTerms::Days30, None, None, None)
            .await
            .unwrap();

        // Edit the order after invoicing (still confirmed, lines mutable).
        let lines = db.orders().get_lines(&order_id).await.unwrap();
        db.orders().update_line(&lines[0].id, 4, None).await.unwrap();

        let order = db.orders().get_by_id(&order_id).await.unwrap().unwrap();
        assert_eq!(order.subtotal_ht_cents, 40_000);

        // The invoice keeps the snapshot.
        let stored = db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.subtotal_ht_cents, 20_000);
        assert_eq!(stored.total_amount_cents, 23_600);
    }

    #[tokio::test]
    async fn test_create_rejects_draft_order() {
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
        let order = db.orders().create(&customer.id, None, None).await.unwrap();

        // draft order with no lines
        let err = db
            .invoices()
            .create_from_order(&order.id, PaymentTerms::default(), None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyOrder { .. })));
    }

    #[tokio::test]
    async fn test_list_overdue_is_computed_from_due_date() {
        let (db, order_id) = setup_confirmed_order().await;
        db.invoices()
            .create_from_order(&order_id, PaymentTerms::Days7, Some(d(2024, 1, 1)), None, None)
            .await
            .unwrap();

        // due 2024-01-08
        assert!(db.invoices().list_overdue(d(2024, 1, 8)).await.unwrap().is_empty());
        assert_eq!(db.invoices().list_overdue(d(2024, 1, 9)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_status_absorbing() {
        let (db, order_id) = setup_confirmed_order().await;
        let invoice = db
            .invoices()
            .create_from_order(&order_id, PaymentTerms::default(), None, None, None)
            .await
            .unwrap();

        let cancelled = db
            .invoices()
            .set_status(&invoice.id, InvoiceStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

        let err = db
            .invoices()
            .set_status(&invoice.id, InvoiceStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_order_delete_blocked_by_invoice() {
        let (db, order_id) = setup_confirmed_order().await;
        db.invoices()
            .create_from_order(&order_id, PaymentTerms::default(), None, None, None)
            .await
            .unwrap();

        let err = db.orders().delete(&order_id).await.unwrap_err();
        assert!(matches!(err, DbError::DeleteBlocked { .. }));
    }

    #[tokio::test]
    async fn test_delete_without_payments() {
        let (db, order_id) = setup_confirmed_order().await;
        let invoice = db
            .invoices()
            .create_from_order(&order_id, PaymentTerms::default(), None, None, None)
            .await
            .unwrap();

        db.invoices().delete(&invoice.id).await.unwrap();
        assert!(db.invoices().get_by_id(&invoice.id).await.unwrap().is_none());
    }
}
