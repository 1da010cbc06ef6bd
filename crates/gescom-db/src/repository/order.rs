//! # Order Repository
//!
//! Database operations for orders and their lines.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE DRAFT                                                    │
//! │     └── create() → Order { status: draft, CMD number allocated }    │
//! │                                                                     │
//! │  2. EDIT LINES (draft/confirmed only)                               │
//! │     └── add_line() / update_line() / remove_line()                  │
//! │         each runs in ONE transaction:                               │
//! │           line write + stock delta + totals recomputation           │
//! │                                                                     │
//! │  3. MOVE FORWARD                                                    │
//! │     └── transition_status() → confirmed → ... → delivered → closed  │
//! │                                                                     │
//! │  4. INVOICE (see invoice repository)                                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are recomputed inside the same transaction as every line write;
//! no reader can observe lines inconsistent with stored totals.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::sequence;
use gescom_core::validation::{validate_price_cents, validate_quantity, validate_tax_rate_bps};
use gescom_core::{
    compute_totals, CoreError, DocumentKind, Order, OrderLine, OrderStatus, OrderTotals, Product,
    ProductType, ValidationError,
};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

const ORDER_COLUMNS: &str = r#"
    id, order_number, customer_id, status, order_date,
    expected_delivery_date, delivered_date,
    subtotal_ht_cents, tax_amount_cents, total_amount_cents,
    notes, created_at, updated_at
"#;

const LINE_COLUMNS: &str = r#"
    id, order_id, product_id, quantity, unit_price_cents, tax_rate_bps,
    notes, created_at
"#;

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates a new draft order for a customer.
    ///
    /// Allocates the CMD number and inserts the order in one transaction.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - unknown customer
    /// * `DbError::Domain` - inactive customer, expected delivery date in
    ///   the past
    pub async fn create(
        &self,
        customer_id: &str,
        expected_delivery_date: Option<chrono::NaiveDate>,
        notes: Option<&str>,
    ) -> DbResult<Order> {
        let now = Utc::now();
        let today = now.date_naive();

        if let Some(expected) = expected_delivery_date {
            if expected < today {
                return Err(CoreError::from(ValidationError::PastDate {
                    field: "expected_delivery_date".to_string(),
                })
                .into());
            }
        }

        let customer_active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM customers WHERE id = ?1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;
        match customer_active {
            None => return Err(DbError::not_found("Customer", customer_id)),
            Some(false) => {
                return Err(CoreError::from(ValidationError::InvalidFormat {
                    field: "customer".to_string(),
                    reason: "customer is inactive".to_string(),
                })
                .into())
            }
            Some(true) => {}
        }

        let mut tx = self.pool.begin().await?;

        let order_number = sequence::next_number_on(&mut *tx, DocumentKind::Order, today).await?;

        let order = Order {
            id: Uuid::new_v4().to_string(),
            order_number,
            customer_id: customer_id.to_string(),
            status: OrderStatus::Draft,
            order_date: now,
            expected_delivery_date,
            delivered_date: None,
            subtotal_ht_cents: 0,
            tax_amount_cents: 0,
            total_amount_cents: 0,
            notes: notes.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %order.id, order_number = %order.order_number, "Creating order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id, status, order_date,
                expected_delivery_date, delivered_date,
                subtotal_ht_cents, tax_amount_cents, total_amount_cents,
                notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.order_date)
        .bind(order.expected_delivery_date)
        .bind(order.delivered_date)
        .bind(order.subtotal_ht_cents)
        .bind(order.tax_amount_cents)
        .bind(order.total_amount_cents)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(order_number = %order.order_number, customer_id = %customer_id, "Order created");

        Ok(order)
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets an order by its business number.
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1"
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all lines for an order, in insertion order.
    pub async fn get_lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Lists orders for a customer, most recent first.
    pub async fn list_by_customer(&self, customer_id: &str) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ?1 ORDER BY order_date DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Adds a line to an order.
    ///
    /// Captures the product's price and tax rate unless explicit overrides
    /// are given, checks stock for physical products, decrements it, and
    /// recomputes the order totals — all in one transaction.
    ///
    /// ## Arguments
    /// * `unit_price_cents` - Optional price override (quote negotiation)
    /// * `tax_rate_bps` - Optional tax rate override
    pub async fn add_line(
        &self,
        order_id: &str,
        product_id: &str,
        quantity: i64,
        unit_price_cents: Option<i64>,
        tax_rate_bps: Option<u32>,
        notes: Option<&str>,
    ) -> DbResult<OrderLine> {
        validate_quantity(quantity).map_err(CoreError::from)?;
        if let Some(cents) = unit_price_cents {
            validate_price_cents(cents).map_err(CoreError::from)?;
        }
        if let Some(bps) = tax_rate_bps {
            validate_tax_rate_bps(bps).map_err(CoreError::from)?;
        }

        let mut tx = self.pool.begin().await?;

        let order = get_order_on(&mut tx, order_id).await?;
        require_lines_mutable(&order)?;

        let product = get_product_on(&mut tx, product_id).await?;
        if !product.is_active {
            return Err(CoreError::ProductInactive {
                product: product.name.clone(),
            }
            .into());
        }
        product.check_stock(quantity)?;

        let (captured_price, captured_rate) = product.pricing();
        let line = OrderLine {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents: unit_price_cents.unwrap_or(captured_price.cents()),
            tax_rate_bps: tax_rate_bps.unwrap_or(captured_rate.bps()),
            notes: notes.map(str::to_string),
            created_at: Utc::now(),
        };

        debug!(order_id = %order_id, product_id = %product_id, quantity, "Adding order line");

        sqlx::query(
            r#"
            INSERT INTO order_lines (
                id, order_id, product_id, quantity, unit_price_cents,
                tax_rate_bps, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&line.id)
        .bind(&line.order_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.tax_rate_bps)
        .bind(&line.notes)
        .bind(line.created_at)
        .execute(&mut *tx)
        .await?;

        adjust_stock_on(&mut tx, &product, -quantity).await?;
        recompute_totals_on(&mut tx, order_id).await?;

        tx.commit().await?;

        Ok(line)
    }

    /// Updates a line's quantity and notes.
    ///
    /// Price and tax rate stay frozen at their captured values. The stock
    /// delta and totals recomputation share the transaction.
    pub async fn update_line(
        &self,
        line_id: &str,
        quantity: i64,
        notes: Option<&str>,
    ) -> DbResult<OrderLine> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let mut line = get_line_on(&mut tx, line_id).await?;
        let order = get_order_on(&mut tx, &line.order_id).await?;
        require_lines_mutable(&order)?;

        let product = get_product_on(&mut tx, &line.product_id).await?;
        let delta = quantity - line.quantity;
        if delta > 0 {
            product.check_stock(delta)?;
        }

        sqlx::query("UPDATE order_lines SET quantity = ?2, notes = ?3 WHERE id = ?1")
            .bind(line_id)
            .bind(quantity)
            .bind(notes)
            .execute(&mut *tx)
            .await?;

        adjust_stock_on(&mut tx, &product, -delta).await?;
        recompute_totals_on(&mut tx, &line.order_id).await?;

        tx.commit().await?;

        line.quantity = quantity;
        line.notes = notes.map(str::to_string);
        Ok(line)
    }

    /// Removes a line, restoring stock for physical products.
    pub async fn remove_line(&self, line_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let line = get_line_on(&mut tx, line_id).await?;
        let order = get_order_on(&mut tx, &line.order_id).await?;
        require_lines_mutable(&order)?;

        let product = get_product_on(&mut tx, &line.product_id).await?;

        debug!(line_id = %line_id, order_id = %line.order_id, "Removing order line");

        sqlx::query("DELETE FROM order_lines WHERE id = ?1")
            .bind(line_id)
            .execute(&mut *tx)
            .await?;

        adjust_stock_on(&mut tx, &product, line.quantity).await?;
        recompute_totals_on(&mut tx, &line.order_id).await?;

        tx.commit().await?;

        Ok(())
    }

    /// Applies a status transition, enforcing the forward-only machine.
    ///
    /// `delivered` records the delivery date; `draft → confirmed` requires
    /// at least one line.
    pub async fn transition_status(&self, order_id: &str, to: OrderStatus) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = get_order_on(&mut tx, order_id).await?;
        let previous = order.status;

        let line_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM order_lines WHERE order_id = ?1")
                .bind(order_id)
                .fetch_one(&mut *tx)
                .await?;

        let today = Utc::now().date_naive();
        order.transition(to, today, line_count as usize)?;

        let now = Utc::now();
        // Guarded on the previous status: a concurrent transition loses.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?2, delivered_date = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(order_id)
        .bind(order.status)
        .bind(order.delivered_date)
        .bind(now)
        .bind(previous)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            });
        }

        tx.commit().await?;

        info!(
            order_number = %order.order_number,
            from = previous.code(),
            to = order.status.code(),
            "Order status updated"
        );

        order.updated_at = now;
        Ok(order)
    }

    /// Deletes an order and (by cascade) its lines.
    ///
    /// Blocked while an invoice references the order.
    pub async fn delete(&self, order_id: &str) -> DbResult<()> {
        let has_invoice: Option<String> =
            sqlx::query_scalar("SELECT id FROM invoices WHERE order_id = ?1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        if has_invoice.is_some() {
            return Err(DbError::delete_blocked(
                "Order",
                order_id,
                "an invoice references this order",
            ));
        }

        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        info!(order_id = %order_id, "Order deleted");

        Ok(())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn get_order_on(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Order> {
    sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Order", order_id))
}

async fn get_line_on(conn: &mut SqliteConnection, line_id: &str) -> DbResult<OrderLine> {
    sqlx::query_as::<_, OrderLine>(&format!(
        "SELECT {LINE_COLUMNS} FROM order_lines WHERE id = ?1"
    ))
    .bind(line_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("OrderLine", line_id))
}

async fn get_product_on(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Product> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, description, category_id, product_type,
               unit_price_cents, tax_rate_bps, stock_quantity, min_stock_level,
               sku, is_active, created_at, updated_at
        FROM products WHERE id = ?1
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Product", product_id))
}

fn require_lines_mutable(order: &Order) -> DbResult<()> {
    if !order.lines_mutable() {
        return Err(CoreError::InvalidOrderState {
            order_number: order.order_number.clone(),
            status: order.status.code().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Applies a stock delta for physical products; services carry no stock.
async fn adjust_stock_on(
    conn: &mut SqliteConnection,
    product: &Product,
    delta: i64,
) -> DbResult<()> {
    if product.product_type != ProductType::Physical || delta == 0 {
        return Ok(());
    }

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity + ?2, updated_at = ?3
        WHERE id = ?1 AND stock_quantity + ?2 >= 0
        "#,
    )
    .bind(&product.id)
    .bind(delta)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        // The stock moved between the check and the write.
        return Err(CoreError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock_quantity,
            requested: -delta,
        }
        .into());
    }

    Ok(())
}

/// Recomputes and stores order totals from the current lines.
///
/// Must run on the same transaction as the triggering line write.
async fn recompute_totals_on(conn: &mut SqliteConnection, order_id: &str) -> DbResult<OrderTotals> {
    let lines = sqlx::query_as::<_, OrderLine>(&format!(
        "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY created_at, id"
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    let totals = compute_totals(&lines);

    sqlx::query(
        r#"
        UPDATE orders
        SET subtotal_ht_cents = ?2, tax_amount_cents = ?3, total_amount_cents = ?4,
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(totals.subtotal_ht_cents)
    .bind(totals.tax_amount_cents)
    .bind(totals.total_amount_cents)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(totals)
}

// =============================================================================
// Unit Tests
// =============================================================================
