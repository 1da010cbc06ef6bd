//! # Customer Repository
//!
//! Database operations for customers. Orders, invoices and payments hold
//! non-owning references to customers, so customers are never hard-deleted;
//! `set_active(false)` removes them from new-document pickers.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use gescom_core::validation::validate_name;
use gescom_core::{Customer, CustomerRef, CustomerType};

/// Fields accepted when registering a customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub customer_type: CustomerType,
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

const CUSTOMER_COLUMNS: &str = r#"
    id, customer_type, first_name, last_name, company_name,
    email, phone, is_active, created_at, updated_at
"#;

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Registers a new customer.
    ///
    /// ## Errors
    /// * `DbError::Domain` - empty name fields
    /// * `DbError::UniqueViolation` - email already registered
    pub async fn insert(&self, new: NewCustomer) -> DbResult<Customer> {
        validate_name("first_name", &new.first_name).map_err(gescom_core::CoreError::from)?;
        validate_name("last_name", &new.last_name).map_err(gescom_core::CoreError::from)?;

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            customer_type: new.customer_type,
            first_name: new.first_name,
            last_name: new.last_name,
            company_name: new.company_name,
            email: new.email,
            phone: new.phone,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %customer.id, email = %customer.email, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, customer_type, first_name, last_name, company_name,
                email, phone, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&customer.id)
        .bind(customer.customer_type)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.company_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Read-only lookup projection for the presentation layer:
    /// `{id, is_active, display_name}`.
    pub async fn lookup(&self, id: &str) -> DbResult<CustomerRef> {
        let customer = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        Ok(CustomerRef::from(&customer))
    }

    /// Lists active customers, ordered by last name.
    pub async fn list_active(&self) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE is_active = 1 ORDER BY last_name, first_name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Activates or deactivates a customer.
    ///
    /// Deactivated customers keep their documents but cannot be referenced
    /// by new ones.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Updating customer active flag");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE customers SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
