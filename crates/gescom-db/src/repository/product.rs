//! # Product Repository
//!
//! Database operations for the catalog: categories and products.
//!
//! Stock updates are always deltas (`stock_quantity + ?`), guarded in SQL
//! so the level can never go negative; the order engine decrements stock
//! through [`adjust_stock`](ProductRepository::adjust_stock) when a line
//! for a physical product is added.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use gescom_core::validation::{
    validate_name, validate_price_cents, validate_sku, validate_tax_rate_bps,
};
use gescom_core::{Category, CoreError, Product, ProductType};

/// Fields accepted when creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category_id: String,
    pub product_type: ProductType,
    pub unit_price_cents: i64,
    /// Defaults to the standard 18.00 % rate when None.
    pub tax_rate_bps: Option<u32>,
    pub stock_quantity: i64,
    pub min_stock_level: i64,
    pub sku: Option<String>,
}

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

const PRODUCT_COLUMNS: &str = r#"
    id, name, description, category_id, product_type,
    unit_price_cents, tax_rate_bps, stock_quantity, min_stock_level,
    sku, is_active, created_at, updated_at
"#;

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Creates a category.
    pub async fn insert_category(&self, name: &str, description: Option<&str>) -> DbResult<Category> {
        validate_name("name", name).map_err(CoreError::from)?;

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            description: description.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %category.id, name = %category.name, "Inserting category");

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    /// Lists active categories, ordered by name.
    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, is_active, created_at, updated_at
            FROM categories
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Creates a product.
    ///
    /// ## Errors
    /// * `DbError::Domain` - invalid name/sku/price/tax rate
    /// * `DbError::UniqueViolation` - SKU already exists
    /// * `DbError::ForeignKeyViolation` - unknown category
    pub async fn insert(&self, new: NewProduct) -> DbResult<Product> {
        validate_name("name", &new.name).map_err(CoreError::from)?;
        validate_price_cents(new.unit_price_cents).map_err(CoreError::from)?;
        if let Some(sku) = &new.sku {
            validate_sku(sku).map_err(CoreError::from)?;
        }
        let tax_rate_bps = new.tax_rate_bps.unwrap_or(gescom_core::types::STANDARD_TAX_RATE_BPS);
        validate_tax_rate_bps(tax_rate_bps).map_err(CoreError::from)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            category_id: new.category_id,
            product_type: new.product_type,
            unit_price_cents: new.unit_price_cents,
            tax_rate_bps,
            stock_quantity: new.stock_quantity,
            min_stock_level: new.min_stock_level,
            sku: new.sku,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, category_id, product_type,
                unit_price_cents, tax_rate_bps, stock_quantity, min_stock_level,
                sku, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category_id)
        .bind(product.product_type)
        .bind(product.unit_price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.stock_quantity)
        .bind(product.min_stock_level)
        .bind(&product.sku)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products, ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active physical products at or below their stock alert level.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE is_active = 1
              AND product_type = 'physical'
              AND stock_quantity <= min_stock_level
            ORDER BY stock_quantity
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates a product's unit price.
    ///
    /// Existing order lines keep the price captured when they were added.
    pub async fn set_price(&self, id: &str, unit_price_cents: i64) -> DbResult<()> {
        validate_price_cents(unit_price_cents).map_err(CoreError::from)?;

        debug!(id = %id, unit_price_cents, "Updating product price");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET unit_price_cents = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(unit_price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Adjusts stock by a delta (negative for sales, positive for
    /// restocking).
    ///
    /// The update is guarded: an adjustment that would drive stock below
    /// zero matches no row and surfaces as a conflict.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<()> {
        debug!(id = %id, delta, "Adjusting stock");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?2, updated_at = ?3
            WHERE id = ?1 AND stock_quantity + ?2 >= 0
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish missing product from an underflowing adjustment.
            if self.get_by_id(id).await?.is_none() {
                return Err(DbError::not_found("Product", id));
            }
            return Err(DbError::Conflict {
                entity: "Product".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical order lines keep referencing it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> (Database, Category) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = db
            .products()
            .insert_category("Fournitures", None)
            .await
            .unwrap();
        (db, category)
    }

    fn new_product(category_id: &str, sku: &str) -> NewProduct {
        NewProduct {
            name: "Papier A4 80g".to_string(),
            description: None,
            category_id: category_id.to_string(),
            product_type: ProductType::Physical,
            unit_price_cents: 2_500,
            tax_rate_bps: None,
            stock_quantity: 40,
            min_stock_level: 10,
            sku: Some(sku.to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_defaults_standard_tax_rate() {
        let (db, category) = setup().await;
        let product = db
            .products()
            .insert(new_product(&category.id, "PAP-A4"))
            .await
            .unwrap();

        assert_eq!(product.tax_rate_bps, 1800);

        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.unit_price_cents, 2_500);
        assert_eq!(found.product_type, ProductType::Physical);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let (db, category) = setup().await;
        db.products()
            .insert(new_product(&category.id, "PAP-A4"))
            .await
            .unwrap();

        let err = db
            .products()
            .insert(new_product(&category.id, "PAP-A4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_unknown_category_rejected() {
        let (db, _) = setup().await;
        let err = db
            .products()
            .insert(new_product("missing", "PAP-A4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_adjust_stock_guarded() {
        let (db, category) = setup().await;
        let product = db
            .products()
            .insert(new_product(&category.id, "PAP-A4"))
            .await
            .unwrap();

        db.products().adjust_stock(&product.id, -15).await.unwrap();
        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.stock_quantity, 25);

        // would underflow: rejected, stock unchanged
        let err = db.products().adjust_stock(&product.id, -26).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.stock_quantity, 25);
    }

    #[tokio::test]
    async fn test_set_price_does_not_touch_lines() {
        let (db, category) = setup().await;
        let product = db
            .products()
            .insert(new_product(&category.id, "PAP-A4"))
            .await
            .unwrap();

        db.products().set_price(&product.id, 3_000).await.unwrap();
        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.unit_price_cents, 3_000);

        assert!(db.products().set_price(&product.id, -1).await.is_err());
    }

    #[tokio::test]
    async fn test_low_stock_listing_and_soft_delete() {
        let (db, category) = setup().await;
        let mut low = new_product(&category.id, "LOW-1");
        low.stock_quantity = 5;
        low.min_stock_level = 10;
        let low = db.products().insert(low).await.unwrap();

        db.products().insert(new_product(&category.id, "OK-1")).await.unwrap();

        let listed = db.products().list_low_stock().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, low.id);

        db.products().soft_delete(&low.id).await.unwrap();
        assert!(db.products().list_low_stock().await.unwrap().is_empty());
        assert_eq!(db.products().count().await.unwrap(), 1);
    }
}
