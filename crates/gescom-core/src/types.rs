//! # Catalog & Shared Domain Types
//!
//! Customers, categories and products: the leaf entities referenced by the
//! order-to-cash engine.
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, order_number, invoice_number, ...) - human-readable
//!
//! Status and type enumerations expose a stable `code → display label`
//! mapping via `choices()`; labels match what the admin frontend renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01 %, so 1800 bps = 18.00 % (the standard TVA rate
/// applied by default to new products).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

/// Default TVA rate: 18.00 %.
pub const STANDARD_TAX_RATE_BPS: u32 = 1800;

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Default is the standard 18.00 % rate.
impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(STANDARD_TAX_RATE_BPS)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Customer type: private individual or company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Individual,
    Company,
}

impl CustomerType {
    /// Stable `code → display label` mapping for UI rendering.
    pub const fn choices() -> &'static [(&'static str, &'static str)] {
        &[("individual", "Particulier"), ("company", "Entreprise")]
    }

    /// Machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            CustomerType::Individual => "individual",
            CustomerType::Company => "company",
        }
    }

    /// Display label.
    pub const fn label(&self) -> &'static str {
        match self {
            CustomerType::Individual => "Particulier",
            CustomerType::Company => "Entreprise",
        }
    }
}

impl Default for CustomerType {
    fn default() -> Self {
        CustomerType::Individual
    }
}

/// A customer placing orders and receiving invoices.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub customer_type: CustomerType,
    pub first_name: String,
    pub last_name: String,
    /// Set for company customers.
    pub company_name: Option<String>,
    /// Unique contact email.
    pub email: String,
    pub phone: Option<String>,
    /// Whether the customer can be referenced by new documents (soft delete).
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Name shown on documents: company name for companies, "first last"
    /// otherwise.
    pub fn display_name(&self) -> String {
        match (&self.customer_type, &self.company_name) {
            (CustomerType::Company, Some(company)) if !company.is_empty() => company.clone(),
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// Read-only customer projection exposed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerRef {
    pub id: String,
    pub is_active: bool,
    pub display_name: String,
}

impl From<&Customer> for CustomerRef {
    fn from(customer: &Customer) -> Self {
        CustomerRef {
            id: customer.id.clone(),
            is_active: customer.is_active,
            display_name: customer.display_name(),
        }
    }
}

// =============================================================================
// Category
// =============================================================================

/// A product/service category.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    /// Unique category name.
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// Product type: physical goods track stock, services do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Physical,
    Service,
}

impl ProductType {
    /// Stable `code → display label` mapping for UI rendering.
    pub const fn choices() -> &'static [(&'static str, &'static str)] {
        &[("physical", "Produit"), ("service", "Service")]
    }

    pub const fn code(&self) -> &'static str {
        match self {
            ProductType::Physical => "physical",
            ProductType::Service => "service",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            ProductType::Physical => "Produit",
            ProductType::Service => "Service",
        }
    }
}

impl Default for ProductType {
    fn default() -> Self {
        ProductType::Physical
    }
}

/// Stock availability, derived from quantity vs. alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// Services do not track stock.
    NotTracked,
    OutOfStock,
    Low,
    Available,
}

impl StockStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            StockStatus::NotTracked => "N/A",
            StockStatus::OutOfStock => "Rupture",
            StockStatus::Low => "Faible",
            StockStatus::Available => "Disponible",
        }
    }
}

/// A product or service available for ordering.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on order lines and invoices.
    pub name: String,

    pub description: Option<String>,

    /// Owning category.
    pub category_id: String,

    pub product_type: ProductType,

    /// Unit price before tax, in cents.
    pub unit_price_cents: i64,

    /// Tax rate in basis points (1800 = 18.00 %).
    pub tax_rate_bps: u32,

    /// Current stock level. Meaningful only for physical products.
    pub stock_quantity: i64,

    /// Stock alert threshold.
    pub min_stock_level: i64,

    /// Stock Keeping Unit - optional business identifier, unique when set.
    pub sku: Option<String>,

    /// Whether product can be added to new orders (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the tax rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Pricing snapshot captured onto order lines at add time.
    #[inline]
    pub fn pricing(&self) -> (Money, TaxRate) {
        (self.unit_price(), self.tax_rate())
    }

    /// Unit price including tax.
    pub fn price_with_tax(&self) -> Money {
        self.unit_price() + self.unit_price().tax_amount(self.tax_rate())
    }

    /// Tax amount on one unit.
    pub fn unit_tax_amount(&self) -> Money {
        self.unit_price().tax_amount(self.tax_rate())
    }

    /// Checks stock for a requested quantity.
    ///
    /// Services always pass; physical products fail when the requested
    /// quantity exceeds what is available.
    pub fn check_stock(&self, requested: i64) -> Result<(), CoreError> {
        if self.product_type == ProductType::Service {
            return Ok(());
        }

        if requested > self.stock_quantity {
            return Err(CoreError::InsufficientStock {
                product: self.name.clone(),
                available: self.stock_quantity,
                requested,
            });
        }

        Ok(())
    }

    /// Derived stock status for listings and alerts.
    pub fn stock_status(&self) -> StockStatus {
        match self.product_type {
            ProductType::Service => StockStatus::NotTracked,
            ProductType::Physical => {
                if self.stock_quantity <= 0 {
                    StockStatus::OutOfStock
                } else if self.stock_quantity <= self.min_stock_level {
                    StockStatus::Low
                } else {
                    StockStatus::Available
                }
            }
        }
    }

    /// Checks if the stock level is at or below the alert threshold.
    pub fn is_low_stock(&self) -> bool {
        self.product_type == ProductType::Physical && self.stock_quantity <= self.min_stock_level
    }

    /// Checks if the product is out of stock.
    pub fn is_out_of_stock(&self) -> bool {
        self.product_type == ProductType::Physical && self.stock_quantity <= 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
