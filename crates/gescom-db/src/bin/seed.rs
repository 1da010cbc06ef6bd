//! # Seed Data Generator
//!
//! Populates the database with demo data for development:
//! a small catalog, a handful of customers, and one complete
//! order → invoice → payment walkthrough.
//!
//! ## Usage
//! ```bash
//! cargo run -p gescom-db --bin seed
//! cargo run -p gescom-db --bin seed -- --db ./data/gescom.db
//! ```

use std::env;

use gescom_core::{CustomerType, OrderStatus, PaymentMethod, PaymentTerms, ProductType};
use gescom_db::{Database, DbConfig, NewCustomer, NewPayment, NewProduct};

/// Demo catalog: (category, [(name, type, price_cents, stock)]).
const CATALOG: &[(&str, &[(&str, ProductType, i64, i64)])] = &[
    (
        "Fournitures de bureau",
        &[
            ("Papier A4 80g (ramette)", ProductType::Physical, 2_500, 120),
            ("Cartouche d'encre noire", ProductType::Physical, 18_000, 25),
            ("Classeur à levier", ProductType::Physical, 3_200, 60),
            ("Stylo bille bleu (boîte de 50)", ProductType::Physical, 7_500, 40),
        ],
    ),
    (
        "Informatique",
        &[
            ("Clavier AZERTY USB", ProductType::Physical, 12_000, 15),
            ("Écran 24 pouces", ProductType::Physical, 95_000, 8),
            ("Disque SSD 500 Go", ProductType::Physical, 45_000, 12),
        ],
    ),
    (
        "Prestations",
        &[
            ("Installation poste de travail", ProductType::Service, 25_000, 0),
            ("Maintenance mensuelle", ProductType::Service, 60_000, 0),
            ("Formation bureautique (jour)", ProductType::Service, 80_000, 0),
        ],
    ),
];

/// Demo customers: (type, first, last, company, email).
const CUSTOMERS: &[(CustomerType, &str, &str, Option<&str>, &str)] = &[
    (
        CustomerType::Company,
        "Awa",
        "Diop",
        Some("Diop & Fils SARL"),
        "contact@diopetfils.sn",
    ),
    (
        CustomerType::Individual,
        "Moussa",
        "Ba",
        None,
        "moussa.ba@example.com",
    ),
    (
        CustomerType::Company,
        "Fatou",
        "Ndiaye",
        Some("Ndiaye Services"),
        "fatou@ndiayeservices.sn",
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./gescom_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Gescom Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./gescom_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Gescom Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog
    println!();
    println!("Seeding catalog...");
    let mut product_ids: Vec<String> = Vec::new();
    for (category_name, products) in CATALOG {
        let category = db.products().insert_category(category_name, None).await?;
        for (idx, (name, product_type, price_cents, stock)) in products.iter().enumerate() {
            let product = db
                .products()
                .insert(NewProduct {
                    name: name.to_string(),
                    description: None,
                    category_id: category.id.clone(),
                    product_type: *product_type,
                    unit_price_cents: *price_cents,
                    tax_rate_bps: None,
                    stock_quantity: *stock,
                    min_stock_level: if *product_type == ProductType::Physical { 5 } else { 0 },
                    sku: Some(format!(
                        "{}-{:02}",
                        category_name.chars().take(3).collect::<String>().to_uppercase(),
                        idx + 1
                    )),
                })
                .await?;
            product_ids.push(product.id);
        }
        println!("  ✓ {} ({} products)", category_name, products.len());
    }

    // Customers
    println!();
    println!("Seeding customers...");
    let mut customer_ids: Vec<String> = Vec::new();
    for (customer_type, first, last, company, email) in CUSTOMERS {
        let customer = db
            .customers()
            .insert(NewCustomer {
                customer_type: *customer_type,
                first_name: first.to_string(),
                last_name: last.to_string(),
                company_name: company.map(str::to_string),
                email: email.to_string(),
                phone: None,
            })
            .await?;
        println!("  ✓ {}", db.customers().lookup(&customer.id).await?.display_name);
        customer_ids.push(customer.id);
    }

    // One complete order-to-cash walkthrough
    println!();
    println!("Seeding order → invoice → payment walkthrough...");

    let order = db.orders().create(&customer_ids[0], None, None).await?;
    db.orders()
        .add_line(&order.id, &product_ids[0], 10, None, None, None)
        .await?;
    db.orders()
        .add_line(&order.id, &product_ids[4], 2, None, None, None)
        .await?;
    db.orders()
        .transition_status(&order.id, OrderStatus::Confirmed)
        .await?;
    let order = db.orders().get_by_id(&order.id).await?.expect("seeded order");
    println!("  ✓ Order {} ({})", order.order_number, order.total_amount());

    let invoice = db
        .invoices()
        .create_from_order(&order.id, PaymentTerms::Days30, None, None, None)
        .await?;
    println!(
        "  ✓ Invoice {} due {}",
        invoice.invoice_number, invoice.due_date
    );

    let payment = db
        .payments()
        .create(NewPayment {
            invoice_id: invoice.id.clone(),
            customer_id: invoice.customer_id.clone(),
            amount_cents: invoice.total_amount_cents / 2,
            payment_method: PaymentMethod::BankTransfer,
            payment_date: None,
            transaction_id: None,
            reference: Some("VIR-DEMO-001".to_string()),
            notes: None,
        })
        .await?;
    let (payment, invoice) = db.payments().mark_completed(&payment.id).await?;
    println!(
        "  ✓ Payment {} ({}) → invoice {}",
        payment.payment_number,
        payment.amount(),
        invoice.status.label()
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
