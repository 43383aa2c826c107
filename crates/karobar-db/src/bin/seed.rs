//! # Seed Data Generator
//!
//! Populates a development database with two sibling sites, a small
//! pharmacy catalogue and a demo sale/edit/transfer so the ledger has
//! something to show.
//!
//! ## Usage
//! ```bash
//! cargo run -p karobar-db --bin seed
//!
//! # Specify database path
//! cargo run -p karobar-db --bin seed -- --db ./data/karobar.db
//! ```

use std::env;
use std::sync::Arc;

use chrono::{Duration, Utc};
use karobar_core::{BillType, Product, RequestContext, StockBatch};
use karobar_db::{
    CreateSaleInput, Database, DbAuditSink, DbConfig, SaleEngine, SaleItemInput, TransferInput,
    TransferItem, TransferService, UpdateSaleInput,
};
use uuid::Uuid;

const TENANT_ID: &str = "tenant-demo";
const SITE_MAIN: &str = "site-saddar";
const SITE_BRANCH: &str = "site-clifton";

/// (name, sale rate cents, stock) pairs for the demo catalogue.
const CATALOGUE: &[(&str, i64, i64)] = &[
    ("Paracetamol 500mg", 10000, 120),
    ("Ibuprofen 400mg", 15000, 80),
    ("Amoxicillin 250mg", 25000, 60),
    ("Cetirizine 10mg", 8000, 200),
    ("Omeprazole 20mg", 30000, 45),
    ("ORS Sachet", 5000, 300),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=debug surfaces engine/ledger traces during seeding.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./karobar_dev.db");
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
                println!("Karobar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./karobar_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Karobar Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.sites().get_by_id(SITE_MAIN).await?.is_some() {
        println!("⚠ Database already seeded.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Two sibling sites under one tenant.
    db.sites().insert(SITE_MAIN, TENANT_ID, "Saddar").await?;
    db.sites().insert(SITE_BRANCH, TENANT_ID, "Clifton").await?;
    println!("✓ Created sites Saddar and Clifton");

    // Same product ids at both sites; the branch starts empty and gets
    // stocked by the demo transfer below.
    let now = Utc::now();
    for (name, rate, stock) in CATALOGUE {
        let id = Uuid::new_v4().to_string();
        for (site_id, site_stock) in [(SITE_MAIN, *stock), (SITE_BRANCH, 0)] {
            db.products()
                .insert(&Product {
                    id: id.clone(),
                    site_id: site_id.to_string(),
                    name: name.to_string(),
                    current_stock: site_stock,
                    mrp_cents: rate + 2000,
                    sale_rate_cents: *rate,
                    purchase_rate_cents: rate / 2,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await?;
        }
    }
    println!("✓ Seeded {} products at each site", CATALOGUE.len());

    // Give the first product a dated batch so per-batch sales can be tried.
    let catalogue = db.products().list_active(SITE_MAIN, 1).await?;
    let first = &catalogue[0];
    db.products()
        .insert_batch(&StockBatch {
            id: Uuid::new_v4().to_string(),
            product_id: first.id.clone(),
            site_id: SITE_MAIN.to_string(),
            batch_no: "BATCH-2026-08".to_string(),
            expiry_date: Some(now + Duration::days(365)),
            original_qty: first.current_stock,
            remaining_qty: first.current_stock,
            created_at: now,
        })
        .await?;
    println!("✓ Created a stock batch for {}", first.name);

    let audit = Arc::new(DbAuditSink::new(db.pool().clone()));
    let ctx = RequestContext {
        site_id: SITE_MAIN.to_string(),
        user_id: "user-demo".to_string(),
        username: "demo".to_string(),
        role: "admin".to_string(),
    };

    // Demo sale against the first product, then an edit and a transfer so
    // the movement log shows every movement type.
    let engine = SaleEngine::new(db.pool().clone(), audit.clone());
    let sale = engine
        .create_sale(
            &ctx,
            CreateSaleInput {
                bill_type: BillType::Walkin,
                items: vec![SaleItemInput {
                    product_id: first.id.clone(),
                    batch_id: None,
                    quantity: 3,
                    discount_cents: 0,
                    tax_rate_bps: 500,
                }],
                discount_cents: 0,
                paid_cents: 0,
                patient_id: None,
                appointment_id: None,
                consultant_id: None,
            },
        )
        .await?;
    println!(
        "✓ Created bill {} ({} net)",
        sale.sale.bill_no,
        sale.sale.net()
    );

    let edited = engine
        .update_sale(
            &ctx,
            UpdateSaleInput {
                sale_id: sale.sale.id.clone(),
                items: vec![SaleItemInput {
                    product_id: first.id.clone(),
                    batch_id: None,
                    quantity: 5,
                    discount_cents: 0,
                    tax_rate_bps: 500,
                }],
                discount_cents: 0,
                edit_reason: "Demo edit: customer added items".to_string(),
            },
        )
        .await?;
    println!(
        "✓ Edited bill {} ({} net)",
        edited.sale.bill_no,
        edited.sale.net()
    );

    let transfers = TransferService::new(db.pool().clone(), audit);
    let transfer = transfers
        .transfer_stock(
            &ctx,
            TransferInput {
                to_site_id: SITE_BRANCH.to_string(),
                items: vec![TransferItem {
                    product_id: first.id.clone(),
                    quantity: 10,
                }],
                note: "initial branch stock".to_string(),
            },
        )
        .await?;
    println!("✓ Transferred 10 units to Clifton ({})", transfer.transfer_ref);

    println!();
    println!("Done. Try:");
    println!("  sqlite3 {} 'SELECT movement_type, quantity, remark FROM stock_movements'", db_path);

    db.close().await;
    Ok(())
}
