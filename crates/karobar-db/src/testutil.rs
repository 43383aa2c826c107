//! Shared helpers for repository and engine tests.
//!
//! Everything runs against a fresh in-memory database with migrations
//! applied, so tests exercise the real schema including its CHECK and
//! UNIQUE constraints.

use chrono::Utc;

use crate::pool::{Database, DbConfig};
use karobar_core::{Product, RequestContext, StockBatch};

/// Fresh in-memory database with migrations applied.
pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .unwrap_or_else(|err| panic!("failed to open test database: {err}"))
}

/// A request context acting at the given site.
pub(crate) fn ctx(site_id: &str) -> RequestContext {
    RequestContext {
        site_id: site_id.to_string(),
        user_id: "u1".to_string(),
        username: "dr.khan".to_string(),
        role: "admin".to_string(),
    }
}

pub(crate) async fn seed_site(db: &Database, id: &str, tenant_id: &str, name: &str) {
    db.sites()
        .insert(id, tenant_id, name)
        .await
        .unwrap_or_else(|err| panic!("failed to seed site {id}: {err}"));
}

pub(crate) async fn seed_product(
    db: &Database,
    id: &str,
    site_id: &str,
    name: &str,
    stock: i64,
    sale_rate_cents: i64,
) {
    let now = Utc::now();
    db.products()
        .insert(&Product {
            id: id.to_string(),
            site_id: site_id.to_string(),
            name: name.to_string(),
            current_stock: stock,
            mrp_cents: sale_rate_cents + 2000,
            sale_rate_cents,
            purchase_rate_cents: sale_rate_cents / 2,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap_or_else(|err| panic!("failed to seed product {id}: {err}"));
}

pub(crate) async fn seed_batch(
    db: &Database,
    id: &str,
    product_id: &str,
    site_id: &str,
    batch_no: &str,
    qty: i64,
) {
    db.products()
        .insert_batch(&StockBatch {
            id: id.to_string(),
            product_id: product_id.to_string(),
            site_id: site_id.to_string(),
            batch_no: batch_no.to_string(),
            expiry_date: None,
            original_qty: qty,
            remaining_qty: qty,
            created_at: Utc::now(),
        })
        .await
        .unwrap_or_else(|err| panic!("failed to seed batch {id}: {err}"));
}
