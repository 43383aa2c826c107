//! # Product Repository
//!
//! Database operations for products and their stock batches.
//!
//! ## Invariant
//! `current_stock` and `remaining_qty` are mutated ONLY by the stock
//! ledger ([`crate::repository::stock`]) as part of a sale/transfer
//! transaction. This repository's write surface is limited to soft
//! deletion and fixture/seed inserts; catalogue maintenance itself is an
//! external concern.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use karobar_core::{Product, StockBatch};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product scoped by `(id, site_id)`.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product exists at this site
    /// * `Ok(None)` - Unknown id, or the id exists only at another site
    pub async fn get(&self, id: &str, site_id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, site_id, name, current_stock,
                   mrp_cents, sale_rate_cents, purchase_rate_cents,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1 AND site_id = ?2
            "#,
        )
        .bind(id)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Same lookup inside an open transaction. The sale engine snapshots
    /// prices from the row it is about to debit under one transaction.
    pub(crate) async fn get_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
        site_id: &str,
    ) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, site_id, name, current_stock,
                   mrp_cents, sale_rate_cents, purchase_rate_cents,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1 AND site_id = ?2
            "#,
        )
        .bind(id)
        .bind(site_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(product)
    }

    /// Lists active products at a site, sorted by name.
    pub async fn list_active(&self, site_id: &str, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, site_id, name, current_stock,
                   mrp_cents, sale_rate_cents, purchase_rate_cents,
                   is_active, created_at, updated_at
            FROM products
            WHERE site_id = ?1 AND is_active = 1
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(site_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// * `DbError::Conflict` - `(id, site_id)` already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, site_id = %product.site_id, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, site_id, name, current_stock,
                mrp_cents, sale_rate_cents, purchase_rate_cents,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.site_id)
        .bind(&product.name)
        .bind(product.current_stock)
        .bind(product.mrp_cents)
        .bind(product.sale_rate_cents)
        .bind(product.purchase_rate_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical sales and movements keep referencing the row.
    pub async fn soft_delete(&self, id: &str, site_id: &str) -> DbResult<()> {
        debug!(id = %id, site_id = %site_id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = 0, updated_at = ?3
            WHERE id = ?1 AND site_id = ?2
            "#,
        )
        .bind(id)
        .bind(site_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    // =========================================================================
    // Stock Batches
    // =========================================================================

    /// Gets a batch scoped by `(id, site_id)`.
    pub async fn get_batch(&self, batch_id: &str, site_id: &str) -> DbResult<Option<StockBatch>> {
        let batch = sqlx::query_as::<_, StockBatch>(
            r#"
            SELECT id, product_id, site_id, batch_no, expiry_date,
                   original_qty, remaining_qty, created_at
            FROM stock_batches
            WHERE id = ?1 AND site_id = ?2
            "#,
        )
        .bind(batch_id)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }

    /// Inserts a stock batch. The batch arrives full: `remaining_qty`
    /// starts equal to `original_qty`.
    pub async fn insert_batch(&self, batch: &StockBatch) -> DbResult<()> {
        debug!(id = %batch.id, product_id = %batch.product_id, "Inserting stock batch");

        sqlx::query(
            r#"
            INSERT INTO stock_batches (
                id, product_id, site_id, batch_no, expiry_date,
                original_qty, remaining_qty, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.product_id)
        .bind(&batch.site_id)
        .bind(&batch.batch_no)
        .bind(batch.expiry_date)
        .bind(batch.original_qty)
        .bind(batch.remaining_qty)
        .bind(batch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reads a product's stock inside an open transaction.
    ///
    /// Used by the ledger to build typed errors after a guarded UPDATE
    /// matched nothing.
    pub(crate) async fn stock_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
        site_id: &str,
    ) -> DbResult<Option<i64>> {
        let stock: Option<i64> = sqlx::query_scalar(
            "SELECT current_stock FROM products WHERE id = ?1 AND site_id = ?2",
        )
        .bind(id)
        .bind(site_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(stock)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::testutil;

    #[tokio::test]
    async fn test_insert_and_get_scoped_by_site() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_site(&db, "site-b", "tenant-1", "Clifton").await;
        testutil::seed_product(&db, "p1", "site-a", "Paracetamol 500mg", 10, 10000).await;

        let products = db.products();

        let found = products.get("p1", "site-a").await.unwrap().unwrap();
        assert_eq!(found.current_stock, 10);

        // Same id, wrong site: not visible.
        assert!(products.get("p1", "site-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_product_id_at_two_sites() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_site(&db, "site-b", "tenant-1", "Clifton").await;

        // Composite (id, site_id) identity: one product id, two stocks.
        testutil::seed_product(&db, "p1", "site-a", "Paracetamol 500mg", 10, 10000).await;
        testutil::seed_product(&db, "p1", "site-b", "Paracetamol 500mg", 4, 10000).await;

        let products = db.products();
        assert_eq!(
            products.get("p1", "site-a").await.unwrap().unwrap().current_stock,
            10
        );
        assert_eq!(
            products.get("p1", "site-b").await.unwrap().unwrap().current_stock,
            4
        );
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_product(&db, "p1", "site-a", "Paracetamol 500mg", 10, 10000).await;

        let products = db.products();
        products.soft_delete("p1", "site-a").await.unwrap();

        let p = products.get("p1", "site-a").await.unwrap().unwrap();
        assert!(!p.is_active);
        assert!(products.list_active("site-a", 50).await.unwrap().is_empty());

        let err = products.soft_delete("missing", "site-a").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_batch_insert_and_get() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_product(&db, "p1", "site-a", "Amoxicillin 250mg", 50, 25000).await;
        testutil::seed_batch(&db, "b1", "p1", "site-a", "AMX-2026-03", 50).await;

        let batch = db.products().get_batch("b1", "site-a").await.unwrap().unwrap();
        assert_eq!(batch.batch_no, "AMX-2026-03");
        assert_eq!(batch.remaining_qty, 50);
        assert_eq!(batch.original_qty, 50);
    }
}
