//! # Stock Ledger
//!
//! Owns the append-only movement log and the two mutable aggregates it
//! feeds: per-product running stock and per-batch remaining quantity.
//!
//! ## Applying a Movement
//! ```text
//! apply_movement(tx, NewMovement)
//!      │
//!      ▼
//! 1. UPDATE products
//!        SET current_stock = current_stock + delta      ← relative update,
//!      WHERE id = ? AND site_id = ?                       never read-modify-
//!        AND current_stock + delta >= 0                   write; the guard
//!      │                                                  makes "insufficient
//!      │  0 rows? → NotFound or InsufficientStock         stock" atomic
//!      ▼
//! 2. (batch referenced?) UPDATE stock_batches
//!        SET remaining_qty = remaining_qty + delta
//!      WHERE id = ? AND site_id = ?
//!        AND remaining_qty + delta BETWEEN 0 AND original_qty
//!      │
//!      ▼
//! 3. INSERT INTO stock_movements (immutable, append-only)
//! ```
//! All three effects ride the CALLER's transaction: the ledger never
//! commits on its own, so a failing sale or transfer rolls every effect
//! back together.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::product::ProductRepository;
use karobar_core::{MovementType, StockMovement};

/// A movement to apply, before it has been written.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: String,
    pub batch_id: Option<String>,
    pub site_id: String,
    pub movement_type: MovementType,
    /// Unsigned magnitude for SALE/RETURN/TRANSFER_*; signed net change
    /// for ADJUSTMENT (see [`MovementType::signed_delta`]).
    pub quantity: i64,
    pub remark: String,
    pub transfer_ref: Option<String>,
    pub created_by: String,
}

/// The append-only stock ledger.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    /// Creates a new StockLedger.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Applies a stock movement inside the caller's open transaction.
    ///
    /// ## Effects (all or nothing with the caller's commit)
    /// 1. Product `current_stock` += signed delta, scoped `(product_id, site_id)`
    /// 2. Batch `remaining_qty` += same delta when a batch is referenced
    /// 3. Movement row appended
    ///
    /// ## Errors
    /// * `DbError::NotFound` - product/batch unknown at this site
    /// * `DbError::InsufficientStock` - delta would drive stock negative
    /// * `DbError::Integrity` - delta would credit a batch past its
    ///   original quantity
    pub async fn apply_movement(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        movement: NewMovement,
    ) -> DbResult<StockMovement> {
        let delta = movement.movement_type.signed_delta(movement.quantity);
        let now = Utc::now();

        debug!(
            product_id = %movement.product_id,
            site_id = %movement.site_id,
            movement_type = ?movement.movement_type,
            delta = %delta,
            "Applying stock movement"
        );

        // 1. Product aggregate. The non-negativity guard rides the UPDATE
        // predicate so concurrent sales cannot both pass a stale check.
        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = current_stock + ?3,
                updated_at = ?4
            WHERE id = ?1 AND site_id = ?2
              AND current_stock + ?3 >= 0
            "#,
        )
        .bind(&movement.product_id)
        .bind(&movement.site_id)
        .bind(delta)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(
                match ProductRepository::stock_in_tx(tx, &movement.product_id, &movement.site_id)
                    .await?
                {
                    None => DbError::not_found("Product", &movement.product_id),
                    Some(available) => DbError::InsufficientStock {
                        product_id: movement.product_id.clone(),
                        available,
                        requested: -delta,
                    },
                },
            );
        }

        // 2. Batch aggregate, in lock-step with the product.
        if let Some(batch_id) = &movement.batch_id {
            let result = sqlx::query(
                r#"
                UPDATE stock_batches
                SET remaining_qty = remaining_qty + ?3
                WHERE id = ?1 AND site_id = ?2
                  AND remaining_qty + ?3 >= 0
                  AND remaining_qty + ?3 <= original_qty
                "#,
            )
            .bind(batch_id)
            .bind(&movement.site_id)
            .bind(delta)
            .execute(&mut **tx)
            .await?;

            if result.rows_affected() == 0 {
                let remaining: Option<i64> = sqlx::query_scalar(
                    "SELECT remaining_qty FROM stock_batches WHERE id = ?1 AND site_id = ?2",
                )
                .bind(batch_id)
                .bind(&movement.site_id)
                .fetch_optional(&mut **tx)
                .await?;

                return Err(match remaining {
                    None => DbError::not_found("StockBatch", batch_id),
                    Some(available) if delta < 0 => DbError::InsufficientStock {
                        product_id: movement.product_id.clone(),
                        available,
                        requested: -delta,
                    },
                    Some(_) => DbError::Integrity(format!(
                        "crediting batch {} past its original quantity",
                        batch_id
                    )),
                });
            }
        }

        // 3. Immutable movement row.
        let record = StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: movement.product_id,
            batch_id: movement.batch_id,
            site_id: movement.site_id,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            remark: movement.remark,
            transfer_ref: movement.transfer_ref,
            created_by: movement.created_by,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, batch_id, site_id, movement_type,
                quantity, remark, transfer_ref, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&record.id)
        .bind(&record.product_id)
        .bind(&record.batch_id)
        .bind(&record.site_id)
        .bind(record.movement_type)
        .bind(record.quantity)
        .bind(&record.remark)
        .bind(&record.transfer_ref)
        .bind(&record.created_by)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(record)
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    /// Movement history for a product at a site, newest first.
    pub async fn movements_for_product(
        &self,
        product_id: &str,
        site_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, batch_id, site_id, movement_type,
                   quantity, remark, transfer_ref, created_by, created_at
            FROM stock_movements
            WHERE product_id = ?1 AND site_id = ?2
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(product_id)
        .bind(site_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Both halves of a transfer, regrouped by the shared reference.
    pub async fn movements_by_transfer_ref(
        &self,
        transfer_ref: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, batch_id, site_id, movement_type,
                   quantity, remark, transfer_ref, created_by, created_at
            FROM stock_movements
            WHERE transfer_ref = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(transfer_ref)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Signed sum of all movements for a product at a site.
    ///
    /// By the ledger invariant this always equals the product's
    /// `current_stock` after a committed transaction.
    pub async fn movement_sum(&self, product_id: &str, site_id: &str) -> DbResult<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(CASE movement_type
                WHEN 'SALE' THEN -quantity
                WHEN 'TRANSFER_OUT' THEN -quantity
                ELSE quantity
            END)
            FROM stock_movements
            WHERE product_id = ?1 AND site_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(site_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.unwrap_or(0))
    }

    /// Signed sum of movements tagged with a batch.
    pub async fn batch_movement_sum(&self, batch_id: &str, site_id: &str) -> DbResult<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(CASE movement_type
                WHEN 'SALE' THEN -quantity
                WHEN 'TRANSFER_OUT' THEN -quantity
                ELSE quantity
            END)
            FROM stock_movements
            WHERE batch_id = ?1 AND site_id = ?2
            "#,
        )
        .bind(batch_id)
        .bind(site_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.unwrap_or(0))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use karobar_core::MovementType;

    fn sale_movement(product_id: &str, site_id: &str, qty: i64) -> NewMovement {
        NewMovement {
            product_id: product_id.to_string(),
            batch_id: None,
            site_id: site_id.to_string(),
            movement_type: MovementType::Sale,
            quantity: qty,
            remark: "Bill INV0001".to_string(),
            transfer_ref: None,
            created_by: "u1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sale_movement_decrements_and_appends() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_product(&db, "p1", "site-a", "Paracetamol 500mg", 10, 10000).await;

        let ledger = db.stock();
        let mut tx = db.pool().begin().await.unwrap();
        let movement = ledger
            .apply_movement(&mut tx, sale_movement("p1", "site-a", 3))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(movement.movement_type, MovementType::Sale);
        assert_eq!(movement.quantity, 3);
        assert_eq!(movement.signed_quantity(), -3);

        let product = db.products().get("p1", "site-a").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 7);

        // Sum law: signed movement sum reproduces current_stock exactly.
        // Starting stock was seeded directly (no movement), so the sum
        // covers only the ledger's own effect.
        assert_eq!(ledger.movement_sum("p1", "site-a").await.unwrap(), -3);
    }

    #[tokio::test]
    async fn test_return_movement_increments() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_product(&db, "p1", "site-a", "Paracetamol 500mg", 10, 10000).await;

        let ledger = db.stock();
        let mut tx = db.pool().begin().await.unwrap();
        ledger
            .apply_movement(
                &mut tx,
                NewMovement {
                    movement_type: MovementType::Return,
                    ..sale_movement("p1", "site-a", 2)
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let product = db.products().get("p1", "site-a").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 12);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_product(&db, "p1", "site-a", "Paracetamol 500mg", 2, 10000).await;

        let ledger = db.stock();
        let mut tx = db.pool().begin().await.unwrap();
        let err = ledger
            .apply_movement(&mut tx, sale_movement("p1", "site-a", 3))
            .await
            .unwrap_err();
        drop(tx); // rollback

        match err {
            DbError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Nothing persisted.
        let product = db.products().get("p1", "site-a").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 2);
        assert!(ledger
            .movements_for_product("p1", "site-a", 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;

        let ledger = db.stock();
        let mut tx = db.pool().begin().await.unwrap();
        let err = ledger
            .apply_movement(&mut tx, sale_movement("ghost", "site-a", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_batch_moves_in_lockstep() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_product(&db, "p1", "site-a", "Amoxicillin 250mg", 50, 25000).await;
        testutil::seed_batch(&db, "b1", "p1", "site-a", "AMX-2026-03", 50).await;

        let ledger = db.stock();
        let mut tx = db.pool().begin().await.unwrap();
        ledger
            .apply_movement(
                &mut tx,
                NewMovement {
                    batch_id: Some("b1".to_string()),
                    ..sale_movement("p1", "site-a", 5)
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let product = db.products().get("p1", "site-a").await.unwrap().unwrap();
        let batch = db.products().get_batch("b1", "site-a").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 45);
        assert_eq!(batch.remaining_qty, 45);
        assert_eq!(ledger.batch_movement_sum("b1", "site-a").await.unwrap(), -5);
    }

    #[tokio::test]
    async fn test_batch_cannot_exceed_original_qty() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_product(&db, "p1", "site-a", "Amoxicillin 250mg", 50, 25000).await;
        testutil::seed_batch(&db, "b1", "p1", "site-a", "AMX-2026-03", 50).await;

        let ledger = db.stock();
        let mut tx = db.pool().begin().await.unwrap();
        let err = ledger
            .apply_movement(
                &mut tx,
                NewMovement {
                    batch_id: Some("b1".to_string()),
                    movement_type: MovementType::Return,
                    ..sale_movement("p1", "site-a", 1)
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_adjustment_carries_its_own_sign() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_product(&db, "p1", "site-a", "Paracetamol 500mg", 10, 10000).await;

        let ledger = db.stock();
        let mut tx = db.pool().begin().await.unwrap();
        ledger
            .apply_movement(
                &mut tx,
                NewMovement {
                    movement_type: MovementType::Adjustment,
                    quantity: -2,
                    ..sale_movement("p1", "site-a", 0)
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let product = db.products().get("p1", "site-a").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 8);
        assert_eq!(ledger.movement_sum("p1", "site-a").await.unwrap(), -2);
    }
}
