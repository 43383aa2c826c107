//! Sale repository: row-level persistence for sales and their items.
//!
//! Pure storage. Bill numbering, stock effects and payment derivation live
//! in the sale engine; this module only reads and writes rows, and every
//! mutator rides the caller's transaction.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::{DbError, DbResult};
use karobar_core::{Sale, SaleItem};

/// Repository for sales and sale items.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetches a sale by id, scoped to a site.
    pub async fn get_by_id(&self, id: &str, site_id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, site_id, bill_no, bill_type,
                   patient_id, appointment_id, consultant_id,
                   gross_cents, discount_cents, net_cents, paid_cents, due_cents,
                   payment_status, created_by, created_at,
                   is_edited, edited_at, edited_by, edit_reason
            FROM sales
            WHERE id = ?1 AND site_id = ?2
            "#,
        )
        .bind(id)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Same lookup inside an open transaction (edit path reads the current
    /// row under the same transaction that will rewrite it).
    pub(crate) async fn get_by_id_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
        site_id: &str,
    ) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, site_id, bill_no, bill_type,
                   patient_id, appointment_id, consultant_id,
                   gross_cents, discount_cents, net_cents, paid_cents, due_cents,
                   payment_status, created_by, created_at,
                   is_edited, edited_at, edited_by, edit_reason
            FROM sales
            WHERE id = ?1 AND site_id = ?2
            "#,
        )
        .bind(id)
        .bind(site_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(sale)
    }

    /// Line items of a sale, in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, batch_id, quantity,
                   mrp_cents, sale_rate_cents, discount_cents,
                   tax_rate_bps, tax_cents, total_cents, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Items of a sale inside an open transaction (edit reversal path).
    pub(crate) async fn get_items_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        sale_id: &str,
    ) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, batch_id, quantity,
                   mrp_cents, sale_rate_cents, discount_cents,
                   tax_rate_bps, tax_cents, total_cents, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(items)
    }

    /// Latest bill number issued at a site, by insertion recency.
    ///
    /// Reads under the caller's transaction so the number a new sale is
    /// derived from cannot be superseded between read and insert without
    /// tripping the `(site_id, bill_no)` unique index.
    pub(crate) async fn last_bill_no(
        tx: &mut Transaction<'_, Sqlite>,
        site_id: &str,
    ) -> DbResult<Option<String>> {
        let bill_no: Option<String> = sqlx::query_scalar(
            r#"
            SELECT bill_no FROM sales
            WHERE site_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(site_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(bill_no)
    }

    /// Recent sales at a site, newest first.
    pub async fn list_recent(&self, site_id: &str, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, site_id, bill_no, bill_type,
                   patient_id, appointment_id, consultant_id,
                   gross_cents, discount_cents, net_cents, paid_cents, due_cents,
                   payment_status, created_by, created_at,
                   is_edited, edited_at, edited_by, edit_reason
            FROM sales
            WHERE site_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(site_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    // =========================================================================
    // Writes (transaction-scoped)
    // =========================================================================

    /// Inserts the sale header row.
    pub(crate) async fn insert_sale(
        tx: &mut Transaction<'_, Sqlite>,
        sale: &Sale,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, site_id, bill_no, bill_type,
                patient_id, appointment_id, consultant_id,
                gross_cents, discount_cents, net_cents, paid_cents, due_cents,
                payment_status, created_by, created_at,
                is_edited, edited_at, edited_by, edit_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.site_id)
        .bind(&sale.bill_no)
        .bind(sale.bill_type)
        .bind(&sale.patient_id)
        .bind(&sale.appointment_id)
        .bind(&sale.consultant_id)
        .bind(sale.gross_cents)
        .bind(sale.discount_cents)
        .bind(sale.net_cents)
        .bind(sale.paid_cents)
        .bind(sale.due_cents)
        .bind(sale.payment_status)
        .bind(&sale.created_by)
        .bind(sale.created_at)
        .bind(sale.is_edited)
        .bind(sale.edited_at)
        .bind(&sale.edited_by)
        .bind(&sale.edit_reason)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Inserts one line item.
    pub(crate) async fn insert_item(
        tx: &mut Transaction<'_, Sqlite>,
        item: &SaleItem,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, batch_id, quantity,
                mrp_cents, sale_rate_cents, discount_cents,
                tax_rate_bps, tax_cents, total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.batch_id)
        .bind(item.quantity)
        .bind(item.mrp_cents)
        .bind(item.sale_rate_cents)
        .bind(item.discount_cents)
        .bind(item.tax_rate_bps)
        .bind(item.tax_cents)
        .bind(item.total_cents)
        .bind(item.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Deletes all items of a sale (edit path rewrites the item set).
    pub(crate) async fn delete_items(
        tx: &mut Transaction<'_, Sqlite>,
        sale_id: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sale_items WHERE sale_id = ?1")
            .bind(sale_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    /// Rewrites the mutable portion of a sale header during an edit.
    ///
    /// Identity fields (bill_no, bill_type, created_by, created_at) are
    /// deliberately not touched.
    pub(crate) async fn update_for_edit(
        tx: &mut Transaction<'_, Sqlite>,
        sale: &Sale,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales
            SET patient_id = ?3, appointment_id = ?4, consultant_id = ?5,
                gross_cents = ?6, discount_cents = ?7, net_cents = ?8,
                paid_cents = ?9, due_cents = ?10, payment_status = ?11,
                is_edited = ?12, edited_at = ?13, edited_by = ?14, edit_reason = ?15
            WHERE id = ?1 AND site_id = ?2
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.site_id)
        .bind(&sale.patient_id)
        .bind(&sale.appointment_id)
        .bind(&sale.consultant_id)
        .bind(sale.gross_cents)
        .bind(sale.discount_cents)
        .bind(sale.net_cents)
        .bind(sale.paid_cents)
        .bind(sale.due_cents)
        .bind(sale.payment_status)
        .bind(sale.is_edited)
        .bind(sale.edited_at)
        .bind(&sale.edited_by)
        .bind(&sale.edit_reason)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", &sale.id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use chrono::Utc;
    use karobar_core::{BillType, PaymentStatus};
    use uuid::Uuid;

    fn sample_sale(site_id: &str, bill_no: &str) -> Sale {
        Sale {
            id: Uuid::new_v4().to_string(),
            site_id: site_id.to_string(),
            bill_no: bill_no.to_string(),
            bill_type: BillType::Walkin,
            patient_id: None,
            appointment_id: None,
            consultant_id: None,
            gross_cents: 30000,
            discount_cents: 0,
            net_cents: 31500,
            paid_cents: 31500,
            due_cents: 0,
            payment_status: PaymentStatus::Paid,
            created_by: "u1".to_string(),
            created_at: Utc::now(),
            is_edited: false,
            edited_at: None,
            edited_by: None,
            edit_reason: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_sale() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;

        let sale = sample_sale("site-a", "INV0001");
        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_sale(&mut tx, &sale).await.unwrap();
        tx.commit().await.unwrap();

        let fetched = db
            .sales()
            .get_by_id(&sale.id, "site-a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.bill_no, "INV0001");
        assert_eq!(fetched.payment_status, PaymentStatus::Paid);
        assert!(!fetched.is_edited);

        // Site scoping: invisible from a sibling site.
        assert!(db
            .sales()
            .get_by_id(&sale.id, "site-b")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_last_bill_no_by_recency() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_site(&db, "site-b", "tenant-1", "Clifton").await;

        let mut tx = db.pool().begin().await.unwrap();
        assert_eq!(
            SaleRepository::last_bill_no(&mut tx, "site-a").await.unwrap(),
            None
        );
        SaleRepository::insert_sale(&mut tx, &sample_sale("site-a", "INV0001"))
            .await
            .unwrap();
        SaleRepository::insert_sale(&mut tx, &sample_sale("site-a", "INV0002"))
            .await
            .unwrap();
        SaleRepository::insert_sale(&mut tx, &sample_sale("site-b", "INV0001"))
            .await
            .unwrap();

        // Per-site sequences are independent.
        assert_eq!(
            SaleRepository::last_bill_no(&mut tx, "site-a")
                .await
                .unwrap()
                .as_deref(),
            Some("INV0002")
        );
        assert_eq!(
            SaleRepository::last_bill_no(&mut tx, "site-b")
                .await
                .unwrap()
                .as_deref(),
            Some("INV0001")
        );
    }

    #[tokio::test]
    async fn test_duplicate_bill_no_is_conflict() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_sale(&mut tx, &sample_sale("site-a", "INV0001"))
            .await
            .unwrap();
        let err = SaleRepository::insert_sale(&mut tx, &sample_sale("site-a", "INV0001"))
            .await
            .unwrap_err();

        assert!(err.is_bill_no_conflict(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_update_for_edit_preserves_identity() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;

        let mut sale = sample_sale("site-a", "INV0001");
        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_sale(&mut tx, &sale).await.unwrap();
        tx.commit().await.unwrap();

        sale.net_cents = 52500;
        sale.due_cents = 21000;
        sale.payment_status = PaymentStatus::Partial;
        sale.is_edited = true;
        sale.edited_at = Some(Utc::now());
        sale.edited_by = Some("u2".to_string());
        sale.edit_reason = Some("Customer added items".to_string());

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::update_for_edit(&mut tx, &sale).await.unwrap();
        tx.commit().await.unwrap();

        let fetched = db
            .sales()
            .get_by_id(&sale.id, "site-a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.bill_no, "INV0001");
        assert_eq!(fetched.net_cents, 52500);
        assert_eq!(fetched.payment_status, PaymentStatus::Partial);
        assert!(fetched.is_edited);
        assert_eq!(fetched.edit_reason.as_deref(), Some("Customer added items"));
    }

    #[tokio::test]
    async fn test_update_missing_sale_is_not_found() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;

        let sale = sample_sale("site-a", "INV0001");
        let mut tx = db.pool().begin().await.unwrap();
        let err = SaleRepository::update_for_edit(&mut tx, &sale)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_items_rewrite() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;
        testutil::seed_product(&db, "p1", "site-a", "Paracetamol 500mg", 10, 10000).await;

        let sale = sample_sale("site-a", "INV0001");
        let item = SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: sale.id.clone(),
            product_id: "p1".to_string(),
            batch_id: None,
            quantity: 3,
            mrp_cents: 12000,
            sale_rate_cents: 10000,
            discount_cents: 0,
            tax_rate_bps: 500,
            tax_cents: 1500,
            total_cents: 31500,
            created_at: Utc::now(),
        };

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_sale(&mut tx, &sale).await.unwrap();
        SaleRepository::insert_item(&mut tx, &item).await.unwrap();
        tx.commit().await.unwrap();

        let items = db.sales().get_items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total_cents, 31500);
        assert_eq!(items[0].tax_rate_bps, 500);

        let mut tx = db.pool().begin().await.unwrap();
        let deleted = SaleRepository::delete_items(&mut tx, &sale.id)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(deleted, 1);
        assert!(db.sales().get_items(&sale.id).await.unwrap().is_empty());
    }
}
