//! # Site Repository
//!
//! Read access to sites for scoping and the sibling-site check the
//! transfer protocol depends on. Site provisioning itself is an external
//! concern; `insert` exists for seeding and tests.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use karobar_core::Site;

/// Repository for site lookups.
#[derive(Debug, Clone)]
pub struct SiteRepository {
    pool: SqlitePool,
}

impl SiteRepository {
    /// Creates a new SiteRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SiteRepository { pool }
    }

    /// Gets a site by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Site>> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            SELECT id, tenant_id, name, created_at
            FROM sites
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(site)
    }

    /// Lists the other sites under the same tenant as `site_id`.
    ///
    /// This is the transfer protocol's destination allow-list: a transfer
    /// may only credit a sibling site.
    pub async fn siblings(&self, tenant_id: &str, site_id: &str) -> DbResult<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>(
            r#"
            SELECT id, tenant_id, name, created_at
            FROM sites
            WHERE tenant_id = ?1 AND id != ?2
            ORDER BY name
            "#,
        )
        .bind(tenant_id)
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sites)
    }

    /// Inserts a site. Used by seeding and tests; provisioning is
    /// otherwise external.
    pub async fn insert(&self, id: &str, tenant_id: &str, name: &str) -> DbResult<Site> {
        debug!(id = %id, tenant_id = %tenant_id, "Inserting site");

        let site = Site {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO sites (id, tenant_id, name, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&site.id)
        .bind(&site.tenant_id)
        .bind(&site.name)
        .bind(site.created_at)
        .execute(&self.pool)
        .await?;

        Ok(site)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::testutil;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = testutil::test_db().await;
        let sites = db.sites();

        sites.insert("site-a", "tenant-1", "Saddar").await.unwrap();

        let site = sites.get_by_id("site-a").await.unwrap().unwrap();
        assert_eq!(site.tenant_id, "tenant-1");
        assert_eq!(site.name, "Saddar");

        assert!(sites.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_siblings_excludes_self_and_other_tenants() {
        let db = testutil::test_db().await;
        let sites = db.sites();

        sites.insert("site-a", "tenant-1", "Saddar").await.unwrap();
        sites.insert("site-b", "tenant-1", "Clifton").await.unwrap();
        sites.insert("site-x", "tenant-2", "Gulberg").await.unwrap();

        let siblings = sites.siblings("tenant-1", "site-a").await.unwrap();
        assert_eq!(siblings.len(), 1);
        assert_eq!(siblings[0].id, "site-b");
    }
}
