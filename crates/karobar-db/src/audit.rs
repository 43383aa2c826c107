//! Best-effort audit emission.
//!
//! Audit events are recorded AFTER the business transaction commits, never
//! inside it: an audit failure must not roll back a committed sale. The
//! sink trait is the seam; the default implementation appends to the
//! `audit_logs` table and swallows failures with a warning.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use karobar_core::{AuditLog, RequestContext};

/// An audit event describing one completed ledger operation.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// "CREATE", "UPDATE", "TRANSFER".
    pub action: String,
    /// "Sale", "StockTransfer", ...
    pub entity_type: String,
    pub entity_id: String,
    /// Human-readable handle (bill number, transfer reference).
    pub entity_name: String,
    /// JSON snapshot before the change (UPDATE only).
    pub old_values: Option<String>,
    /// JSON snapshot after the change.
    pub new_values: Option<String>,
    /// Comma-joined field-level summary ("netAmount: 315.00 -> 525.00").
    pub changes: Option<String>,
}

impl AuditEvent {
    pub fn new(action: &str, entity_type: &str, entity_id: &str, entity_name: &str) -> Self {
        AuditEvent {
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            entity_name: entity_name.to_string(),
            old_values: None,
            new_values: None,
            changes: None,
        }
    }

    pub fn with_new_values(mut self, json: String) -> Self {
        self.new_values = Some(json);
        self
    }

    pub fn with_old_values(mut self, json: String) -> Self {
        self.old_values = Some(json);
        self
    }

    pub fn with_changes(mut self, summary: String) -> Self {
        self.changes = Some(summary);
        self
    }
}

/// Sink for audit events.
///
/// Implementations must be best-effort: `record` is infallible from the
/// caller's point of view and may drop the event on internal failure.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, ctx: &RequestContext, event: AuditEvent);
}

/// Audit sink that appends to the `audit_logs` table.
#[derive(Debug, Clone)]
pub struct DbAuditSink {
    pool: SqlitePool,
}

impl DbAuditSink {
    pub fn new(pool: SqlitePool) -> Self {
        DbAuditSink { pool }
    }

    /// Recent audit entries at a site, newest first.
    pub async fn recent(&self, site_id: &str, limit: u32) -> sqlx::Result<Vec<AuditLog>> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, site_id, user_id, user_name, user_role,
                   action, entity_type, entity_id, entity_name,
                   old_values, new_values, changes, created_at
            FROM audit_logs
            WHERE site_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(site_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, ctx: &RequestContext, event: AuditEvent) {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, site_id, user_id, user_name, user_role,
                action, entity_type, entity_id, entity_name,
                old_values, new_values, changes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&ctx.site_id)
        .bind(&ctx.user_id)
        .bind(&ctx.username)
        .bind(&ctx.role)
        .bind(&event.action)
        .bind(&event.entity_type)
        .bind(&event.entity_id)
        .bind(&event.entity_name)
        .bind(&event.old_values)
        .bind(&event.new_values)
        .bind(&event.changes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            warn!(
                action = %event.action,
                entity_type = %event.entity_type,
                entity_id = %event.entity_id,
                error = %err,
                "Audit write failed; event dropped"
            );
        }
    }
}

/// Sink that discards every event. Useful in tests and tooling that does
/// not need an audit trail.
#[derive(Debug, Clone, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _ctx: &RequestContext, _event: AuditEvent) {}
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn test_db_sink_appends_entry() {
        let db = testutil::test_db().await;
        testutil::seed_site(&db, "site-a", "tenant-1", "Saddar").await;

        let sink = DbAuditSink::new(db.pool().clone());
        let ctx = testutil::ctx("site-a");
        sink.record(
            &ctx,
            AuditEvent::new("CREATE", "Sale", "sale-1", "INV0001")
                .with_new_values("{\"netAmount\":\"315.00\"}".to_string()),
        )
        .await;

        let entries = sink.recent("site-a", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "CREATE");
        assert_eq!(entries[0].entity_name, "INV0001");
        assert_eq!(entries[0].user_id, ctx.user_id);
        assert!(entries[0].old_values.is_none());
    }

    #[tokio::test]
    async fn test_db_sink_swallows_failure() {
        let db = testutil::test_db().await;
        let sink = DbAuditSink::new(db.pool().clone());
        db.close().await;

        // Pool is closed; record must not panic or propagate.
        sink.record(
            &testutil::ctx("site-a"),
            AuditEvent::new("CREATE", "Sale", "sale-1", "INV0001"),
        )
        .await;
    }
}
