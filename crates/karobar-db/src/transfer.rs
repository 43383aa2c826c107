//! # Inter-Site Transfer Protocol
//!
//! Moves stock between two sites of the same tenant as a matched pair of
//! movements per product, committed in one transaction:
//!
//! ```text
//! TRF-260829-141503-0042          ← shared transfer reference
//!   ├─ TRANSFER_OUT  site A  −qty   "Transfer to Clifton: restock"
//!   └─ TRANSFER_IN   site B  +qty   "Transfer from Saddar: restock"
//! ```
//!
//! Preconditions checked before the transaction opens: both sites exist,
//! they belong to the same tenant, and they are not the same site. A
//! foreign site is reported as an unknown sibling rather than revealing
//! whether it exists at all.
//!
//! There is no partial transfer: if any product is missing at either end
//! or the source lacks stock, the whole batch rolls back.

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{DbError, DbResult};
use crate::repository::site::SiteRepository;
use crate::repository::stock::{NewMovement, StockLedger};
use karobar_core::validation::{validate_item_count, validate_quantity};
use karobar_core::{MovementType, RequestContext, Site, StockMovement, ValidationError};

// =============================================================================
// Inputs / Outputs
// =============================================================================

/// One product line in a transfer (whole-product, not per-batch).
#[derive(Debug, Clone)]
pub struct TransferItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Request to move stock from the caller's site to a sibling site.
#[derive(Debug, Clone)]
pub struct TransferInput {
    pub to_site_id: String,
    pub items: Vec<TransferItem>,
    /// Free-text context carried into both movements' remarks.
    pub note: String,
}

/// A committed transfer: the shared reference and every movement written.
#[derive(Debug, Clone)]
pub struct TransferOutput {
    pub transfer_ref: String,
    pub movements: Vec<StockMovement>,
}

// =============================================================================
// Service
// =============================================================================

/// The inter-site transfer service.
#[derive(Clone)]
pub struct TransferService {
    pool: SqlitePool,
    ledger: StockLedger,
    audit: Arc<dyn AuditSink>,
}

impl TransferService {
    pub fn new(pool: SqlitePool, audit: Arc<dyn AuditSink>) -> Self {
        let ledger = StockLedger::new(pool.clone());
        TransferService {
            pool,
            ledger,
            audit,
        }
    }

    /// Transfers stock from the caller's site to a sibling site.
    ///
    /// ## Errors
    /// * `DbError::Validation` - empty items, bad quantity, or source and
    ///   destination are the same site
    /// * `DbError::NotFound` - either site unknown, destination not a
    ///   sibling, or a product missing at either end
    /// * `DbError::InsufficientStock` - source lacks stock for a line
    #[instrument(skip(self, ctx, input), fields(from = %ctx.site_id, to = %input.to_site_id))]
    pub async fn transfer_stock(
        &self,
        ctx: &RequestContext,
        input: TransferInput,
    ) -> DbResult<TransferOutput> {
        validate_item_count(input.items.len())?;
        for item in &input.items {
            validate_quantity(item.quantity)?;
        }
        if input.to_site_id == ctx.site_id {
            return Err(ValidationError::MustDiffer {
                field: "toSiteId".to_string(),
                other: "fromSiteId".to_string(),
            }
            .into());
        }

        let (source, dest) = self.sibling_sites(&ctx.site_id, &input.to_site_id).await?;
        let transfer_ref = new_transfer_ref();

        // Writer transactions take the write lock up front so concurrent
        // writers queue at BEGIN instead of failing a snapshot upgrade.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let mut movements = Vec::with_capacity(input.items.len() * 2);

        for item in &input.items {
            let out = self
                .ledger
                .apply_movement(
                    &mut tx,
                    NewMovement {
                        product_id: item.product_id.clone(),
                        batch_id: None,
                        site_id: source.id.clone(),
                        movement_type: MovementType::TransferOut,
                        quantity: item.quantity,
                        remark: format!("Transfer to {}: {}", dest.name, input.note),
                        transfer_ref: Some(transfer_ref.clone()),
                        created_by: ctx.user_id.clone(),
                    },
                )
                .await?;

            let incoming = self
                .ledger
                .apply_movement(
                    &mut tx,
                    NewMovement {
                        product_id: item.product_id.clone(),
                        batch_id: None,
                        site_id: dest.id.clone(),
                        movement_type: MovementType::TransferIn,
                        quantity: item.quantity,
                        remark: format!("Transfer from {}: {}", source.name, input.note),
                        transfer_ref: Some(transfer_ref.clone()),
                        created_by: ctx.user_id.clone(),
                    },
                )
                .await?;

            movements.push(out);
            movements.push(incoming);
        }

        tx.commit().await?;

        info!(
            transfer_ref = %transfer_ref,
            items = input.items.len(),
            "Stock transferred"
        );

        // One audit entry at each end of the transfer.
        let summary = format!("{} -> {}, {} product(s)", source.name, dest.name, input.items.len());
        let event = AuditEvent::new("TRANSFER", "StockTransfer", &transfer_ref, &transfer_ref)
            .with_changes(summary);
        self.audit.record(ctx, event.clone()).await;

        let dest_ctx = RequestContext {
            site_id: dest.id.clone(),
            ..ctx.clone()
        };
        self.audit.record(&dest_ctx, event).await;

        Ok(TransferOutput {
            transfer_ref,
            movements,
        })
    }

    /// Resolves source and destination and enforces the sibling rule.
    ///
    /// A destination under another tenant is reported exactly like a
    /// nonexistent one.
    async fn sibling_sites(&self, from: &str, to: &str) -> DbResult<(Site, Site)> {
        let sites = SiteRepository::new(self.pool.clone());
        let source = sites
            .get_by_id(from)
            .await?
            .ok_or_else(|| DbError::not_found("Site", from))?;
        let dest = sites
            .get_by_id(to)
            .await?
            .filter(|site| site.tenant_id == source.tenant_id)
            .ok_or_else(|| DbError::not_found("Sibling site", to))?;
        Ok((source, dest))
    }
}

/// Mints a transfer reference: timestamp plus a sub-second discriminator.
fn new_transfer_ref() -> String {
    let now = Utc::now();
    format!(
        "TRF-{}-{:04}",
        now.format("%y%m%d-%H%M%S"),
        now.timestamp_subsec_nanos() % 10_000
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
