//! # Sale Transaction Engine
//!
//! Creating and editing bills. Each operation is one database transaction
//! covering the sale header, its line items and every stock effect, with
//! the audit event emitted only after commit.
//!
//! ## Create
//! ```text
//! validate input ──► BEGIN
//!                      ├─ last bill no for site ─► derive next (INVnnnn)
//!                      ├─ per item: snapshot product prices, compute
//!                      │            tax/total, apply SALE (or RETURN)
//!                      │            movement through the stock ledger
//!                      ├─ insert sale + items
//!                    COMMIT ──► audit CREATE (best-effort)
//!
//! bill-number UNIQUE conflict on insert? roll back and retry ONCE with a
//! freshly derived number; a second conflict propagates.
//! ```
//!
//! ## Edit
//! Items are rewritten wholesale. Stock is corrected by the NET difference
//! per product: the engine diffs the old and new stock effect for each
//! `(product, batch)` and records one signed ADJUSTMENT movement per
//! changed product, so an edit that touches nothing moves no stock and an
//! edit from 3 to 5 units records a single `-2` adjustment.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{DbError, DbResult};
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::{NewMovement, StockLedger};
use karobar_core::billing::{compute_line_totals, next_bill_number, sale_change_summary};
use karobar_core::validation::{
    validate_edit_reason, validate_item_count, validate_non_negative, validate_quantity,
};
use karobar_core::{
    BillType, Money, MovementType, PaymentStatus, Product, RequestContext, Sale, SaleItem, TaxRate,
};

// =============================================================================
// Inputs / Outputs
// =============================================================================

/// One requested line item. Prices are snapshotted from the product row
/// inside the transaction; the caller supplies only quantity, discount and
/// the already-resolved tax rate.
#[derive(Debug, Clone)]
pub struct SaleItemInput {
    pub product_id: String,
    pub batch_id: Option<String>,
    pub quantity: i64,
    pub discount_cents: i64,
    pub tax_rate_bps: u32,
}

/// Request to create a bill.
#[derive(Debug, Clone)]
pub struct CreateSaleInput {
    pub bill_type: BillType,
    pub items: Vec<SaleItemInput>,
    /// Bill-level discount on top of any line discounts.
    pub discount_cents: i64,
    pub paid_cents: i64,
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub consultant_id: Option<String>,
}

/// Request to edit a bill. The item set replaces the old one; payment
/// stays as originally recorded and due/status are re-derived from it.
#[derive(Debug, Clone)]
pub struct UpdateSaleInput {
    pub sale_id: String,
    pub items: Vec<SaleItemInput>,
    pub discount_cents: i64,
    /// Mandatory justification, stored on the sale and in the adjustment
    /// movements' remarks.
    pub edit_reason: String,
}

/// A committed sale with its line items.
#[derive(Debug, Clone)]
pub struct CreateSaleOutput {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Engine
// =============================================================================

/// The sale transaction engine.
#[derive(Clone)]
pub struct SaleEngine {
    pool: SqlitePool,
    ledger: StockLedger,
    audit: Arc<dyn AuditSink>,
}

impl SaleEngine {
    pub fn new(pool: SqlitePool, audit: Arc<dyn AuditSink>) -> Self {
        let ledger = StockLedger::new(pool.clone());
        SaleEngine {
            pool,
            ledger,
            audit,
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a bill: numbered header, frozen line items and one stock
    /// movement per item, committed atomically.
    ///
    /// ## Errors
    /// * `DbError::Validation` - empty/oversized item set, bad quantity,
    ///   negative discount or paid amount
    /// * `DbError::NotFound` - product or batch unknown at the caller's site
    /// * `DbError::InsufficientStock` - any line would drive stock negative
    /// * `DbError::Integrity` - stored bill number is corrupt
    /// * `DbError::Conflict` - bill number collided twice in a row
    #[instrument(skip(self, ctx, input), fields(site_id = %ctx.site_id, bill_type = ?input.bill_type))]
    pub async fn create_sale(
        &self,
        ctx: &RequestContext,
        input: CreateSaleInput,
    ) -> DbResult<CreateSaleOutput> {
        validate_item_count(input.items.len())?;
        validate_non_negative("discount", input.discount_cents)?;
        validate_non_negative("paidAmount", input.paid_cents)?;
        for item in &input.items {
            validate_quantity(item.quantity)?;
            validate_non_negative("discount", item.discount_cents)?;
        }

        // Two writers can derive the same number; the UNIQUE index catches
        // the loser and one retry re-derives from the winner's row.
        let mut attempt = 0;
        loop {
            match self.try_create_sale(ctx, &input).await {
                Ok(output) => {
                    info!(
                        bill_no = %output.sale.bill_no,
                        net_cents = output.sale.net_cents,
                        items = output.items.len(),
                        "Sale created"
                    );

                    self.audit
                        .record(
                            ctx,
                            AuditEvent::new("CREATE", "Sale", &output.sale.id, &output.sale.bill_no)
                                .with_new_values(sale_snapshot(&output.sale)),
                        )
                        .await;

                    return Ok(output);
                }
                Err(err) if err.is_bill_no_conflict() && attempt == 0 => {
                    warn!("Bill number conflict, retrying with a fresh number");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_create_sale(
        &self,
        ctx: &RequestContext,
        input: &CreateSaleInput,
    ) -> DbResult<CreateSaleOutput> {
        // BEGIN IMMEDIATE takes the write lock up front. A deferred
        // transaction would take its read snapshot at the first SELECT and
        // then fail the write upgrade (SQLITE_BUSY_SNAPSHOT) if a rival
        // committed in between; starting immediate makes a concurrent
        // writer queue at BEGIN and observe the winner's committed state.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let now = Utc::now();

        let last = SaleRepository::last_bill_no(&mut tx, &ctx.site_id).await?;
        let bill_no = next_bill_number(last.as_deref())?;

        let sale_id = Uuid::new_v4().to_string();
        let movement_type = input.bill_type.movement_type();

        let mut items = Vec::with_capacity(input.items.len());
        let mut gross = Money::zero();
        let mut items_total = Money::zero();

        for item in &input.items {
            let product = self
                .product_for_sale(&mut tx, &item.product_id, &ctx.site_id)
                .await?;

            let totals = compute_line_totals(
                product.sale_rate(),
                item.quantity,
                Money::from_cents(item.discount_cents),
                TaxRate::from_bps(item.tax_rate_bps),
            );
            gross = gross + product.sale_rate() * item.quantity;
            items_total = items_total + totals.total;

            self.ledger
                .apply_movement(
                    &mut tx,
                    NewMovement {
                        product_id: item.product_id.clone(),
                        batch_id: item.batch_id.clone(),
                        site_id: ctx.site_id.clone(),
                        movement_type,
                        quantity: item.quantity,
                        remark: format!("Bill {}", bill_no),
                        transfer_ref: None,
                        created_by: ctx.user_id.clone(),
                    },
                )
                .await?;

            items.push(SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: item.product_id.clone(),
                batch_id: item.batch_id.clone(),
                quantity: item.quantity,
                mrp_cents: product.mrp_cents,
                sale_rate_cents: product.sale_rate_cents,
                discount_cents: item.discount_cents,
                tax_rate_bps: item.tax_rate_bps,
                tax_cents: totals.tax.cents(),
                total_cents: totals.total.cents(),
                created_at: now,
            });
        }

        let discount = Money::from_cents(input.discount_cents);
        let net = items_total - discount;
        let paid = Money::from_cents(input.paid_cents);
        // due = net − paid, always; an overpaid bill carries a negative
        // due (a credit owed back to the customer).
        let due = net - paid;

        let sale = Sale {
            id: sale_id,
            site_id: ctx.site_id.clone(),
            bill_no,
            bill_type: input.bill_type,
            patient_id: input.patient_id.clone(),
            appointment_id: input.appointment_id.clone(),
            consultant_id: input.consultant_id.clone(),
            gross_cents: gross.cents(),
            discount_cents: input.discount_cents,
            net_cents: net.cents(),
            paid_cents: input.paid_cents,
            due_cents: due.cents(),
            payment_status: PaymentStatus::derive(paid, net),
            created_by: ctx.user_id.clone(),
            created_at: now,
            is_edited: false,
            edited_at: None,
            edited_by: None,
            edit_reason: None,
        };

        SaleRepository::insert_sale(&mut tx, &sale).await?;
        for item in &items {
            SaleRepository::insert_item(&mut tx, item).await?;
        }

        tx.commit().await?;
        Ok(CreateSaleOutput { sale, items })
    }

    // =========================================================================
    // Edit
    // =========================================================================

    /// Edits a bill: rewrites the item set, corrects stock by the net
    /// per-product difference, re-derives money fields from the unchanged
    /// paid amount and stamps the edit metadata. One transaction.
    ///
    /// ## Errors
    /// * `DbError::Validation` - missing reason, empty items, bad quantity
    /// * `DbError::NotFound` - sale unknown at the caller's site
    /// * `DbError::InsufficientStock` - a quantity increase exceeds stock
    #[instrument(skip(self, ctx, input), fields(site_id = %ctx.site_id, sale_id = %input.sale_id))]
    pub async fn update_sale(
        &self,
        ctx: &RequestContext,
        input: UpdateSaleInput,
    ) -> DbResult<CreateSaleOutput> {
        validate_edit_reason(&input.edit_reason)?;
        validate_item_count(input.items.len())?;
        validate_non_negative("discount", input.discount_cents)?;
        for item in &input.items {
            validate_quantity(item.quantity)?;
            validate_non_negative("discount", item.discount_cents)?;
        }

        // Write lock up front, as in create (read-then-write upgrades
        // fail under contention in WAL mode).
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let now = Utc::now();

        let old = SaleRepository::get_by_id_in_tx(&mut tx, &input.sale_id, &ctx.site_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", &input.sale_id))?;
        let old_items = SaleRepository::get_items_in_tx(&mut tx, &old.id).await?;

        // Net stock effect per (product, batch): new effect minus old
        // effect. SALE-type bills have negative effects; a RETURN bill's
        // are positive. The difference IS the adjustment to record.
        let movement_type = old.bill_type.movement_type();
        let mut deltas: HashMap<(String, Option<String>), i64> = HashMap::new();
        for item in &old_items {
            *deltas
                .entry((item.product_id.clone(), item.batch_id.clone()))
                .or_default() -= movement_type.signed_delta(item.quantity);
        }
        for item in &input.items {
            *deltas
                .entry((item.product_id.clone(), item.batch_id.clone()))
                .or_default() += movement_type.signed_delta(item.quantity);
        }

        for ((product_id, batch_id), delta) in deltas {
            if delta == 0 {
                continue;
            }
            self.ledger
                .apply_movement(
                    &mut tx,
                    NewMovement {
                        product_id,
                        batch_id,
                        site_id: ctx.site_id.clone(),
                        movement_type: MovementType::Adjustment,
                        quantity: delta,
                        remark: format!("Bill {} edited: {}", old.bill_no, input.edit_reason),
                        transfer_ref: None,
                        created_by: ctx.user_id.clone(),
                    },
                )
                .await?;
        }

        SaleRepository::delete_items(&mut tx, &old.id).await?;

        let mut items = Vec::with_capacity(input.items.len());
        let mut gross = Money::zero();
        let mut items_total = Money::zero();
        for item in &input.items {
            let product = self
                .product_for_sale(&mut tx, &item.product_id, &ctx.site_id)
                .await?;

            let totals = compute_line_totals(
                product.sale_rate(),
                item.quantity,
                Money::from_cents(item.discount_cents),
                TaxRate::from_bps(item.tax_rate_bps),
            );
            gross = gross + product.sale_rate() * item.quantity;
            items_total = items_total + totals.total;

            let row = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: old.id.clone(),
                product_id: item.product_id.clone(),
                batch_id: item.batch_id.clone(),
                quantity: item.quantity,
                mrp_cents: product.mrp_cents,
                sale_rate_cents: product.sale_rate_cents,
                discount_cents: item.discount_cents,
                tax_rate_bps: item.tax_rate_bps,
                tax_cents: totals.tax.cents(),
                total_cents: totals.total.cents(),
                created_at: now,
            };
            SaleRepository::insert_item(&mut tx, &row).await?;
            items.push(row);
        }

        let discount = Money::from_cents(input.discount_cents);
        let net = items_total - discount;
        let paid = old.paid();
        // due = net − paid, always; negative when the original payment
        // exceeds the re-derived net.
        let due = net - paid;

        let mut updated = old.clone();
        updated.gross_cents = gross.cents();
        updated.discount_cents = input.discount_cents;
        updated.net_cents = net.cents();
        updated.due_cents = due.cents();
        updated.payment_status = PaymentStatus::derive(paid, net);
        updated.is_edited = true;
        updated.edited_at = Some(now);
        updated.edited_by = Some(ctx.user_id.clone());
        updated.edit_reason = Some(input.edit_reason.trim().to_string());

        SaleRepository::update_for_edit(&mut tx, &updated).await?;
        tx.commit().await?;

        info!(
            bill_no = %updated.bill_no,
            net_cents = updated.net_cents,
            "Sale edited"
        );

        self.audit
            .record(
                ctx,
                AuditEvent::new("UPDATE", "Sale", &updated.id, &updated.bill_no)
                    .with_old_values(sale_snapshot(&old))
                    .with_new_values(sale_snapshot(&updated))
                    .with_changes(sale_change_summary(&old, &updated)),
            )
            .await;

        Ok(CreateSaleOutput {
            sale: updated,
            items,
        })
    }

    /// Looks up a sellable product in the open transaction.
    async fn product_for_sale(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product_id: &str,
        site_id: &str,
    ) -> DbResult<Product> {
        ProductRepository::get_in_tx(tx, product_id, site_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))
    }
}

/// JSON snapshot of a sale's money fields for the audit trail.
fn sale_snapshot(sale: &Sale) -> String {
    json!({
        "billNo": sale.bill_no,
        "billType": sale.bill_type,
        "grossAmount": Money::from_cents(sale.gross_cents).to_string(),
        "discount": Money::from_cents(sale.discount_cents).to_string(),
        "netAmount": Money::from_cents(sale.net_cents).to_string(),
        "paidAmount": Money::from_cents(sale.paid_cents).to_string(),
        "dueAmount": Money::from_cents(sale.due_cents).to_string(),
        "paymentStatus": sale.payment_status,
    })
    .to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
