//! # Domain Types
//!
//! Core domain types for the sale-and-inventory ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Domain Types                               │
//! │                                                                     │
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐       │
//! │  │     Site     │   │   Product    │   │    StockBatch     │       │
//! │  │  ──────────  │   │  ──────────  │   │  ───────────────  │       │
//! │  │  id (UUID)   │   │  (id, site)  │   │  id (UUID)        │       │
//! │  │  tenant_id   │   │  current_    │   │  remaining_qty    │       │
//! │  │  name        │   │    stock     │   │  expiry, batch_no │       │
//! │  └──────────────┘   └──────────────┘   └───────────────────┘       │
//! │                                                                     │
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐       │
//! │  │     Sale     │   │   SaleItem   │   │   StockMovement   │       │
//! │  │  ──────────  │   │  ──────────  │   │  ───────────────  │       │
//! │  │  bill_no     │   │  snapshot of │   │  immutable,       │       │
//! │  │  money flds  │   │  price/tax   │   │  append-only      │       │
//! │  │  edit meta   │   │  at sale time│   │  signed by type   │       │
//! │  └──────────────┘   └──────────────┘   └───────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists (bill_no, batch_no) - human-readable
//!
//! ## Site Scoping
//! Every entity carries a `site_id`. Products use a composite identity
//! `(id, site_id)` so the same product id can exist at multiple sites of a
//! tenant with independent stock, which is what lets a transfer debit one
//! site and credit another for "the same" product.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so 500 bps = 5% with no floating
/// point anywhere. Tax configuration is resolved upstream and supplied to
/// the ledger as a pre-computed rate per line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Site
// =============================================================================

/// A tenant's independently-scoped business location.
///
/// One inventory, one bill sequence. Sites are provisioned externally;
/// the ledger only reads them for scoping and sibling checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Site {
    pub id: String,
    /// Owning tenant ("main user"). Transfers are only legal between
    /// sites sharing this value.
    pub tenant_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product stocked at a site.
///
/// `current_stock` is the authoritative running total and is mutated only
/// through the stock ledger, never assigned directly. It is a derived
/// cache of the movement log: at every committed transaction boundary it
/// equals the signed sum of all movements for `(id, site_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Product identifier, unique together with `site_id`.
    pub id: String,
    pub site_id: String,
    pub name: String,
    /// Running stock total (may only change via stock movements).
    pub current_stock: i64,
    /// Maximum retail price in cents.
    pub mrp_cents: i64,
    /// Default selling rate in cents.
    pub sale_rate_cents: i64,
    /// Purchase rate in cents (for margin reporting).
    pub purchase_rate_cents: i64,
    /// Soft-delete flag; historical sales keep referencing the row.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the sale rate as Money.
    #[inline]
    pub fn sale_rate(&self) -> Money {
        Money::from_cents(self.sale_rate_cents)
    }
}

// =============================================================================
// Stock Batch
// =============================================================================

/// A dated sub-lot of a product's stock with its own remaining quantity.
///
/// When a sale item references a batch, `remaining_qty` moves in lock-step
/// with the product's `current_stock`. Invariant: `remaining_qty` never
/// exceeds `original_qty` and equals the signed sum of movements tagged
/// with this batch id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockBatch {
    pub id: String,
    pub product_id: String,
    pub site_id: String,
    pub batch_no: String,
    pub expiry_date: Option<DateTime<Utc>>,
    pub original_qty: i64,
    pub remaining_qty: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// What kind of stock change a movement records.
///
/// The persisted spellings (`SALE`, `RETURN`, `ADJUSTMENT`, `TRANSFER_OUT`,
/// `TRANSFER_IN`) are part of the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Ordinary sale; subtracts stock.
    Sale,
    /// Return bill; restores stock.
    Return,
    /// Net correction from a bill edit; quantity is stored signed.
    Adjustment,
    /// Debit half of an inter-site transfer.
    TransferOut,
    /// Credit half of an inter-site transfer.
    TransferIn,
}

impl MovementType {
    /// Signed stock effect of a movement of this type.
    ///
    /// `quantity` is an unsigned magnitude for every type except
    /// `Adjustment`, which carries its own sign so that the signed sum of
    /// all movements always reproduces `current_stock` exactly.
    #[inline]
    pub const fn signed_delta(&self, quantity: i64) -> i64 {
        match self {
            MovementType::Sale | MovementType::TransferOut => -quantity,
            MovementType::Return | MovementType::TransferIn => quantity,
            MovementType::Adjustment => quantity,
        }
    }
}

/// An immutable ledger entry recording a quantity change for a product.
///
/// Never updated or deleted after creation; it is the audit-grade source
/// of truth that `current_stock` / `remaining_qty` are derived caches of.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub batch_id: Option<String>,
    pub site_id: String,
    pub movement_type: MovementType,
    /// Magnitude for SALE/RETURN/TRANSFER_*; signed net change for
    /// ADJUSTMENT.
    pub quantity: i64,
    /// Free-text context ("Bill INV0001", "Transfer to Clifton: restock").
    pub remark: String,
    /// First-class grouping key for the two halves of a transfer.
    pub transfer_ref: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// The movement's signed effect on stock.
    #[inline]
    pub fn signed_quantity(&self) -> i64 {
        self.movement_type.signed_delta(self.quantity)
    }
}

// =============================================================================
// Bill Type
// =============================================================================

/// Category of a bill.
///
/// Persisted spellings (`CONSULTATION`, `WALKIN`, `RETURN`, `COURIER`) are
/// part of the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillType {
    Consultation,
    Walkin,
    Return,
    Courier,
}

impl BillType {
    /// Return bills restore stock instead of consuming it.
    #[inline]
    pub const fn restocks(&self) -> bool {
        matches!(self, BillType::Return)
    }

    /// The movement type a bill of this kind records for its items.
    #[inline]
    pub const fn movement_type(&self) -> MovementType {
        if self.restocks() {
            MovementType::Return
        } else {
            MovementType::Sale
        }
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Derived classification of a sale's settlement state.
///
/// Always recomputed from `(paid, net)`, never incremented in place, so it
/// cannot drift. Persisted spellings (`PAID`/`PARTIAL`/`UNPAID`) are part
/// of the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl PaymentStatus {
    /// Pure derivation: `PAID` if paid ≥ net, `PARTIAL` if 0 < paid < net,
    /// else `UNPAID`.
    pub fn derive(paid: Money, net: Money) -> Self {
        if paid >= net {
            PaymentStatus::Paid
        } else if paid.is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A billing transaction (sale or return) issued at a site.
///
/// Created once by the sale engine; mutated only by the edit operation,
/// which always requires a reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub site_id: String,
    /// Human-readable bill number, unique per site.
    pub bill_no: String,
    pub bill_type: BillType,
    /// Optional links to externally-owned records (ids only).
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub consultant_id: Option<String>,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub net_cents: i64,
    pub paid_cents: i64,
    pub due_cents: i64,
    pub payment_status: PaymentStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub edited_by: Option<String>,
    pub edit_reason: Option<String>,
}

impl Sale {
    #[inline]
    pub fn net(&self) -> Money {
        Money::from_cents(self.net_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
///
/// Point-in-time financial record: price, discount and tax values are
/// frozen at sale time and stay valid however product prices change later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub batch_id: Option<String>,
    pub quantity: i64,
    /// MRP at time of sale (frozen).
    pub mrp_cents: i64,
    /// Selling rate at time of sale (frozen).
    pub sale_rate_cents: i64,
    /// Line-level discount.
    pub discount_cents: i64,
    /// Tax rate applied, in basis points (frozen).
    pub tax_rate_bps: u32,
    /// Computed tax amount.
    pub tax_cents: i64,
    /// `sale_rate × quantity − discount + tax`.
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Audit Log
// =============================================================================

/// Append-only record of who changed what.
///
/// Write-only from the ledger's perspective; never read or joined against
/// during a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditLog {
    pub id: String,
    pub site_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_role: String,
    /// "CREATE", "UPDATE", "TRANSFER", ...
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub entity_name: String,
    /// JSON of the record before the change (UPDATE only).
    pub old_values: Option<String>,
    /// JSON of the record after the change.
    pub new_values: Option<String>,
    /// Human-readable field-level change summary, comma-joined.
    pub changes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Request Context
// =============================================================================

/// Caller identity threaded explicitly through every ledger operation.
///
/// Supplied by the session layer; the ledger trusts it completely and
/// performs no authorization itself. Passed as a parameter, never cached
/// process-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub site_id: String,
    pub user_id: String,
    pub username: String,
    pub role: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(500);
        assert_eq!(rate.bps(), 500);
        assert!((rate.percentage() - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        let rate = TaxRate::from_percentage(8.25);
        assert_eq!(rate.bps(), 825);
    }

    #[test]
    fn test_movement_type_signed_delta() {
        assert_eq!(MovementType::Sale.signed_delta(3), -3);
        assert_eq!(MovementType::TransferOut.signed_delta(5), -5);
        assert_eq!(MovementType::Return.signed_delta(3), 3);
        assert_eq!(MovementType::TransferIn.signed_delta(5), 5);
        // Adjustments carry their own sign.
        assert_eq!(MovementType::Adjustment.signed_delta(-2), -2);
        assert_eq!(MovementType::Adjustment.signed_delta(4), 4);
    }

    #[test]
    fn test_bill_type_restocks() {
        assert!(BillType::Return.restocks());
        assert!(!BillType::Walkin.restocks());
        assert_eq!(BillType::Return.movement_type(), MovementType::Return);
        assert_eq!(BillType::Consultation.movement_type(), MovementType::Sale);
    }

    #[test]
    fn test_payment_status_derivation() {
        let net = Money::from_cents(31500);
        assert_eq!(
            PaymentStatus::derive(Money::from_cents(31500), net),
            PaymentStatus::Paid
        );
        assert_eq!(
            PaymentStatus::derive(Money::from_cents(40000), net),
            PaymentStatus::Paid
        );
        assert_eq!(
            PaymentStatus::derive(Money::from_cents(20000), net),
            PaymentStatus::Partial
        );
        assert_eq!(
            PaymentStatus::derive(Money::zero(), net),
            PaymentStatus::Unpaid
        );
    }

    #[test]
    fn test_enum_wire_spellings() {
        // Persisted spellings are a storage contract; pin them.
        assert_eq!(
            serde_json::to_string(&MovementType::TransferOut).unwrap(),
            "\"TRANSFER_OUT\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Partial).unwrap(),
            "\"PARTIAL\""
        );
        assert_eq!(
            serde_json::to_string(&BillType::Walkin).unwrap(),
            "\"WALKIN\""
        );
    }
}
