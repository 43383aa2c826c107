//! # karobar-core: Pure Business Logic for the Karobar Ledger
//!
//! This crate is the **heart** of the sale-and-inventory ledger. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Karobar Architecture                           │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │          Callers (HTTP layer, background jobs, CLI)           │ │
//! │  └──────────────────────────────┬────────────────────────────────┘ │
//! │                                 │                                   │
//! │  ┌──────────────────────────────▼────────────────────────────────┐ │
//! │  │             ★ karobar-core (THIS CRATE) ★                     │ │
//! │  │                                                               │ │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌────────────┐      │ │
//! │  │   │  types  │  │  money  │  │ billing │  │ validation │      │ │
//! │  │   │ Product │  │  Money  │  │ BillNo  │  │   rules    │      │ │
//! │  │   │  Sale   │  │ TaxCalc │  │ Totals  │  │   checks   │      │ │
//! │  │   └─────────┘  └─────────┘  └─────────┘  └────────────┘      │ │
//! │  │                                                               │ │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS          │ │
//! │  └──────────────────────────────┬────────────────────────────────┘ │
//! │                                 │                                   │
//! │  ┌──────────────────────────────▼────────────────────────────────┐ │
//! │  │                 karobar-db (Database Layer)                   │ │
//! │  │       SQLite queries, migrations, stock ledger, engine        │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, StockMovement, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`billing`] - Bill numbering, line totals, payment status, diffs
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Prefix for human-readable bill numbers.
///
/// Bill numbers are persisted as `INV` followed by a zero-padded sequence
/// (`INV0001`, `INV0002`, ...). The format is part of the storage contract
/// and must not change without a data migration.
pub const BILL_PREFIX: &str = "INV";

/// Width of the zero-padded numeric suffix in a bill number.
pub const BILL_SEQ_WIDTH: usize = 4;

/// Maximum line items allowed in a single bill.
///
/// ## Business Reason
/// Prevents runaway bills and keeps a single transaction's write set
/// bounded. Can be made configurable per-tenant later.
pub const MAX_BILL_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
