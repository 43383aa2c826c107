//! # karobar-db: Database Layer for the Karobar Ledger
//!
//! SQLite persistence for the multi-site sale-and-inventory ledger, built
//! on sqlx with async pooled connections.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Karobar Data Flow                            │
//! │                                                                     │
//! │  Caller (HTTP layer / job)                                          │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                   karobar-db (THIS CRATE)                     │ │
//! │  │                                                               │ │
//! │  │  ┌────────────┐   ┌──────────────┐   ┌────────────────────┐  │ │
//! │  │  │ SaleEngine │   │TransferService│  │    Repositories    │  │ │
//! │  │  │ create/edit│──►│ paired OUT/IN │  │ site product sale  │  │ │
//! │  │  └─────┬──────┘   └──────┬───────┘   │   stock ledger     │  │ │
//! │  │        │                 │           └────────────────────┘  │ │
//! │  │        │   one transaction each                              │ │
//! │  │        ▼                 ▼                                   │ │
//! │  │  ┌───────────────────────────────┐   ┌───────────────────┐   │ │
//! │  │  │  Database (pool.rs)           │   │ AuditSink         │   │ │
//! │  │  │  SqlitePool, WAL, migrations  │   │ (post-commit,     │   │ │
//! │  │  └───────────────────────────────┘   │  best-effort)     │   │ │
//! │  │                                      └───────────────────┘   │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database file (or :memory: in tests)                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - The ledger error taxonomy
//! - [`repository`] - Repository implementations (site, product, sale, stock)
//! - [`engine`] - Sale Transaction Engine (create / edit bills)
//! - [`transfer`] - Inter-site Transfer Protocol
//! - [`audit`] - Best-effort audit emission
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use karobar_db::{Database, DbConfig, DbAuditSink, SaleEngine};
//!
//! let db = Database::new(DbConfig::new("path/to/karobar.db")).await?;
//! let audit = Arc::new(DbAuditSink::new(db.pool().clone()));
//! let engine = SaleEngine::new(db.pool().clone(), audit);
//! let out = engine.create_sale(&ctx, input).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testutil;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditEvent, AuditSink, DbAuditSink, NoopAuditSink};
pub use engine::{CreateSaleInput, CreateSaleOutput, SaleEngine, SaleItemInput, UpdateSaleInput};
pub use error::DbError;
pub use pool::{Database, DbConfig};
pub use transfer::{TransferInput, TransferItem, TransferOutput, TransferService};

// Repository re-exports for convenience
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::site::SiteRepository;
pub use repository::stock::{NewMovement, StockLedger};
