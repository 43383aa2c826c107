//! # Ledger Error Types
//!
//! The full error taxonomy every mutating ledger operation can surface.
//!
//! ## Taxonomy
//! ```text
//! Validation        - malformed/missing input, rejected before any
//!                     transaction opens
//! NotFound          - referenced sale/product/batch/site absent or not
//!                     owned by the caller's site; transaction rolled back
//! Conflict          - uniqueness violation (bill number); the engine
//!                     retries once, then it is terminal
//! InsufficientStock - the movement would drive stock negative;
//!                     transaction rolled back, terminal
//! Integrity         - corrupt stored data (unparseable bill number,
//!                     over-credited batch); fatal, never auto-corrected
//!
//! plus infrastructure variants (connection, migration, pool) wrapping
//! sqlx failures.
//! ```
//! Audit-emission failures never appear here: the audit sink logs and
//! swallows them by contract.

use thiserror::Error;

use karobar_core::{CoreError, ValidationError};

/// Ledger operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Malformed or missing required input. Raised before a transaction
    /// opens.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Entity not found, or not owned by the caller's site.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two concurrent sales minting the same bill number for a site
    ///   (the `(site_id, bill_no)` backstop); retried once by the engine
    #[error("Duplicate {field}: '{value}' already exists")]
    Conflict { field: String, value: String },

    /// The movement would drive stock negative.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Corrupt stored data. Fatal; surfaced, never auto-corrected.
    #[error("Data integrity error: {0}")]
    Integrity(String),

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True when this is the bill-number uniqueness collision the sale
    /// engine is allowed to retry once.
    pub fn is_bill_no_conflict(&self) -> bool {
        matches!(self, DbError::Conflict { field, .. } if field.contains("bill_no"))
    }
}

/// Convert core domain errors.
///
/// An unparseable stored bill number is a data-integrity failure at this
/// layer, not a validation problem with the caller's input.
impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BillNumberCorrupt { .. } => DbError::Integrity(err.to_string()),
            CoreError::Validation(v) => DbError::Validation(v),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE: "UNIQUE constraint failed: <table>.<column>"
                // FK:     "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::Conflict {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    // Schema-level backstop for invariants the repositories
                    // already guard (non-negative stock, batch ceilings).
                    DbError::Integrity(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for ledger operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_no_conflict_detection() {
        let err = DbError::Conflict {
            field: "sales.site_id, sales.bill_no".to_string(),
            value: "unknown".to_string(),
        };
        assert!(err.is_bill_no_conflict());

        let err = DbError::Conflict {
            field: "products.id".to_string(),
            value: "unknown".to_string(),
        };
        assert!(!err.is_bill_no_conflict());
    }

    #[test]
    fn test_core_error_mapping() {
        let err: DbError = CoreError::BillNumberCorrupt {
            bill_no: "XYZ".to_string(),
        }
        .into();
        assert!(matches!(err, DbError::Integrity(_)));

        let err: DbError = CoreError::Validation(ValidationError::Required {
            field: "editReason".to_string(),
        })
        .into();
        assert!(matches!(err, DbError::Validation(_)));
    }
}
