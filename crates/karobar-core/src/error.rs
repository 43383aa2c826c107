//! # Error Types
//!
//! Domain-specific error types for karobar-core.
//!
//! ## Error Hierarchy
//! ```text
//! karobar-core errors (this file)
//! ├── CoreError        - Business rule / integrity failures
//! └── ValidationError  - Input validation failures
//!
//! karobar-db errors (separate crate)
//! └── DbError          - Full ledger taxonomy + infrastructure failures
//!
//! Flow: ValidationError → CoreError → DbError → caller
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (bill number, product id, etc.)
//! 3. Errors are enum variants, never bare strings

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stored bill number does not match the `INV` + digits format.
    ///
    /// ## When This Occurs
    /// - The sequence generator read the latest bill for a site and could
    ///   not parse its numeric suffix.
    ///
    /// This is a data-integrity failure: silently restarting the sequence
    /// at 1 could mint a duplicate bill number for an unrelated record, so
    /// the caller must surface this instead of recovering.
    #[error("Stored bill number is corrupt: {bill_no:?}")]
    BillNumberCorrupt { bill_no: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements. Used for early
/// validation before any transaction opens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// A collection that must have entries is empty.
    #[error("{field} must contain at least one entry")]
    Empty { field: String },

    /// Collection has too many entries.
    #[error("{field} must contain at most {max} entries")]
    TooMany { field: String, max: usize },

    /// Two values that must differ are equal.
    #[error("{field} must differ from {other}")]
    MustDiffer { field: String, other: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
