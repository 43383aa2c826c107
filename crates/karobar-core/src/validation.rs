//! # Validation Module
//!
//! Input validation for ledger operations.
//!
//! ## Validation Strategy
//! ```text
//! Layer 1: Caller (HTTP layer / forms)   - format checks, fast feedback
//! Layer 2: THIS MODULE                   - business rule validation,
//!                                          rejected BEFORE a transaction
//!                                          ever opens
//! Layer 3: Database (SQLite)             - NOT NULL, UNIQUE, FK, CHECK
//! ```
//! Defense in depth: each layer catches different mistakes.

use crate::error::ValidationError;
use crate::{MAX_BILL_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Bill Validators
// =============================================================================

/// Validates an edit reason.
///
/// ## Rules
/// - Must not be empty (every edit is accountable to a reason)
/// - At most 500 characters
///
/// ## Example
/// ```rust
/// use karobar_core::validation::validate_edit_reason;
///
/// assert!(validate_edit_reason("correction").is_ok());
/// assert!(validate_edit_reason("   ").is_err());
/// ```
pub fn validate_edit_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "editReason".to_string(),
        });
    }

    if reason.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "editReason".to_string(),
            max: 500,
        });
    }

    Ok(())
}

/// Validates the number of line items in a bill.
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_BILL_ITEMS`]
pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    if count > MAX_BILL_ITEMS {
        return Err(ValidationError::TooMany {
            field: "items".to_string(),
            max: MAX_BILL_ITEMS,
        });
    }

    Ok(())
}

/// Validates a line-item or transfer quantity.
///
/// ## Rules
/// - Strictly positive (the signed effect comes from the movement type,
///   never from caller-supplied negative quantities)
/// - At most [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a money amount that must not be negative (paid amount,
/// discounts, rates).
pub fn validate_non_negative(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
