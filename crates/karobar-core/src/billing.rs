//! # Billing Module
//!
//! Pure billing math: bill-number sequencing, line-item totals and the
//! field-level change summary recorded when a bill is edited.
//!
//! ## Bill Number Sequencing
//! ```text
//! last sale for site:  INV0007
//!        │
//!        ▼
//! parse numeric suffix ── fails? → CoreError::BillNumberCorrupt
//!        │                         (never silently restart at 1: that
//!        ▼                          could mint a duplicate bill number)
//! increment, zero-pad:  INV0008
//! ```
//! Two concurrent callers can legitimately compute the same next number;
//! the UNIQUE `(site_id, bill_no)` constraint is the correctness backstop
//! and the engine retries once on that conflict.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Sale, TaxRate};
use crate::{BILL_PREFIX, BILL_SEQ_WIDTH};

// =============================================================================
// Bill Number Sequencing
// =============================================================================

/// Formats a sequence number as a bill number (`INV0001`, `INV0002`, ...).
///
/// Sequences past 9999 simply widen; the pad is a minimum, not a cap.
pub fn format_bill_number(seq: u64) -> String {
    format!("{}{:0width$}", BILL_PREFIX, seq, width = BILL_SEQ_WIDTH)
}

/// Parses the numeric suffix out of a stored bill number.
///
/// ## Errors
/// `CoreError::BillNumberCorrupt` when the value is not `INV` followed by
/// digits. This is a data-integrity failure the caller must surface.
pub fn parse_bill_number(bill_no: &str) -> CoreResult<u64> {
    let corrupt = || CoreError::BillNumberCorrupt {
        bill_no: bill_no.to_string(),
    };

    let digits = bill_no.strip_prefix(BILL_PREFIX).ok_or_else(corrupt)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(corrupt());
    }
    digits.parse::<u64>().map_err(|_| corrupt())
}

/// Derives the next bill number from the most recently issued one.
///
/// `None` means this site has never billed; the sequence starts at 1.
///
/// ## Example
/// ```rust
/// use karobar_core::billing::next_bill_number;
///
/// assert_eq!(next_bill_number(None).unwrap(), "INV0001");
/// assert_eq!(next_bill_number(Some("INV0007")).unwrap(), "INV0008");
/// assert!(next_bill_number(Some("garbage")).is_err());
/// ```
pub fn next_bill_number(last: Option<&str>) -> CoreResult<String> {
    let seq = match last {
        Some(bill_no) => parse_bill_number(bill_no)? + 1,
        None => 1,
    };
    Ok(format_bill_number(seq))
}

// =============================================================================
// Line Item Math
// =============================================================================

/// Computed money fields for one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTotals {
    pub tax: Money,
    pub total: Money,
}

/// Computes tax and total for a line item.
///
/// `tax = sale_rate × quantity × rate`,
/// `total = sale_rate × quantity − discount + tax`.
///
/// ## Example
/// ```rust
/// use karobar_core::billing::compute_line_totals;
/// use karobar_core::money::Money;
/// use karobar_core::types::TaxRate;
///
/// let totals = compute_line_totals(
///     Money::from_cents(10000), // rate 100.00
///     3,
///     Money::zero(),
///     TaxRate::from_bps(500), // 5%
/// );
/// assert_eq!(totals.tax.cents(), 1500);   // 15.00
/// assert_eq!(totals.total.cents(), 31500); // 315.00
/// ```
pub fn compute_line_totals(
    sale_rate: Money,
    quantity: i64,
    discount: Money,
    tax_rate: TaxRate,
) -> LineTotals {
    let line = sale_rate * quantity;
    let tax = line.calculate_tax(tax_rate);
    LineTotals {
        tax,
        total: line - discount + tax,
    }
}

// =============================================================================
// Edit Change Summary
// =============================================================================

/// Builds the human-readable, comma-joined field-level change summary
/// recorded with an UPDATE audit event.
///
/// Only scalar money/status fields that actually changed are listed;
/// an untouched bill yields an empty string.
pub fn sale_change_summary(old: &Sale, new: &Sale) -> String {
    let mut changes: Vec<String> = Vec::new();

    let mut diff = |field: &str, old_val: String, new_val: String| {
        if old_val != new_val {
            changes.push(format!("{}: {} -> {}", field, old_val, new_val));
        }
    };

    diff(
        "grossAmount",
        Money::from_cents(old.gross_cents).to_string(),
        Money::from_cents(new.gross_cents).to_string(),
    );
    diff(
        "discount",
        Money::from_cents(old.discount_cents).to_string(),
        Money::from_cents(new.discount_cents).to_string(),
    );
    diff(
        "netAmount",
        Money::from_cents(old.net_cents).to_string(),
        Money::from_cents(new.net_cents).to_string(),
    );
    diff(
        "dueAmount",
        Money::from_cents(old.due_cents).to_string(),
        Money::from_cents(new.due_cents).to_string(),
    );
    diff(
        "paymentStatus",
        format!("{:?}", old.payment_status),
        format!("{:?}", new.payment_status),
    );

    changes.join(", ")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BillType, PaymentStatus};
    use chrono::Utc;

    #[test]
    fn test_format_bill_number() {
        assert_eq!(format_bill_number(1), "INV0001");
        assert_eq!(format_bill_number(42), "INV0042");
        assert_eq!(format_bill_number(9999), "INV9999");
        // Past the pad width the number simply widens.
        assert_eq!(format_bill_number(10000), "INV10000");
    }

    #[test]
    fn test_parse_bill_number() {
        assert_eq!(parse_bill_number("INV0001").unwrap(), 1);
        assert_eq!(parse_bill_number("INV0310").unwrap(), 310);
        assert_eq!(parse_bill_number("INV10000").unwrap(), 10000);
    }

    #[test]
    fn test_parse_rejects_corrupt_numbers() {
        for bad in ["", "INV", "INVx1", "0001", "BILL0001", "INV-001"] {
            let err = parse_bill_number(bad).unwrap_err();
            assert!(
                matches!(err, CoreError::BillNumberCorrupt { .. }),
                "expected corrupt error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_next_bill_number() {
        assert_eq!(next_bill_number(None).unwrap(), "INV0001");
        assert_eq!(next_bill_number(Some("INV0001")).unwrap(), "INV0002");
        assert_eq!(next_bill_number(Some("INV0099")).unwrap(), "INV0100");
    }

    #[test]
    fn test_next_bill_number_fails_loudly_on_corrupt_input() {
        // A corrupt stored number must never silently restart the
        // sequence at 1.
        assert!(next_bill_number(Some("WHAT-IS-THIS")).is_err());
    }

    #[test]
    fn test_compute_line_totals() {
        let totals = compute_line_totals(
            Money::from_cents(10000),
            3,
            Money::zero(),
            TaxRate::from_bps(500),
        );
        assert_eq!(totals.tax.cents(), 1500);
        assert_eq!(totals.total.cents(), 31500);
    }

    #[test]
    fn test_compute_line_totals_with_discount() {
        // 50.00 × 2 − 10.00 + 10% tax on the undiscounted line
        let totals = compute_line_totals(
            Money::from_cents(5000),
            2,
            Money::from_cents(1000),
            TaxRate::from_bps(1000),
        );
        assert_eq!(totals.tax.cents(), 1000);
        assert_eq!(totals.total.cents(), 10000);
    }

    fn sale_fixture() -> Sale {
        let now = Utc::now();
        Sale {
            id: "s1".into(),
            site_id: "site1".into(),
            bill_no: "INV0001".into(),
            bill_type: BillType::Walkin,
            patient_id: None,
            appointment_id: None,
            consultant_id: None,
            gross_cents: 30000,
            discount_cents: 0,
            net_cents: 31500,
            paid_cents: 31500,
            due_cents: 0,
            payment_status: PaymentStatus::Paid,
            created_by: "u1".into(),
            created_at: now,
            is_edited: false,
            edited_at: None,
            edited_by: None,
            edit_reason: None,
        }
    }

    #[test]
    fn test_sale_change_summary() {
        let old = sale_fixture();
        let mut new = old.clone();
        new.net_cents = 52500;
        new.due_cents = 21000;
        new.payment_status = PaymentStatus::Partial;

        let summary = sale_change_summary(&old, &new);
        assert_eq!(
            summary,
            "netAmount: 315.00 -> 525.00, dueAmount: 0.00 -> 210.00, \
             paymentStatus: Paid -> Partial"
        );
    }

    #[test]
    fn test_sale_change_summary_no_changes() {
        let old = sale_fixture();
        assert_eq!(sale_change_summary(&old, &old.clone()), "");
    }
}
