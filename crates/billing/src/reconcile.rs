//! Invoice totals reconciliation.
//!
//! Spending decisions live on the line items; this module folds them into the
//! two numbers the review workflow reports: what was billed, and what survives
//! review. Rounding happens once, at the totals boundary, to two decimals.

use serde::{Deserialize, Serialize};

use crate::line_item::{LineItem, LineItemStatus};

/// Round a monetary value to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub total_original: f64,
    pub total_adjusted: f64,
}

/// Recompute invoice totals from the current line items.
///
/// `total_original` sums the billed amounts unconditionally. For
/// `total_adjusted` each item contributes:
/// - `0` when rejected,
/// - its `adjusted_amount` when adjusted and one was recorded,
/// - its original `amount` in every other case (pending, approved, reviewed,
///   and adjusted without a recorded amount).
pub fn reconcile(items: &[LineItem]) -> InvoiceTotals {
    let total_original: f64 = items.iter().map(|item| item.amount).sum();

    let total_adjusted: f64 = items
        .iter()
        .map(|item| match item.status {
            LineItemStatus::Rejected => 0.0,
            LineItemStatus::Adjusted => item.adjusted_amount.unwrap_or(item.amount),
            _ => item.amount,
        })
        .sum();

    InvoiceTotals {
        total_original: round2(total_original),
        total_adjusted: round2(total_adjusted),
    }
}
