use serde::{Deserialize, Serialize};

use lexbill_core::TenantId;

/// Read-model snapshot of an invoice under review.
///
/// Identifiers are plain strings: this crate has no dependency on the billing
/// domain types and callers map ids at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub tenant_id: TenantId,
    pub invoice_id: String,
    pub line_items: Vec<LineItemSnapshot>,
}

/// The billed numbers a compliance pass needs per line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemSnapshot {
    pub line_item_id: String,
    pub ledes_row_num: u32,
    pub hours: f64,
    pub rate: f64,
    pub amount: f64,
}
