//! `lexbill-billing` — LEDES invoice review domain.
//!
//! The aggregate here owns the full review lifecycle of an uploaded invoice:
//! ingestion, line-item adjustments, compliance findings, and the terminal
//! approve/reject decision. Totals reconciliation is a pure function in
//! [`reconcile`] so it can be shared with read models.

pub mod invoice;
pub mod line_item;
pub mod reconcile;
pub mod sample;

pub use invoice::{
    AcceptLineItem, AdjustLineItem, ApproveInvoice, ComplianceFinding, IngestInvoice, Invoice,
    InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceStatus, MarkLineItemsReviewed,
    RecordComplianceFindings, RejectInvoice, RejectLineItem,
};
pub use line_item::{
    AiAction, ComplianceIssue, LedesFormat, LineItem, LineItemId, LineItemStatus, Severity,
};
pub use reconcile::{InvoiceTotals, reconcile, round2};
