//! `lexbill-compliance`
//!
//! **Responsibility:** the e-billing compliance review boundary.
//!
//! This crate is intentionally **not** part of the domain model:
//! - It must not depend on billing aggregates.
//! - It must not mutate domain state.
//! - It consumes read-model **snapshots** and emits **reports**, which higher
//!   layers may turn into domain commands.

pub mod invoice_review;
pub mod job;
pub mod result;
pub mod scheduler;
pub mod snapshot;

pub use invoice_review::InvoiceReviewJob;
pub use job::ComplianceJob;
pub use result::{
    ComplianceError, ComplianceIssue, ComplianceReport, ComplianceResult, RecommendedAction,
    Severity,
};
pub use scheduler::{ComplianceScheduler, LocalComplianceScheduler, TenantScope};
pub use snapshot::{InvoiceSnapshot, LineItemSnapshot};
