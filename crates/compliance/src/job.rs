use lexbill_core::TenantId;

use crate::result::{ComplianceError, ComplianceReport};

/// A tenant-scoped compliance review unit.
///
/// Jobs consume read-model snapshots via their `Input` type. This crate stays
/// storage-agnostic: inputs are provided by callers (infra/API).
pub trait ComplianceJob: Send + Sync + 'static {
    type Input: Send + Sync + 'static;

    /// The tenant this job belongs to (tenant-safe execution model).
    fn tenant_id(&self) -> TenantId;

    /// The input snapshot the job will review.
    fn input(&self) -> &Self::Input;

    /// Run the review and return a report.
    ///
    /// Must not mutate domain state.
    fn run(&self) -> Result<ComplianceReport, ComplianceError>;
}
