use lexbill_core::TenantId;

use crate::job::ComplianceJob;
use crate::result::{ComplianceError, ComplianceReport};

/// Tenant scope for execution.
///
/// - `Any`: run jobs for any tenant (useful for shared workers).
/// - `Tenant`: only accept jobs for the specified tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TenantScope {
    Any,
    Tenant(TenantId),
}

impl TenantScope {
    pub fn allows(&self, tenant_id: TenantId) -> bool {
        match self {
            TenantScope::Any => true,
            TenantScope::Tenant(t) => *t == tenant_id,
        }
    }
}

/// Scheduler/executor for compliance jobs.
///
/// This is intentionally minimal and storage/runtime agnostic.
pub trait ComplianceScheduler: Send + Sync + 'static {
    fn scope(&self) -> TenantScope;

    fn run<J: ComplianceJob>(&self, job: J) -> Result<ComplianceReport, ComplianceError> {
        if !self.scope().allows(job.tenant_id()) {
            return Err(ComplianceError::InvalidInput(
                "tenant scope violation (job tenant not allowed by scheduler)".to_string(),
            ));
        }
        job.run()
    }
}

/// Simple synchronous scheduler that runs jobs immediately in-process.
#[derive(Debug, Copy, Clone)]
pub struct LocalComplianceScheduler {
    scope: TenantScope,
}

impl LocalComplianceScheduler {
    pub fn new(scope: TenantScope) -> Self {
        Self { scope }
    }

    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self::new(TenantScope::Tenant(tenant_id))
    }
}

impl ComplianceScheduler for LocalComplianceScheduler {
    fn scope(&self) -> TenantScope {
        self.scope
    }
}
