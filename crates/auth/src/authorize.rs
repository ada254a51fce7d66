use std::collections::HashSet;

use thiserror::Error;

use lexbill_core::TenantId;

use crate::{Permission, PrincipalId, TenantMembership};

/// A fully resolved principal for authorization decisions.
///
/// Construction of this object is intentionally decoupled from storage and
/// transport: the API layer derives memberships from claims and a policy source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract (checked at the command boundary).
///
/// Implement this on commands that require permissions.
/// The API layer should enforce these requirements before dispatching.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal within its active tenant context.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let perms: HashSet<&str> = principal
        .membership
        .permissions
        .iter()
        .map(|p| p.as_str())
        .collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn principal(tenant: TenantId, membership_tenant: TenantId, perms: Vec<Permission>) -> Principal {
        Principal {
            principal_id: PrincipalId::new(),
            active_tenant_id: tenant,
            membership: TenantMembership {
                tenant_id: membership_tenant,
                roles: vec![Role::new("reviewer")],
                permissions: perms,
            },
        }
    }

    #[test]
    fn wildcard_grants_everything() {
        let t = TenantId::new();
        let p = principal(t, t, vec![Permission::new("*")]);
        assert_eq!(authorize(&p, &Permission::new("invoices.approve")), Ok(()));
    }

    #[test]
    fn explicit_permission_is_honored() {
        let t = TenantId::new();
        let p = principal(t, t, vec![Permission::new("lines.adjust")]);
        assert_eq!(authorize(&p, &Permission::new("lines.adjust")), Ok(()));
        assert_eq!(
            authorize(&p, &Permission::new("invoices.approve")),
            Err(AuthzError::Forbidden("invoices.approve".to_string()))
        );
    }

    #[test]
    fn tenant_mismatch_is_rejected_before_permissions() {
        let p = principal(TenantId::new(), TenantId::new(), vec![Permission::new("*")]);
        assert_eq!(
            authorize(&p, &Permission::new("invoices.approve")),
            Err(AuthzError::TenantMismatch)
        );
    }
}
