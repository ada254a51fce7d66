use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "invoices.approve").
/// A special wildcard permission `"*"` can be used by policy layers to indicate
/// "allow all" without hardcoding domain permissions into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role→permission policy.
///
/// - "admin" grants all permissions in the current tenant.
/// - "reviewer" grants the invoice review workflow.
/// - "viewer" (and any unknown role) grants read-only access, which needs
///   no command permissions.
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == "admin") {
        return vec![Permission::new("*")];
    }

    if roles.iter().any(|r| r.as_str() == "reviewer") {
        return vec![
            Permission::new("invoices.upload"),
            Permission::new("invoices.approve"),
            Permission::new("invoices.reject"),
            Permission::new("invoices.review"),
            Permission::new("compliance.run"),
            Permission::new("lines.adjust"),
            Permission::new("lines.accept"),
            Permission::new("lines.reject"),
        ];
    }

    Vec::new()
}
