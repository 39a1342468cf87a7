//! # Authorization Policy
//!
//! Decides whether a [`Principal`] may perform an [`Operation`].
//!
//! | Operation | Requires |
//! |---|---|
//! | read records of kind K | `K_READ` |
//! | create / update / soft-delete K | `K_WRITE` |
//! | hard-delete (purge) K | `K_WRITE` and role ADMIN or above |
//! | read the audit trail | `AUDIT_READ` |
//!
//! Every operation additionally requires the principal to carry an
//! organization.

use stockroom_core::EntityKind;
use thiserror::Error;

use crate::principal::{Permission, Principal, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    Purge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Records(EntityKind),
    AuditTrail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub resource: Resource,
    pub action: Action,
}

impl Operation {
    pub fn read(kind: EntityKind) -> Self {
        Self {
            resource: Resource::Records(kind),
            action: Action::Read,
        }
    }

    pub fn write(kind: EntityKind) -> Self {
        Self {
            resource: Resource::Records(kind),
            action: Action::Write,
        }
    }

    pub fn purge(kind: EntityKind) -> Self {
        Self {
            resource: Resource::Records(kind),
            action: Action::Purge,
        }
    }

    pub fn read_audit() -> Self {
        Self {
            resource: Resource::AuditTrail,
            action: Action::Read,
        }
    }
}

/// Authorization refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("access denied: {reason}")]
pub struct Denied {
    pub reason: String,
}

impl Denied {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Check `operation` against the principal's roles and permissions.
pub fn authorize(principal: &Principal, operation: Operation) -> Result<(), Denied> {
    if principal.organization_id.is_none() {
        return Err(Denied::new("token carries no organization"));
    }

    let required = match (operation.resource, operation.action) {
        (Resource::Records(kind), Action::Read) => Permission::for_kind(kind, false),
        (Resource::Records(kind), Action::Write) => Permission::for_kind(kind, true),
        (Resource::Records(kind), Action::Purge) => {
            if !principal.has_role_at_least(Role::Admin) {
                return Err(Denied::new("hard delete requires ADMIN"));
            }
            Permission::for_kind(kind, true)
        }
        (Resource::AuditTrail, Action::Read) => Permission::AuditRead,
        (Resource::AuditTrail, _) => return Err(Denied::new("the audit trail is read-only")),
    };

    if principal.has_permission(required) {
        Ok(())
    } else {
        Err(Denied::new(format!("missing permission {required}")))
    }
}
