//! # Principal
//!
//! The verified identity behind a request, derived from token claims.
//!
//! ## Roles
//!
//! Roles are totally ordered so that "at least MANAGER" checks are a single
//! comparison:
//!
//! `CUSTOMER < CASHIER < SUPPORT < MANAGER < ADMIN < SUPER_ADMIN`
//!
//! Each role also grants a fixed permission set (see [`Role::grants`]).
//! Explicit permissions in the token are added on top of role grants.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stockroom_core::{EntityKind, OrganizationId};
use uuid::Uuid;

use crate::claims::Claims;
use crate::error::AuthError;

/// Store roles, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Cashier,
    Support,
    Manager,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Customer,
        Role::Cashier,
        Role::Support,
        Role::Manager,
        Role::Admin,
        Role::SuperAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Cashier => "CASHIER",
            Self::Support => "SUPPORT",
            Self::Manager => "MANAGER",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Parse `ADMIN`, `admin` or `ROLE_ADMIN`.
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.strip_prefix("ROLE_").unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(name))
    }

    /// Permissions implied by holding this role.
    pub fn grants(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Self::SuperAdmin | Self::Admin => &Permission::ALL,
            Self::Manager => &[
                ProductRead,
                ProductWrite,
                CategoryRead,
                CategoryWrite,
                DiscountRead,
                DiscountWrite,
            ],
            Self::Support => &[ProductRead, CategoryRead, DiscountRead, AuditRead],
            Self::Cashier => &[ProductRead, CategoryRead, DiscountRead],
            Self::Customer => &[ProductRead, CategoryRead],
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ProductRead,
    ProductWrite,
    CategoryRead,
    CategoryWrite,
    DiscountRead,
    DiscountWrite,
    AuditRead,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::ProductRead,
        Permission::ProductWrite,
        Permission::CategoryRead,
        Permission::CategoryWrite,
        Permission::DiscountRead,
        Permission::DiscountWrite,
        Permission::AuditRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductRead => "PRODUCT_READ",
            Self::ProductWrite => "PRODUCT_WRITE",
            Self::CategoryRead => "CATEGORY_READ",
            Self::CategoryWrite => "CATEGORY_WRITE",
            Self::DiscountRead => "DISCOUNT_READ",
            Self::DiscountWrite => "DISCOUNT_WRITE",
            Self::AuditRead => "AUDIT_READ",
        }
    }

    /// Parse `PRODUCT_READ` or the scope form `product:read`.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.replace(':', "_");
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(&normalized))
    }

    /// The read or write permission for a record kind.
    pub fn for_kind(kind: EntityKind, write: bool) -> Self {
        match (kind, write) {
            (EntityKind::Product, false) => Self::ProductRead,
            (EntityKind::Product, true) => Self::ProductWrite,
            (EntityKind::Category, false) => Self::CategoryRead,
            (EntityKind::Category, true) => Self::CategoryWrite,
            (EntityKind::Discount, false) => Self::DiscountRead,
            (EntityKind::Discount, true) => Self::DiscountWrite,
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: String,
    pub issuer: String,
    /// Tenant the caller acts for. Callers without one are denied every
    /// record operation.
    pub organization_id: Option<OrganizationId>,
    pub store_id: Option<Uuid>,
    pub roles: BTreeSet<Role>,
    /// Explicit permissions from the token, excluding role grants.
    pub permissions: BTreeSet<Permission>,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    /// Build a principal from verified claims.
    ///
    /// Unknown authorities are ignored so that issuers may carry
    /// authorities meant for other services.
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let organization_id = claims
            .organization_id
            .as_deref()
            .map(|s| {
                s.parse::<OrganizationId>()
                    .map_err(|_| AuthError::InvalidClaims("organization_id is not a UUID".into()))
            })
            .transpose()?;
        let store_id = claims
            .store_id
            .as_deref()
            .map(|s| {
                Uuid::parse_str(s)
                    .map_err(|_| AuthError::InvalidClaims("store_id is not a UUID".into()))
            })
            .transpose()?;
        let expires_at = claims
            .expires_at()
            .ok_or_else(|| AuthError::InvalidClaims("exp out of range".into()))?;

        let mut roles = BTreeSet::new();
        let mut permissions = BTreeSet::new();
        for authority in claims.all_authorities() {
            if authority.starts_with("ROLE_") {
                if let Some(role) = Role::parse(authority) {
                    roles.insert(role);
                }
            } else if let Some(permission) = Permission::parse(authority) {
                permissions.insert(permission);
            }
        }

        Ok(Self {
            subject: claims.sub.clone(),
            issuer: claims.iss.clone(),
            organization_id,
            store_id,
            roles,
            permissions,
            expires_at,
        })
    }

    /// Highest role held, if any.
    pub fn highest_role(&self) -> Option<Role> {
        self.roles.iter().next_back().copied()
    }

    /// Whether any held role is at or above `minimum`.
    pub fn has_role_at_least(&self, minimum: Role) -> bool {
        self.highest_role().is_some_and(|r| r >= minimum)
    }

    /// Explicit or role-granted permission.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
            || self
                .roles
                .iter()
                .any(|r| r.grants().contains(&permission))
    }
}
