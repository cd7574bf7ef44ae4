//! Tenant isolation.
//!
//! Every query against a tenant-owned entity is narrowed to a [`TenantScope`]
//! resolved from the acting [`Principal`] and the [`ExecutionContext`] the
//! operation runs in. New rows are stamped with the principal's tenant; a
//! `tenant_id` supplied by the caller is never trusted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::database::record::Record;

/// Column carrying the owning tenant on every tenant-owned table
pub const TENANT_FIELD: &str = "tenant_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(|s| s.parse().ok())
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.0.to_string())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(TenantId)
    }
}

/// The acting identity for one operation. Built by the auth layer, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub tenant_id: Option<TenantId>,
    pub is_admin: bool,
    pub is_super_admin: bool,
}

impl Principal {
    /// Ordinary user of a tenant
    pub fn member(tenant_id: TenantId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tenant_id: Some(tenant_id),
            is_admin: false,
            is_super_admin: false,
        }
    }

    /// Per-tenant administrator: may see trashed rows and purge, still tenant-scoped
    pub fn admin(tenant_id: TenantId, name: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::member(tenant_id, name)
        }
    }

    pub fn super_admin(tenant_id: Option<TenantId>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tenant_id,
            is_admin: true,
            is_super_admin: true,
        }
    }

    pub fn can_manage_trash(&self) -> bool {
        self.is_admin || self.is_super_admin
    }
}

/// Where an operation originates. Decides what happens when no principal is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Live HTTP request
    Request,
    /// Scheduled jobs, CLI tooling, recovery scripts
    Background,
    /// Automated test harness; `open_setup` lets fixtures run without a principal
    Test { open_setup: bool },
}

impl ExecutionContext {
    /// Contexts in which a missing principal means trusted internal code
    pub fn trusts_missing_principal(&self) -> bool {
        matches!(
            self,
            ExecutionContext::Background | ExecutionContext::Test { open_setup: true }
        )
    }
}

/// Whether the default tenant filter applies to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantMode {
    #[default]
    Scoped,
    /// Explicit administrative bypass. Callers needing a single tenant add their own filter.
    Bypassed,
}

/// Result of resolving the tenant filter for one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    /// No tenant predicate
    Unscoped,
    /// `tenant_id = <id>` on the entity's own table
    Tenant(TenantId),
    /// Matches no rows
    Nothing,
}

impl TenantScope {
    /// Whether a stored row falls inside this scope
    pub fn admits(&self, row_tenant: Option<&Value>) -> bool {
        match self {
            TenantScope::Unscoped => true,
            TenantScope::Nothing => false,
            TenantScope::Tenant(tenant) => row_tenant
                .and_then(TenantId::from_value)
                .is_some_and(|t| t == *tenant),
        }
    }
}

/// Resolve the tenant filter for a read, update or delete query.
///
/// Never fails: an unresolvable tenant yields [`TenantScope::Nothing`].
pub fn resolve_scope(
    principal: Option<&Principal>,
    context: ExecutionContext,
    mode: TenantMode,
) -> TenantScope {
    if mode == TenantMode::Bypassed {
        return TenantScope::Unscoped;
    }

    match principal {
        None if context.trusts_missing_principal() => TenantScope::Unscoped,
        None => TenantScope::Nothing,
        Some(p) if p.is_super_admin => TenantScope::Unscoped,
        Some(p) => match p.tenant_id {
            Some(tenant) => TenantScope::Tenant(tenant),
            None => TenantScope::Nothing,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenancyError {
    #[error("Cannot resolve an owning tenant for new '{0}' record")]
    TenantRequired(String),
}

/// Stamp the owning tenant on a record about to be created.
///
/// With a principal the principal's tenant always wins, whatever the payload
/// says. Without one, an explicit `tenant_id` is accepted only from trusted
/// contexts or through the bypass accessor.
pub fn stamp_tenant(
    record: &mut Record,
    principal: Option<&Principal>,
    context: ExecutionContext,
    mode: TenantMode,
    entity: &str,
) -> Result<TenantId, TenancyError> {
    let supplied = record.tenant_id();

    let owner = match principal {
        Some(p) => {
            if let (Some(own), Some(other)) = (p.tenant_id, supplied) {
                if own != other {
                    tracing::warn!(
                        principal = %p.id,
                        tenant = %own,
                        supplied = %other,
                        "Ignoring foreign tenant_id on new {} record",
                        entity
                    );
                }
            }
            p.tenant_id
        }
        None if mode == TenantMode::Bypassed || context.trusts_missing_principal() => supplied,
        None => None,
    };

    let owner = owner.ok_or_else(|| TenancyError::TenantRequired(entity.to_string()))?;
    record.set_system_field(TENANT_FIELD, owner.to_value());
    Ok(owner)
}

/// Drop any attempt to re-parent a row through an update. Returns true when a change was dropped.
pub fn strip_owner_change(record: &mut Record) -> bool {
    record.remove(TENANT_FIELD).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_with_tenant(tenant: Option<TenantId>) -> Record {
        let mut record = Record::from_json(json!({ "nome": "Widget" })).unwrap();
        if let Some(t) = tenant {
            record.set_system_field(TENANT_FIELD, t.to_value());
        }
        record
    }

    #[test]
    fn member_is_scoped_to_own_tenant() {
        let tenant = TenantId::new();
        let principal = Principal::member(tenant, "ana");
        let scope = resolve_scope(Some(&principal), ExecutionContext::Request, TenantMode::Scoped);
        assert_eq!(scope, TenantScope::Tenant(tenant));
    }

    #[test]
    fn missing_principal_fails_closed_in_requests() {
        let scope = resolve_scope(None, ExecutionContext::Request, TenantMode::Scoped);
        assert_eq!(scope, TenantScope::Nothing);

        let scope = resolve_scope(None, ExecutionContext::Test { open_setup: false }, TenantMode::Scoped);
        assert_eq!(scope, TenantScope::Nothing);
    }

    #[test]
    fn missing_principal_is_trusted_in_background_and_open_tests() {
        assert_eq!(
            resolve_scope(None, ExecutionContext::Background, TenantMode::Scoped),
            TenantScope::Unscoped
        );
        assert_eq!(
            resolve_scope(None, ExecutionContext::Test { open_setup: true }, TenantMode::Scoped),
            TenantScope::Unscoped
        );
    }

    #[test]
    fn super_admin_and_bypass_are_unscoped() {
        let root = Principal::super_admin(Some(TenantId::new()), "root");
        assert_eq!(
            resolve_scope(Some(&root), ExecutionContext::Request, TenantMode::Scoped),
            TenantScope::Unscoped
        );

        let member = Principal::member(TenantId::new(), "ana");
        assert_eq!(
            resolve_scope(Some(&member), ExecutionContext::Request, TenantMode::Bypassed),
            TenantScope::Unscoped
        );
    }

    #[test]
    fn principal_without_tenant_sees_nothing() {
        let mut principal = Principal::member(TenantId::new(), "orphan");
        principal.tenant_id = None;
        assert_eq!(
            resolve_scope(Some(&principal), ExecutionContext::Request, TenantMode::Scoped),
            TenantScope::Nothing
        );
    }

    #[test]
    fn scope_admits_only_matching_rows() {
        let tenant = TenantId::new();
        let scope = TenantScope::Tenant(tenant);
        assert!(scope.admits(Some(&tenant.to_value())));
        assert!(!scope.admits(Some(&TenantId::new().to_value())));
        assert!(!scope.admits(None));
        assert!(!TenantScope::Nothing.admits(Some(&tenant.to_value())));
        assert!(TenantScope::Unscoped.admits(None));
    }

    #[test]
    fn forged_tenant_is_overridden() {
        let own = TenantId::new();
        let forged = TenantId::new();
        let principal = Principal::member(own, "ana");
        let mut record = record_with_tenant(Some(forged));

        let stamped = stamp_tenant(
            &mut record,
            Some(&principal),
            ExecutionContext::Request,
            TenantMode::Scoped,
            "customers",
        )
        .unwrap();

        assert_eq!(stamped, own);
        assert_eq!(record.tenant_id(), Some(own));
    }

    #[test]
    fn super_admin_creates_in_own_tenant_only() {
        let own = TenantId::new();
        let root = Principal::super_admin(Some(own), "root");
        let mut record = record_with_tenant(Some(TenantId::new()));
        stamp_tenant(&mut record, Some(&root), ExecutionContext::Request, TenantMode::Bypassed, "products")
            .unwrap();
        assert_eq!(record.tenant_id(), Some(own));

        let tenantless = Principal::super_admin(None, "root");
        let mut record = record_with_tenant(Some(TenantId::new()));
        let err = stamp_tenant(
            &mut record,
            Some(&tenantless),
            ExecutionContext::Request,
            TenantMode::Bypassed,
            "products",
        )
        .unwrap_err();
        assert_eq!(err, TenancyError::TenantRequired("products".to_string()));
    }

    #[test]
    fn anonymous_create_needs_trusted_context_and_explicit_tenant() {
        let tenant = TenantId::new();

        let mut record = record_with_tenant(Some(tenant));
        assert!(stamp_tenant(&mut record, None, ExecutionContext::Request, TenantMode::Scoped, "sales").is_err());

        let mut record = record_with_tenant(Some(tenant));
        let stamped =
            stamp_tenant(&mut record, None, ExecutionContext::Background, TenantMode::Scoped, "sales").unwrap();
        assert_eq!(stamped, tenant);

        let mut record = record_with_tenant(Some(tenant));
        let stamped =
            stamp_tenant(&mut record, None, ExecutionContext::Request, TenantMode::Bypassed, "sales").unwrap();
        assert_eq!(stamped, tenant);

        let mut record = record_with_tenant(None);
        assert!(stamp_tenant(&mut record, None, ExecutionContext::Background, TenantMode::Scoped, "sales").is_err());
    }

    #[test]
    fn owner_change_is_stripped_from_updates() {
        let mut patch = record_with_tenant(Some(TenantId::new()));
        assert!(strip_owner_change(&mut patch));
        assert!(patch.tenant_id().is_none());
        assert!(!strip_owner_change(&mut patch));
    }
}
