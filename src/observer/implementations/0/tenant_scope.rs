// Ring 0: Scope - narrows every query on a tenant-owned entity to the caller's tenant
use async_trait::async_trait;

use crate::database::entities::EntityDef;
use crate::database::store::StoreTransaction;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};
use crate::tenancy::{resolve_scope, TenantScope};

#[derive(Default)]
pub struct TenantScopeObserver;

impl Observer for TenantScopeObserver {
    fn name(&self) -> &'static str {
        "TenantScopeObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Scope
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        // Creates have no query; ownership is stamped instead
        op != Operation::Create
    }

    fn applies_to_entity(&self, entity: &EntityDef) -> bool {
        entity.tenant_owned
    }

    fn priority(&self) -> u8 {
        10
    }
}

#[async_trait]
impl SyncObserver for TenantScopeObserver {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        _tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        let scope = resolve_scope(ctx.principal(), ctx.execution, ctx.tenant_mode);

        if scope == TenantScope::Nothing {
            tracing::debug!(
                "No tenant resolvable for {:?} on {} in {:?} context, query forced empty",
                ctx.operation,
                ctx.entity.name,
                ctx.execution
            );
        }

        ctx.filter.set_scope(scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities;
    use crate::database::memory::MemoryStore;
    use crate::database::store::Store;
    use crate::tenancy::{ExecutionContext, Principal, TenantId, TenantMode};

    #[tokio::test]
    async fn resolves_scope_from_principal() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let tenant = TenantId::new();

        let mut ctx = ObserverContext::new(
            Operation::Select,
            entities::PRODUCTS,
            Some(Principal::member(tenant, "ana")),
            ExecutionContext::Request,
        );
        TenantScopeObserver.execute(&mut ctx, tx.as_mut()).await.unwrap();
        assert_eq!(ctx.filter.scope(), &TenantScope::Tenant(tenant));

        let mut ctx = ObserverContext::new(Operation::Select, entities::PRODUCTS, None, ExecutionContext::Request);
        TenantScopeObserver.execute(&mut ctx, tx.as_mut()).await.unwrap();
        assert_eq!(ctx.filter.scope(), &TenantScope::Nothing);

        let mut ctx = ObserverContext::new(Operation::Select, entities::PRODUCTS, None, ExecutionContext::Request);
        ctx.tenant_mode = TenantMode::Bypassed;
        TenantScopeObserver.execute(&mut ctx, tx.as_mut()).await.unwrap();
        assert_eq!(ctx.filter.scope(), &TenantScope::Unscoped);
    }

    #[test]
    fn skips_global_entities_and_creates() {
        assert!(!TenantScopeObserver.applies_to_entity(entities::TENANTS));
        assert!(TenantScopeObserver.applies_to_entity(entities::CATEGORIES));
        assert!(!TenantScopeObserver.applies_to_operation(Operation::Create));
        assert!(TenantScopeObserver.applies_to_operation(Operation::Purge));
    }
}
