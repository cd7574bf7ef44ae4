// Ring 3: Business - turns deletes of audited entities into attributed soft deletes
use async_trait::async_trait;
use chrono::Utc;

use crate::audit::DeletionAudit;
use crate::config::CONFIG;
use crate::database::entities::EntityDef;
use crate::database::store::StoreTransaction;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

#[derive(Default)]
pub struct SoftDeleteObserver;

impl Observer for SoftDeleteObserver {
    fn name(&self) -> &'static str {
        "SoftDeleteObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Business
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Delete
    }

    fn applies_to_entity(&self, entity: &EntityDef) -> bool {
        entity.audited
    }
}

#[async_trait]
impl SyncObserver for SoftDeleteObserver {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        _tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        let audit = DeletionAudit::new(
            ctx.principal(),
            ctx.reason.as_deref(),
            &CONFIG.audit.default_reason,
            Utc::now(),
        );

        if !audit.is_attributed() {
            tracing::warn!(
                entity = ctx.entity.name,
                ids = ?ctx.target_ids(),
                context = ?ctx.execution,
                "Soft delete without a principal; deleter left empty"
            );
        }

        ctx.deletion = Some(audit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities;
    use crate::database::memory::MemoryStore;
    use crate::database::store::Store;
    use crate::tenancy::{ExecutionContext, Principal, TenantId};

    #[tokio::test]
    async fn stamps_principal_and_default_reason() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let principal = Principal::member(TenantId::new(), "Carlos");
        let mut ctx = ObserverContext::new(
            Operation::Delete,
            entities::WORK_ORDERS,
            Some(principal.clone()),
            ExecutionContext::Request,
        );

        SoftDeleteObserver.execute(&mut ctx, tx.as_mut()).await.unwrap();

        let audit = ctx.deletion.unwrap();
        assert_eq!(audit.deleted_by_id, Some(principal.id));
        assert_eq!(audit.deleted_by_name.as_deref(), Some("Carlos"));
        assert_eq!(audit.reason, CONFIG.audit.default_reason);
    }

    #[test]
    fn only_audited_entities() {
        assert!(SoftDeleteObserver.applies_to_entity(entities::SALES));
        assert!(!SoftDeleteObserver.applies_to_entity(entities::CATEGORIES));
    }
}
