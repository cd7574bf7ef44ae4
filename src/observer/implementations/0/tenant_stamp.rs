// Ring 0: Scope - stamps the owning tenant on new records
use async_trait::async_trait;

use crate::database::entities::EntityDef;
use crate::database::store::StoreTransaction;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};
use crate::tenancy::stamp_tenant;

#[derive(Default)]
pub struct TenantStampObserver;

impl Observer for TenantStampObserver {
    fn name(&self) -> &'static str {
        "TenantStampObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Scope
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Create
    }

    fn applies_to_entity(&self, entity: &EntityDef) -> bool {
        entity.tenant_owned
    }

    fn priority(&self) -> u8 {
        20
    }
}

#[async_trait]
impl SyncObserver for TenantStampObserver {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        _tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        let principal = ctx.principal.clone();
        for record in ctx.records.iter_mut() {
            stamp_tenant(
                record,
                principal.as_ref(),
                ctx.execution,
                ctx.tenant_mode,
                ctx.entity.name,
            )?;
        }
        Ok(())
    }
}
