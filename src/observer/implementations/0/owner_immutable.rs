// Ring 0: Scope - the owning tenant is fixed at creation
use async_trait::async_trait;

use crate::database::entities::EntityDef;
use crate::database::store::StoreTransaction;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};
use crate::tenancy::strip_owner_change;

#[derive(Default)]
pub struct OwnerImmutableObserver;

impl Observer for OwnerImmutableObserver {
    fn name(&self) -> &'static str {
        "OwnerImmutableObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Scope
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Update
    }

    fn applies_to_entity(&self, entity: &EntityDef) -> bool {
        entity.tenant_owned
    }

    fn priority(&self) -> u8 {
        30
    }
}

#[async_trait]
impl SyncObserver for OwnerImmutableObserver {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        _tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        if let Some(patch) = ctx.patch.as_mut() {
            if strip_owner_change(patch) {
                tracing::warn!(
                    principal = ?ctx.principal.as_ref().map(|p| p.id),
                    "Dropped tenant_id change on {} update",
                    ctx.entity.name
                );
            }
        }
        Ok(())
    }
}
