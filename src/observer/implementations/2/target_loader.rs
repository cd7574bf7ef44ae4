// Ring 2: Preparation - loads the rows an operation will touch
use async_trait::async_trait;

use crate::database::store::StoreTransaction;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

#[derive(Default)]
pub struct TargetLoaderObserver;

impl Observer for TargetLoaderObserver {
    fn name(&self) -> &'static str {
        "TargetLoaderObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Preparation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op.targets_existing()
    }

    fn priority(&self) -> u8 {
        10
    }
}

#[async_trait]
impl SyncObserver for TargetLoaderObserver {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        // Same filter, same transaction: the database ring touches exactly these rows
        ctx.targets = tx.select(&ctx.filter).await?;

        tracing::debug!(
            "Loaded {} {} targets for {:?}",
            ctx.targets.len(),
            ctx.entity.name,
            ctx.operation
        );

        if ctx.targets.is_empty() && ctx.require_targets {
            return Err(ObserverError::NotFound(format!("{} record not found", ctx.entity.name)));
        }
        Ok(())
    }
}
