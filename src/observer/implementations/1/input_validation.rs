// Ring 1: Validation - operations carry what they need
use async_trait::async_trait;

use crate::database::store::StoreTransaction;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

#[derive(Default)]
pub struct InputValidationObserver;

impl Observer for InputValidationObserver {
    fn name(&self) -> &'static str {
        "InputValidationObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }
}

#[async_trait]
impl SyncObserver for InputValidationObserver {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        _tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        match ctx.operation {
            Operation::Create if ctx.records.is_empty() => Err(ObserverError::ValidationError(
                format!("No {} records to create", ctx.entity.name),
            )),
            Operation::Update => match &ctx.patch {
                Some(patch) if patch.has_changes() => Ok(()),
                _ => Err(ObserverError::ValidationError(format!(
                    "Nothing to update on {}",
                    ctx.entity.name
                ))),
            },
            _ => Ok(()),
        }
    }
}
