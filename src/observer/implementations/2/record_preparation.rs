// Ring 2: Preparation - system fields on new and changed records
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::audit::timestamp_value;
use crate::database::store::StoreTransaction;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

#[derive(Default)]
pub struct RecordPreparationObserver;

impl Observer for RecordPreparationObserver {
    fn name(&self) -> &'static str {
        "RecordPreparationObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Preparation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn priority(&self) -> u8 {
        20
    }
}

#[async_trait]
impl SyncObserver for RecordPreparationObserver {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        _tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        let now = timestamp_value(Utc::now());

        match ctx.operation {
            Operation::Create => {
                for record in ctx.records.iter_mut() {
                    if record.id().is_none() {
                        record.set_id(Uuid::new_v4());
                    }
                    record.set_system_field("created_at", now.clone());
                    record.set_system_field("updated_at", now.clone());
                }
            }
            Operation::Update => {
                if let Some(patch) = ctx.patch.as_mut() {
                    patch.set_system_field("updated_at", now);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities;
    use crate::database::memory::MemoryStore;
    use crate::database::record::Record;
    use crate::database::store::Store;
    use crate::tenancy::ExecutionContext;
    use serde_json::json;

    #[tokio::test]
    async fn new_records_get_id_and_timestamps() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut ctx = ObserverContext::new(Operation::Create, entities::CATEGORIES, None, ExecutionContext::Background);
        ctx.records.push(Record::from_json(json!({ "nome": "Ferramentas" })).unwrap());

        RecordPreparationObserver.execute(&mut ctx, tx.as_mut()).await.unwrap();

        let record = &ctx.records[0];
        assert!(record.id().is_some());
        assert!(record.created_at().is_some());
        assert_eq!(record.created_at(), record.updated_at());
    }
}
