// Ring 4: Database - storage calls for every operation, inside the unit of work
use async_trait::async_trait;
use serde_json::json;

use crate::audit::{cleared_audit_fields, deletion_marker, restoration};
use crate::database::record::Record;
use crate::database::store::StoreTransaction;
use crate::filter::TrashedMode;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

#[derive(Default)]
pub struct SqlExecutorObserver;

impl Observer for SqlExecutorObserver {
    fn name(&self) -> &'static str {
        "SqlExecutorObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Database
    }

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }
}

#[async_trait]
impl SyncObserver for SqlExecutorObserver {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        let result = match ctx.operation {
            Operation::Select => tx.select(&ctx.filter).await?,
            Operation::Create => self.create(ctx, tx).await?,
            _ if ctx.targets.is_empty() => Vec::new(),
            Operation::Update => self.update(ctx, tx).await?,
            Operation::Delete if ctx.entity.audited => self.soft_delete(ctx, tx).await?,
            Operation::Delete => tx.delete(&ctx.targets_filter()?).await?,
            Operation::Restore => self.restore(ctx, tx).await?,
            Operation::Purge => self.purge(ctx, tx).await?,
        };

        tracing::debug!(
            "{:?} on {} touched {} rows",
            ctx.operation,
            ctx.entity.name,
            result.len()
        );
        ctx.result = Some(result);
        Ok(())
    }
}

impl SqlExecutorObserver {
    async fn create(
        &self,
        ctx: &ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<Vec<Record>, ObserverError> {
        let mut created = Vec::with_capacity(ctx.records.len());
        for record in &ctx.records {
            created.push(tx.insert(ctx.filter.table_name(), record).await?);
        }
        Ok(created)
    }

    async fn update(
        &self,
        ctx: &ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<Vec<Record>, ObserverError> {
        let changes = ctx.patch.as_ref().map(Record::changes).unwrap_or_default();
        Ok(tx.update(&ctx.targets_filter()?, &changes).await?)
    }

    /// Audit fields first, then the deletion marker, both in the caller's transaction
    async fn soft_delete(
        &self,
        ctx: &ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<Vec<Record>, ObserverError> {
        let audit = ctx.deletion.as_ref().ok_or_else(|| {
            ObserverError::SystemError(format!(
                "Refusing to soft delete {} without an audit stamp",
                ctx.entity.name
            ))
        })?;

        let filter = ctx.targets_filter()?;
        tx.update(&filter, &audit.fields()).await?;
        Ok(tx.update(&filter, &deletion_marker(audit.deleted_on)).await?)
    }

    /// One update per row since each may carry its own reassigned key
    async fn restore(
        &self,
        ctx: &ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<Vec<Record>, ObserverError> {
        let mut restored = Vec::with_capacity(ctx.targets.len());

        for id in ctx.target_ids() {
            let mut changes = restoration();
            if let Some(moved) = ctx.reassigned.iter().find(|r| r.id == Some(id)) {
                changes.insert(moved.field.to_string(), json!(moved.to));
            }

            let mut filter = ctx.filter.clone();
            filter.set_trashed(TrashedMode::Only);
            filter.and_where(json!({ "id": id.to_string() }))?;
            restored.extend(tx.update(&filter, &changes).await?);
        }
        Ok(restored)
    }

    /// Audit fields are cleared immediately before the physical removal
    async fn purge(
        &self,
        ctx: &ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<Vec<Record>, ObserverError> {
        let filter = ctx.targets_filter()?;
        if ctx.entity.audited {
            tx.update(&filter, &cleared_audit_fields()).await?;
        }
        Ok(tx.delete(&filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{DeletionAudit, DELETED_AT, DELETED_BY_NAME};
    use chrono::Utc;
    use crate::database::entities;
    use crate::database::memory::MemoryStore;
    use crate::database::store::Store;
    use crate::tenancy::{ExecutionContext, TenantId, TenantScope};

    async fn seed(store: &MemoryStore, tenant: TenantId) -> Record {
        let mut tx = store.begin().await.unwrap();
        let mut record = Record::from_json(json!({ "numero": 717, "status": "aberta" })).unwrap();
        record.set_id(uuid::Uuid::new_v4());
        record.set_system_field("tenant_id", tenant.to_value());
        let stored = tx.insert("work_orders", &record).await.unwrap();
        tx.commit().await.unwrap();
        stored
    }

    #[tokio::test]
    async fn soft_delete_without_stamp_is_refused() {
        let store = MemoryStore::new();
        let tenant = TenantId::new();
        let row = seed(&store, tenant).await;

        let mut tx = store.begin().await.unwrap();
        let mut ctx = ObserverContext::new(Operation::Delete, entities::WORK_ORDERS, None, ExecutionContext::Background);
        ctx.filter.set_scope(TenantScope::Tenant(tenant));
        ctx.targets = vec![row];

        let err = SqlExecutorObserver.execute(&mut ctx, tx.as_mut()).await.unwrap_err();
        assert!(matches!(err, ObserverError::SystemError(_)));
    }

    #[tokio::test]
    async fn soft_delete_writes_stamp_and_marker() {
        let store = MemoryStore::new();
        let tenant = TenantId::new();
        let row = seed(&store, tenant).await;

        let mut tx = store.begin().await.unwrap();
        let mut ctx = ObserverContext::new(Operation::Delete, entities::WORK_ORDERS, None, ExecutionContext::Background);
        ctx.filter.set_scope(TenantScope::Tenant(tenant));
        ctx.targets = vec![row];
        ctx.deletion = Some(DeletionAudit::new(None, Some("teste"), "padrão", Utc::now()));

        SqlExecutorObserver.execute(&mut ctx, tx.as_mut()).await.unwrap();
        tx.commit().await.unwrap();

        let rows = store.rows("work_orders").await;
        assert!(!rows[0][DELETED_AT].is_null());
        assert!(rows[0][DELETED_BY_NAME].is_null());
        assert_eq!(rows[0]["justificativa_exclusao"], json!("teste"));
    }
}
