//! In-process store for development without PostgreSQL and for tests.
//!
//! Transactions are serialised: `begin` holds the table lock until the
//! transaction is committed or dropped, and works on a staged copy that is
//! written back only on commit.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::audit::DELETED_AT;
use crate::database::entities;
use crate::database::manager::DatabaseError;
use crate::database::record::Record;
use crate::database::store::{Store, StoreTransaction};
use crate::filter::Filter;
use crate::tenancy::TENANT_FIELD;

type Tables = HashMap<String, Vec<Map<String, Value>>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of one table, unfiltered
    pub async fn rows(&self, table: &str) -> Vec<Map<String, Value>> {
        self.tables.lock().await.get(table).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl MemoryTransaction {
    fn table_mut(&mut self, table: &str) -> &mut Vec<Map<String, Value>> {
        self.staged.entry(table.to_string()).or_default()
    }

    /// Mirrors the partial unique index on `(tenant_id, <business key>) WHERE deleted_at IS NULL`
    fn check_unique(&self, table: &str) -> Result<(), DatabaseError> {
        let Some(key) = entities::by_table(table).and_then(|def| def.business_key) else {
            return Ok(());
        };
        let Some(rows) = self.staged.get(table) else {
            return Ok(());
        };

        let mut seen = HashSet::new();
        for row in rows {
            let active = row.get(DELETED_AT).map_or(true, Value::is_null);
            let value = row.get(key).filter(|v| !v.is_null());
            if let (true, Some(value)) = (active, value) {
                let tenant = row.get(TENANT_FIELD).cloned().unwrap_or(Value::Null);
                if !seen.insert((tenant.to_string(), value.to_string())) {
                    return Err(DatabaseError::Conflict(format!(
                        "duplicate {}.{} = {} for tenant {}",
                        table, key, value, tenant
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn select(&mut self, filter: &Filter) -> Result<Vec<Record>, DatabaseError> {
        let rows = self.staged.get(filter.table_name()).cloned().unwrap_or_default();
        Ok(filter.apply(rows).into_iter().map(Record::from_sql_data).collect())
    }

    async fn count(&mut self, filter: &Filter) -> Result<i64, DatabaseError> {
        let count = self
            .staged
            .get(filter.table_name())
            .map_or(0, |rows| rows.iter().filter(|row| filter.matches(row)).count());
        Ok(count as i64)
    }

    async fn insert(&mut self, table: &str, record: &Record) -> Result<Record, DatabaseError> {
        let row = record.to_map();
        if let Some(id) = row.get("id") {
            if self.table_mut(table).iter().any(|r| r.get("id") == Some(id)) {
                return Err(DatabaseError::Conflict(format!("duplicate {}.id = {}", table, id)));
            }
        }
        self.table_mut(table).push(row.clone());
        self.check_unique(table)?;
        Ok(Record::from_sql_data(row))
    }

    async fn update(
        &mut self,
        filter: &Filter,
        changes: &Map<String, Value>,
    ) -> Result<Vec<Record>, DatabaseError> {
        let table = filter.table_name().to_string();
        let mut updated = Vec::new();
        for row in self.table_mut(&table).iter_mut() {
            if filter.matches(row) {
                for (key, value) in changes {
                    row.insert(key.clone(), value.clone());
                }
                updated.push(Record::from_sql_data(row.clone()));
            }
        }
        self.check_unique(&table)?;
        Ok(updated)
    }

    async fn delete(&mut self, filter: &Filter) -> Result<Vec<Record>, DatabaseError> {
        let rows = self.table_mut(filter.table_name());
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(rows).into_iter().partition(|row| filter.matches(row));
        *rows = kept;
        Ok(removed.into_iter().map(Record::from_sql_data).collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::{TenantId, TenantScope};
    use serde_json::json;

    fn work_order(tenant: TenantId, numero: i64) -> Record {
        Record::from_sql_data(
            json!({
                "id": uuid::Uuid::new_v4().to_string(),
                "tenant_id": tenant.to_string(),
                "numero": numero,
                "deleted_at": null
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn rollback_discards_changes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert("work_orders", &work_order(TenantId::new(), 1)).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.rows("work_orders").await.is_empty());

        let mut tx = store.begin().await.unwrap();
        tx.insert("work_orders", &work_order(TenantId::new(), 1)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.rows("work_orders").await.len(), 1);
    }

    #[tokio::test]
    async fn business_key_unique_among_active_rows_per_tenant() {
        let store = MemoryStore::new();
        let tenant = TenantId::new();
        let mut tx = store.begin().await.unwrap();

        tx.insert("work_orders", &work_order(tenant, 717)).await.unwrap();
        tx.insert("work_orders", &work_order(TenantId::new(), 717)).await.unwrap();
        let err = tx.insert("work_orders", &work_order(tenant, 717)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_and_delete_honour_the_filter() {
        let store = MemoryStore::new();
        let tenant = TenantId::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert("work_orders", &work_order(tenant, 1)).await.unwrap();
        tx.insert("work_orders", &work_order(TenantId::new(), 2)).await.unwrap();

        let mut filter = Filter::for_entity(entities::WORK_ORDERS);
        filter.set_scope(TenantScope::Tenant(tenant));

        let mut changes = Map::new();
        changes.insert("status".into(), json!("fechada"));
        let updated = tx.update(&filter, &changes).await.unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].get("status"), Some(&json!("fechada")));

        let removed = tx.delete(&filter).await.unwrap();
        assert_eq!(removed.len(), 1);

        filter.set_scope(TenantScope::Unscoped);
        assert_eq!(tx.count(&filter).await.unwrap(), 1);
    }
}
