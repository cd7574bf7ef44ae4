#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};

use retail_core::database::entities::{self, EntityDef};
use retail_core::database::memory::MemoryStore;
use retail_core::database::record::Record;
use retail_core::database::repository::Repository;
use retail_core::database::store::Store;
use retail_core::observer::ObserverPipeline;
use retail_core::tenancy::{ExecutionContext, Principal, TenantId};

/// In-memory store plus the standard pipeline; no database required
pub struct Fixture {
    pub store: MemoryStore,
    pub pipeline: Arc<ObserverPipeline>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            pipeline: Arc::new(ObserverPipeline::standard()),
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn Store> {
        Arc::new(self.store.clone())
    }

    /// Live request acting as `principal` (or anonymous)
    pub fn request(&self, entity: &'static EntityDef, principal: Option<&Principal>) -> Repository {
        Repository::new(
            entity,
            self.dyn_store(),
            self.pipeline.clone(),
            principal.cloned(),
            ExecutionContext::Request,
        )
    }

    /// Scheduled job or CLI without a principal
    pub fn background(&self, entity: &'static EntityDef) -> Repository {
        Repository::new(entity, self.dyn_store(), self.pipeline.clone(), None, ExecutionContext::Background)
    }

    /// Fixture setup mode of the test harness
    pub fn setup(&self, entity: &'static EntityDef) -> Repository {
        Repository::new(
            entity,
            self.dyn_store(),
            self.pipeline.clone(),
            None,
            ExecutionContext::Test { open_setup: true },
        )
    }

    /// Insert a row for `tenant` through the trusted setup path
    pub async fn seed(&self, entity: &'static EntityDef, tenant: TenantId, mut data: Value) -> Result<Record> {
        data["tenant_id"] = tenant.to_value();
        Ok(self.setup(entity).create(data).await?)
    }

    pub async fn work_order(&self, principal: &Principal, numero: i64) -> Result<Record> {
        Ok(self
            .request(entities::WORK_ORDERS, Some(principal))
            .create(json!({ "numero": numero, "status": "aberta", "descricao": "Troca de tela" }))
            .await?)
    }
}

pub fn numbers(records: &[Record], field: &str) -> Vec<i64> {
    let mut values: Vec<i64> = records.iter().filter_map(|r| r.get(field)?.as_i64()).collect();
    values.sort_unstable();
    values
}
