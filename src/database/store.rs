use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::database::manager::DatabaseError;
use crate::database::record::Record;
use crate::filter::Filter;

/// Storage backend able to open units of work
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    /// Short backend name for logs and `/health`
    fn backend(&self) -> &'static str;
}

/// One unit of work. Dropping it without `commit` discards every change.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn select(&mut self, filter: &Filter) -> Result<Vec<Record>, DatabaseError>;

    async fn count(&mut self, filter: &Filter) -> Result<i64, DatabaseError>;

    async fn insert(&mut self, table: &str, record: &Record) -> Result<Record, DatabaseError>;

    /// Apply `changes` to every row the filter matches, returning the updated rows
    async fn update(
        &mut self,
        filter: &Filter,
        changes: &Map<String, Value>,
    ) -> Result<Vec<Record>, DatabaseError>;

    /// Physically remove matching rows, returning them as they were
    async fn delete(&mut self, filter: &Filter) -> Result<Vec<Record>, DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}
