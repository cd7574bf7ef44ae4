use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::entities::{self, EntityDef};
use crate::database::manager::DatabaseError;
use crate::database::record::{Record, RecordError};
use crate::database::store::{Store, StoreTransaction};
use crate::filter::{FilterData, FilterError, TrashedMode};
use crate::observer::{KeyReassignment, ObserverContext, ObserverError, ObserverPipeline, Operation};
use crate::tenancy::{ExecutionContext, Principal, TenantMode};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Cannot resolve an owning tenant for new '{0}' record")]
    TenantRequired(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<ObserverError> for RepositoryError {
    fn from(error: ObserverError) -> Self {
        match error {
            ObserverError::ValidationError(msg) => RepositoryError::Validation(msg),
            ObserverError::TenantRequired(entity) => RepositoryError::TenantRequired(entity),
            ObserverError::NotFound(msg) => RepositoryError::NotFound(msg),
            ObserverError::TimeoutError(msg) => RepositoryError::Timeout(msg),
            ObserverError::SystemError(msg) => RepositoryError::Internal(msg),
            ObserverError::Database(db) => db.into(),
        }
    }
}

impl From<DatabaseError> for RepositoryError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::Conflict(msg) => RepositoryError::Conflict(msg),
            DatabaseError::NotFound(msg) => RepositoryError::NotFound(msg),
            other => RepositoryError::Database(other),
        }
    }
}

impl From<FilterError> for RepositoryError {
    fn from(error: FilterError) -> Self {
        RepositoryError::Validation(error.to_string())
    }
}

impl From<RecordError> for RepositoryError {
    fn from(error: RecordError) -> Self {
        RepositoryError::Validation(error.to_string())
    }
}

/// Result of a restore: the reactivated rows plus any business keys moved to avoid a collision
#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub records: Vec<Record>,
    pub reassigned: Vec<KeyReassignment>,
}

/// Entity accessor. Every call runs the observer pipeline inside one unit of work.
///
/// Scoped to the principal's tenant by default; `without_tenant_scope`,
/// `with_trashed` and `only_trashed` return adjusted copies.
#[derive(Clone)]
pub struct Repository {
    entity: &'static EntityDef,
    store: Arc<dyn Store>,
    pipeline: Arc<ObserverPipeline>,
    principal: Option<Principal>,
    execution: ExecutionContext,
    tenant_mode: TenantMode,
    trashed: TrashedMode,
}

impl Repository {
    pub fn new(
        entity: &'static EntityDef,
        store: Arc<dyn Store>,
        pipeline: Arc<ObserverPipeline>,
        principal: Option<Principal>,
        execution: ExecutionContext,
    ) -> Self {
        Self {
            entity,
            store,
            pipeline,
            principal,
            execution,
            tenant_mode: TenantMode::Scoped,
            trashed: TrashedMode::Without,
        }
    }

    /// Repository for an entity looked up by API name
    pub fn for_name(
        name: &str,
        store: Arc<dyn Store>,
        pipeline: Arc<ObserverPipeline>,
        principal: Option<Principal>,
        execution: ExecutionContext,
    ) -> Result<Self, RepositoryError> {
        let entity = entities::lookup(name).ok_or_else(|| RepositoryError::UnknownEntity(name.to_string()))?;
        Ok(Self::new(entity, store, pipeline, principal, execution))
    }

    /// Same principal and context, different entity
    pub fn sibling(&self, entity: &'static EntityDef) -> Self {
        Self {
            entity,
            ..self.clone()
        }
    }

    /// Explicit administrative bypass of the tenant filter.
    ///
    /// Callers that must stay within one tenant add their own `tenant_id` condition.
    pub fn without_tenant_scope(mut self) -> Self {
        tracing::debug!(entity = self.entity.name, "tenant scope bypassed");
        self.tenant_mode = TenantMode::Bypassed;
        self
    }

    pub fn with_trashed(mut self) -> Self {
        self.trashed = TrashedMode::With;
        self
    }

    pub fn only_trashed(mut self) -> Self {
        self.trashed = TrashedMode::Only;
        self
    }

    pub fn trashed(mut self, mode: TrashedMode) -> Self {
        self.trashed = mode;
        self
    }

    pub fn entity(&self) -> &'static EntityDef {
        self.entity
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn pipeline(&self) -> &Arc<ObserverPipeline> {
        &self.pipeline
    }

    // ========================================
    // Reads
    // ========================================

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<Record>, RepositoryError> {
        let mut ctx = self.context(Operation::Select, self.trashed);
        ctx.filter.assign(filter_data)?;
        Ok(self.run(ctx).await?.into_result())
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<Record>, RepositoryError> {
        let filter_data = FilterData {
            limit: Some(1),
            ..filter_data
        };
        Ok(self.select_any(filter_data).await?.into_iter().next())
    }

    pub async fn select_404(&self, filter_data: FilterData) -> Result<Record, RepositoryError> {
        self.select_one(filter_data)
            .await?
            .ok_or_else(|| self.not_found())
    }

    pub async fn select_id(&self, id: Uuid) -> Result<Record, RepositoryError> {
        self.select_404(Self::by_id(id)).await
    }

    // ========================================
    // Writes
    // ========================================

    pub async fn create(&self, input: Value) -> Result<Record, RepositoryError> {
        self.create_all(vec![input])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Internal(format!("{} create returned no row", self.entity.name)))
    }

    pub async fn create_all(&self, inputs: Vec<Value>) -> Result<Vec<Record>, RepositoryError> {
        let mut ctx = self.context(Operation::Create, self.trashed);
        ctx.records = inputs
            .into_iter()
            .map(Record::from_json)
            .collect::<Result<_, _>>()?;
        Ok(self.run(ctx).await?.into_result())
    }

    /// Apply `patch` to one row. A `tenant_id` in the patch is dropped.
    pub async fn update(&self, id: Uuid, patch: Value) -> Result<Record, RepositoryError> {
        let mut ctx = self.context(Operation::Update, self.trashed);
        ctx.filter.and_where(json!({ "id": id.to_string() }))?;
        ctx.patch = Some(Record::from_json(patch)?);
        ctx.require_targets = true;
        self.first(self.run(ctx).await?)
    }

    /// Soft delete for audited entities, hard delete otherwise.
    ///
    /// Deleting an audited row that is already in the trash stamps it again with
    /// the current principal and reason.
    pub async fn delete(&self, id: Uuid, reason: Option<&str>) -> Result<Record, RepositoryError> {
        let mut ctx = self.context(Operation::Delete, self.delete_mode());
        ctx.filter.and_where(json!({ "id": id.to_string() }))?;
        ctx.reason = reason.map(str::to_string);
        ctx.require_targets = true;
        self.first(self.run(ctx).await?)
    }

    /// Return one soft-deleted row to active. Active rows are not found.
    pub async fn restore(&self, id: Uuid) -> Result<RestoreOutcome, RepositoryError> {
        let mut ctx = self.restore_context(json!({ "id": id.to_string() }))?;
        ctx.require_targets = true;
        let ctx = self.run(ctx).await?;
        Ok(Self::restore_outcome(ctx))
    }

    /// Restore every soft-deleted row matching `where_clause`
    pub async fn restore_where(&self, where_clause: Value) -> Result<RestoreOutcome, RepositoryError> {
        let ctx = self.restore_context(where_clause)?;
        let ctx = self.run(ctx).await?;
        Ok(Self::restore_outcome(ctx))
    }

    /// Irreversible physical removal, from active or deleted
    pub async fn purge(&self, id: Uuid) -> Result<Record, RepositoryError> {
        let mut ctx = self.context(Operation::Purge, TrashedMode::With);
        ctx.filter.and_where(json!({ "id": id.to_string() }))?;
        ctx.require_targets = true;
        self.first(self.run(ctx).await?)
    }

    // ========================================
    // Inside a caller-owned unit of work
    // ========================================

    /// Restore inside `tx`. The caller commits and then calls [`Repository::finish`].
    pub async fn restore_in(
        &self,
        tx: &mut dyn StoreTransaction,
        where_clause: Value,
        require_targets: bool,
    ) -> Result<ObserverContext, RepositoryError> {
        let mut ctx = self.restore_context(where_clause)?;
        ctx.require_targets = require_targets;
        self.pipeline.execute(&mut ctx, tx).await?;
        Ok(ctx)
    }

    /// Delete every row matching `where_clause` inside a caller-owned transaction.
    ///
    /// Honours the repository's trashed mode as is: by default rows already in the
    /// trash are left alone. Call [`finish`](Self::finish) after commit.
    pub async fn delete_in(
        &self,
        tx: &mut dyn StoreTransaction,
        where_clause: Value,
        reason: Option<&str>,
        require_targets: bool,
    ) -> Result<ObserverContext, RepositoryError> {
        let mut ctx = self.context(Operation::Delete, self.trashed);
        ctx.filter.and_where(where_clause)?;
        ctx.reason = reason.map(str::to_string);
        ctx.require_targets = require_targets;
        self.pipeline.execute(&mut ctx, tx).await?;
        Ok(ctx)
    }

    /// Run the post-commit audit ring for a context executed with a `_in` method
    pub async fn finish(&self, ctx: &ObserverContext) {
        self.pipeline.execute_audit(ctx).await;
    }

    pub fn restore_outcome(ctx: ObserverContext) -> RestoreOutcome {
        let reassigned = ctx.reassigned.clone();
        RestoreOutcome {
            records: ctx.into_result(),
            reassigned,
        }
    }

    // ========================================
    // Internals
    // ========================================

    fn context(&self, operation: Operation, trashed: TrashedMode) -> ObserverContext {
        let mut ctx = ObserverContext::new(operation, self.entity, self.principal.clone(), self.execution);
        ctx.tenant_mode = self.tenant_mode;
        ctx.filter.set_trashed(trashed);
        ctx
    }

    /// Trashed rows of audited entities stay deletable so a second delete re-stamps them
    fn delete_mode(&self) -> TrashedMode {
        match self.trashed {
            TrashedMode::Without if self.entity.audited => TrashedMode::With,
            mode => mode,
        }
    }

    fn restore_context(&self, where_clause: Value) -> Result<ObserverContext, RepositoryError> {
        if !self.entity.audited {
            return Err(RepositoryError::Validation(format!(
                "{} records are not soft deleted",
                self.entity.name
            )));
        }
        let mut ctx = self.context(Operation::Restore, TrashedMode::Only);
        ctx.filter.and_where(where_clause)?;
        Ok(ctx)
    }

    /// One unit of work: pipeline, then commit or roll back, then the audit ring
    async fn run(&self, mut ctx: ObserverContext) -> Result<ObserverContext, RepositoryError> {
        let mut tx = self.store.begin().await?;

        match self.pipeline.execute(&mut ctx, tx.as_mut()).await {
            Ok(()) => {
                tx.commit().await?;
            }
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::error!("Rollback failed after {}: {}", error, rollback_error);
                }
                return Err(error.into());
            }
        }

        self.pipeline.execute_audit(&ctx).await;
        Ok(ctx)
    }

    fn first(&self, ctx: ObserverContext) -> Result<Record, RepositoryError> {
        ctx.into_result().into_iter().next().ok_or_else(|| self.not_found())
    }

    fn not_found(&self) -> RepositoryError {
        RepositoryError::NotFound(format!("{} record not found", self.entity.name))
    }

    fn by_id(id: Uuid) -> FilterData {
        FilterData {
            where_clause: Some(json!({ "id": id.to_string() })),
            ..Default::default()
        }
    }
}
