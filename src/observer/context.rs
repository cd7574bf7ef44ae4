use std::time::Instant;
use uuid::Uuid;

use crate::audit::DeletionAudit;
use crate::database::entities::EntityDef;
use crate::database::record::Record;
use crate::filter::Filter;
use crate::observer::error::ObserverError;
use crate::observer::traits::{ObserverRing, Operation};
use crate::tenancy::{ExecutionContext, Principal, TenantId, TenantMode};

/// A business key moved to a fresh value during restore
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct KeyReassignment {
    pub id: Option<Uuid>,
    pub tenant_id: Option<TenantId>,
    pub field: &'static str,
    pub from: i64,
    pub to: i64,
}

/// Everything one operation carries through the pipeline
#[derive(Debug)]
pub struct ObserverContext {
    // Core request data
    pub operation: Operation,
    pub entity: &'static EntityDef,
    pub principal: Option<Principal>,
    pub execution: ExecutionContext,
    pub tenant_mode: TenantMode,

    /// Selects the rows read or targeted by the operation
    pub filter: Filter,

    /// Create: records to insert
    pub records: Vec<Record>,
    /// Update: change set applied to every target
    pub patch: Option<Record>,
    /// Delete: justification supplied by the caller
    pub reason: Option<String>,
    /// Fail with `NotFound` when no row matches
    pub require_targets: bool,

    /// Existing rows loaded for update, delete, restore and purge
    pub targets: Vec<Record>,
    /// Attribution computed for a soft delete
    pub deletion: Option<DeletionAudit>,
    /// Business keys moved during restore
    pub reassigned: Vec<KeyReassignment>,

    /// Rows as stored after the database ring
    pub result: Option<Vec<Record>>,

    // Performance tracking
    pub start_time: Instant,
    pub current_ring: Option<ObserverRing>,

    pub errors: Vec<ObserverError>,
}

impl ObserverContext {
    pub fn new(
        operation: Operation,
        entity: &'static EntityDef,
        principal: Option<Principal>,
        execution: ExecutionContext,
    ) -> Self {
        Self {
            operation,
            entity,
            principal,
            execution,
            tenant_mode: TenantMode::Scoped,
            filter: Filter::for_entity(entity),
            records: Vec::new(),
            patch: None,
            reason: None,
            require_targets: false,
            targets: Vec::new(),
            deletion: None,
            reassigned: Vec::new(),
            result: None,
            start_time: Instant::now(),
            current_ring: None,
            errors: Vec::new(),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Ids of the loaded targets
    pub fn target_ids(&self) -> Vec<Uuid> {
        self.targets.iter().filter_map(Record::id).collect()
    }

    /// The operation's filter narrowed to the loaded targets
    pub fn targets_filter(&self) -> Result<Filter, ObserverError> {
        let ids: Vec<String> = self.target_ids().iter().map(Uuid::to_string).collect();
        let mut filter = self.filter.clone();
        filter.and_where(serde_json::json!({ "id": { "$in": ids } }))?;
        Ok(filter)
    }

    /// Add error to context
    pub fn add_error(&mut self, error: ObserverError) {
        self.errors.push(error);
    }

    /// Check if context has any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn execution_time(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Take the stored rows, falling back to the loaded targets
    pub fn into_result(self) -> Vec<Record> {
        self.result.unwrap_or(self.targets)
    }
}
