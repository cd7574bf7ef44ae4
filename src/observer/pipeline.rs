use std::collections::HashMap;
use std::time::Instant;
use tokio::time::timeout;

use crate::database::store::StoreTransaction;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::implementations::*;
use crate::observer::traits::{ObserverBox, ObserverRing};

/// Executes observers in ring order
pub struct ObserverPipeline {
    // Observer registry by ring, sorted by priority
    observers: HashMap<ObserverRing, Vec<ObserverBox>>,
}

impl ObserverPipeline {
    /// Create new observer pipeline with empty observer registry
    pub fn new() -> Self {
        Self {
            observers: HashMap::new(),
        }
    }

    /// Tenant isolation and soft-delete audit, as every entity runs them
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline.register_observer(ObserverBox::Sync(Box::new(TenantScopeObserver)));
        pipeline.register_observer(ObserverBox::Sync(Box::new(TenantStampObserver)));
        pipeline.register_observer(ObserverBox::Sync(Box::new(OwnerImmutableObserver)));
        pipeline.register_observer(ObserverBox::Sync(Box::new(InputValidationObserver)));
        pipeline.register_observer(ObserverBox::Sync(Box::new(TargetLoaderObserver)));
        pipeline.register_observer(ObserverBox::Sync(Box::new(RecordPreparationObserver)));
        pipeline.register_observer(ObserverBox::Sync(Box::new(SoftDeleteObserver)));
        pipeline.register_observer(ObserverBox::Sync(Box::new(RestoreConflictObserver)));
        pipeline.register_observer(ObserverBox::Sync(Box::new(SqlExecutorObserver)));
        pipeline.register_observer(ObserverBox::Audit(Box::new(DeletionLogObserver)));
        pipeline
    }

    /// Register an observer
    pub fn register_observer(&mut self, observer: ObserverBox) {
        let ring = observer.ring();
        let name = observer.name();
        let observers = self.observers.entry(ring).or_default();
        observers.push(observer);
        observers.sort_by_key(ObserverBox::priority);

        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    /// Run rings 0-4 inside the caller's unit of work.
    ///
    /// Stops at the first ring that records an error and returns that error;
    /// the caller is expected to roll back.
    pub async fn execute(
        &self,
        ctx: &mut ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        tracing::debug!(
            "Observer pipeline starting: operation={:?}, entity={}",
            ctx.operation,
            ctx.entity.name
        );

        for ring in ObserverRing::SYNCHRONOUS {
            ctx.current_ring = Some(ring);
            self.execute_ring(ring, ctx, tx).await;

            if ctx.has_errors() {
                tracing::warn!("Observer pipeline stopped at ring {:?} due to errors", ring);
                return Err(ctx.errors.remove(0));
            }
        }

        tracing::debug!(
            "Observer pipeline finished: operation={:?}, entity={}, elapsed={:?}",
            ctx.operation,
            ctx.entity.name,
            ctx.execution_time()
        );
        Ok(())
    }

    /// Run the audit ring after commit. Failures are logged, never returned.
    pub async fn execute_audit(&self, ctx: &ObserverContext) {
        let Some(observers) = self.observers.get(&ObserverRing::Audit) else {
            return;
        };

        for observer in observers {
            if !observer.applies_to_operation(ctx.operation) || !observer.applies_to_entity(ctx.entity) {
                continue;
            }
            match timeout(observer.timeout(), observer.execute_audit(ctx)).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::error!("Audit observer {} failed: {}", observer.name(), error);
                }
                Err(_timeout) => {
                    tracing::error!(
                        "Audit observer {} timed out after {:?}",
                        observer.name(),
                        observer.timeout()
                    );
                }
            }
        }
    }

    /// Execute observers in a specific ring
    async fn execute_ring(
        &self,
        ring: ObserverRing,
        ctx: &mut ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) {
        let observers = match self.observers.get(&ring) {
            Some(obs) => obs,
            None => {
                tracing::trace!("No observers registered for ring {:?}", ring);
                return;
            }
        };

        for observer in observers {
            // Check if observer applies to this operation and entity
            if !observer.applies_to_operation(ctx.operation) {
                tracing::trace!(
                    "Observer {} skipped - doesn't apply to operation {:?}",
                    observer.name(),
                    ctx.operation
                );
                continue;
            }

            if !observer.applies_to_entity(ctx.entity) {
                tracing::trace!(
                    "Observer {} skipped - doesn't apply to entity {}",
                    observer.name(),
                    ctx.entity.name
                );
                continue;
            }

            let observer_start = Instant::now();

            // Execute with timeout protection
            let result = timeout(observer.timeout(), observer.execute_sync(ctx, tx)).await;

            let execution_time = observer_start.elapsed();

            match result {
                Ok(Ok(())) => {
                    tracing::trace!(
                        "Observer: {} completed successfully in {:?}",
                        observer.name(),
                        execution_time
                    );
                }
                Ok(Err(error)) => {
                    tracing::debug!(
                        "Observer: {} failed in {:?}: {}",
                        observer.name(),
                        execution_time,
                        error
                    );
                    ctx.add_error(error);
                    return;
                }
                Err(_timeout) => {
                    tracing::error!(
                        "Observer: {} timed out after {:?}",
                        observer.name(),
                        observer.timeout()
                    );
                    ctx.add_error(ObserverError::TimeoutError(format!(
                        "Observer {} timed out after {:?}",
                        observer.name(),
                        observer.timeout()
                    )));
                    return;
                }
            }
        }
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}
