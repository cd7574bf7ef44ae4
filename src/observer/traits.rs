use async_trait::async_trait;
use std::time::Duration;

use crate::config::CONFIG;
use crate::database::entities::EntityDef;
use crate::database::store::StoreTransaction;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
pub use crate::types::Operation;

/// Observer rings, executed in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    Scope = 0,       // Tenant scope and ownership
    Validation = 1,  // Input shape, required fields
    Preparation = 2, // Load targets, system fields
    Business = 3,    // Audit stamping, key conflicts
    Database = 4,    // Storage calls inside the unit of work
    Audit = 5,       // After commit, never fails the operation
}

impl ObserverRing {
    pub const SYNCHRONOUS: [ObserverRing; 5] = [
        ObserverRing::Scope,
        ObserverRing::Validation,
        ObserverRing::Preparation,
        ObserverRing::Business,
        ObserverRing::Database,
    ];

    /// Check if ring executes inside the unit of work
    pub fn is_synchronous(&self) -> bool {
        *self != ObserverRing::Audit
    }
}

/// Base trait for all observers with metadata and applicability checks
pub trait Observer: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this observer belongs to
    fn ring(&self) -> ObserverRing;

    /// Check if observer applies to this operation
    fn applies_to_operation(&self, op: Operation) -> bool;

    /// Check if observer applies to this entity
    fn applies_to_entity(&self, _entity: &EntityDef) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(CONFIG.observer.timeout_ms)
    }

    /// Priority within ring (lower numbers execute first)
    fn priority(&self) -> u8 {
        50
    }
}

/// Rings 0-4: run inside the unit of work with access to the open transaction
#[async_trait]
pub trait SyncObserver: Observer {
    async fn execute(
        &self,
        ctx: &mut ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError>;
}

/// Ring 5: runs after commit, read-only
#[async_trait]
pub trait AuditObserver: Observer {
    async fn execute(&self, ctx: &ObserverContext) -> Result<(), ObserverError>;
}

pub enum ObserverBox {
    Sync(Box<dyn SyncObserver>),
    Audit(Box<dyn AuditObserver>),
}

impl ObserverBox {
    pub fn name(&self) -> &'static str {
        match self {
            ObserverBox::Sync(o) => o.name(),
            ObserverBox::Audit(o) => o.name(),
        }
    }

    pub fn ring(&self) -> ObserverRing {
        match self {
            ObserverBox::Sync(o) => o.ring(),
            ObserverBox::Audit(o) => o.ring(),
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            ObserverBox::Sync(o) => o.priority(),
            ObserverBox::Audit(o) => o.priority(),
        }
    }

    pub fn applies_to_operation(&self, op: Operation) -> bool {
        match self {
            ObserverBox::Sync(o) => o.applies_to_operation(op),
            ObserverBox::Audit(o) => o.applies_to_operation(op),
        }
    }

    pub fn applies_to_entity(&self, entity: &EntityDef) -> bool {
        match self {
            ObserverBox::Sync(o) => o.applies_to_entity(entity),
            ObserverBox::Audit(o) => o.applies_to_entity(entity),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            ObserverBox::Sync(o) => o.timeout(),
            ObserverBox::Audit(o) => o.timeout(),
        }
    }

    pub async fn execute_sync(
        &self,
        ctx: &mut ObserverContext,
        tx: &mut dyn StoreTransaction,
    ) -> Result<(), ObserverError> {
        match self {
            ObserverBox::Sync(o) => o.execute(ctx, tx).await,
            ObserverBox::Audit(_) => Ok(()), // Audit observers don't execute in sync phase
        }
    }

    pub async fn execute_audit(&self, ctx: &ObserverContext) -> Result<(), ObserverError> {
        match self {
            ObserverBox::Audit(o) => o.execute(ctx).await,
            ObserverBox::Sync(_) => Ok(()),
        }
    }
}
