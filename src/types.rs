/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Operations that flow through the observer pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Select,
    Create,
    Update,
    Delete,
    Restore, // Clear deleted_at and the deletion audit fields
    Purge,   // Physical removal, no way back
}

impl Operation {
    /// Operations that act on rows already in storage
    pub fn targets_existing(&self) -> bool {
        matches!(
            self,
            Operation::Update | Operation::Delete | Operation::Restore | Operation::Purge
        )
    }
}
