// Observer implementations organized by rings
// Each ring handles a specific phase of data processing

// Ring 0: Scope - tenant filter and ownership
#[path = "0/owner_immutable.rs"]
pub mod owner_immutable;
#[path = "0/tenant_scope.rs"]
pub mod tenant_scope;
#[path = "0/tenant_stamp.rs"]
pub mod tenant_stamp;

// Ring 1: Validation
#[path = "1/input_validation.rs"]
pub mod input_validation;

// Ring 2: Preparation - load targets, system fields
#[path = "2/record_preparation.rs"]
pub mod record_preparation;
#[path = "2/target_loader.rs"]
pub mod target_loader;

// Ring 3: Business - soft delete and restore rules
#[path = "3/restore_conflict.rs"]
pub mod restore_conflict;
#[path = "3/soft_delete.rs"]
pub mod soft_delete;

// Ring 4: Database
#[path = "4/sql_executor.rs"]
pub mod sql_executor;

// Ring 5: Audit
#[path = "5/deletion_log.rs"]
pub mod deletion_log;

pub use deletion_log::*;
pub use input_validation::*;
pub use owner_immutable::*;
pub use record_preparation::*;
pub use restore_conflict::*;
pub use soft_delete::*;
pub use sql_executor::*;
pub use target_loader::*;
pub use tenant_scope::*;
pub use tenant_stamp::*;
