// Observer system: every data operation runs through an ordered ring pipeline.
// Tenant isolation and the soft-delete audit trail are observers like any other.

pub mod context;
pub mod error;
pub mod implementations;
pub mod pipeline;
pub mod traits;

// Re-export core types
pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use traits::*;
