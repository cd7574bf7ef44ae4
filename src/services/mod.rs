pub mod soft_delete_service;
pub mod tenant_service;

pub use soft_delete_service::{CascadeDelete, CascadeRestore, SoftDeleteService};
pub use tenant_service::{TenantError, TenantService};
