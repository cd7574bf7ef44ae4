use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::database::record::RecordError;
use crate::tenancy::TenancyError;

/// Observer system errors with structured error types
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Tenant required: {0}")]
    TenantRequired(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("System error: {0}")]
    SystemError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<TenancyError> for ObserverError {
    fn from(error: TenancyError) -> Self {
        match error {
            TenancyError::TenantRequired(entity) => ObserverError::TenantRequired(entity),
        }
    }
}

impl From<RecordError> for ObserverError {
    fn from(error: RecordError) -> Self {
        ObserverError::ValidationError(error.to_string())
    }
}

impl From<crate::filter::FilterError> for ObserverError {
    fn from(error: crate::filter::FilterError) -> Self {
        ObserverError::ValidationError(error.to_string())
    }
}
