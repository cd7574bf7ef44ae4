use serde_json::json;
use std::sync::Arc;

use crate::database::entities;
use crate::database::models::Tenant;
use crate::database::record::RecordError;
use crate::database::repository::{Repository, RepositoryError};
use crate::database::store::Store;
use crate::filter::FilterData;
use crate::observer::ObserverPipeline;
use crate::tenancy::{ExecutionContext, TenantId};

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Tenant not found: {0}")]
    NotFound(TenantId),
    #[error("Tenant is inactive: {0}")]
    Inactive(TenantId),
    #[error("Invalid tenant name: {0}")]
    InvalidName(String),
    #[error("Invalid tenant row: {0}")]
    InvalidRow(#[from] RecordError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Tenant directory. Tenants are global rows, read in background context.
#[derive(Clone)]
pub struct TenantService {
    repo: Repository,
}

impl TenantService {
    pub fn new(store: Arc<dyn Store>, pipeline: Arc<ObserverPipeline>) -> Self {
        Self {
            repo: Repository::new(entities::TENANTS, store, pipeline, None, ExecutionContext::Background),
        }
    }

    pub async fn find(&self, id: TenantId) -> Result<Tenant, TenantError> {
        match self.repo.select_id(id.0).await {
            Ok(record) => Ok(Tenant::try_from(record)?),
            Err(RepositoryError::NotFound(_)) => Err(TenantError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// The tenant, provided it exists and is active
    pub async fn ensure_active(&self, id: TenantId) -> Result<Tenant, TenantError> {
        let tenant = self.find(id).await?;
        if !tenant.active {
            return Err(TenantError::Inactive(id));
        }
        Ok(tenant)
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, TenantError> {
        let filter = FilterData {
            order: Some(json!("name")),
            ..Default::default()
        };
        let records = self.repo.select_any(filter).await?;
        Ok(records
            .into_iter()
            .map(Tenant::try_from)
            .collect::<Result<_, _>>()?)
    }

    pub async fn create(
        &self,
        name: &str,
        plan: Option<&str>,
        max_users: Option<i32>,
    ) -> Result<Tenant, TenantError> {
        Self::validate_name(name)?;
        let record = self
            .repo
            .create(json!({
                "name": name.trim(),
                "active": true,
                "plan": plan,
                "max_users": max_users,
            }))
            .await?;
        let tenant = Tenant::try_from(record)?;
        tracing::info!(tenant = %tenant.id, "Created tenant '{}'", tenant.name);
        Ok(tenant)
    }

    pub async fn set_active(&self, id: TenantId, active: bool) -> Result<Tenant, TenantError> {
        let record = match self.repo.update(id.0, json!({ "active": active })).await {
            Ok(record) => record,
            Err(RepositoryError::NotFound(_)) => return Err(TenantError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };
        Ok(Tenant::try_from(record)?)
    }

    fn validate_name(name: &str) -> Result<(), TenantError> {
        let name = name.trim();
        if name.chars().count() < 2 {
            return Err(TenantError::InvalidName("Tenant name must be at least 2 characters".to_string()));
        }
        if name.chars().count() > 100 {
            return Err(TenantError::InvalidName("Tenant name must be less than 100 characters".to_string()));
        }
        Ok(())
    }
}
