use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::CONFIG;
use crate::database::entities;
use crate::database::repository::{Repository, RepositoryError};
use crate::database::store::Store;
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::{jwt_auth_middleware, validate_tenant_middleware, CurrentPrincipal};
use crate::observer::ObserverPipeline;
use crate::services::TenantService;
use crate::tenancy::ExecutionContext;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub pipeline: Arc<ObserverPipeline>,
    pub tenants: TenantService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let pipeline = Arc::new(ObserverPipeline::standard());
        Self {
            tenants: TenantService::new(store.clone(), pipeline.clone()),
            store,
            pipeline,
        }
    }

    /// Request-context repository for `entity`, acting as the current principal.
    ///
    /// Only tenant-owned entities are served; the tenant directory is reachable
    /// through [`TenantService`] alone.
    pub fn repository(&self, entity: &str, current: &CurrentPrincipal) -> Result<Repository, ApiError> {
        let def = entities::lookup_tenant_owned(entity)
            .ok_or_else(|| RepositoryError::UnknownEntity(entity.to_string()))?;
        Ok(Repository::new(
            def,
            self.store.clone(),
            self.pipeline.clone(),
            current.0.clone(),
            ExecutionContext::Request,
        ))
    }
}

pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health))
        .merge(data_routes())
        .merge(find_routes())
        // Layers run bottom-up: token first, then tenant validation
        .layer(from_fn_with_state(state.clone(), validate_tenant_middleware))
        .layer(from_fn(jwt_auth_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state);

    if CONFIG.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn data_routes() -> Router<AppState> {
    use handlers::{data, trash};

    Router::new()
        .route("/api/data/:entity", get(data::list).post(data::create))
        .route(
            "/api/data/:entity/:id",
            get(data::get_one).patch(data::update_one).delete(data::delete_one),
        )
        .route("/api/data/:entity/:id/restore", post(trash::restore))
        .route("/api/data/:entity/:id/purge", delete(trash::purge))
}

fn find_routes() -> Router<AppState> {
    Router::new().route("/api/find/:entity", post(handlers::find::find_post))
}
