// HTTP handlers. Each builds a request-context repository for the current
// principal; tenant scoping and soft delete happen in the observer pipeline.
pub mod data;
pub mod find;
pub mod trash;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::error::ApiError;
use crate::filter::TrashedMode;
use crate::middleware::CurrentPrincipal;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": backend }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": { "status": "degraded", "timestamp": now, "database": backend }
                })),
            )
        }
    }
}

/// `?cascade=true` on delete and restore also covers child rows
#[derive(Debug, Default, Deserialize)]
pub struct CascadeQuery {
    #[serde(default)]
    pub cascade: bool,
}

/// Parse `?trashed=` and refuse it to principals that cannot manage trash
pub(crate) fn trashed_mode(current: &CurrentPrincipal, raw: Option<&str>) -> Result<TrashedMode, ApiError> {
    let mode = raw.map(str::parse::<TrashedMode>).transpose()?.unwrap_or_default();
    if mode != TrashedMode::Without && !current.can_manage_trash() {
        return Err(ApiError::forbidden("Only administrators may view deleted records"));
    }
    Ok(mode)
}

/// Admin gate for irreversible operations
pub(crate) fn require_trash_manager(current: &CurrentPrincipal) -> Result<(), ApiError> {
    if current.can_manage_trash() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Administrator privileges required"))
    }
}
