use axum::extract::{Extension, Path, Query, State};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{require_trash_manager, CascadeQuery};
use crate::app::AppState;
use crate::database::record::Record;
use crate::middleware::{ApiResponse, ApiResult, CurrentPrincipal};
use crate::services::SoftDeleteService;

/// POST /api/data/:entity/:id/restore
pub async fn restore(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path((entity, id)): Path<(String, Uuid)>,
    Query(query): Query<CascadeQuery>,
) -> ApiResult<Value> {
    let repo = state.repository(&entity, &current)?;

    let body = if query.cascade {
        json!(SoftDeleteService::new(repo).restore_cascade(id).await?)
    } else {
        json!(repo.restore(id).await?)
    };
    Ok(ApiResponse::success(body))
}

/// DELETE /api/data/:entity/:id/purge - administrators only, irreversible
pub async fn purge(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path((entity, id)): Path<(String, Uuid)>,
) -> ApiResult<Record> {
    require_trash_manager(&current)?;
    let repo = state.repository(&entity, &current)?;
    Ok(ApiResponse::success(repo.purge(id).await?))
}
