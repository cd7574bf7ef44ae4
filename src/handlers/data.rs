use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{trashed_mode, CascadeQuery};
use crate::app::AppState;
use crate::database::record::Record;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, CurrentPrincipal};
use crate::services::SoftDeleteService;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `with` or `only` (administrators)
    pub trashed: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
    /// `column` or `column desc`
    pub order: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    pub trashed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteBody {
    pub reason: Option<String>,
}

/// GET /api/data/:entity
pub async fn list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path(entity): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Record>> {
    let trashed = trashed_mode(&current, query.trashed.as_deref())?;
    let repo = state.repository(&entity, &current)?.trashed(trashed);

    let filter = FilterData {
        where_clause: None,
        order: query.order.map(Value::String),
        limit: query.limit,
        offset: query.offset,
    };
    Ok(ApiResponse::success(repo.select_any(filter).await?))
}

/// POST /api/data/:entity - a single object or an array of objects
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path(entity): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let repo = state.repository(&entity, &current)?;

    let created = match body {
        Value::Array(items) => json!(repo.create_all(items).await?),
        Value::Object(_) => json!(repo.create(body).await?),
        _ => return Err(ApiError::bad_request("Expected a JSON object or array")),
    };
    Ok(ApiResponse::created(created))
}

/// GET /api/data/:entity/:id
pub async fn get_one(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path((entity, id)): Path<(String, Uuid)>,
    Query(query): Query<RecordQuery>,
) -> ApiResult<Record> {
    let trashed = trashed_mode(&current, query.trashed.as_deref())?;
    let repo = state.repository(&entity, &current)?.trashed(trashed);
    Ok(ApiResponse::success(repo.select_id(id).await?))
}

/// PATCH /api/data/:entity/:id
pub async fn update_one(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path((entity, id)): Path<(String, Uuid)>,
    Json(body): Json<Value>,
) -> ApiResult<Record> {
    let repo = state.repository(&entity, &current)?;
    Ok(ApiResponse::success(repo.update(id, body).await?))
}

/// DELETE /api/data/:entity/:id - soft delete on audited entities, optional `{ "reason": ... }`
pub async fn delete_one(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path((entity, id)): Path<(String, Uuid)>,
    Query(query): Query<CascadeQuery>,
    body: Option<Json<DeleteBody>>,
) -> ApiResult<Value> {
    let repo = state.repository(&entity, &current)?;
    let reason = body.and_then(|Json(b)| b.reason);

    let body = if query.cascade {
        json!(SoftDeleteService::new(repo).delete_cascade(id, reason.as_deref()).await?)
    } else {
        json!(repo.delete(id, reason.as_deref()).await?)
    };
    Ok(ApiResponse::success(body))
}
