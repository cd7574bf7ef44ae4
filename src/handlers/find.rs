use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};

use super::data::RecordQuery;
use super::trashed_mode;
use crate::app::AppState;
use crate::database::record::Record;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, CurrentPrincipal};

/// POST /api/find/:entity - filter body `{ where, order, limit, offset }`
pub async fn find_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPrincipal>,
    Path(entity): Path<String>,
    Query(query): Query<RecordQuery>,
    Json(filter): Json<FilterData>,
) -> ApiResult<Vec<Record>> {
    let trashed = trashed_mode(&current, query.trashed.as_deref())?;
    let repo = state.repository(&entity, &current)?.trashed(trashed);

    let records = repo.select_any(filter).await?;
    tracing::debug!(entity = %entity, count = records.len(), "find");
    Ok(ApiResponse::success(records))
}
