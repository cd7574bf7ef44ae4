use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::CurrentPrincipal;
use crate::app::AppState;
use crate::error::ApiError;

/// Refuses principals whose tenant is missing or deactivated.
///
/// Super admins without a tenant and anonymous requests pass through untouched.
pub async fn validate_tenant_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let tenant_id = request
        .extensions()
        .get::<CurrentPrincipal>()
        .and_then(|current| current.principal())
        .and_then(|p| p.tenant_id);

    if let Some(tenant_id) = tenant_id {
        if let Err(e) = state.tenants.ensure_active(tenant_id).await {
            tracing::warn!(tenant = %tenant_id, "Tenant validation failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(next.run(request).await)
}
