use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use crate::auth::{decode_jwt, Claims};
use crate::error::ApiError;
use crate::tenancy::Principal;

/// Principal resolved for the current request. `None` when no token was sent.
#[derive(Clone, Debug, Default)]
pub struct CurrentPrincipal(pub Option<Principal>);

impl CurrentPrincipal {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }

    pub fn can_manage_trash(&self) -> bool {
        self.0.as_ref().is_some_and(Principal::can_manage_trash)
    }
}

/// JWT authentication middleware.
///
/// A missing header is not an error: the request proceeds without a principal and
/// tenant-owned reads come back empty. A malformed or invalid token is rejected.
pub async fn jwt_auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = match extract_jwt_from_headers(&headers)? {
        Some(token) => {
            let claims: Claims = decode_jwt(&token)?;
            Some(Principal::from(claims))
        }
        None => None,
    };

    if let Some(p) = &principal {
        tracing::debug!(principal = %p.id, tenant = ?p.tenant_id, "authenticated");
    }
    request.extensions_mut().insert(CurrentPrincipal(principal));

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header format"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err(ApiError::unauthorized("Empty JWT token")),
        None => Err(ApiError::unauthorized("Authorization header must use Bearer token format")),
    }
}
