//! Gateway identity middleware.
//!
//! The upstream gateway authenticates callers and forwards who they are
//! in `X-User-Id` and `X-User-Role`. This layer turns those headers into
//! a `UserContext` for downstream handlers.

use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::UserContext;
use crate::models::enums::UserRole;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Require gateway identity headers on every protected route.
pub async fn require_identity(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_identity_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_identity_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = identity_from_headers(req.headers()).ok_or(ApiError::Unauthorized)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn identity_from_headers(headers: &HeaderMap) -> Option<UserContext> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let user_id = header(USER_ID_HEADER)?;
    let role: UserRole = header(USER_ROLE_HEADER)?.to_ascii_lowercase().parse().ok()?;
    Some(UserContext {
        user_id: user_id.to_string(),
        role,
    })
}
