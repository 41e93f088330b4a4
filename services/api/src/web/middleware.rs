//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::web::state::AppState;

/// The identity attached to routes that accept anonymous callers.
/// The entitlement gate decides what an absent identity may do.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<Uuid>);

fn session_id_from_headers(req: &Request) -> Option<&str> {
    let cookie_header = req.headers().get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|c| {
        let c = c.trim();
        c.strip_prefix("session=")
    })
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_id_from_headers(&req)
        .map(str::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .db
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

/// Middleware for routes the anonymous policy may open up: resolves the
/// session cookie when present but never rejects the request. An invalid
/// cookie degrades to anonymous rather than failing.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user_id = match session_id_from_headers(&req).map(str::to_string) {
        Some(session_id) => state.db.validate_auth_session(&session_id).await.ok(),
        None => None,
    };

    req.extensions_mut().insert(MaybeUser(user_id));
    next.run(req).await
}
