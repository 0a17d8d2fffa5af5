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

use crate::web::state::AppState;

/// The authenticated caller's email, injected into request extensions by
/// `require_auth` and extracted by handlers with `Extension<CurrentUser>`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

fn unauthenticated() -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, "Unauthenticated".to_string())
}

/// Middleware that validates the auth session cookie and extracts the caller.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers to use.
/// If invalid, missing, or expired, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    // 1. Extract cookie header
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthenticated)?;

    // 2. Parse session ID from cookie
    let auth_session_id = cookie_header
        .split(';')
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix("session=")
        })
        .ok_or_else(unauthenticated)?;

    // 3. Resolve the session to a user email; expired sessions come back None
    let email = state
        .identity
        .resolve_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to resolve auth session: {:?}", e);
            unauthenticated()
        })?
        .ok_or_else(unauthenticated)?;

    // 4. Insert the caller identity into request extensions
    req.extensions_mut().insert(CurrentUser(email));

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
