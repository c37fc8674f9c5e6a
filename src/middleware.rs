//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::ServerError;
use crate::error::Result;

/// Reject requests whose `Authorization` header is not the configured key.
///
/// The header carries the raw key, without scheme.
pub async fn api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .is_some_and(|key| !key.is_empty() && key == state.config.api_key);

    if !authorized {
        tracing::debug!(path = %req.uri().path(), "rejected api key");
        return Err(ServerError::Unauthorized);
    }

    Ok(next.run(req).await)
}
