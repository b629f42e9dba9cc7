//! Bearer-token auth middleware: all non-healthcheck endpoints require
//! `Authorization: Bearer <key>` unless disabled, via a `from_fn_with_state`
//! layer applied to every authenticated route group.

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::state::AppState;

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if state.config.disable_api_key {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(presented) = presented else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    match state.jobstore.auth().verify_api_key(presented).await {
        Ok(true) => Ok(next.run(request).await),
        Ok(false) => Err(StatusCode::UNAUTHORIZED),
        Err(e) => {
            tracing::error!("auth verification failed: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
