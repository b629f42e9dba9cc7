//! Maps [`satellite_core::error::Error`] onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use satellite_core::error::Error;
use serde_json::json;

/// Newtype so route handlers can return `Result<T, ApiError>` and get a
/// JSON `{message}` body with the right status code for free.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Error::Busy => (
                StatusCode::LOCKED,
                "a conflicting job is already running".to_string(),
            ),
            Error::NotFound(msg) | Error::NotFoundRemote(msg) => {
                (StatusCode::NOT_FOUND, msg.clone())
            }
            Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::Fatal(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Error::Integrity(msg) | Error::CorruptInput(msg) => {
                (StatusCode::EXPECTATION_FAILED, msg.clone())
            }
            Error::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            Error::Transient(msg) | Error::Storage(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            Error::Serialization(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Error::Other(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: Error) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn busy_maps_to_locked() {
        assert_eq!(status_of(Error::Busy), StatusCode::LOCKED);
    }

    #[test]
    fn not_found_remote_maps_to_404() {
        assert_eq!(
            status_of(Error::NotFoundRemote("gone".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn invalid_input_maps_to_400() {
        assert_eq!(
            status_of(Error::InvalidInput("bad namespace".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn rate_limited_maps_to_429() {
        assert_eq!(
            status_of(Error::RateLimited("slow down".into())),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
