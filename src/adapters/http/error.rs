//! Per-surface wire mappings of the domain error taxonomy.
//!
//! The agent surface keeps the legacy `{"error": "<message>"}` shape, the
//! web surface answers FastAPI-style `{"detail": ...}`, and the control
//! surface speaks RFC 9457 `application/problem+json`. Internal failures
//! never leak details onto the wire.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::domain::errors::DomainError;

/// Seconds an agent should wait after a throttled heartbeat.
const RETRY_AFTER_SECS: &str = "15";

fn log_internal(err: &DomainError) {
    if matches!(err, DomainError::Database(_) | DomainError::Serialization(_)) {
        error!(error = %err, "internal error reached the HTTP boundary");
    }
}

/// Status code shared by all three surfaces, before per-surface overrides.
fn base_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Conflict(_) | DomainError::StaleVersion { .. } => StatusCode::CONFLICT,
        DomainError::Stale => StatusCode::ACCEPTED,
        DomainError::Preempted => StatusCode::GONE,
        DomainError::Malformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        DomainError::Database(_) | DomainError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn visible_message(err: &DomainError, status: StatusCode) -> String {
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        "internal server error".to_string()
    } else {
        err.to_string()
    }
}

/// Agent-surface error: legacy `{"error": "<message>"}` body.
#[derive(Debug)]
pub struct AgentApiError {
    pub status: StatusCode,
    pub message: String,
    retry_after: bool,
}

impl From<DomainError> for AgentApiError {
    fn from(err: DomainError) -> Self {
        log_internal(&err);
        // This surface reports state-precondition violations as 422.
        let status = match &err {
            DomainError::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => base_status(&err),
        };
        Self {
            status,
            message: visible_message(&err, status),
            retry_after: matches!(err, DomainError::TooManyRequests),
        }
    }
}

impl IntoResponse for AgentApiError {
    fn into_response(self) -> Response {
        let mut response =
            (self.status, Json(json!({ "error": self.message }))).into_response();
        if self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

/// Web-surface error: `{"detail": ...}` body.
#[derive(Debug)]
pub struct WebApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl WebApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::UNPROCESSABLE_ENTITY, detail: detail.into() }
    }
}

impl From<DomainError> for WebApiError {
    fn from(err: DomainError) -> Self {
        log_internal(&err);
        let status = base_status(&err);
        Self { status, detail: visible_message(&err, status) }
    }
}

impl IntoResponse for WebApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// Control-surface error: RFC 9457 problem document.
#[derive(Debug)]
pub struct ProblemError {
    pub status: StatusCode,
    pub title: String,
    pub detail: String,
}

impl From<DomainError> for ProblemError {
    fn from(err: DomainError) -> Self {
        log_internal(&err);
        let status = base_status(&err);
        let title = status.canonical_reason().unwrap_or("Error").to_string();
        Self { status, title, detail: visible_message(&err, status) }
    }
}

impl IntoResponse for ProblemError {
    fn into_response(self) -> Response {
        let body = json!({
            "type": "about:blank",
            "title": self.title,
            "status": self.status.as_u16(),
            "detail": self.detail,
            "instance": serde_json::Value::Null,
        });
        let mut response = (self.status, Json(body)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_surface_maps_conflict_to_422() {
        let err = AgentApiError::from(DomainError::Conflict("terminal".to_string()));
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn control_surface_keeps_conflict_as_409() {
        let err = ProblemError::from(DomainError::Conflict("terminal".to_string()));
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let err = WebApiError::from(DomainError::Database("secret dsn".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.detail.contains("secret"));
    }

    #[test]
    fn preemption_maps_to_410() {
        let err = AgentApiError::from(DomainError::Preempted);
        assert_eq!(err.status, StatusCode::GONE);
    }
}
