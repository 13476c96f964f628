//! Response envelope shared by every endpoint.
//!
//! Success is `{ "data": T, "meta": {...} }`, failure is
//! `{ "error": { "code", "message" }, "meta": {...} }`. Equipment-scoped
//! responses echo the equipment id in `meta`, and diagnoses also carry the
//! id of the session they persisted.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::diagnostics::DiagnosticError;

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMeta {
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl ResponseMeta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
            equipment_id: None,
            session_id: None,
        }
    }

    pub fn for_equipment(equipment_id: &str) -> Self {
        Self { equipment_id: Some(equipment_id.to_string()), ..Self::now() }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

#[derive(Serialize)]
struct DataBody<T> {
    data: T,
    meta: ResponseMeta,
}

/// `200 OK` with `data` wrapped in the envelope.
pub fn ok<T: Serialize>(data: T, meta: ResponseMeta) -> Response {
    (StatusCode::OK, axum::Json(DataBody { data, meta })).into_response()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    InternalError,
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Handler error rendered as the `{error, meta}` envelope.
#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub meta: ResponseMeta,
}

impl ApiError {
    pub fn bad_request(meta: ResponseMeta, message: impl Into<String>) -> Self {
        Self { code: ErrorCode::BadRequest, message: message.into(), meta }
    }

    /// Map a service failure for one piece of equipment. Model unavailability
    /// is the caller's to retry; storage failures are ours and are logged.
    pub fn from_diagnostic(equipment_id: &str, err: DiagnosticError) -> Self {
        let meta = ResponseMeta::for_equipment(equipment_id);
        match err {
            DiagnosticError::Unavailable(e) => {
                Self { code: ErrorCode::ServiceUnavailable, message: e.to_string(), meta }
            }
            DiagnosticError::Storage(e) => {
                error!(equipment_id, error = %e, "Storage failure");
                Self { code: ErrorCode::InternalError, message: format!("storage error: {e}"), meta }
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: ErrorCode,
    message: &'a str,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
    meta: &'a ResponseMeta,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail { code: self.code, message: &self.message },
            meta: &self.meta,
        };
        (self.code.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::DiagnosticUnavailable;

    async fn json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ok_envelope_echoes_ids() {
        let session_id = Uuid::new_v4();
        let resp = ok(
            serde_json::json!({"risk_level": "low"}),
            ResponseMeta::for_equipment("CH-1").with_session(session_id),
        );
        assert_eq!(resp.status(), StatusCode::OK);

        let v = json(resp).await;
        assert_eq!(v["data"]["risk_level"], "low");
        assert_eq!(v["meta"]["equipment_id"], "CH-1");
        assert_eq!(v["meta"]["session_id"], session_id.to_string());
        assert!(v["meta"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_unscoped_meta_omits_ids() {
        let v = json(ok(1, ResponseMeta::now())).await;
        assert!(v["meta"].get("equipment_id").is_none());
        assert!(v["meta"].get("session_id").is_none());
    }

    #[tokio::test]
    async fn test_unavailable_maps_to_503() {
        let err = DiagnosticError::Unavailable(DiagnosticUnavailable { failures: Vec::new() });
        let resp = ApiError::from_diagnostic("RTU-3", err).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let v = json(resp).await;
        assert_eq!(v["error"]["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(v["meta"]["equipment_id"], "RTU-3");
    }

    #[test]
    fn test_error_code_statuses() {
        assert_eq!(ErrorCode::BadRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InternalError.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
