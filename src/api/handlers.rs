//! Endpoint handlers. Success goes through `envelope::ok`, failure through `ApiError`.

use std::collections::BTreeSet;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::envelope::{self, ApiError, ResponseMeta};
use crate::config::defaults::MAX_SESSION_LISTING;
use crate::diagnostics::{AnalysisMode, DiagnoseRequest, DiagnosticService};
use crate::llm::ModelKind;
use crate::types::ReadingSourcePreference;

#[derive(Clone)]
pub struct AppState {
    pub service: DiagnosticService,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub available_models: Vec<ModelKind>,
}

/// Body of `POST /equipment/:id/diagnose`; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct DiagnoseBody {
    #[serde(default)]
    pub source_preference: Option<ReadingSourcePreference>,
    #[serde(default)]
    pub mode: Option<AnalysisMode>,
    #[serde(default)]
    pub models: Vec<ModelKind>,
}

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    pub limit: Option<usize>,
}

pub async fn health(State(state): State<AppState>) -> Response {
    envelope::ok(
        HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            available_models: state.service.available_models(),
        },
        ResponseMeta::now(),
    )
}

pub async fn data_quality(
    State(state): State<AppState>,
    Path(equipment_id): Path<String>,
) -> Result<Response, ApiError> {
    let assessment = state
        .service
        .data_quality(&equipment_id)
        .map_err(|e| ApiError::from_diagnostic(&equipment_id, e))?;
    Ok(envelope::ok(assessment, ResponseMeta::for_equipment(&equipment_id)))
}

pub async fn diagnose(
    State(state): State<AppState>,
    Path(equipment_id): Path<String>,
    body: Result<axum::Json<DiagnoseBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = match body {
        Ok(axum::Json(b)) => b,
        // Bodiless POST runs with defaults
        Err(JsonRejection::MissingJsonContentType(_)) => DiagnoseBody::default(),
        Err(rejection) => {
            return Err(ApiError::bad_request(ResponseMeta::for_equipment(&equipment_id), rejection.body_text()))
        }
    };
    let request = DiagnoseRequest {
        equipment_id: equipment_id.clone(),
        source_preference: body.source_preference.unwrap_or_default(),
        mode: body.mode.unwrap_or_default(),
        models: body.models.into_iter().collect::<BTreeSet<_>>(),
    };
    info!(equipment_id = %equipment_id, mode = %request.mode, preference = %request.source_preference, "Diagnose requested");

    let session = state
        .service
        .diagnose(request)
        .await
        .map_err(|e| ApiError::from_diagnostic(&equipment_id, e))?;
    let meta = ResponseMeta::for_equipment(&equipment_id).with_session(session.id);
    Ok(envelope::ok(session, meta))
}

pub async fn sessions(
    State(state): State<AppState>,
    Path(equipment_id): Path<String>,
    Query(query): Query<SessionsQuery>,
) -> Result<Response, ApiError> {
    let limit = query.limit.unwrap_or(20);
    if limit == 0 || limit > MAX_SESSION_LISTING {
        return Err(ApiError::bad_request(
            ResponseMeta::for_equipment(&equipment_id),
            format!("limit must be between 1 and {MAX_SESSION_LISTING}"),
        ));
    }
    let list = state
        .service
        .sessions(&equipment_id, limit)
        .map_err(|e| ApiError::from_diagnostic(&equipment_id, e))?;
    Ok(envelope::ok(list, ResponseMeta::for_equipment(&equipment_id)))
}
