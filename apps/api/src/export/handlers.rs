//! Axum route handlers for the Export API.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::lifecycle::{BuildOutcome, ExportSummary, RenderOutcome};
use crate::models::export::{ExportStatus, Theme};
use crate::state::AppState;
use crate::storage::PDF_CONTENT_TYPE;

pub const PAGE_COUNT_HEADER: &str = "x-page-count";

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BuildRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub theme: Theme,
    /// Render in the same request instead of leaving it to the client.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub preview_only: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/exports
///
/// 200 when the export is ready (cache hit or `wait`), 202 while it is
/// still rendering.
pub async fn handle_build(
    State(state): State<AppState>,
    Json(request): Json<BuildRequest>,
) -> Result<(StatusCode, Json<ExportSummary>), AppError> {
    if request.user_id.is_nil() {
        return Err(AppError::Validation("user_id cannot be nil".to_string()));
    }

    let summary = if request.wait {
        state
            .exports
            .build_and_render(request.user_id, request.theme)
            .await?
    } else {
        match state.exports.build(request.user_id, request.theme).await? {
            BuildOutcome::Cached(record)
            | BuildOutcome::InFlight(record)
            | BuildOutcome::Started(record) => ExportSummary::from(&record),
        }
    };

    let code = if summary.status == ExportStatus::Ready {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((code, Json(summary)))
}

/// POST /api/v1/exports/:id/render
///
/// With `preview_only` the first pages come back inline as PDF bytes and
/// nothing is stored. The body is optional.
pub async fn handle_render(
    State(state): State<AppState>,
    Path(export_id): Path<Uuid>,
    request: Option<Json<RenderRequest>>,
) -> Result<Response, AppError> {
    let Json(request) = request.unwrap_or_default();

    if request.preview_only {
        let preview = state.exports.preview(export_id).await?;
        return Ok((
            [
                (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
                (
                    header::HeaderName::from_static(PAGE_COUNT_HEADER),
                    preview.page_count.to_string(),
                ),
            ],
            preview.bytes,
        )
            .into_response());
    }

    let outcome: RenderOutcome = state.exports.render(export_id).await?;
    Ok(Json(outcome).into_response())
}

/// GET /api/v1/exports/:id
pub async fn handle_get_export(
    State(state): State<AppState>,
    Path(export_id): Path<Uuid>,
) -> Result<Json<ExportSummary>, AppError> {
    Ok(Json(state.exports.status(export_id).await?))
}
