use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::export::repo::RepoError;
use crate::layout::fonts::FontError;
use crate::layout::paginate::LayoutError;
use crate::storage::StorageError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No content: {0}")]
    NoContent(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Manuscript not found: {0}")]
    ManuscriptNotFound(String),

    #[error("Storage read failed: {0}")]
    StorageReadFailed(String),

    #[error("Font asset corrupt: {0}")]
    FontAssetCorrupt(#[from] FontError),

    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("Render failed: {0}")]
    RenderInternal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NoContent(_) => "NO_CONTENT",
            AppError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AppError::ManuscriptNotFound(_) => "MANUSCRIPT_NOT_FOUND",
            AppError::StorageReadFailed(_) => "STORAGE_READ_FAILED",
            AppError::FontAssetCorrupt(_) => "FONT_ASSET_CORRUPT",
            AppError::StorageWriteFailed(_) => "STORAGE_WRITE_FAILED",
            AppError::RenderInternal(_) => "RENDER_INTERNAL",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may safely repeat the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamUnavailable(_)
                | AppError::StorageWriteFailed(_)
                | AppError::StorageReadFailed(_)
                | AppError::Database(_)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NoContent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ManuscriptNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StorageReadFailed(_) | AppError::StorageWriteFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::FontAssetCorrupt(_)
            | AppError::RenderInternal(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { key } => AppError::ManuscriptNotFound(key),
            StorageError::Read { .. } => AppError::StorageReadFailed(e.to_string()),
            StorageError::Write { .. } | StorageError::Sign { .. } => {
                AppError::StorageWriteFailed(e.to_string())
            }
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Database(e) => AppError::Database(e),
            RepoError::CorruptRow { .. } => AppError::Internal(anyhow::anyhow!(e.to_string())),
        }
    }
}

impl From<LayoutError> for AppError {
    fn from(e: LayoutError) -> Self {
        AppError::RenderInternal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                "A database error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
            AppError::FontAssetCorrupt(e) => {
                tracing::error!("Font asset error: {e}");
                "A bundled font asset failed validation".to_string()
            }
            other if status.is_server_error() => {
                tracing::error!("{other}");
                other.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
                "retryable": self.is_retryable()
            }
        }));

        (status, body).into_response()
    }
}
