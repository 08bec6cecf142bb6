//! Persistence of export records.
//!
//! Every status change is one guarded `UPDATE ... WHERE status = $from`, so a
//! transition is applied at most once and terminal rows are never touched.
//! Concurrent builds for the same key are fenced by the partial unique index
//! `exports_in_flight_key`: the losing insert becomes a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::export::{ExportKey, ExportKind, ExportRecord, ExportRow, ExportStatus, Theme};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("export row {id} is unreadable: {reason}")]
    CorruptRow { id: Uuid, reason: String },
}

/// A record about to be created in `formatting`.
#[derive(Debug, Clone)]
pub struct NewExport {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: ExportKind,
    pub theme: Theme,
    pub content_signature: String,
    pub manuscript_key: String,
}

impl NewExport {
    pub fn key(&self) -> ExportKey {
        ExportKey {
            user_id: self.user_id,
            kind: self.kind,
            theme: self.theme,
            content_signature: self.content_signature.clone(),
        }
    }
}

/// The write applied by one status transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Rendering,
    Ready {
        document_key: String,
        url: String,
        page_count: u32,
    },
    Failed {
        message: String,
    },
}

impl Transition {
    pub fn status(&self) -> ExportStatus {
        match self {
            Transition::Rendering => ExportStatus::Rendering,
            Transition::Ready { .. } => ExportStatus::Ready,
            Transition::Failed { .. } => ExportStatus::Error,
        }
    }
}

#[async_trait]
pub trait ExportRepository: Send + Sync {
    /// Newest `ready` record for `key` created at or after `since`.
    async fn find_fresh_ready(
        &self,
        key: &ExportKey,
        since: DateTime<Utc>,
    ) -> Result<Option<ExportRecord>, RepoError>;

    /// The `formatting` or `rendering` record holding `key`, if any.
    async fn find_in_flight(&self, key: &ExportKey) -> Result<Option<ExportRecord>, RepoError>;

    /// Inserts in `formatting`. Returns `None` when another in-flight record
    /// already holds the key.
    async fn insert_formatting(&self, new: &NewExport) -> Result<Option<ExportRecord>, RepoError>;

    async fn get(&self, id: Uuid) -> Result<Option<ExportRecord>, RepoError>;

    /// Applies `transition` if the record is still in `from`. Returns whether
    /// a row changed.
    async fn transition(
        &self,
        id: Uuid,
        from: ExportStatus,
        transition: Transition,
    ) -> Result<bool, RepoError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgExportRepository {
    pool: PgPool,
}

impl PgExportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode(row: ExportRow) -> Result<ExportRecord, RepoError> {
    let id = row.id;
    ExportRecord::try_from(row).map_err(|reason| RepoError::CorruptRow { id, reason })
}

fn decode_opt(row: Option<ExportRow>) -> Result<Option<ExportRecord>, RepoError> {
    row.map(decode).transpose()
}

#[async_trait]
impl ExportRepository for PgExportRepository {
    async fn find_fresh_ready(
        &self,
        key: &ExportKey,
        since: DateTime<Utc>,
    ) -> Result<Option<ExportRecord>, RepoError> {
        let row: Option<ExportRow> = sqlx::query_as(
            r#"
            SELECT * FROM exports
            WHERE user_id = $1 AND kind = $2 AND theme = $3 AND content_signature = $4
              AND status = 'ready' AND created_at >= $5
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(key.user_id)
        .bind(key.kind.as_str())
        .bind(key.theme.as_str())
        .bind(&key.content_signature)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        decode_opt(row)
    }

    async fn find_in_flight(&self, key: &ExportKey) -> Result<Option<ExportRecord>, RepoError> {
        let row: Option<ExportRow> = sqlx::query_as(
            r#"
            SELECT * FROM exports
            WHERE user_id = $1 AND kind = $2 AND theme = $3 AND content_signature = $4
              AND status IN ('formatting', 'rendering')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(key.user_id)
        .bind(key.kind.as_str())
        .bind(key.theme.as_str())
        .bind(&key.content_signature)
        .fetch_optional(&self.pool)
        .await?;
        decode_opt(row)
    }

    async fn insert_formatting(&self, new: &NewExport) -> Result<Option<ExportRecord>, RepoError> {
        let row: Option<ExportRow> = sqlx::query_as(
            r#"
            INSERT INTO exports
                (id, user_id, kind, theme, status, content_signature, manuscript_key)
            VALUES ($1, $2, $3, $4, 'formatting', $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(new.user_id)
        .bind(new.kind.as_str())
        .bind(new.theme.as_str())
        .bind(&new.content_signature)
        .bind(&new.manuscript_key)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_none() {
            debug!(export_id = %new.id, "Insert fenced by in-flight export");
        }
        decode_opt(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ExportRecord>, RepoError> {
        let row: Option<ExportRow> = sqlx::query_as("SELECT * FROM exports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        decode_opt(row)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ExportStatus,
        transition: Transition,
    ) -> Result<bool, RepoError> {
        let to = transition.status();
        if !from.can_transition_to(to) {
            return Ok(false);
        }

        let (document_key, url, page_count, error_message) = match transition {
            Transition::Rendering => (None, None, None, None),
            Transition::Ready {
                document_key,
                url,
                page_count,
            } => (Some(document_key), Some(url), Some(page_count as i32), None),
            Transition::Failed { message } => (None, None, None, Some(message)),
        };

        let result = sqlx::query(
            r#"
            UPDATE exports
            SET status = $3,
                document_key = COALESCE($4, document_key),
                url = COALESCE($5, url),
                page_count = COALESCE($6, page_count),
                error_message = COALESCE($7, error_message),
                updated_at = now()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(document_key)
        .bind(url)
        .bind(page_count)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
