//! Export cache and lifecycle.
//!
//! `build` resolves a request to an export record: a fresh `ready` record
//! with the same key is reused; an in-flight record is returned as-is;
//! otherwise a new record is created, its manuscript persisted and the
//! record moved to `rendering`. `render` drives a `rendering` record to
//! `ready` or `error`.
//!
//! # State machine
//! ```text
//! formatting ──► rendering ──► ready
//!      │             │
//!      └──► error ◄──┘
//! ```

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::notify::{notify_in_background, CompletionNotice, Notifier};
use crate::export::repo::{ExportRepository, NewExport, Transition};
use crate::export::source::ContentSource;
use crate::manuscript::{build_manuscript, manuscript_key, Manuscript};
use crate::models::export::{ExportKey, ExportKind, ExportRecord, ExportStatus, Theme};
use crate::render::{render_document, FontSource, RenderedDocument};
use crate::storage::{ArtifactStore, JSON_CONTENT_TYPE, PDF_CONTENT_TYPE};

pub const LEASE_EXPIRED_MESSAGE: &str = "render lease expired";

/// Time windows governing reuse and reclamation.
#[derive(Debug, Clone)]
pub struct ExportPolicy {
    /// How long a `ready` export is reused for identical content.
    pub freshness: Duration,
    /// Validity of signed document URLs.
    pub url_ttl: StdDuration,
    /// An in-flight record untouched for this long is considered abandoned.
    pub render_lease: Duration,
    /// Page cap for inline previews.
    pub preview_pages: u32,
}

impl Default for ExportPolicy {
    fn default() -> Self {
        Self {
            freshness: Duration::hours(24),
            url_ttl: StdDuration::from_secs(24 * 3600),
            render_lease: Duration::minutes(15),
            preview_pages: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// A fresh `ready` export with the same key was reused.
    Cached(ExportRecord),
    /// Another request is already producing this export.
    InFlight(ExportRecord),
    /// A new export was created and is now `rendering`.
    Started(ExportRecord),
}

impl BuildOutcome {
    pub fn record(&self) -> &ExportRecord {
        match self {
            BuildOutcome::Cached(r) | BuildOutcome::InFlight(r) | BuildOutcome::Started(r) => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub export_id: Uuid,
    pub status: ExportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ExportRecord> for ExportSummary {
    fn from(record: &ExportRecord) -> Self {
        Self {
            export_id: record.id,
            status: record.status,
            url: record.url.clone(),
            page_count: record.page_count.map(|n| n as u32),
            error: record.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutcome {
    pub export_id: Uuid,
    pub document_url: String,
    pub page_count: u32,
}

#[derive(Debug, Clone)]
pub struct Preview {
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

pub struct ExportService {
    repo: Arc<dyn ExportRepository>,
    source: Arc<dyn ContentSource>,
    store: Arc<dyn ArtifactStore>,
    fonts: Arc<dyn FontSource>,
    notifier: Arc<dyn Notifier>,
    policy: ExportPolicy,
}

impl ExportService {
    pub fn new(
        repo: Arc<dyn ExportRepository>,
        source: Arc<dyn ContentSource>,
        store: Arc<dyn ArtifactStore>,
        fonts: Arc<dyn FontSource>,
        notifier: Arc<dyn Notifier>,
        policy: ExportPolicy,
    ) -> Self {
        Self {
            repo,
            source,
            store,
            fonts,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &ExportPolicy {
        &self.policy
    }

    // ── build ───────────────────────────────────────────────────────────────

    pub async fn build(&self, user_id: Uuid, theme: Theme) -> Result<BuildOutcome, AppError> {
        let manuscript = self.fetch_and_build(user_id).await?;
        let key = ExportKey {
            user_id,
            kind: ExportKind::Premium,
            theme,
            content_signature: manuscript.content_signature.clone(),
        };

        let since = Utc::now() - self.policy.freshness;
        if let Some(record) = self.repo.find_fresh_ready(&key, since).await? {
            info!(export_id = %record.id, %user_id, "Export cache hit");
            let record = self.with_current_url(record).await?;
            return Ok(BuildOutcome::Cached(record));
        }

        if let Some(record) = self.live_in_flight(&key).await? {
            info!(export_id = %record.id, %user_id, "Export already in flight");
            return Ok(BuildOutcome::InFlight(record));
        }

        let export_id = Uuid::new_v4();
        let new = NewExport {
            id: export_id,
            user_id,
            kind: ExportKind::Premium,
            theme,
            content_signature: key.content_signature.clone(),
            manuscript_key: manuscript_key(user_id, export_id),
        };

        let Some(record) = self.repo.insert_formatting(&new).await? else {
            // Lost the race to a concurrent build of the same content.
            return match self.repo.find_in_flight(&key).await? {
                Some(record) => Ok(BuildOutcome::InFlight(record)),
                None => Err(AppError::Conflict(
                    "a concurrent build for this content just finished; retry".to_string(),
                )),
            };
        };
        info!(%export_id, %user_id, theme = theme.as_str(), "Export created");

        if let Err(e) = self.persist_manuscript(&record, &manuscript).await {
            self.mark_failed(&record, ExportStatus::Formatting, &e).await;
            return Err(e);
        }

        if !self
            .repo
            .transition(record.id, ExportStatus::Formatting, Transition::Rendering)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "export {export_id} left formatting unexpectedly"
            )));
        }

        let record = self.require(export_id).await?;
        Ok(BuildOutcome::Started(record))
    }

    /// Build, then render a newly started export in the same request.
    pub async fn build_and_render(&self, user_id: Uuid, theme: Theme) -> Result<ExportSummary, AppError> {
        match self.build(user_id, theme).await? {
            BuildOutcome::Started(record) => {
                self.render(record.id).await?;
                let record = self.require(record.id).await?;
                Ok(ExportSummary::from(&record))
            }
            outcome => Ok(ExportSummary::from(outcome.record())),
        }
    }

    async fn fetch_and_build(&self, user_id: Uuid) -> Result<Manuscript, AppError> {
        let profile = self
            .source
            .profile(user_id)
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {user_id} not found")))?;
        let entries = self
            .source
            .entries(user_id)
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        build_manuscript(&profile, &entries)
    }

    /// In-flight record for `key`, reclaiming it first if its lease expired.
    async fn live_in_flight(&self, key: &ExportKey) -> Result<Option<ExportRecord>, AppError> {
        let Some(record) = self.repo.find_in_flight(key).await? else {
            return Ok(None);
        };

        let lease_cutoff = Utc::now() - self.policy.render_lease;
        if record.updated_at >= lease_cutoff {
            return Ok(Some(record));
        }

        let reclaimed = self
            .repo
            .transition(
                record.id,
                record.status,
                Transition::Failed {
                    message: LEASE_EXPIRED_MESSAGE.to_string(),
                },
            )
            .await?;
        if reclaimed {
            warn!(export_id = %record.id, status = %record.status, "Reclaimed stale export");
            Ok(None)
        } else {
            // Moved on while we looked; whatever holds the key now wins.
            Ok(self.repo.find_in_flight(key).await?)
        }
    }

    async fn persist_manuscript(&self, record: &ExportRecord, manuscript: &Manuscript) -> Result<(), AppError> {
        let body = serde_json::to_vec(manuscript)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("manuscript serialization failed: {e}")))?;
        self.store
            .put(&record.manuscript_key, body, JSON_CONTENT_TYPE)
            .await?;
        Ok(())
    }

    // ── render ──────────────────────────────────────────────────────────────

    /// Renders a `rendering` export and moves it to `ready`. Any failure moves
    /// it to `error` instead. Already-ready exports are returned unchanged.
    pub async fn render(&self, export_id: Uuid) -> Result<RenderOutcome, AppError> {
        let record = self.require(export_id).await?;

        match record.status {
            ExportStatus::Ready => return ready_outcome(&self.with_current_url(record).await?),
            ExportStatus::Error => {
                return Err(AppError::Conflict(format!(
                    "export {export_id} failed: {}",
                    record.error_message.as_deref().unwrap_or("unknown error")
                )))
            }
            ExportStatus::Formatting => {
                return Err(AppError::Conflict(format!(
                    "export {export_id} is still formatting"
                )))
            }
            ExportStatus::Rendering => {}
        }

        let (document_key, document) = match self.produce_document(&record).await {
            Ok(produced) => produced,
            Err(e) => {
                self.mark_failed(&record, ExportStatus::Rendering, &e).await;
                return Err(e);
            }
        };

        let url = match self.store.signed_url(&document_key, self.policy.url_ttl).await {
            Ok(url) => url,
            Err(e) => {
                let e = AppError::from(e);
                self.mark_failed(&record, ExportStatus::Rendering, &e).await;
                return Err(e);
            }
        };

        let applied = self
            .repo
            .transition(
                export_id,
                ExportStatus::Rendering,
                Transition::Ready {
                    document_key: document_key.clone(),
                    url: url.clone(),
                    page_count: document.page_count,
                },
            )
            .await?;

        if !applied {
            // A concurrent render or a lease reclaim got there first.
            let current = self.require(export_id).await?;
            return match current.status {
                ExportStatus::Ready => ready_outcome(&self.with_current_url(current).await?),
                status => Err(AppError::Conflict(format!(
                    "export {export_id} moved to {status} during render"
                ))),
            };
        }

        info!(
            %export_id,
            document_key = %document_key,
            pages = document.page_count,
            "Export ready"
        );

        notify_in_background(
            self.notifier.clone(),
            CompletionNotice {
                export_id,
                url: url.clone(),
            },
        );

        Ok(RenderOutcome {
            export_id,
            document_url: url,
            page_count: document.page_count,
        })
    }

    /// First pages of an export's document, rendered without touching
    /// storage or the record.
    pub async fn preview(&self, export_id: Uuid) -> Result<Preview, AppError> {
        let record = self.require(export_id).await?;
        let manuscript = self.load_manuscript(&record).await?;
        let limit = Some(self.policy.preview_pages);
        let document = self.typeset(manuscript, record.theme, limit).await?;

        info!(%export_id, pages = document.page_count, "Preview rendered");
        Ok(Preview {
            bytes: document.bytes,
            page_count: document.page_count,
        })
    }

    async fn produce_document(&self, record: &ExportRecord) -> Result<(String, RenderedDocument), AppError> {
        let manuscript = self.load_manuscript(record).await?;
        let document = self.typeset(manuscript, record.theme, None).await?;

        let document_key = document_key(record.user_id, record.id, Utc::now().timestamp_millis());
        self.store
            .put(&document_key, document.bytes.clone(), PDF_CONTENT_TYPE)
            .await?;
        Ok((document_key, document))
    }

    async fn load_manuscript(&self, record: &ExportRecord) -> Result<Manuscript, AppError> {
        let bytes = self.store.get(&record.manuscript_key).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::StorageReadFailed(format!(
                "manuscript {} is unreadable: {e}",
                record.manuscript_key
            ))
        })
    }

    /// Loads fonts, then paginates and emits on the blocking pool.
    async fn typeset(
        &self,
        manuscript: Manuscript,
        theme: Theme,
        page_limit: Option<u32>,
    ) -> Result<RenderedDocument, AppError> {
        let fonts = self.fonts.load().await?;

        let document = tokio::task::spawn_blocking(move || {
            render_document(&manuscript, &fonts, theme, page_limit)
        })
        .await
        .map_err(|e| AppError::RenderInternal(format!("render task panicked: {e}")))??;

        Ok(document)
    }

    // ── status ──────────────────────────────────────────────────────────────

    /// Current state of an export, with an expired URL re-signed.
    pub async fn status(&self, export_id: Uuid) -> Result<ExportSummary, AppError> {
        let record = self.require(export_id).await?;
        let record = self.with_current_url(record).await?;
        Ok(ExportSummary::from(&record))
    }

    /// Replaces an expired signed URL on a ready record with a fresh one.
    /// Only the returned copy changes; the stored record keeps its URL.
    async fn with_current_url(&self, mut record: ExportRecord) -> Result<ExportRecord, AppError> {
        if record.status != ExportStatus::Ready {
            return Ok(record);
        }
        let ttl = Duration::from_std(self.policy.url_ttl).unwrap_or(self.policy.freshness);
        if record.updated_at + ttl > Utc::now() {
            return Ok(record);
        }
        if let Some(document_key) = record.document_key.as_deref() {
            let url = self.store.signed_url(document_key, self.policy.url_ttl).await?;
            debug!(export_id = %record.id, "Re-signed expired document URL");
            record.url = Some(url);
        }
        Ok(record)
    }

    // ── helpers ─────────────────────────────────────────────────────────────

    async fn require(&self, export_id: Uuid) -> Result<ExportRecord, AppError> {
        self.repo
            .get(export_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Export {export_id} not found")))
    }

    /// Moves the record to `error`. The original failure is what the caller
    /// sees, so a failure here is only logged.
    async fn mark_failed(&self, record: &ExportRecord, from: ExportStatus, cause: &AppError) {
        let transition = Transition::Failed {
            message: format!("{}: {cause}", cause.code()),
        };
        match self.repo.transition(record.id, from, transition).await {
            Ok(true) => error!(export_id = %record.id, code = cause.code(), "Export failed: {cause}"),
            Ok(false) => warn!(export_id = %record.id, "Export already left {from}; not marking error"),
            Err(e) => warn!(export_id = %record.id, "Could not mark export as failed: {e}"),
        }
    }
}

fn ready_outcome(record: &ExportRecord) -> Result<RenderOutcome, AppError> {
    match (&record.url, record.page_count) {
        (Some(url), Some(pages)) => Ok(RenderOutcome {
            export_id: record.id,
            document_url: url.clone(),
            page_count: pages as u32,
        }),
        _ => Err(AppError::Internal(anyhow::anyhow!(
            "ready export {} is missing its url or page count",
            record.id
        ))),
    }
}

/// Versioned document key; a new render never reuses an old key.
pub fn document_key(user_id: Uuid, export_id: Uuid, render_epoch_ms: i64) -> String {
    format!("{user_id}/{export_id}-{render_epoch_ms}.pdf")
}
