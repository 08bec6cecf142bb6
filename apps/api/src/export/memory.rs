//! In-memory collaborators for exercising the export lifecycle in tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::export::lifecycle::{ExportPolicy, ExportService};
use crate::export::notify::{CompletionNotice, Notifier, NotifyError};
use crate::export::repo::{ExportRepository, NewExport, RepoError, Transition};
use crate::export::source::{ContentSource, SourceError};
use crate::layout::fonts::FontError;
use crate::layout::metrics::MetricFont;
use crate::models::entry::{EntryRow, ProfileRow};
use crate::models::export::{ExportKey, ExportRecord, ExportStatus};
use crate::render::{BookFonts, FontSource};
use crate::storage::memory::MemoryArtifactStore;

// ────────────────────────────────────────────────────────────────────────────
// Repository
// ────────────────────────────────────────────────────────────────────────────

/// Mirrors the Postgres repository, including in-flight fencing.
#[derive(Default)]
pub struct MemoryExportRepository {
    records: Mutex<Vec<ExportRecord>>,
}

impl MemoryExportRepository {
    pub async fn all(&self) -> Vec<ExportRecord> {
        self.records.lock().await.clone()
    }

    /// Shifts a record's timestamps into the past.
    pub async fn backdate(&self, id: Uuid, by: Duration) {
        let mut records = self.records.lock().await;
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.created_at -= by;
            record.updated_at -= by;
        }
    }
}

#[async_trait]
impl ExportRepository for MemoryExportRepository {
    async fn find_fresh_ready(
        &self,
        key: &ExportKey,
        since: DateTime<Utc>,
    ) -> Result<Option<ExportRecord>, RepoError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|r| r.key() == *key && r.status == ExportStatus::Ready && r.created_at >= since)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn find_in_flight(&self, key: &ExportKey) -> Result<Option<ExportRecord>, RepoError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|r| r.key() == *key && r.status.is_in_flight())
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn insert_formatting(&self, new: &NewExport) -> Result<Option<ExportRecord>, RepoError> {
        let mut records = self.records.lock().await;
        let key = new.key();
        if records.iter().any(|r| r.key() == key && r.status.is_in_flight()) {
            return Ok(None);
        }

        let now = Utc::now();
        let record = ExportRecord {
            id: new.id,
            user_id: new.user_id,
            kind: new.kind,
            theme: new.theme,
            status: ExportStatus::Formatting,
            content_signature: new.content_signature.clone(),
            manuscript_key: new.manuscript_key.clone(),
            document_key: None,
            url: None,
            page_count: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        records.push(record.clone());
        Ok(Some(record))
    }

    async fn get(&self, id: Uuid) -> Result<Option<ExportRecord>, RepoError> {
        Ok(self.records.lock().await.iter().find(|r| r.id == id).cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ExportStatus,
        transition: Transition,
    ) -> Result<bool, RepoError> {
        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        let to = transition.status();
        if record.status != from || !from.can_transition_to(to) {
            return Ok(false);
        }

        record.status = to;
        record.updated_at = Utc::now();
        match transition {
            Transition::Rendering => {}
            Transition::Ready {
                document_key,
                url,
                page_count,
            } => {
                record.document_key = Some(document_key);
                record.url = Some(url);
                record.page_count = Some(page_count as i32);
            }
            Transition::Failed { message } => record.error_message = Some(message),
        }
        Ok(true)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Content, fonts, notifications
// ────────────────────────────────────────────────────────────────────────────

pub struct StaticContentSource {
    profile: Mutex<Option<ProfileRow>>,
    entries: Mutex<Vec<EntryRow>>,
    failing: AtomicBool,
}

impl StaticContentSource {
    pub fn new(profile: ProfileRow, entries: Vec<EntryRow>) -> Self {
        Self {
            profile: Mutex::new(Some(profile)),
            entries: Mutex::new(entries),
            failing: AtomicBool::new(false),
        }
    }

    pub async fn set_entries(&self, entries: Vec<EntryRow>) {
        *self.entries.lock().await = entries;
    }

    pub async fn set_dedication(&self, dedication: Option<&str>) {
        if let Some(profile) = self.profile.lock().await.as_mut() {
            profile.dedication = dedication.map(str::to_string);
        }
    }

    pub async fn remove_profile(&self) {
        *self.profile.lock().await = None;
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(SourceError("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentSource for StaticContentSource {
    async fn profile(&self, _user_id: Uuid) -> Result<Option<ProfileRow>, SourceError> {
        self.check()?;
        Ok(self.profile.lock().await.clone())
    }

    async fn entries(&self, _user_id: Uuid) -> Result<Vec<EntryRow>, SourceError> {
        self.check()?;
        Ok(self.entries.lock().await.clone())
    }
}

/// Serves the table-driven metric fonts, or a validation failure on demand.
#[derive(Default)]
pub struct StaticFonts {
    loads: AtomicUsize,
    corrupt: AtomicBool,
}

impl StaticFonts {
    pub fn corrupt(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FontSource for StaticFonts {
    async fn load(&self) -> Result<BookFonts, FontError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.corrupt.load(Ordering::SeqCst) {
            return Err(FontError::UnknownSignature {
                name: "DejaVuSerif.ttf".to_string(),
                signature: "3c68746d".to_string(),
            });
        }
        Ok(MetricFont::boxed_set())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<CompletionNotice>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn notices(&self) -> Vec<CompletionNotice> {
        self.notices.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn export_ready(&self, notice: &CompletionNotice) -> Result<(), NotifyError> {
        self.notices.lock().await.push(notice.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Status(500));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

pub fn user_id() -> Uuid {
    Uuid::from_u128(0x5EED)
}

pub fn profile() -> ProfileRow {
    ProfileRow {
        user_id: user_id(),
        display_name: "Rosa Parks".to_string(),
        book_title: Some("Things Worth Keeping".to_string()),
        dedication: Some("For Raymond.".to_string()),
        timezone: "-05:00".to_string(),
        locale: "en-US".to_string(),
    }
}

pub fn entry(n: u128, category: &str, content: &str) -> EntryRow {
    let at = Utc.with_ymd_and_hms(2025, 2, 1, 15, 0, 0).unwrap() + Duration::hours(n as i64);
    EntryRow {
        id: Uuid::from_u128(n),
        user_id: user_id(),
        content: content.to_string(),
        category: Some(category.to_string()),
        created_at: at,
        updated_at: at,
    }
}

pub fn entries() -> Vec<EntryRow> {
    vec![
        entry(1, "Courage", "Stand your ground when it matters."),
        entry(2, "Courage", "Fear is not a reason to stay seated."),
        entry(3, "Family", "Sunday dinners are not optional."),
    ]
}

/// A service wired to in-memory collaborators, with handles to each.
pub struct Harness {
    pub repo: Arc<MemoryExportRepository>,
    pub source: Arc<StaticContentSource>,
    pub store: Arc<MemoryArtifactStore>,
    pub fonts: Arc<StaticFonts>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: Arc<ExportService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_entries(entries())
    }

    pub fn with_entries(entries: Vec<EntryRow>) -> Self {
        Self::with_policy(entries, ExportPolicy::default())
    }

    pub fn with_policy(entries: Vec<EntryRow>, policy: ExportPolicy) -> Self {
        let repo = Arc::new(MemoryExportRepository::default());
        let source = Arc::new(StaticContentSource::new(profile(), entries));
        let store = Arc::new(MemoryArtifactStore::new());
        let fonts = Arc::new(StaticFonts::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = Arc::new(ExportService::new(
            repo.clone(),
            source.clone(),
            store.clone(),
            fonts.clone(),
            notifier.clone(),
            policy,
        ));
        Self {
            repo,
            source,
            store,
            fonts,
            notifier,
            service,
        }
    }

    pub async fn record(&self, id: Uuid) -> ExportRecord {
        self.repo
            .get(id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("export {id} missing"))
    }
}
