//! Manuscript Builder: entries + profile → signature-addressed manuscript.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::text::{sanitize_for_layout, sanitize_for_storage};
use crate::manuscript::models::{Manuscript, ManuscriptMeta, Page, Section, DEFAULT_CATEGORY};
use crate::models::entry::{EntryRow, ProfileRow};

/// Separates hashed fields so adjacent values cannot run together.
const FIELD_SEPARATOR: &[u8] = &[0x1F];

/// Builds the manuscript for a profile and its entries.
///
/// Entries are taken in chronological order. Entries with no visible text
/// after sanitizing are skipped; if nothing remains the build fails with
/// `NoContent`.
pub fn build_manuscript(profile: &ProfileRow, entries: &[EntryRow]) -> Result<Manuscript, AppError> {
    let mut ordered: Vec<&EntryRow> = entries
        .iter()
        .filter(|e| !sanitize_for_layout(&e.content).trim().is_empty())
        .collect();
    if ordered.is_empty() {
        return Err(AppError::NoContent(format!(
            "user {} has no entries with content",
            profile.user_id
        )));
    }
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let skipped = entries.len() - ordered.len();
    if skipped > 0 {
        debug!(user_id = %profile.user_id, skipped, "Skipped blank entries");
    }

    let dedication = profile
        .dedication
        .as_deref()
        .map(sanitize_for_storage)
        .filter(|d| !d.is_empty());

    let ids: Vec<Uuid> = ordered.iter().map(|e| e.id).collect();
    let latest = ordered.iter().map(|e| e.updated_at).max().unwrap_or_default();
    let signature = content_signature(profile.user_id, dedication.as_deref(), &ids, latest);

    let mut groups: BTreeMap<String, Vec<Page>> = BTreeMap::new();
    for entry in &ordered {
        groups.entry(category_of(entry)).or_default().push(Page {
            entry_id: entry.id,
            content: sanitize_for_layout(&entry.content),
            date: entry.created_at,
            continued: false,
        });
    }
    let sections = order_sections(
        groups
            .into_iter()
            .map(|(category, entries)| Section { category, entries })
            .collect(),
    );

    let author = sanitize_for_storage(&profile.display_name);
    let title = profile
        .book_title
        .as_deref()
        .map(sanitize_for_storage)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| default_title(&author));

    info!(
        user_id = %profile.user_id,
        entries = ids.len(),
        sections = sections.len(),
        signature = %signature,
        "Manuscript built"
    );

    Ok(Manuscript {
        meta: ManuscriptMeta {
            title,
            author,
            dedication,
            timezone: profile.timezone.clone(),
            locale: profile.locale.clone(),
        },
        content_signature: signature,
        sections,
    })
}

/// SHA-256 over user, dedication, ordered entry ids and the newest entry
/// timestamp, as lowercase hex.
pub fn content_signature(
    user_id: Uuid,
    dedication: Option<&str>,
    entry_ids: &[Uuid],
    latest: DateTime<Utc>,
) -> String {
    let ids = entry_ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");

    let mut hasher = Sha256::new();
    hasher.update(user_id.to_string().as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(dedication.unwrap_or_default().as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(ids.as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(latest.to_rfc3339_opts(SecondsFormat::Micros, true).as_bytes());
    hex::encode(hasher.finalize())
}

/// Descending entry count, ties broken by ascending category name.
pub fn order_sections(mut sections: Vec<Section>) -> Vec<Section> {
    sections.sort_by(|a, b| {
        b.entries
            .len()
            .cmp(&a.entries.len())
            .then_with(|| a.category.cmp(&b.category))
    });
    sections
}

/// Blob key of the manuscript persisted for an export.
pub fn manuscript_key(user_id: Uuid, export_id: Uuid) -> String {
    format!("{user_id}/{export_id}.json")
}

fn category_of(entry: &EntryRow) -> String {
    entry
        .category
        .as_deref()
        .map(sanitize_for_storage)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

fn default_title(author: &str) -> String {
    if author.is_empty() {
        "A Book of Days".to_string()
    } else {
        format!("The Book of {author}")
    }
}
