use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Author-facing settings read from the profile store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub display_name: String,
    pub book_title: Option<String>,
    pub dedication: Option<String>,
    pub timezone: String,
    pub locale: String,
}

/// A short text entry. `category` is filled in by the upstream classifier
/// and may be missing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every edit; the newest value feeds the content signature.
    pub updated_at: DateTime<Utc>,
}
