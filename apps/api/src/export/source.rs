//! Read access to the profile and entry stores owned by other services.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::entry::{EntryRow, ProfileRow};

#[derive(Debug, Error)]
#[error("content fetch failed: {0}")]
pub struct SourceError(pub String);

impl From<sqlx::Error> for SourceError {
    fn from(e: sqlx::Error) -> Self {
        SourceError(e.to_string())
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn profile(&self, user_id: Uuid) -> Result<Option<ProfileRow>, SourceError>;

    /// All entries of a user, oldest first.
    async fn entries(&self, user_id: Uuid) -> Result<Vec<EntryRow>, SourceError>;
}

#[derive(Clone)]
pub struct PgContentSource {
    pool: PgPool,
}

impl PgContentSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentSource for PgContentSource {
    async fn profile(&self, user_id: Uuid) -> Result<Option<ProfileRow>, SourceError> {
        Ok(sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, display_name, book_title, dedication, timezone, locale
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn entries(&self, user_id: Uuid) -> Result<Vec<EntryRow>, SourceError> {
        Ok(sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT id, user_id, content, category, created_at, updated_at
            FROM entries
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
