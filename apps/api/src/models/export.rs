use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Status state machine
// ────────────────────────────────────────────────────────────────────────────

/// `formatting → rendering → {ready | error}`. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Formatting,
    Rendering,
    Ready,
    Error,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::Formatting => "formatting",
            ExportStatus::Rendering => "rendering",
            ExportStatus::Ready => "ready",
            ExportStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportStatus::Ready | ExportStatus::Error)
    }

    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(&self, next: ExportStatus) -> bool {
        use ExportStatus::*;
        match (self, next) {
            (Formatting, Rendering) | (Formatting, Error) => true,
            (Rendering, Ready) | (Rendering, Error) => true,
            (Formatting, _) | (Rendering, _) => false,
            (Ready, _) | (Error, _) => false,
        }
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "formatting" => Ok(ExportStatus::Formatting),
            "rendering" => Ok(ExportStatus::Rendering),
            "ready" => Ok(ExportStatus::Ready),
            "error" => Ok(ExportStatus::Error),
            other => Err(format!("unknown export status '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Kind and theme
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Premium,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Premium => "premium",
        }
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "premium" => Ok(ExportKind::Premium),
            other => Err(format!("unknown export kind '{other}'")),
        }
    }
}

/// Visual treatment of ornaments and the title page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Classic,
    Minimal,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Classic => "classic",
            Theme::Minimal => "minimal",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Theme::Classic),
            "minimal" => Ok(Theme::Minimal),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Record
// ────────────────────────────────────────────────────────────────────────────

/// Raw `exports` row as stored in Postgres.
#[derive(Debug, Clone, FromRow)]
pub struct ExportRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub theme: String,
    pub status: String,
    pub content_signature: String,
    pub manuscript_key: String,
    pub document_key: Option<String>,
    pub url: Option<String>,
    pub page_count: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One render attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: ExportKind,
    pub theme: Theme,
    pub status: ExportStatus,
    pub content_signature: String,
    pub manuscript_key: String,
    pub document_key: Option<String>,
    pub url: Option<String>,
    pub page_count: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ExportRow> for ExportRecord {
    type Error = String;

    fn try_from(row: ExportRow) -> Result<Self, Self::Error> {
        Ok(ExportRecord {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            theme: row.theme.parse()?,
            status: row.status.parse()?,
            content_signature: row.content_signature,
            manuscript_key: row.manuscript_key,
            document_key: row.document_key,
            url: row.url,
            page_count: row.page_count,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Cache / fencing key of an export.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportKey {
    pub user_id: Uuid,
    pub kind: ExportKind,
    pub theme: Theme,
    pub content_signature: String,
}

impl ExportRecord {
    pub fn key(&self) -> ExportKey {
        ExportKey {
            user_id: self.user_id,
            kind: self.kind,
            theme: self.theme,
            content_signature: self.content_signature.clone(),
        }
    }
}
