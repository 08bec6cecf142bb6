use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Category assigned to entries the classifier left blank.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// The structured, signature-addressed document between raw entries and
/// the paginated book. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manuscript {
    pub meta: ManuscriptMeta,
    pub content_signature: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManuscriptMeta {
    pub title: String,
    pub author: String,
    pub dedication: Option<String>,
    pub timezone: String,
    pub locale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub category: String,
    pub entries: Vec<Page>,
}

/// One source entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub entry_id: Uuid,
    pub content: String,
    pub date: DateTime<Utc>,
    /// Always false in a built manuscript. Continuation is decided by the
    /// layout engine and reported on its page plans.
    #[serde(default)]
    pub continued: bool,
}

impl Manuscript {
    /// Zone used for date footers. Unparsable zones fall back to UTC.
    pub fn zone(&self) -> BookZone {
        BookZone::parse(&self.meta.timezone).unwrap_or_else(|| {
            debug!(timezone = %self.meta.timezone, "Unrecognized timezone, using UTC");
            BookZone::Fixed(utc())
        })
    }
}

/// A profile timezone: an IANA name, or a bare UTC offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BookZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl BookZone {
    pub fn parse(tz: &str) -> Option<Self> {
        let tz = tz.trim();
        if let Ok(named) = tz.parse::<Tz>() {
            return Some(BookZone::Named(named));
        }
        parse_utc_offset(tz).map(BookZone::Fixed)
    }

    /// Offset in effect at `at`. Named zones follow daylight saving.
    pub fn offset_at(&self, at: DateTime<Utc>) -> FixedOffset {
        match self {
            BookZone::Named(tz) => at.with_timezone(tz).offset().fix(),
            BookZone::Fixed(offset) => *offset,
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parses `UTC`, `Z`, `+05:30`, `-0800` style zones.
pub fn parse_utc_offset(tz: &str) -> Option<FixedOffset> {
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("utc") || tz.eq_ignore_ascii_case("z") || tz == "GMT" {
        return Some(utc());
    }

    let (sign, rest) = match tz.chars().next()? {
        '+' => (1, &tz[1..]),
        '-' => (-1, &tz[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
