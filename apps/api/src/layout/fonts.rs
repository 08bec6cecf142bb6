//! Font resource manager: loads, validates and measures the four book fonts.
//!
//! Every asset is checked for a minimum size and a recognized sfnt signature
//! before it is parsed. Any failure is fatal for the render: there is no
//! degraded mode with a partial font set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Anything smaller than this is a truncated download or a placeholder.
pub const MIN_FONT_BYTES: usize = 10 * 1024;

// ────────────────────────────────────────────────────────────────────────────
// Capability interface
// ────────────────────────────────────────────────────────────────────────────

/// Measuring and coverage capability shared by every font backend.
pub trait FontHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Advance width of `text` in points at `size`.
    fn measure(&self, text: &str, size: f32) -> f32;

    /// True when every character of `text` has a glyph in this font.
    fn encodable(&self, text: &str) -> bool;
}

impl<T: FontHandle + ?Sized> FontHandle for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn measure(&self, text: &str, size: f32) -> f32 {
        (**self).measure(text, size)
    }

    fn encodable(&self, text: &str) -> bool {
        (**self).encodable(text)
    }
}

/// The four fonts a premium book is set in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontRole {
    /// Body text, running headers, folios, date footers.
    Body,
    /// Title page and section dividers.
    Display,
    /// Full-coverage font substituted when the primary lacks a glyph.
    Fallback,
    /// Preformatted lines.
    Mono,
}

impl FontRole {
    pub const ALL: [FontRole; 4] = [
        FontRole::Body,
        FontRole::Display,
        FontRole::Fallback,
        FontRole::Mono,
    ];

    /// File name looked up in the font directory.
    pub fn asset_name(&self) -> &'static str {
        match self {
            FontRole::Body => "DejaVuSerif.ttf",
            FontRole::Display => "DejaVuSerif-Bold.ttf",
            FontRole::Fallback => "DejaVuSans.ttf",
            FontRole::Mono => "DejaVuSansMono.ttf",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FontError {
    #[error("font asset '{name}' could not be read: {source}")]
    Unreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("font asset '{name}' is {len} bytes, below the {min}-byte minimum")]
    Undersized { name: String, len: usize, min: usize },

    #[error("font asset '{name}' has unrecognized signature {signature}")]
    UnknownSignature { name: String, signature: String },

    #[error("font asset '{name}' could not be parsed: {reason}")]
    Malformed { name: String, reason: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Outline flavour of a validated sfnt file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outline {
    TrueType,
    Cff,
}

/// Checks size and magic bytes. Returns the outline flavour on success.
pub fn validate_font_bytes(name: &str, data: &[u8]) -> Result<Outline, FontError> {
    if data.len() < MIN_FONT_BYTES {
        return Err(FontError::Undersized {
            name: name.to_string(),
            len: data.len(),
            min: MIN_FONT_BYTES,
        });
    }

    let magic = [data[0], data[1], data[2], data[3]];
    match &magic {
        [0x00, 0x01, 0x00, 0x00] | b"true" => Ok(Outline::TrueType),
        b"OTTO" => Ok(Outline::Cff),
        _ => Err(FontError::UnknownSignature {
            name: name.to_string(),
            signature: hex::encode(magic),
        }),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Parsed font
// ────────────────────────────────────────────────────────────────────────────

/// Vertical metrics in font units.
#[derive(Debug, Clone, Copy)]
pub struct VerticalMetrics {
    pub ascender: i16,
    pub descender: i16,
    pub cap_height: i16,
    pub bbox: [i16; 4],
}

/// A validated font file with its cmap and advances extracted up front,
/// so the handle owns no borrowed parser state.
pub struct LoadedFont {
    name: String,
    data: Vec<u8>,
    outline: Outline,
    units_per_em: u16,
    glyphs: HashMap<char, u16>,
    advances: Vec<u16>,
    vertical: VerticalMetrics,
}

impl LoadedFont {
    pub fn from_bytes(name: &str, role: FontRole, data: Vec<u8>) -> Result<Self, FontError> {
        let outline = validate_font_bytes(name, &data)?;

        let face = ttf_parser::Face::parse(&data, 0).map_err(|e| FontError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let units_per_em = face.units_per_em();
        if units_per_em == 0 {
            return Err(FontError::Malformed {
                name: name.to_string(),
                reason: "units_per_em is zero".to_string(),
            });
        }

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    if let (Some(ch), Some(gid)) = (char::from_u32(cp), subtable.glyph_index(cp)) {
                        glyphs.entry(ch).or_insert(gid.0);
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err(FontError::Malformed {
                name: name.to_string(),
                reason: "no unicode cmap".to_string(),
            });
        }

        let advances = (0..face.number_of_glyphs())
            .map(|gid| face.glyph_hor_advance(ttf_parser::GlyphId(gid)).unwrap_or(0))
            .collect();

        let bbox = face.global_bounding_box();
        let vertical = VerticalMetrics {
            ascender: face.ascender(),
            descender: face.descender(),
            cap_height: face.capital_height().unwrap_or_else(|| face.ascender()),
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
        };

        debug!(font = name, ?role, glyphs = glyphs.len(), "Parsed font asset");

        Ok(Self {
            name: name.to_string(),
            data,
            outline,
            units_per_em,
            glyphs,
            advances,
            vertical,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn outline(&self) -> Outline {
        self.outline
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn vertical_metrics(&self) -> VerticalMetrics {
        self.vertical
    }

    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        self.glyphs.get(&ch).copied()
    }

    /// Advance of a glyph in font units; unknown ids measure as `.notdef`.
    pub fn advance(&self, gid: u16) -> u16 {
        self.advances
            .get(gid as usize)
            .or_else(|| self.advances.first())
            .copied()
            .unwrap_or(0)
    }
}

impl FontHandle for LoadedFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn measure(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|c| self.advance(self.glyph_id(c).unwrap_or(0)) as u32)
            .sum();
        units as f32 * size / self.units_per_em as f32
    }

    fn encodable(&self, text: &str) -> bool {
        text.chars().all(|c| self.glyphs.contains_key(&c))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font set and fallback guard
// ────────────────────────────────────────────────────────────────────────────

/// One font per role. Generic so the layout engine works with any backend.
pub struct FontSet<F> {
    pub body: F,
    pub display: F,
    pub fallback: F,
    pub mono: F,
}

impl<F: FontHandle> FontSet<F> {
    pub fn get(&self, role: FontRole) -> &F {
        match role {
            FontRole::Body => &self.body,
            FontRole::Display => &self.display,
            FontRole::Fallback => &self.fallback,
            FontRole::Mono => &self.mono,
        }
    }

    /// Role that will actually draw `text` when `primary` is requested:
    /// the primary if it can encode the whole string, otherwise the fallback.
    pub fn resolve(&self, primary: FontRole, text: &str) -> FontRole {
        if self.get(primary).encodable(text) {
            primary
        } else {
            FontRole::Fallback
        }
    }

    /// Measuring view of `primary` with the fallback substitution applied.
    pub fn guarded(&self, primary: FontRole) -> Guarded<'_, F> {
        Guarded {
            primary: self.get(primary),
            fallback: &self.fallback,
        }
    }
}

/// Measures with the primary font, or with the fallback for strings the
/// primary cannot encode. Mirrors what the draw call will do.
pub struct Guarded<'a, F> {
    primary: &'a F,
    fallback: &'a F,
}

impl<F: FontHandle> FontHandle for Guarded<'_, F> {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn measure(&self, text: &str, size: f32) -> f32 {
        if self.primary.encodable(text) {
            self.primary.measure(text, size)
        } else {
            self.fallback.measure(text, size)
        }
    }

    fn encodable(&self, text: &str) -> bool {
        self.primary.encodable(text) || self.fallback.encodable(text)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loading
// ────────────────────────────────────────────────────────────────────────────

async fn load_font(dir: &Path, role: FontRole) -> Result<LoadedFont, FontError> {
    let name = role.asset_name();
    let path: PathBuf = dir.join(name);
    let data = tokio::fs::read(&path)
        .await
        .map_err(|source| FontError::Unreadable {
            name: name.to_string(),
            source,
        })?;
    LoadedFont::from_bytes(name, role, data)
}

/// Loads all four fonts concurrently. All-or-nothing: the first failure
/// aborts the whole set.
pub async fn load_font_set(dir: &Path) -> Result<FontSet<LoadedFont>, FontError> {
    let (body, display, fallback, mono) = tokio::try_join!(
        load_font(dir, FontRole::Body),
        load_font(dir, FontRole::Display),
        load_font(dir, FontRole::Fallback),
        load_font(dir, FontRole::Mono),
    )?;

    info!(dir = %dir.display(), "Font set loaded");

    Ok(FontSet {
        body,
        display,
        fallback,
        mono,
    })
}
