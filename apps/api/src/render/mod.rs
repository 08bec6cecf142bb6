// Turns a manuscript into document bytes: paginate, then emit PDF.
// Both steps are CPU-bound and run inside spawn_blocking on the async side.

pub mod pdf;

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::layout::fonts::{load_font_set, FontError, FontSet};
use crate::layout::geometry::PageGeometry;
use crate::layout::paginate::{paginate, LayoutError, LayoutOptions};
use crate::manuscript::models::Manuscript;
use crate::models::export::Theme;

pub use pdf::{DocumentInfo, PdfFont};

/// Boxed font set handed to the renderer.
pub type BookFonts = FontSet<Box<dyn PdfFont>>;

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub page_count: u32,
    /// True when a page limit cut the document short.
    pub truncated: bool,
}

/// Paginates and emits a manuscript. Deterministic for identical inputs.
pub fn render_document<F: PdfFont>(
    manuscript: &Manuscript,
    fonts: &FontSet<F>,
    theme: Theme,
    page_limit: Option<u32>,
) -> Result<RenderedDocument, LayoutError> {
    let geometry = PageGeometry::default();
    let options = LayoutOptions { theme, page_limit };
    let layout = paginate(manuscript, fonts, &geometry, &options)?;

    let info = DocumentInfo {
        title: &manuscript.meta.title,
        author: &manuscript.meta.author,
    };
    let bytes = pdf::write_pdf(&layout, fonts, &geometry, &info);

    info!(
        signature = %manuscript.content_signature,
        pages = layout.page_count(),
        truncated = layout.truncated,
        fonts = ?pdf::fonts_used(&layout),
        bytes = bytes.len(),
        "Document rendered"
    );

    Ok(RenderedDocument {
        bytes,
        page_count: layout.page_count(),
        truncated: layout.truncated,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Font source
// ────────────────────────────────────────────────────────────────────────────

/// Supplies the font set for one render.
#[async_trait]
pub trait FontSource: Send + Sync {
    async fn load(&self) -> Result<BookFonts, FontError>;
}

/// Loads and validates the bundled font files from a directory on every call.
pub struct FontDirectory {
    dir: PathBuf,
}

impl FontDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FontSource for FontDirectory {
    async fn load(&self) -> Result<BookFonts, FontError> {
        let set = load_font_set(&self.dir).await?;
        Ok(FontSet {
            body: Box::new(set.body),
            display: Box::new(set.display),
            fallback: Box::new(set.fallback),
            mono: Box::new(set.mono),
        })
    }
}
