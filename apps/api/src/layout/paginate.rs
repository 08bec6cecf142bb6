//! Pagination / typesetting engine.
//!
//! Lays a `Manuscript` onto fixed-size pages and returns one `PagePlan` per
//! page: positioned text runs and ornaments, with the font for every run
//! already resolved through the fallback guard. Emission to bytes happens
//! in `render::pdf`; nothing here touches I/O.
//!
//! # Page order
//! 1. Title page, then the dedication page when there is one.
//! 2. Per section: a blank filler when the page count is even, so the
//!    section opener lands on an even (recto) page. The opener carries the
//!    category divider above the section's first entry.
//! 3. Per entry: pages are allocated while wrapped lines remain. Every entry
//!    page has a folio, a date footer and the running header, except the
//!    section opener which carries the divider in the header's place. The
//!    first page of an entry carries the ornament, later pages the
//!    continuation marker.

use std::collections::VecDeque;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::layout::fonts::{FontHandle, FontRole, FontSet};
use crate::layout::geometry::{Frame, PageGeometry, Side};
use crate::layout::text::{
    is_preformatted, sanitize_for_layout, strip_preformatted_marker, wrap, LayoutLine, LineKind,
};
use crate::manuscript::models::{Manuscript, Page};
use crate::models::export::Theme;

pub const CONTINUED_MARKER: &str = "(continued)";

const TITLE_SIZE: f32 = 26.0;
const TITLE_LEADING: f32 = 32.0;
const AUTHOR_SIZE: f32 = 13.0;
const DIVIDER_SIZE: f32 = 18.0;
/// Vertical space taken by the ornament at the head of an entry.
const ORNAMENT_BLOCK: f32 = 20.0;
/// Vertical space taken by the continuation marker.
const CONTINUED_BLOCK: f32 = 20.0;
/// Vertical space taken by the category divider on a section opener.
const DIVIDER_BLOCK: f32 = 96.0;

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageKind {
    Title,
    Dedication,
    Blank,
    Entry {
        entry_id: Uuid,
        category: String,
        /// True on every page of an entry after its first.
        continued: bool,
        /// True on the page that carries the category divider.
        opens_section: bool,
    },
}

/// What a text run is, independent of where it sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRole {
    Title,
    Author,
    Dedication,
    Divider,
    Header,
    Folio,
    DateFooter,
    Continued,
    Body,
    Preformatted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrnamentStyle {
    /// Diamond flanked by two hairline rules.
    Fleuron,
    /// A single short rule.
    Rule,
}

impl From<Theme> for OrnamentStyle {
    fn from(theme: Theme) -> Self {
        match theme {
            Theme::Classic => OrnamentStyle::Fleuron,
            Theme::Minimal => OrnamentStyle::Rule,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        font: FontRole,
        role: TextRole,
        text: String,
    },
    Ornament {
        center_x: f32,
        y: f32,
        style: OrnamentStyle,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlan {
    pub number: u32,
    pub side: Side,
    pub kind: PageKind,
    pub ops: Vec<DrawOp>,
}

impl PagePlan {
    fn new(number: u32, kind: PageKind) -> Self {
        Self {
            number,
            side: Side::of(number),
            kind,
            ops: Vec::new(),
        }
    }

    /// Text of the body and preformatted lines placed on this page, in order.
    pub fn body_lines(&self) -> Vec<&str> {
        self.texts(&[TextRole::Body, TextRole::Preformatted])
    }

    pub fn texts(&self, roles: &[TextRole]) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { role, text, .. } if roles.contains(role) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_ornament(&self) -> bool {
        self.ops.iter().any(|op| matches!(op, DrawOp::Ornament { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub pages: Vec<PagePlan>,
    /// True when a page limit stopped pagination early.
    pub truncated: bool,
}

impl Layout {
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutOptions {
    pub theme: Theme,
    /// Stop after this many pages (previews).
    pub page_limit: Option<u32>,
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("manuscript has no sections")]
    EmptyManuscript,

    #[error("text frame on page {page} cannot hold a single line")]
    FrameTooSmall { page: u32 },
}

// ────────────────────────────────────────────────────────────────────────────
// Entry point
// ────────────────────────────────────────────────────────────────────────────

pub fn paginate<F: FontHandle>(
    manuscript: &Manuscript,
    fonts: &FontSet<F>,
    geometry: &PageGeometry,
    options: &LayoutOptions,
) -> Result<Layout, LayoutError> {
    if manuscript.sections.is_empty() {
        return Err(LayoutError::EmptyManuscript);
    }

    let mut paginator = Paginator {
        fonts,
        geometry,
        ornament: options.theme.into(),
        page_limit: options.page_limit,
        pages: Vec::new(),
        truncated: false,
    };
    paginator.run(manuscript)?;

    debug!(
        pages = paginator.pages.len(),
        truncated = paginator.truncated,
        "Pagination complete"
    );

    Ok(Layout {
        pages: paginator.pages,
        truncated: paginator.truncated,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Paginator
// ────────────────────────────────────────────────────────────────────────────

struct Paginator<'a, F> {
    fonts: &'a FontSet<F>,
    geometry: &'a PageGeometry,
    ornament: OrnamentStyle,
    page_limit: Option<u32>,
    pages: Vec<PagePlan>,
    truncated: bool,
}

/// Per-entry context shared by its pages.
struct EntryContext<'m> {
    author: &'m str,
    category: &'m str,
    date_line: String,
    opens_section: bool,
}

impl<'a, F: FontHandle> Paginator<'a, F> {
    fn run(&mut self, manuscript: &Manuscript) -> Result<(), LayoutError> {
        self.title_page(manuscript);

        if let Some(dedication) = manuscript.meta.dedication.as_deref() {
            if !dedication.trim().is_empty() {
                if self.stop_here() {
                    return Ok(());
                }
                self.dedication_page(dedication);
            }
        }

        let zone = manuscript.zone();
        for section in &manuscript.sections {
            if self.stop_here() {
                return Ok(());
            }
            if self.pages.len() % 2 == 0 {
                self.push(PagePlan::new(self.next_number(), PageKind::Blank));
            }

            for (index, entry) in section.entries.iter().enumerate() {
                if self.stop_here() {
                    return Ok(());
                }
                let context = EntryContext {
                    author: &manuscript.meta.author,
                    category: &section.category,
                    date_line: format_entry_date(entry.date, zone.offset_at(entry.date)),
                    opens_section: index == 0,
                };
                self.entry_pages(entry, &context)?;
            }
        }
        Ok(())
    }

    fn next_number(&self) -> u32 {
        self.pages.len() as u32 + 1
    }

    fn is_full(&self) -> bool {
        self.page_limit
            .is_some_and(|limit| self.pages.len() as u32 >= limit)
    }

    /// Checks the page limit before more content is placed, recording the
    /// truncation when it is hit.
    fn stop_here(&mut self) -> bool {
        if self.is_full() {
            self.truncated = true;
        }
        self.truncated
    }

    fn push(&mut self, page: PagePlan) {
        self.pages.push(page);
    }

    // ── front matter ────────────────────────────────────────────────────────

    fn title_page(&mut self, manuscript: &Manuscript) {
        let mut page = PagePlan::new(self.next_number(), PageKind::Title);
        let frame = self.geometry.frame(page.number);
        let center = self.geometry.width / 2.0;

        let mut y = self.geometry.height * 0.64;
        let title_font = self.fonts.guarded(FontRole::Display);
        for line in wrap(&manuscript.meta.title, frame.width(), &title_font, TITLE_SIZE) {
            page.ops.push(self.centered(FontRole::Display, TextRole::Title, &line, center, y, TITLE_SIZE));
            y -= TITLE_LEADING;
        }

        page.ops.push(DrawOp::Ornament {
            center_x: center,
            y: y + TITLE_LEADING / 2.0 - 6.0,
            style: self.ornament,
        });

        y -= AUTHOR_SIZE * 1.5;
        page.ops.push(self.centered(
            FontRole::Body,
            TextRole::Author,
            &manuscript.meta.author,
            center,
            y,
            AUTHOR_SIZE,
        ));

        self.push(page);
    }

    fn dedication_page(&mut self, dedication: &str) {
        let mut page = PagePlan::new(self.next_number(), PageKind::Dedication);
        let frame = self.geometry.frame(page.number);
        let size = self.geometry.body_size;
        let text = sanitize_for_layout(dedication);
        let body = self.fonts.guarded(FontRole::Body);

        let mut y = self.geometry.height * 0.66;
        for line in wrap(text.trim(), frame.width() * 0.8, &body, size) {
            if y - self.geometry.leading < frame.bottom {
                warn!(page = page.number, "Dedication clipped at frame bottom");
                break;
            }
            y -= self.geometry.leading;
            if line.is_empty() {
                y -= self.geometry.paragraph_spacing;
                continue;
            }
            page.ops.push(self.centered(FontRole::Body, TextRole::Dedication, &line, frame.center_x(), y, size));
        }

        self.push(page);
    }

    // ── entries ─────────────────────────────────────────────────────────────

    fn entry_pages(&mut self, entry: &Page, context: &EntryContext<'_>) -> Result<(), LayoutError> {
        let mut queue = self.entry_lines(&entry.content);
        let mut first = true;

        loop {
            if !first {
                while queue.front().is_some_and(|l| l.kind == LineKind::Blank) {
                    queue.pop_front();
                }
            }
            if queue.is_empty() || self.stop_here() {
                return Ok(());
            }

            let number = self.next_number();
            let frame = self.geometry.frame(number);
            let opens_section = first && context.opens_section;
            let mut page = PagePlan::new(
                number,
                PageKind::Entry {
                    entry_id: entry.entry_id,
                    category: context.category.to_string(),
                    continued: !first,
                    opens_section,
                },
            );

            if !opens_section {
                self.running_header(&mut page, &frame, context);
            }
            self.folio(&mut page, &frame);
            page.ops.push(self.centered(
                FontRole::Body,
                TextRole::DateFooter,
                &context.date_line,
                frame.center_x(),
                self.geometry.footer_offset,
                self.geometry.footer_size,
            ));

            let mut y = frame.top;
            if opens_section {
                y = self.divider(&mut page, &frame, context.category, y);
            }
            if first {
                page.ops.push(DrawOp::Ornament {
                    center_x: frame.center_x(),
                    y: y - ORNAMENT_BLOCK / 2.0,
                    style: self.ornament,
                });
                y -= ORNAMENT_BLOCK;
            } else {
                page.ops.push(self.centered(
                    FontRole::Body,
                    TextRole::Continued,
                    CONTINUED_MARKER,
                    frame.center_x(),
                    y - self.geometry.footer_size,
                    self.geometry.footer_size,
                ));
                y -= CONTINUED_BLOCK;
            }

            let consumed = self.fill_frame(&mut page, &frame, y, &mut queue);
            if consumed == 0 {
                return Err(LayoutError::FrameTooSmall { page: number });
            }

            self.push(page);
            first = false;
        }
    }

    /// Greedily places queued lines while another line still fits.
    fn fill_frame(
        &self,
        page: &mut PagePlan,
        frame: &Frame,
        mut y: f32,
        queue: &mut VecDeque<LayoutLine>,
    ) -> usize {
        let leading = self.geometry.leading;
        let mut consumed = 0;

        while !queue.is_empty() && y - leading >= frame.bottom {
            let Some(line) = queue.pop_front() else { break };
            y -= leading;
            consumed += 1;

            match line.kind {
                LineKind::Blank => y -= self.geometry.paragraph_spacing,
                LineKind::Prose => page.ops.push(self.text(
                    FontRole::Body,
                    TextRole::Body,
                    &line.text,
                    frame.left,
                    y,
                    self.geometry.body_size,
                )),
                LineKind::Preformatted => page.ops.push(self.text(
                    FontRole::Mono,
                    TextRole::Preformatted,
                    &line.text,
                    frame.left + self.geometry.preformatted_indent,
                    y,
                    self.geometry.mono_size,
                )),
            }
        }
        consumed
    }

    /// Sanitizes and wraps an entry into its line queue. Prose and
    /// preformatted lines are wrapped against their own widths and fonts.
    fn entry_lines(&self, content: &str) -> VecDeque<LayoutLine> {
        // Frames mirror, so every page has the same width.
        let frame = self.geometry.frame(1);
        let prose_font = self.fonts.guarded(FontRole::Body);
        let mono_font = self.fonts.guarded(FontRole::Mono);
        let text = sanitize_for_layout(content);

        let mut lines: VecDeque<LayoutLine> = VecDeque::new();
        for raw in text.split('\n') {
            if raw.trim().is_empty() {
                lines.push_back(LayoutLine::blank());
            } else if is_preformatted(raw) {
                let width = self.geometry.preformatted_width(&frame);
                for text in wrap(strip_preformatted_marker(raw), width, &mono_font, self.geometry.mono_size) {
                    lines.push_back(LayoutLine {
                        text,
                        kind: LineKind::Preformatted,
                    });
                }
            } else {
                for text in wrap(raw, frame.width(), &prose_font, self.geometry.body_size) {
                    lines.push_back(LayoutLine {
                        text,
                        kind: LineKind::Prose,
                    });
                }
            }
        }

        while lines.front().is_some_and(|l| l.kind == LineKind::Blank) {
            lines.pop_front();
        }
        while lines.back().is_some_and(|l| l.kind == LineKind::Blank) {
            lines.pop_back();
        }
        lines
    }

    // ── furniture ───────────────────────────────────────────────────────────

    /// Author and category, swapping sides with page parity.
    fn running_header(&self, page: &mut PagePlan, frame: &Frame, context: &EntryContext<'_>) {
        let size = self.geometry.header_size;
        let y = self.geometry.header_baseline();
        let (left_text, right_text) = match page.side {
            Side::Left => (context.author, context.category),
            Side::Right => (context.category, context.author),
        };

        page.ops.push(self.text(FontRole::Body, TextRole::Header, left_text, frame.left, y, size));
        let width = self.fonts.guarded(FontRole::Body).measure(right_text, size);
        page.ops.push(self.text(
            FontRole::Body,
            TextRole::Header,
            right_text,
            frame.right - width,
            y,
            size,
        ));
    }

    /// Page number at the outer bottom corner.
    fn folio(&self, page: &mut PagePlan, frame: &Frame) {
        let size = self.geometry.footer_size;
        let label = page.number.to_string();
        let x = match page.side {
            Side::Left => frame.left,
            Side::Right => frame.right - self.fonts.guarded(FontRole::Body).measure(&label, size),
        };
        page.ops.push(self.text(
            FontRole::Body,
            TextRole::Folio,
            &label,
            x,
            self.geometry.folio_offset,
            size,
        ));
    }

    /// Category heading and ornament on a section opener. Returns the new y.
    fn divider(&self, page: &mut PagePlan, frame: &Frame, category: &str, top: f32) -> f32 {
        let heading_y = top - DIVIDER_BLOCK * 0.45;
        page.ops.push(self.centered(
            FontRole::Display,
            TextRole::Divider,
            category,
            frame.center_x(),
            heading_y,
            DIVIDER_SIZE,
        ));
        page.ops.push(DrawOp::Ornament {
            center_x: frame.center_x(),
            y: heading_y - DIVIDER_SIZE,
            style: self.ornament,
        });
        top - DIVIDER_BLOCK
    }

    // ── text helpers ────────────────────────────────────────────────────────

    /// Text run with the fallback guard applied to the requested font.
    fn text(&self, primary: FontRole, role: TextRole, text: &str, x: f32, y: f32, size: f32) -> DrawOp {
        DrawOp::Text {
            x,
            y,
            size,
            font: self.fonts.resolve(primary, text),
            role,
            text: text.to_string(),
        }
    }

    fn centered(
        &self,
        primary: FontRole,
        role: TextRole,
        text: &str,
        center_x: f32,
        y: f32,
        size: f32,
    ) -> DrawOp {
        let width = self.fonts.guarded(primary).measure(text, size);
        self.text(primary, role, text, center_x - width / 2.0, y, size)
    }
}

/// `Tuesday, March 4, 2025` in the manuscript's offset.
pub fn format_entry_date(date: DateTime<Utc>, offset: FixedOffset) -> String {
    date.with_timezone(&offset).format("%A, %B %-d, %Y").to_string()
}
