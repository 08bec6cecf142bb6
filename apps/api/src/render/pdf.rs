//! PDF emission for a paginated layout.
//!
//! Embedded fonts are written as Type0 / Identity-H composite fonts with a
//! `W` array and a ToUnicode map covering only the glyphs actually drawn.
//! Builtin (base-14) fonts are written as simple Type1 fonts with
//! WinAnsiEncoding.

use std::collections::{BTreeMap, BTreeSet};

use pdf_writer::types::{CidFontType, FontFlags, SystemInfo, UnicodeCmap};
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use tracing::debug;

use crate::layout::fonts::{FontHandle, FontRole, FontSet, LoadedFont, Outline};
use crate::layout::geometry::PageGeometry;
use crate::layout::paginate::{DrawOp, Layout, OrnamentStyle};

// ────────────────────────────────────────────────────────────────────────────
// Font capability
// ────────────────────────────────────────────────────────────────────────────

/// How a font's program gets into the document.
pub enum FontProgram<'a> {
    TrueType(&'a [u8]),
    OpenTypeCff(&'a [u8]),
    /// One of the standard 14 fonts, referenced by base name.
    Builtin(&'static str),
}

/// Face metrics in thousandths of an em.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaceMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub cap_height: f32,
    pub bbox: [f32; 4],
}

/// A font that can be written into a PDF.
pub trait PdfFont: FontHandle {
    fn program(&self) -> FontProgram<'_>;

    /// Glyph id for `ch` (the character code for builtin fonts).
    fn glyph(&self, ch: char) -> Option<u16>;

    /// Advance of `glyph` in thousandths of an em.
    fn glyph_width(&self, glyph: u16) -> f32;

    fn face_metrics(&self) -> FaceMetrics;
}

impl<T: PdfFont + ?Sized> PdfFont for Box<T> {
    fn program(&self) -> FontProgram<'_> {
        (**self).program()
    }

    fn glyph(&self, ch: char) -> Option<u16> {
        (**self).glyph(ch)
    }

    fn glyph_width(&self, glyph: u16) -> f32 {
        (**self).glyph_width(glyph)
    }

    fn face_metrics(&self) -> FaceMetrics {
        (**self).face_metrics()
    }
}

impl PdfFont for LoadedFont {
    fn program(&self) -> FontProgram<'_> {
        match self.outline() {
            Outline::TrueType => FontProgram::TrueType(self.data()),
            Outline::Cff => FontProgram::OpenTypeCff(self.data()),
        }
    }

    fn glyph(&self, ch: char) -> Option<u16> {
        self.glyph_id(ch)
    }

    fn glyph_width(&self, glyph: u16) -> f32 {
        self.advance(glyph) as f32 * 1000.0 / self.units_per_em() as f32
    }

    fn face_metrics(&self) -> FaceMetrics {
        let scale = 1000.0 / self.units_per_em() as f32;
        let v = self.vertical_metrics();
        FaceMetrics {
            ascent: v.ascender as f32 * scale,
            descent: v.descender as f32 * scale,
            cap_height: v.cap_height as f32 * scale,
            bbox: v.bbox.map(|u| u as f32 * scale),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document writer
// ────────────────────────────────────────────────────────────────────────────

pub struct DocumentInfo<'a> {
    pub title: &'a str,
    pub author: &'a str,
}

/// Resource name of the font drawing a role.
fn resource_name(role: FontRole) -> Name<'static> {
    match role {
        FontRole::Body => Name(b"F1"),
        FontRole::Display => Name(b"F2"),
        FontRole::Fallback => Name(b"F3"),
        FontRole::Mono => Name(b"F4"),
    }
}

/// Glyphs drawn with each role, keyed by glyph id.
type GlyphUsage = BTreeMap<FontRole, BTreeMap<u16, char>>;

pub fn write_pdf<F: PdfFont>(
    layout: &Layout,
    fonts: &FontSet<F>,
    geometry: &PageGeometry,
    info: &DocumentInfo<'_>,
) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let mut alloc = Ref::new(1);

    let catalog_id = alloc.bump();
    let tree_id = alloc.bump();
    let info_id = alloc.bump();

    // Content first, so the font objects only cover what was drawn.
    let mut usage = GlyphUsage::new();
    let contents: Vec<Vec<u8>> = layout
        .pages
        .iter()
        .map(|page| page_content(&page.ops, fonts, &mut usage))
        .collect();

    let font_refs: BTreeMap<FontRole, Ref> = usage.keys().map(|role| (*role, alloc.bump())).collect();
    for (role, font_id) in &font_refs {
        let glyphs = usage.get(role).cloned().unwrap_or_default();
        write_font(&mut pdf, &mut alloc, *font_id, fonts.get(*role), &glyphs);
    }

    let mut page_ids = Vec::with_capacity(contents.len());
    for content in contents {
        let page_id = alloc.bump();
        let content_id = alloc.bump();
        page_ids.push(page_id);

        pdf.stream(content_id, &content);

        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, geometry.width, geometry.height));
        page.parent(tree_id);
        page.contents(content_id);
        let mut resources = page.resources();
        let mut font_dict = resources.fonts();
        for (role, font_id) in &font_refs {
            font_dict.pair(resource_name(*role), *font_id);
        }
        font_dict.finish();
        resources.finish();
        page.finish();
    }

    pdf.pages(tree_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);
    pdf.catalog(catalog_id).pages(tree_id);
    pdf.document_info(info_id)
        .title(TextStr(info.title))
        .author(TextStr(info.author))
        .creator(TextStr("keepsake"));

    let bytes = pdf.finish();
    debug!(pages = page_ids.len(), bytes = bytes.len(), "PDF written");
    bytes
}

fn page_content<F: PdfFont>(ops: &[DrawOp], fonts: &FontSet<F>, usage: &mut GlyphUsage) -> Vec<u8> {
    let mut content = Content::new();

    for op in ops {
        match op {
            DrawOp::Text {
                x,
                y,
                size,
                font,
                text,
                ..
            } => {
                let encoded = encode(fonts.get(*font), text, usage.entry(*font).or_default());
                content.begin_text();
                content.set_font(resource_name(*font), *size);
                content.next_line(*x, *y);
                content.show(Str(&encoded));
                content.end_text();
            }
            DrawOp::Ornament { center_x, y, style } => draw_ornament(&mut content, *center_x, *y, *style),
        }
    }

    content.finish().to_vec()
}

/// Encodes `text` for the font's encoding. Characters without a glyph
/// become `.notdef` (or `?` in a builtin font) rather than failing.
fn encode<F: PdfFont>(font: &F, text: &str, used: &mut BTreeMap<u16, char>) -> Vec<u8> {
    match font.program() {
        FontProgram::Builtin(_) => text
            .chars()
            .map(|c| if (' '..='~').contains(&c) { c as u8 } else { b'?' })
            .collect(),
        FontProgram::TrueType(_) | FontProgram::OpenTypeCff(_) => {
            let mut bytes = Vec::with_capacity(text.len() * 2);
            for ch in text.chars() {
                let gid = font.glyph(ch).unwrap_or(0);
                if gid != 0 {
                    used.entry(gid).or_insert(ch);
                }
                bytes.extend_from_slice(&gid.to_be_bytes());
            }
            bytes
        }
    }
}

fn draw_ornament(content: &mut Content, cx: f32, y: f32, style: OrnamentStyle) {
    content.save_state();
    match style {
        OrnamentStyle::Fleuron => {
            let r = 3.5;
            content.move_to(cx, y + r);
            content.line_to(cx + r, y);
            content.line_to(cx, y - r);
            content.line_to(cx - r, y);
            content.close_path();
            content.fill_nonzero();

            content.set_line_width(0.5);
            content.move_to(cx - 40.0, y);
            content.line_to(cx - 8.0, y);
            content.move_to(cx + 8.0, y);
            content.line_to(cx + 40.0, y);
            content.stroke();
        }
        OrnamentStyle::Rule => {
            content.set_line_width(0.6);
            content.move_to(cx - 24.0, y);
            content.line_to(cx + 24.0, y);
            content.stroke();
        }
    }
    content.restore_state();
}

// ────────────────────────────────────────────────────────────────────────────
// Font objects
// ────────────────────────────────────────────────────────────────────────────

fn write_font<F: PdfFont>(
    pdf: &mut Pdf,
    alloc: &mut Ref,
    font_id: Ref,
    font: &F,
    glyphs: &BTreeMap<u16, char>,
) {
    let (data, cff) = match font.program() {
        FontProgram::Builtin(base) => {
            pdf.type1_font(font_id)
                .base_font(Name(base.as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            return;
        }
        FontProgram::TrueType(data) => (data, false),
        FontProgram::OpenTypeCff(data) => (data, true),
    };

    let cid_id = alloc.bump();
    let descriptor_id = alloc.bump();
    let cmap_id = alloc.bump();
    let file_id = alloc.bump();

    let base_name = postscript_name(font.name());

    pdf.type0_font(font_id)
        .base_font(Name(base_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_id)
        .to_unicode(cmap_id);

    let mut cid = pdf.cid_font(cid_id);
    cid.subtype(if cff { CidFontType::Type0 } else { CidFontType::Type2 });
    cid.base_font(Name(base_name.as_bytes()));
    cid.system_info(identity_system_info());
    cid.font_descriptor(descriptor_id);
    cid.default_width(font.glyph_width(0));
    if !cff {
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
    }
    let mut widths = cid.widths();
    for gid in glyphs.keys() {
        widths.consecutive(*gid, [font.glyph_width(*gid)]);
    }
    widths.finish();
    cid.finish();

    let metrics = font.face_metrics();
    let mut flags = FontFlags::NON_SYMBOLIC;
    if font.measure("i", 1.0) == font.measure("W", 1.0) {
        flags |= FontFlags::FIXED_PITCH;
    }
    let mut descriptor = pdf.font_descriptor(descriptor_id);
    descriptor
        .name(Name(base_name.as_bytes()))
        .flags(flags)
        .bbox(Rect::new(
            metrics.bbox[0],
            metrics.bbox[1],
            metrics.bbox[2],
            metrics.bbox[3],
        ))
        .italic_angle(0.0)
        .ascent(metrics.ascent)
        .descent(metrics.descent)
        .cap_height(metrics.cap_height)
        .stem_v(80.0);
    if cff {
        descriptor.font_file3(file_id);
    } else {
        descriptor.font_file2(file_id);
    }
    descriptor.finish();

    let mut cmap = UnicodeCmap::new(Name(b"Custom"), identity_system_info());
    for (gid, ch) in glyphs {
        cmap.pair(*gid, *ch);
    }
    pdf.cmap(cmap_id, &cmap.finish());

    let mut file = pdf.stream(file_id, data);
    if cff {
        file.pair(Name(b"Subtype"), Name(b"OpenType"));
    } else {
        file.pair(Name(b"Length1"), data.len() as i32);
    }
    file.finish();
}

fn identity_system_info() -> SystemInfo<'static> {
    SystemInfo {
        registry: Str(b"Adobe"),
        ordering: Str(b"Identity"),
        supplement: 0,
    }
}

/// `DejaVuSerif-Bold.ttf` → `DejaVuSerif-Bold`, restricted to the
/// characters allowed in a PDF name.
fn postscript_name(file_name: &str) -> String {
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    let name: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.is_empty() {
        "KeepsakeFont".to_string()
    } else {
        name
    }
}

/// Fonts that end up referenced by a layout, for logging.
pub fn fonts_used(layout: &Layout) -> BTreeSet<FontRole> {
    layout
        .pages
        .iter()
        .flat_map(|p| &p.ops)
        .filter_map(|op| match op {
            DrawOp::Text { font, .. } => Some(*font),
            DrawOp::Ornament { .. } => None,
        })
        .collect()
}
