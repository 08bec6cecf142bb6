//! Text sanitization and width-bounded word wrapping.
//!
//! Two sanitization modes exist:
//! - storage-time (`sanitize_for_storage`) collapses runs of spaces/tabs;
//! - layout-time (`sanitize_for_layout`) keeps leading spaces/tabs, which
//!   mark preformatted lines.
//!
//! `wrap` is pure: it only consults the `FontHandle` it is given.

use crate::layout::fonts::FontHandle;

/// Leading spaces that turn a line into a preformatted line.
pub const PREFORMATTED_MIN_SPACES: usize = 4;

/// Prefix used by quoted fragments in source entries.
const QUOTE_PREFIX: &str = "> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitespaceMode {
    Preserve,
    Collapse,
}

/// Kind of a laid-out body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Prose,
    Preformatted,
    Blank,
}

/// A wrapped line ready for placement in a text frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub text: String,
    pub kind: LineKind,
}

impl LayoutLine {
    pub fn blank() -> Self {
        Self {
            text: String::new(),
            kind: LineKind::Blank,
        }
    }
}

/// Normalizes line endings, non-breaking spaces and control characters.
///
/// LF and TAB survive; every other C0/C1 control character is dropped.
pub fn sanitize(raw: &str, mode: WhitespaceMode) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let cleaned: String = normalized
        .chars()
        .filter_map(|c| match c {
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => Some(' '),
            '\n' | '\t' => Some(c),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    match mode {
        WhitespaceMode::Preserve => cleaned,
        WhitespaceMode::Collapse => collapse_whitespace(&cleaned),
    }
}

pub fn sanitize_for_layout(raw: &str) -> String {
    sanitize(raw, WhitespaceMode::Preserve)
}

pub fn sanitize_for_storage(raw: &str) -> String {
    sanitize(raw, WhitespaceMode::Collapse)
}

fn collapse_whitespace(text: &str) -> String {
    let lines: Vec<String> = text
        .split('\n')
        .map(|line| line.split([' ', '\t']).filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .collect();
    lines.join("\n").trim().to_string()
}

/// True when the line should be set as fixed-width quoted text.
pub fn is_preformatted(line: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    if line.starts_with('\t') || line.starts_with(QUOTE_PREFIX) {
        return true;
    }
    line.chars().take_while(|c| *c == ' ').count() >= PREFORMATTED_MIN_SPACES
}

/// Strips the indentation or quote marker that flagged a preformatted line.
pub fn strip_preformatted_marker(line: &str) -> &str {
    line.strip_prefix(QUOTE_PREFIX)
        .unwrap_or(line)
        .trim_start_matches([' ', '\t'])
}

/// Greedy word wrap against `max_width` points.
///
/// Explicit newlines split paragraphs first; a whitespace-only paragraph
/// becomes one empty output line. Words wider than `max_width` are split
/// character by character; a lone character wider than the frame is emitted
/// on its own line.
pub fn wrap<F>(text: &str, max_width: f32, font: &F, size: f32) -> Vec<String>
where
    F: FontHandle + ?Sized,
{
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current = place_word(word, max_width, font, size, &mut lines);
                continue;
            }

            let candidate = format!("{current} {word}");
            if font.measure(&candidate, size) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current = place_word(word, max_width, font, size, &mut lines);
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Starts a fresh line with `word`, force-splitting it if needed.
/// Full chunks go straight to `lines`; the trailing chunk is returned as the
/// new current line.
fn place_word<F>(word: &str, max_width: f32, font: &F, size: f32, lines: &mut Vec<String>) -> String
where
    F: FontHandle + ?Sized,
{
    if font.measure(word, size) <= max_width {
        return word.to_string();
    }

    let mut chunk = String::new();
    for ch in word.chars() {
        let mut candidate = chunk.clone();
        candidate.push(ch);
        if chunk.is_empty() || font.measure(&candidate, size) <= max_width {
            chunk = candidate;
        } else {
            lines.push(std::mem::replace(&mut chunk, ch.to_string()));
        }
    }
    chunk
}
