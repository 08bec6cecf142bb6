//! Page geometry for the 6" × 9" trade trim.
//!
//! All values are PDF points (1/72 in) with the origin at the bottom-left.
//! Even page numbers are right-hand (recto) pages and odd numbers left-hand
//! (verso); the title page is page 1. Section openers are pushed onto even
//! numbers by the paginator, so they always land on a recto. The binding
//! edge is the inner margin: on the left of a recto and on the right of a
//! verso.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn of(page_number: u32) -> Self {
        if page_number % 2 == 0 {
            Side::Right
        } else {
            Side::Left
        }
    }
}

/// Rectangle available for body text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Frame {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_inner: f32,
    pub margin_outer: f32,
    pub body_size: f32,
    pub leading: f32,
    pub paragraph_spacing: f32,
    pub mono_size: f32,
    /// Left offset of preformatted lines inside the frame.
    pub preformatted_indent: f32,
    /// Baseline of the running header, measured down from the page top.
    pub header_offset: f32,
    pub header_size: f32,
    /// Baseline of the folio, measured up from the page bottom.
    pub folio_offset: f32,
    /// Baseline of the date footer, measured up from the page bottom.
    pub footer_offset: f32,
    pub footer_size: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: 432.0,
            height: 648.0,
            margin_top: 63.0,
            margin_bottom: 72.0,
            margin_inner: 63.0,
            margin_outer: 45.0,
            body_size: 11.0,
            leading: 15.0,
            paragraph_spacing: 6.0,
            mono_size: 9.0,
            preformatted_indent: 18.0,
            header_offset: 36.0,
            header_size: 8.5,
            folio_offset: 30.0,
            footer_offset: 46.0,
            footer_size: 8.5,
        }
    }
}

impl PageGeometry {
    /// Text frame of a page, mirrored by page parity.
    pub fn frame(&self, page_number: u32) -> Frame {
        let (left, right) = match Side::of(page_number) {
            Side::Right => (self.margin_inner, self.width - self.margin_outer),
            Side::Left => (self.margin_outer, self.width - self.margin_inner),
        };
        Frame {
            left,
            right,
            top: self.height - self.margin_top,
            bottom: self.margin_bottom,
        }
    }

    pub fn header_baseline(&self) -> f32 {
        self.height - self.header_offset
    }

    /// Width available to a preformatted line.
    pub fn preformatted_width(&self, frame: &Frame) -> f32 {
        frame.width() - self.preformatted_indent
    }
}
