//! Static font-metric tables used as a `FontHandle` backend in tests.
//!
//! Character widths are in em units. Tables cover ASCII 0x20..=0x7E
//! (index = char - 32). Each table maps onto one of the PDF base-14 fonts so
//! documents laid out with it can be emitted without embedding a font file.

use crate::layout::fonts::{FontHandle, FontSet};
use crate::render::pdf::{FaceMetrics, FontProgram, PdfFont};

/// Static character-width table.
pub struct FontMetricTable {
    widths: [f32; 95],
    /// Width for characters outside the table.
    pub average_char_width: f32,
}

impl FontMetricTable {
    fn width(&self, c: char) -> Option<f32> {
        let code = c as usize;
        (32..=126).contains(&code).then(|| self.widths[code - 32])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    Ascii,
    Full,
}

/// A table-driven font. `Coverage::Ascii` fonts refuse anything outside the
/// table, which is what exercises the fallback guard.
pub struct MetricFont {
    name: &'static str,
    base_font: &'static str,
    table: &'static FontMetricTable,
    coverage: Coverage,
}

impl MetricFont {
    pub fn serif() -> Self {
        Self {
            name: "metric-serif",
            base_font: "Times-Roman",
            table: &SERIF_TABLE,
            coverage: Coverage::Ascii,
        }
    }

    pub fn sans() -> Self {
        Self {
            name: "metric-sans",
            base_font: "Helvetica",
            table: &SANS_TABLE,
            coverage: Coverage::Ascii,
        }
    }

    pub fn mono() -> Self {
        Self {
            name: "metric-mono",
            base_font: "Courier",
            table: &MONO_TABLE,
            coverage: Coverage::Ascii,
        }
    }

    /// Claims every character; widths outside ASCII use the average.
    pub fn full_coverage() -> Self {
        Self {
            name: "metric-fallback",
            base_font: "Helvetica",
            table: &SANS_TABLE,
            coverage: Coverage::Full,
        }
    }

    pub fn builtin_set() -> FontSet<MetricFont> {
        FontSet {
            body: Self::serif(),
            display: Self::sans(),
            fallback: Self::full_coverage(),
            mono: Self::mono(),
        }
    }

    pub fn boxed_set() -> FontSet<Box<dyn PdfFont>> {
        FontSet {
            body: Box::new(Self::serif()),
            display: Box::new(Self::sans()),
            fallback: Box::new(Self::full_coverage()),
            mono: Box::new(Self::mono()),
        }
    }

    fn em_width(&self, c: char) -> f32 {
        self.table.width(c).unwrap_or(self.table.average_char_width)
    }
}

impl FontHandle for MetricFont {
    fn name(&self) -> &str {
        self.name
    }

    fn measure(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|c| self.em_width(c)).sum::<f32>() * size
    }

    fn encodable(&self, text: &str) -> bool {
        match self.coverage {
            Coverage::Full => true,
            Coverage::Ascii => text.chars().all(|c| self.table.width(c).is_some()),
        }
    }
}

impl PdfFont for MetricFont {
    fn program(&self) -> FontProgram<'_> {
        FontProgram::Builtin(self.base_font)
    }

    fn glyph(&self, ch: char) -> Option<u16> {
        self.table.width(ch).map(|_| ch as u16)
    }

    fn glyph_width(&self, glyph: u16) -> f32 {
        char::from_u32(glyph as u32)
            .map(|c| self.em_width(c) * 1000.0)
            .unwrap_or(0.0)
    }

    fn face_metrics(&self) -> FaceMetrics {
        FaceMetrics::default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Static width tables  (95 ASCII printable characters each)
// ────────────────────────────────────────────────────────────────────────────

/// Old-style serif proportions.
static SERIF_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.21, 0.26, 0.32, 0.48, 0.48, 0.76, 0.57, 0.19, 0.28, 0.28, 0.33, 0.50, 0.24, 0.28, 0.24, 0.26,
        // 0     1     2     3     4     5     6     7     8     9
        0.48, 0.48, 0.48, 0.48, 0.48, 0.48, 0.48, 0.48, 0.48, 0.48,
        // :     ;     <     =     >     ?     @
        0.24, 0.24, 0.50, 0.50, 0.50, 0.43, 0.87,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.57, 0.52, 0.52, 0.57, 0.48, 0.43, 0.57, 0.57, 0.21, 0.33, 0.52, 0.45, 0.66,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.57, 0.61, 0.48, 0.61, 0.52, 0.43, 0.48, 0.57, 0.57, 0.76, 0.52, 0.52, 0.48,
        // [     \     ]     ^     _     `
        0.24, 0.26, 0.24, 0.40, 0.48, 0.29,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.48, 0.48, 0.43, 0.48, 0.48, 0.26, 0.48, 0.48, 0.19, 0.19, 0.45, 0.19, 0.71,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.48, 0.48, 0.48, 0.48, 0.28, 0.37, 0.33, 0.48, 0.43, 0.61, 0.43, 0.43, 0.37,
        // {     |     }     ~
        0.28, 0.22, 0.28, 0.50,
    ],
    average_char_width: 0.44,
};

/// Humanist sans proportions.
static SANS_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.25, 0.30, 0.38, 0.56, 0.56, 0.89, 0.67, 0.22, 0.33, 0.33, 0.39, 0.59, 0.28, 0.33, 0.28, 0.31,
        // 0     1     2     3     4     5     6     7     8     9
        0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56,
        // :     ;     <     =     >     ?     @
        0.28, 0.28, 0.59, 0.59, 0.59, 0.50, 1.02,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.67, 0.61, 0.61, 0.67, 0.56, 0.50, 0.67, 0.67, 0.25, 0.39, 0.61, 0.53, 0.78,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.67, 0.72, 0.56, 0.72, 0.61, 0.50, 0.56, 0.67, 0.67, 0.89, 0.61, 0.61, 0.56,
        // [     \     ]     ^     _     `
        0.28, 0.31, 0.28, 0.47, 0.56, 0.34,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.56, 0.56, 0.50, 0.56, 0.56, 0.31, 0.56, 0.56, 0.22, 0.22, 0.53, 0.22, 0.83,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.56, 0.56, 0.56, 0.56, 0.33, 0.44, 0.39, 0.56, 0.50, 0.72, 0.50, 0.50, 0.44,
        // {     |     }     ~
        0.33, 0.26, 0.33, 0.59,
    ],
    average_char_width: 0.52,
};

static MONO_TABLE: FontMetricTable = FontMetricTable {
    widths: [0.60; 95],
    average_char_width: 0.60,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_empty_is_zero() {
        assert_eq!(MetricFont::serif().measure("", 11.0), 0.0);
    }

    #[test]
    fn test_measure_scales_with_size() {
        let font = MetricFont::sans();
        // "Rust" = R(0.61) + u(0.56) + s(0.44) + t(0.39) = 2.00em
        assert!((font.measure("Rust", 10.0) - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_mono_is_fixed_pitch() {
        let font = MetricFont::mono();
        assert_eq!(font.measure("iiii", 10.0), font.measure("WWWW", 10.0));
    }

    #[test]
    fn test_ascii_coverage_rejects_non_ascii() {
        let font = MetricFont::serif();
        assert!(font.encodable("Hello, world!"));
        assert!(!font.encodable("Grüße"));
        assert!(MetricFont::full_coverage().encodable("Grüße 🌿"));
    }
}
