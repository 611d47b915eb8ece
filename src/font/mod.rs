//! # Font Metrics
//!
//! The glyph-metrics service layout measures against. Given a font request
//! and a string it answers advance width, ascent, descent and line height.
//! Measurement is a pure function of its inputs.
//!
//! The standard families (Helvetica, Courier, and Times, which shares
//! Helvetica's table) come from built-in tables. Custom TrueType/OpenType
//! faces are parsed with ttf-parser when registered.

pub mod metrics;

use std::collections::HashMap;

use crate::error::FolioError;
use crate::style::FontSpec;

pub use metrics::StandardFontMetrics;

/// Measured extent of a run of text.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextMetrics {
    /// Advance width of the whole run.
    pub width: f64,
    /// Baseline to top of the font's em box.
    pub ascent: f64,
    /// Baseline to bottom of the font's em box (positive).
    pub descent: f64,
    /// Distance between consecutive baselines.
    pub line_height: f64,
}

impl TextMetrics {
    /// Ascent + descent, without leading.
    pub fn height(&self) -> f64 {
        self.ascent + self.descent
    }
}

/// The glyph-metrics service consumed by every layout routine.
pub trait GlyphMetrics {
    /// Measure `text` set in `font`.
    fn measure(&self, font: &FontSpec, text: &str) -> TextMetrics;

    /// Advance of each character of `text`, in order.
    fn char_advances(&self, font: &FontSpec, text: &str) -> Vec<f64> {
        let mut buf = [0u8; 4];
        text.chars()
            .map(|ch| self.measure(font, ch.encode_utf8(&mut buf)).width)
            .collect()
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub weight: u32,
    pub italic: bool,
}

#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the built-in families.
    Standard(StandardFont),
    /// A parsed TrueType/OpenType face.
    Custom(CustomFontMetrics),
}

/// Metrics parsed from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
}

impl CustomFontMetrics {
    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Result<Self, FolioError> {
        let face = ttf_parser::Face::parse(data, 0)
            .map_err(|e| FolioError::Font(format!("cannot parse font face: {e}")))?;
        let units_per_em = face.units_per_em();

        let mut advance_widths = HashMap::new();
        let mut default_advance = 0u16;

        // Sample the Basic Multilingual Plane to build the width map
        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Ok(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
        })
    }
}

/// The built-in families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    Courier,
}

impl StandardFont {
    pub fn metrics(&self) -> &'static StandardFontMetrics {
        match self {
            StandardFont::Helvetica => &metrics::HELVETICA,
            StandardFont::Courier => &metrics::COURIER,
        }
    }
}

static FALLBACK: FontData = FontData::Standard(StandardFont::Helvetica);

/// Maps family + weight + style to font data.
pub struct FontRegistry {
    fonts: HashMap<FontKey, FontData>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut fonts = HashMap::new();
        let families = [
            ("Helvetica", StandardFont::Helvetica),
            ("Times", StandardFont::Helvetica),
            ("Courier", StandardFont::Courier),
        ];
        for (family, font) in families {
            for weight in [400, 700] {
                for italic in [false, true] {
                    fonts.insert(
                        FontKey {
                            family: family.to_string(),
                            weight,
                            italic,
                        },
                        FontData::Standard(font),
                    );
                }
            }
        }
        Self { fonts }
    }

    /// Look up a font, falling back to Helvetica if not found.
    pub fn resolve(&self, family: &str, weight: u32, italic: bool) -> &FontData {
        let exact = FontKey {
            family: family.to_string(),
            weight,
            italic,
        };
        if let Some(font) = self.fonts.get(&exact) {
            return font;
        }

        // Try with normalized weight (snap to 400 or 700)
        let snapped_weight = if weight >= 600 { 700 } else { 400 };
        let snapped = FontKey {
            family: family.to_string(),
            weight: snapped_weight,
            italic,
        };
        if let Some(font) = self.fonts.get(&snapped) {
            return font;
        }

        let helvetica = FontKey {
            family: "Helvetica".to_string(),
            weight: snapped_weight,
            italic,
        };
        self.fonts.get(&helvetica).unwrap_or(&FALLBACK)
    }

    /// Register a custom font face.
    pub fn register(
        &mut self,
        family: &str,
        weight: u32,
        italic: bool,
        data: &[u8],
    ) -> Result<(), FolioError> {
        let metrics = CustomFontMetrics::from_font_data(data)?;
        log::debug!(
            target: "folio::font",
            "registered {family} {weight}{} ({} glyph advances)",
            if italic { " italic" } else { "" },
            metrics.advance_widths.len()
        );
        self.fonts.insert(
            FontKey {
                family: family.to_string(),
                weight,
                italic,
            },
            FontData::Custom(metrics),
        );
        Ok(())
    }
}

/// Shared font context used by layout. Provides text measurement with real
/// glyph metrics.
#[derive(Default)]
pub struct FontContext {
    registry: FontRegistry,
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Get the advance width of a single character in points.
    pub fn char_width(&self, ch: char, font: &FontSpec) -> f64 {
        match self.registry.resolve(&font.family, font.weight, font.italic) {
            FontData::Standard(std_font) => std_font.metrics().char_width(ch, font.size),
            FontData::Custom(m) => m.char_width(ch, font.size),
        }
    }

    /// Register a custom font from base64 data or a `data:` URI.
    pub fn register_base64(
        &mut self,
        family: &str,
        weight: u32,
        italic: bool,
        src: &str,
    ) -> Result<(), FolioError> {
        use base64::Engine;
        let b64 = match src.find(',') {
            Some(pos) if src.starts_with("data:") => &src[pos + 1..],
            _ => src,
        };
        let data = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| FolioError::Font(format!("base64 decode error for '{family}': {e}")))?;
        self.registry.register(family, weight, italic, &data)
    }

    /// Access the underlying font registry mutably.
    pub fn registry_mut(&mut self) -> &mut FontRegistry {
        &mut self.registry
    }
}

impl GlyphMetrics for FontContext {
    fn measure(&self, font: &FontSpec, text: &str) -> TextMetrics {
        let (units, ascender, descender, line_gap, width) =
            match self.registry.resolve(&font.family, font.weight, font.italic) {
                FontData::Standard(std_font) => {
                    let m = std_font.metrics();
                    (
                        1000.0,
                        m.ascender as f64,
                        m.descender as f64,
                        m.line_gap as f64,
                        m.measure_string(text, font.size, 0.0),
                    )
                }
                FontData::Custom(m) => (
                    m.units_per_em as f64,
                    m.ascender as f64,
                    m.descender as f64,
                    m.line_gap as f64,
                    text.chars().map(|ch| m.char_width(ch, font.size)).sum(),
                ),
            };
        let scale = font.size / units;
        let ascent = ascender * scale;
        let descent = -descender * scale;
        TextMetrics {
            width,
            ascent,
            descent,
            line_height: ascent + descent + line_gap * scale,
        }
    }

    fn char_advances(&self, font: &FontSpec, text: &str) -> Vec<f64> {
        text.chars().map(|ch| self.char_width(ch, font)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helvetica(size: f64, weight: u32) -> FontSpec {
        FontSpec {
            family: "Helvetica".into(),
            size,
            weight,
            italic: false,
        }
    }

    #[test]
    fn test_font_context_helvetica() {
        let ctx = FontContext::new();
        let w = ctx.char_width(' ', &helvetica(12.0, 400));
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn test_font_context_measure_string() {
        let ctx = FontContext::new();
        let m = ctx.measure(&helvetica(12.0, 400), "Hello");
        assert!(m.width > 0.0);
        assert!((m.ascent - 8.616).abs() < 1e-9);
        assert!((m.descent - 2.484).abs() < 1e-9);
        assert!(m.line_height > m.height());
    }

    #[test]
    fn test_font_context_fallback() {
        let ctx = FontContext::new();
        let known = ctx.measure(&helvetica(12.0, 400), "A");
        let unknown = ctx.measure(
            &FontSpec {
                family: "UnknownFont".into(),
                ..helvetica(12.0, 400)
            },
            "A",
        );
        assert_eq!(known, unknown);
    }

    #[test]
    fn test_font_context_weight_resolution() {
        let ctx = FontContext::new();
        let w700 = ctx.char_width('A', &helvetica(12.0, 700));
        let w800 = ctx.char_width('A', &helvetica(12.0, 800));
        assert!((w700 - w800).abs() < 0.001);
    }

    #[test]
    fn char_advances_sum_to_measured_width() {
        let ctx = FontContext::new();
        let font = helvetica(10.0, 400);
        let sum: f64 = ctx.char_advances(&font, "x + y").iter().sum();
        assert!((sum - ctx.measure(&font, "x + y").width).abs() < 1e-9);
    }

    #[test]
    fn garbage_font_data_is_an_error() {
        let mut ctx = FontContext::new();
        let err = ctx
            .registry_mut()
            .register("Broken", 400, false, b"not a font")
            .unwrap_err();
        assert!(matches!(err, FolioError::Font(_)));
    }
}
