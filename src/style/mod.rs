//! # Formats
//!
//! The styling information a document element carries into layout: font,
//! color, parenthesis decoration, script position, and block spacing.
//!
//! Like a cascade, every field is optional on the element and resolved
//! against the parent's resolved format. Fonts and colors inherit; structural
//! settings (parentheses, spacing) do not.

use serde::{Deserialize, Serialize};

/// Format properties attached to a document element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    // ── Typography ─────────────────────────────────────────────
    /// Font family name.
    pub font_family: Option<String>,
    /// Font size in points.
    pub font_size: Option<f64>,
    /// Font weight (100-900).
    pub font_weight: Option<u32>,
    /// Font style.
    pub font_style: Option<FontStyle>,
    /// Glyph color.
    pub color: Option<Color>,

    // ── Math decoration ────────────────────────────────────────
    /// Parenthesis style wrapped around an operator's content.
    pub parenthesis: Option<ParenthesisStyle>,
    /// Superscript / subscript placement for literals and text.
    pub script: Option<ScriptPosition>,

    // ── Block behaviour ────────────────────────────────────────
    /// Stretch wrapped lines to the full line width.
    pub justify: Option<bool>,
    /// Minimum spacing above a top-level block, in points.
    pub top_spacing: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// How an operator's content is enclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParenthesisStyle {
    /// No enclosure.
    None,
    /// An unrecognised style coming from the document model; treated as `None`.
    Invalid,
    Parentheses,
    Brackets,
    Braces,
}

impl ParenthesisStyle {
    /// Opening and closing characters, or `None` when the slot collapses.
    pub fn glyphs(&self) -> Option<(char, char)> {
        match self {
            ParenthesisStyle::None | ParenthesisStyle::Invalid => None,
            ParenthesisStyle::Parentheses => Some(('(', ')')),
            ParenthesisStyle::Brackets => Some(('[', ']')),
            ParenthesisStyle::Braces => Some(('{', '}')),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptPosition {
    #[default]
    Normal,
    Superscript,
    Subscript,
}

/// A concrete font request handed to the glyph-metrics service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
    pub weight: u32,
    pub italic: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Helvetica".to_string(),
            size: 12.0,
            weight: 400,
            italic: false,
        }
    }
}

impl FontSpec {
    /// The same face at `factor` times the size, with the weight nudged by
    /// `weight_delta` and clamped to the 100-900 range.
    pub fn adjusted(&self, factor: f64, weight_delta: i32) -> FontSpec {
        let weight = (self.weight as i32 + weight_delta).clamp(100, 900) as u32;
        FontSpec {
            family: self.family.clone(),
            size: self.size * factor,
            weight,
            italic: self.italic,
        }
    }
}

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64, // 0.0 - 1.0
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const GRAY: Color = Color {
        r: 0.6,
        g: 0.6,
        b: 0.6,
        a: 1.0,
    };
    pub const TRANSPARENT: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn hex(hex: &str) -> Self {
        let hex = hex.trim_start_matches('#');
        let (r, g, b) = match hex.len() {
            3 => {
                let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).unwrap_or(0);
                let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).unwrap_or(0);
                let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).unwrap_or(0);
                (r, g, b)
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
                let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
                let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
                (r, g, b)
            }
            _ => (0, 0, 0),
        };
        Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
            a: 1.0,
        }
    }

    /// This color with its alpha replaced.
    pub fn with_alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Resolved format: every value concrete. This is what layout works with.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFormat {
    pub font: FontSpec,
    pub color: Color,
    /// `None` when the element did not ask for any enclosure.
    pub parenthesis: Option<ParenthesisStyle>,
    pub script: ScriptPosition,
    pub justify: bool,
    pub top_spacing: f64,
}

impl Default for ResolvedFormat {
    fn default() -> Self {
        Format::default().resolve(None)
    }
}

impl Format {
    /// Resolve this format against the parent's resolved format.
    pub fn resolve(&self, parent: Option<&ResolvedFormat>) -> ResolvedFormat {
        let parent_font = parent.map(|p| p.font.clone()).unwrap_or_default();
        let italic = match self.font_style {
            Some(style) => style == FontStyle::Italic,
            None => parent_font.italic,
        };

        ResolvedFormat {
            font: FontSpec {
                family: self.font_family.clone().unwrap_or(parent_font.family),
                size: self.font_size.unwrap_or(parent_font.size),
                weight: self.font_weight.unwrap_or(parent_font.weight),
                italic,
            },
            color: self
                .color
                .unwrap_or(parent.map(|p| p.color).unwrap_or_default()),
            parenthesis: self.parenthesis,
            script: self.script.unwrap_or_default(),
            justify: self
                .justify
                .unwrap_or(parent.map(|p| p.justify).unwrap_or(false)),
            top_spacing: self.top_spacing.unwrap_or(0.0).max(0.0),
        }
    }
}

/// Severity of a diagnostic attached to a document element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Information,
    Warning,
    Fatal,
    Runtime,
    Internal,
}

impl Severity {
    /// The tint used for the border and background of decorated items.
    pub fn color(&self) -> Color {
        match self {
            Severity::Information => Color::hex("#2f6fd6"),
            Severity::Warning => Color::hex("#e0a100"),
            Severity::Fatal => Color::hex("#d22f2f"),
            Severity::Runtime => Color::hex("#c2410c"),
            Severity::Internal => Color::hex("#7c3aed"),
        }
    }
}
