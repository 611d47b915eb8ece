//! # Paper Formats
//!
//! Per-page paper size, orientation and margins. Pages without an explicit
//! format use the default, so a document can format its first few pages and
//! let every later page follow the default.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points, portrait.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Edge values (top, right, bottom, left) used for margins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Configuration for one page: size, orientation, margins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFormat {
    #[serde(default)]
    pub size: PageSize,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default = "default_margin")]
    pub margin: Edges,
}

fn default_margin() -> Edges {
    Edges::uniform(54.0) // ~0.75 inch
}

impl Default for PageFormat {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            orientation: Orientation::Portrait,
            margin: default_margin(),
        }
    }
}

impl PageFormat {
    /// A page whose active area is exactly `width` x `height` with no margins.
    pub fn borderless(width: f64, height: f64) -> Self {
        Self {
            size: PageSize::Custom { width, height },
            orientation: Orientation::Portrait,
            margin: Edges::default(),
        }
    }

    /// Paper (width, height) in points, honouring orientation.
    pub fn dimensions(&self) -> (f64, f64) {
        let (w, h) = self.size.dimensions();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    /// The area inside the margins, relative to the paper's top-left corner.
    pub fn active_area(&self) -> Rect {
        let (w, h) = self.dimensions();
        Rect::new(
            self.margin.left,
            self.margin.top,
            (w - self.margin.horizontal()).max(0.0),
            (h - self.margin.vertical()).max(0.0),
        )
    }
}

/// The paper-format provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperFormats {
    /// Format of every page past the explicit ones.
    #[serde(default)]
    pub default: PageFormat,
    /// Explicit formats for the first pages, by page index.
    #[serde(default)]
    pub pages: Vec<PageFormat>,
}

impl PaperFormats {
    pub fn uniform(format: PageFormat) -> Self {
        Self {
            default: format,
            pages: Vec::new(),
        }
    }

    pub fn format_for(&self, page: usize) -> PageFormat {
        self.pages.get(page).copied().unwrap_or(self.default)
    }

    /// Give `page` an explicit format, padding any gap with the default.
    pub fn set_format(&mut self, page: usize, format: PageFormat) {
        if self.pages.len() <= page {
            self.pages.resize(page + 1, self.default);
        }
        self.pages[page] = format;
    }
}
