use crate::geometry::Size;
use crate::placement::AreaAllocation;
use crate::scene::ItemId;

/// One rectangle a presentation occupies, with the item that draws it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresentationArea {
    pub item: ItemId,
    pub size: Size,
    /// Baseline offset from the top of the area.
    pub ascent: f64,
    pub can_stretch: bool,
}

impl PresentationArea {
    pub fn new(item: ItemId, size: Size, ascent: f64) -> Self {
        Self {
            item,
            size,
            ascent,
            can_stretch: false,
        }
    }

    pub fn stretchable(mut self, can_stretch: bool) -> Self {
        self.can_stretch = can_stretch;
        self
    }

    pub fn descent(&self) -> f64 {
        (self.size.height - self.ascent).max(0.0)
    }

    /// The allocation handed to the parent for this area.
    pub fn allocation(&self) -> AreaAllocation {
        AreaAllocation {
            item: self.item,
            size: self.size,
            ascent: self.ascent,
            can_stretch: self.can_stretch,
        }
    }
}

/// Combined extent of areas laid side by side on one baseline:
/// (width, ascent, descent).
pub fn run_extent(areas: &[PresentationArea]) -> (f64, f64, f64) {
    areas.iter().fold((0.0, 0.0, 0.0), |(w, a, d), area| {
        (w + area.size.width, a.max(area.ascent), d.max(area.descent()))
    })
}
