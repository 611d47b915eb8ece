//! # Line Flow
//!
//! The negotiator composite containers hand to their children: areas are
//! appended to the current line until a child rejects the rest of it, then a
//! new line starts below. Lines are aligned on their tallest ascent once
//! they close, optionally justified, and mirrored for right-to-left reading
//! order.
//!
//! Grid cells and frame children each flow through a [`FlowCursor`]; the
//! page-level cursor in pagination reuses [`FlowLine`] and [`place_line`].

use crate::geometry::{Point, Size};
use crate::model::NodeId;
use crate::pagination::ReadingOrder;
use crate::placement::{assert_rejectable, AreaAllocation, Offer, SpaceNegotiator, SpaceQualifier};
use crate::scene::{ItemId, Scene};

use super::LayoutContext;

/// An allocated area waiting on its line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowEntry {
    pub child: NodeId,
    pub area: AreaAllocation,
    /// Offset from the start of the line.
    pub x: f64,
}

/// One line of allocated areas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowLine {
    /// Offset of the line's top from the top of its container.
    pub top: f64,
    pub width: f64,
    pub ascent: f64,
    pub descent: f64,
    pub entries: Vec<FlowEntry>,
}

impl FlowLine {
    pub fn new(top: f64) -> Self {
        Self {
            top,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn height(&self) -> f64 {
        self.ascent + self.descent
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height()
    }

    /// Height the line would have with `area` appended.
    pub fn height_with(&self, area: &AreaAllocation) -> f64 {
        self.ascent.max(area.ascent) + self.descent.max(area.descent())
    }

    pub fn push(&mut self, child: NodeId, area: AreaAllocation) {
        self.entries.push(FlowEntry {
            child,
            area,
            x: self.width,
        });
        self.width += area.size.width;
        self.ascent = self.ascent.max(area.ascent);
        self.descent = self.descent.max(area.descent());
    }

    /// Whether every entry may be stretched.
    pub fn can_stretch(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.area.can_stretch)
    }
}

/// Lines produced by a [`FlowCursor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowBlock {
    pub lines: Vec<FlowLine>,
    /// Widest line.
    pub width: f64,
    pub height: f64,
}

/// Flows children into lines of a fixed width.
#[derive(Debug)]
pub struct FlowCursor {
    width: f64,
    height: f64,
    lines: Vec<FlowLine>,
    open: FlowLine,
}

impl FlowCursor {
    /// A flow `width` wide and at most `height` tall. Either may be
    /// infinite.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            lines: Vec::new(),
            open: FlowLine::new(0.0),
        }
    }

    fn current_offer(&self) -> Offer {
        let remaining = (self.height - self.open.top).max(0.0);
        if !self.open.is_empty() {
            return Offer::new(
                Size::new((self.width - self.open.width).max(0.0), remaining),
                SpaceQualifier::CurrentRemaining,
            );
        }
        let qualifier = if self.lines.is_empty() {
            SpaceQualifier::MaximumAvailable
        } else {
            SpaceQualifier::MaximumWidth
        };
        Offer::new(Size::new(self.width, remaining), qualifier)
    }

    fn close_line(&mut self) {
        if self.open.is_empty() {
            return;
        }
        let next = FlowLine::new(self.open.bottom());
        self.lines.push(std::mem::replace(&mut self.open, next));
    }

    /// Close the open line and hand out everything flowed so far.
    pub fn finish(mut self) -> FlowBlock {
        self.close_line();
        let width = self.lines.iter().map(|l| l.width).fold(0.0, f64::max);
        let height = self.lines.last().map(|l| l.bottom()).unwrap_or(0.0);
        FlowBlock {
            lines: self.lines,
            width,
            height,
        }
    }
}

impl SpaceNegotiator for FlowCursor {
    fn request_area(&self, _child: NodeId) -> Offer {
        self.current_offer()
    }

    fn allocate_area(&mut self, child: NodeId, area: AreaAllocation) {
        self.open.push(child, area);
    }

    fn area_insufficient(&mut self, child: NodeId, _size: Size) {
        assert_rejectable(Some(self.current_offer().qualifier), child);
        self.close_line();
    }
}

/// Stretch a line to `width` when every entry allows it. Entries are
/// re-packed left to right with their new widths.
pub fn justify_line(ctx: &mut LayoutContext<'_>, line: &mut FlowLine, width: f64) {
    if !width.is_finite() || line.width <= 0.0 || line.width >= width || !line.can_stretch() {
        return;
    }
    let factor = width / line.width;
    let mut x = 0.0;
    for entry in &mut line.entries {
        let stretched = ctx.stretch(entry.child, entry.area.item, factor);
        entry.area.size.width = stretched;
        entry.x = x;
        x += stretched;
    }
    line.width = x;
}

/// Re-parent the items of `line` into `container` and position them.
/// `origin` is the container-relative point of the flow's top-left corner;
/// `width` is the extent used for right-to-left mirroring.
pub fn place_line(
    scene: &mut Scene,
    line: &FlowLine,
    container: ItemId,
    origin: Point,
    width: f64,
    order: ReadingOrder,
) {
    for entry in &line.entries {
        let x = match order {
            ReadingOrder::LeftToRight => entry.x,
            ReadingOrder::RightToLeft => width - entry.x - entry.area.size.width,
        };
        let y = line.top + line.ascent - entry.area.ascent;
        scene.set_parent(entry.area.item, container);
        scene.set_position(entry.area.item, Point::new(origin.x + x, origin.y + y));
    }
}

/// Justify and place a whole block. Every line but the last is justified
/// when the format of the child that owns it asks for it.
pub fn place_block(
    ctx: &mut LayoutContext<'_>,
    block: &mut FlowBlock,
    container: ItemId,
    origin: Point,
    width: f64,
) {
    let last = block.lines.len().saturating_sub(1);
    for (i, line) in block.lines.iter_mut().enumerate() {
        if i < last && wants_justify(ctx, line) {
            justify_line(ctx, line, width);
        }
    }
    block.width = block.lines.iter().map(|l| l.width).fold(0.0, f64::max);
    let extent = if width.is_finite() { width } else { block.width };
    let order = ctx.session.reading_order;
    for line in &block.lines {
        place_line(ctx.scene, line, container, origin, extent, order);
    }
}

/// Whether the child owning `line` should be justified.
pub fn wants_justify(ctx: &LayoutContext<'_>, line: &FlowLine) -> bool {
    line.entries
        .first()
        .is_some_and(|e| ctx.session.justify || ctx.format(e.child).justify)
}
