//! # Pagination
//!
//! The root of the document is not placed by a parent: [`RootPagination`]
//! walks its top-level children in document order and flows each one onto
//! pages through a [`RootCursor`]. The cursor is a [`SpaceNegotiator`] like
//! any other, but it rolls to a fresh page when the active area runs out.
//!
//! Passes are incremental. Every top-level child keeps a [`ChildLocation`]
//! from the last pass, and edits widen a dirty window of child indices
//! instead of invalidating the whole document. A pass starts at the first
//! dirty child, at the bottom of the child before it, and for each child
//! decides (see [`ChildDecision`]):
//!
//! - **Recompute**: never placed, dirty, top spacing changed, reflowing
//!   content that moved, or a global recompute was requested.
//! - **Move**: the child starts somewhere else but its layout does not
//!   depend on where; its items are shifted and re-parented.
//! - **Skip**: the child starts exactly where it did last time.
//!
//! After the window, the first skipped child ends the pass: everything
//! below it is already in place.
//!
//! An abort requested through the tracker is honoured between children.
//! Children laid out by an aborted pass are not trusted; they are marked
//! dirty and the window is kept, so the restart redoes them.

pub mod session;

use std::collections::HashMap;

use crate::events::{LayoutEvent, Notifications};
use crate::geometry::{Point, Rect, Size};
use crate::model::NodeId;
use crate::paper::{PageFormat, PaperFormats};
use crate::placement::{assert_rejectable, AreaAllocation, Offer, SpaceNegotiator, SpaceQualifier};
use crate::presentation::flow::{justify_line, place_line, wants_justify, FlowLine};
use crate::presentation::{LayoutContext, ReflowHint};
use crate::scene::{ItemId, Scene};

pub use session::{
    EventPump, LayoutSession, NoopPump, PassMonitor, PassOutcome, PassState, ReadingOrder,
};
use session::YieldClock;

/// Vertical space between consecutive pages in scene coordinates.
pub const PAGE_GAP: f64 = 20.0;

/// A point on a page: the page index and the offset from the top of its
/// active area.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageLocation {
    pub page: usize,
    pub y: f64,
}

impl PageLocation {
    pub fn new(page: usize, y: f64) -> Self {
        Self { page, y }
    }

    /// Same page, and `y` within `tolerance`.
    pub fn approx_eq(&self, other: &PageLocation, tolerance: f64) -> bool {
        self.page == other.page && (self.y - other.y).abs() <= tolerance
    }
}

/// Lifecycle of a top-level child across passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildState {
    #[default]
    NeverPlaced,
    PlacedStable,
    Dirty,
}

/// What a pass did with one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildDecision {
    Recompute,
    Move,
    Skip,
}

/// Where a top-level child was put by the last pass that visited it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildLocation {
    pub node: NodeId,
    pub state: ChildState,
    /// Cursor position when the child started, before its top spacing.
    pub top: PageLocation,
    /// Cursor position after the child. The next child starts here.
    pub bottom: PageLocation,
    /// Where the child's first line starts.
    pub content_top: PageLocation,
    /// Top spacing applied in the last pass.
    pub top_spacing: f64,
    /// From the top of the first line to the bottom of the last. Only
    /// meaningful when the child stays on one page.
    pub height: f64,
    line_count: usize,
    spans_pages: bool,
    items: Vec<(ItemId, usize)>,
}

impl ChildLocation {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            state: ChildState::NeverPlaced,
            top: PageLocation::default(),
            bottom: PageLocation::default(),
            content_top: PageLocation::default(),
            top_spacing: 0.0,
            height: 0.0,
            line_count: 0,
            spans_pages: false,
            items: Vec::new(),
        }
    }

    /// Drawable items of the child with the page each one sits on.
    pub fn items(&self) -> &[(ItemId, usize)] {
        &self.items
    }

    pub fn spans_pages(&self) -> bool {
        self.spans_pages
    }

    /// Last page holding any of the child's items.
    pub fn last_page(&self) -> usize {
        self.items
            .iter()
            .map(|&(_, page)| page)
            .max()
            .unwrap_or(self.content_top.page)
    }
}

/// One page in scene space.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    pub index: usize,
    pub format: PageFormat,
    /// Inside the margins, relative to the page's top-left corner.
    pub active_area: Rect,
    /// Group item every item on this page hangs off.
    pub group: ItemId,
    /// Top-left corner of the page in scene coordinates.
    pub origin: Point,
}

impl PageEntry {
    pub fn paper_size(&self) -> Size {
        let (w, h) = self.format.dimensions();
        Size::new(w, h)
    }

    /// Top-left corner of the active area in scene coordinates.
    pub fn content_origin(&self) -> Point {
        self.origin
            .offset(self.active_area.x, self.active_area.y)
    }
}

/// Lines produced for one child, with the page each line went to.
#[derive(Debug, Default)]
pub struct RootFlow {
    pub lines: Vec<(usize, FlowLine)>,
    /// Cursor position after the last line.
    pub bottom: PageLocation,
}

/// The page-level negotiator. One cursor flows one top-level child from a
/// start location; lines that do not fit the rest of a page move to the
/// next one.
#[derive(Debug)]
pub struct RootCursor<'f> {
    formats: &'f PaperFormats,
    tolerance: f64,
    page: usize,
    width: f64,
    height: f64,
    /// The open line; `open.top` is the cursor's y.
    open: FlowLine,
    lines: Vec<(usize, FlowLine)>,
}

impl<'f> RootCursor<'f> {
    pub fn new(formats: &'f PaperFormats, tolerance: f64, start: PageLocation) -> Self {
        let area = formats.format_for(start.page).active_area();
        Self {
            formats,
            tolerance,
            page: start.page,
            width: area.width,
            height: area.height,
            open: FlowLine::new(start.y),
            lines: Vec::new(),
        }
    }

    /// Current write position.
    pub fn location(&self) -> PageLocation {
        PageLocation::new(self.page, self.open.top)
    }

    fn at_page_top(&self) -> bool {
        self.open.top <= self.tolerance
    }

    fn roll(&mut self) {
        self.page += 1;
        let area = self.formats.format_for(self.page).active_area();
        self.width = area.width;
        self.height = area.height;
        self.open.top = 0.0;
    }

    /// Leave `spacing` above the next line unless it starts a page.
    pub fn apply_spacing(&mut self, spacing: f64) {
        if spacing <= 0.0 || self.at_page_top() || !self.open.is_empty() {
            return;
        }
        self.open.top += spacing;
        if self.open.top >= self.height - self.tolerance {
            self.roll();
        }
    }

    fn close_line(&mut self) {
        if self.open.is_empty() {
            return;
        }
        let bottom = self.open.bottom();
        let line = std::mem::replace(&mut self.open, FlowLine::new(bottom));
        self.lines.push((self.page, line));
        if bottom >= self.height - self.tolerance {
            self.roll();
        }
    }

    fn current_offer(&self) -> Offer {
        let remaining = (self.height - self.open.top).max(0.0);
        if !self.open.is_empty() {
            Offer::new(
                Size::new((self.width - self.open.width).max(0.0), remaining),
                SpaceQualifier::CurrentRemaining,
            )
        } else if self.at_page_top() {
            Offer::new(Size::new(self.width, self.height), SpaceQualifier::MaximumAvailable)
        } else {
            Offer::new(Size::new(self.width, remaining), SpaceQualifier::MaximumWidth)
        }
    }

    pub fn finish(mut self) -> RootFlow {
        self.close_line();
        RootFlow {
            bottom: self.location(),
            lines: self.lines,
        }
    }
}

impl SpaceNegotiator for RootCursor<'_> {
    fn request_area(&self, _child: NodeId) -> Offer {
        self.current_offer()
    }

    fn allocate_area(&mut self, child: NodeId, area: AreaAllocation) {
        let remaining = self.height - self.open.top + self.tolerance;
        if self.open.is_empty() {
            if !self.at_page_top() && area.size.height > remaining {
                self.roll();
            }
        } else if !self.at_page_top() && self.open.height_with(&area) > remaining {
            let mut line = std::mem::take(&mut self.open);
            self.roll();
            line.top = 0.0;
            self.open = line;
        }
        log::trace!(
            target: "folio::pagination",
            "{child:?} allocated {:?} on page {} at y {}",
            area.size,
            self.page,
            self.open.top
        );
        self.open.push(child, area);
    }

    fn area_insufficient(&mut self, child: NodeId, _size: Size) {
        assert_rejectable(Some(self.current_offer().qualifier), child);
        self.close_line();
    }
}

/// Where a moved child ends up.
#[derive(Debug, Clone, Copy)]
struct MovePlan {
    content_top: PageLocation,
    bottom: PageLocation,
}

#[derive(Debug)]
enum Step {
    Skip,
    Move(MovePlan),
    Recompute,
}

impl Step {
    fn decision(&self) -> ChildDecision {
        match self {
            Step::Skip => ChildDecision::Skip,
            Step::Move(_) => ChildDecision::Move,
            Step::Recompute => ChildDecision::Recompute,
        }
    }
}

/// The root presentation: page list, per-child locations and the pass
/// scheduler.
#[derive(Debug, Default)]
pub struct RootPagination {
    pages: Vec<PageEntry>,
    locations: Vec<ChildLocation>,
    window: Option<(usize, usize)>,
    recompute_all: bool,
    decisions: Vec<(usize, ChildDecision)>,
    monitor: PassMonitor,
}

impl RootPagination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> &[PageEntry] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn locations(&self) -> &[ChildLocation] {
        &self.locations
    }

    /// Decisions taken by the last pass, by child index.
    pub fn decisions(&self) -> &[(usize, ChildDecision)] {
        &self.decisions
    }

    /// The `[first_dirty, last_dirty]` window, if any child needs a visit.
    pub fn dirty_window(&self) -> Option<(usize, usize)> {
        self.window
    }

    pub fn monitor(&self) -> PassMonitor {
        self.monitor.clone()
    }

    fn widen(&mut self, first: usize, last: usize) {
        self.window = Some(match self.window {
            Some((f, l)) => (f.min(first), l.max(last)),
            None => (first, last.max(first)),
        });
    }

    /// Bring the location table in line with the current top-level
    /// children. Locations of surviving children are kept; the window grows
    /// over the range that differs.
    pub fn reconcile(&mut self, children: &[NodeId]) {
        let same = self.locations.len() == children.len()
            && self.locations.iter().zip(children).all(|(l, c)| l.node == *c);
        if same {
            return;
        }
        let prefix = self
            .locations
            .iter()
            .zip(children)
            .take_while(|(l, c)| l.node == **c)
            .count();
        let max_suffix = self.locations.len().min(children.len()) - prefix;
        let suffix = self
            .locations
            .iter()
            .rev()
            .zip(children.iter().rev())
            .take(max_suffix)
            .take_while(|(l, c)| l.node == **c)
            .count();

        let mut by_node: HashMap<NodeId, ChildLocation> =
            self.locations.drain(..).map(|l| (l.node, l)).collect();
        self.locations = children
            .iter()
            .map(|&node| by_node.remove(&node).unwrap_or_else(|| ChildLocation::new(node)))
            .collect();

        let last = (children.len() - suffix).saturating_sub(1).max(prefix);
        log::debug!(
            target: "folio::pagination",
            "children changed; dirty window grows over {prefix}..={last}"
        );
        self.widen(prefix, last);
    }

    /// The child at `index` changed and must be laid out again.
    pub fn child_changed(&mut self, index: usize) {
        if let Some(loc) = self.locations.get_mut(index) {
            if loc.state == ChildState::PlacedStable {
                loc.state = ChildState::Dirty;
            }
            self.widen(index, index);
        }
    }

    /// Like [`RootPagination::child_changed`], by node. Unknown nodes are
    /// ignored.
    pub fn node_changed(&mut self, node: NodeId) {
        if let Some(index) = self.locations.iter().position(|l| l.node == node) {
            self.child_changed(index);
        }
    }

    /// Lay out every child again on the next pass.
    pub fn recompute_everything(&mut self) {
        self.recompute_all = true;
        self.widen(0, self.locations.len().saturating_sub(1));
    }

    /// Visit every child on the next pass without invalidating any.
    pub fn revisit_all(&mut self) {
        self.widen(0, self.locations.len().saturating_sub(1));
    }

    /// Run one pass over the dirty window.
    pub fn run_pass(
        &mut self,
        ctx: &mut LayoutContext<'_>,
        formats: &PaperFormats,
        pump: &mut dyn EventPump,
        notifications: &mut Notifications,
    ) -> PassOutcome {
        let children = ctx.document.children(ctx.document.root());
        self.reconcile(&children);
        let Some((first, last)) = self.window else {
            return PassOutcome::Idle;
        };

        self.monitor.set(PassState::Running);
        notifications.push(LayoutEvent::PlacementStarted { first_dirty: first });
        let count = self.locations.len();
        notifications.push(LayoutEvent::PendingJobsChanged {
            pending: count.saturating_sub(first),
        });
        log::debug!(
            target: "folio::pagination",
            "pass over {first}..={last} of {count} children{}",
            if self.recompute_all { " (recompute all)" } else { "" }
        );
        if self.recompute_all {
            self.refresh_pages(ctx.scene, formats);
        }
        ctx.remeasure = self.recompute_all;

        let tolerance = ctx.session.position_tolerance;
        let mut cursor = match first.checked_sub(1).and_then(|i| self.locations.get(i)) {
            Some(prev) => prev.bottom,
            None => PageLocation::default(),
        };
        let mut clock = YieldClock::new(ctx.session.yield_interval());
        self.decisions.clear();

        for i in first..count {
            let step = self.plan(ctx, formats, i, cursor);
            let decision = step.decision();
            log::trace!(target: "folio::pagination", "child {i}: {decision:?}");
            match step {
                Step::Skip => {}
                Step::Move(plan) => self.apply_move(ctx.scene, formats, i, cursor, plan),
                Step::Recompute => self.recompute(ctx, formats, i, cursor),
            }
            self.locations[i].state = ChildState::PlacedStable;
            self.decisions.push((i, decision));
            cursor = self.locations[i].bottom;

            if i > last && decision == ChildDecision::Skip {
                log::trace!(
                    target: "folio::pagination",
                    "child {i} unchanged past the window; stopping early"
                );
                break;
            }

            clock.tick(pump);
            if i + 1 < count && ctx.tracker.should_abort() {
                for loc in &mut self.locations[first..=i] {
                    loc.state = ChildState::Dirty;
                }
                self.widen(first, i);
                log::debug!(target: "folio::pagination", "pass aborted after child {i}");
                notifications.push(LayoutEvent::PlacementAborted {
                    after_child: Some(i),
                });
                self.monitor.set(PassState::Aborted);
                return PassOutcome::Aborted { after_child: i };
            }
        }

        self.window = None;
        self.recompute_all = false;
        let page_count = self.used_pages();
        self.ensure_page(ctx.scene, formats, page_count - 1);
        self.truncate_pages(ctx.scene, page_count);
        self.update_bounds(ctx.scene);
        if let Err(i) = self.verify_continuity(tolerance) {
            log::error!(
                target: "folio::pagination",
                "child {i} does not start where child {} ended",
                i.saturating_sub(1)
            );
        }

        notifications.push(LayoutEvent::PendingJobsChanged { pending: 0 });
        notifications.push(LayoutEvent::PlacementCompleted { page_count });
        self.monitor.set(PassState::Completed);
        log::debug!(target: "folio::pagination", "pass completed with {page_count} page(s)");
        PassOutcome::Completed { page_count }
    }

    fn plan(
        &self,
        ctx: &LayoutContext<'_>,
        formats: &PaperFormats,
        index: usize,
        cursor: PageLocation,
    ) -> Step {
        let loc = &self.locations[index];
        let tolerance = ctx.session.position_tolerance;
        let spacing = ctx.format(loc.node).top_spacing;
        if self.recompute_all
            || loc.state != ChildState::PlacedStable
            || !ctx.is_placed(loc.node)
            || (loc.top_spacing - spacing).abs() > tolerance
        {
            return Step::Recompute;
        }
        if loc.top.approx_eq(&cursor, tolerance) {
            return Step::Skip;
        }
        let hint = ctx
            .presentations
            .get(loc.node)
            .map_or(ReflowHint::AlwaysReflow, |p| p.reflow_hint());
        if hint == ReflowHint::AlwaysReflow {
            return Step::Recompute;
        }
        match plan_move(loc, formats, tolerance, cursor, spacing) {
            Some(plan) => Step::Move(plan),
            None => Step::Recompute,
        }
    }

    fn recompute(
        &mut self,
        ctx: &mut LayoutContext<'_>,
        formats: &PaperFormats,
        index: usize,
        start: PageLocation,
    ) {
        let node = self.locations[index].node;
        let spacing = ctx.format(node).top_spacing;
        let mut root_cursor = RootCursor::new(formats, ctx.session.position_tolerance, start);
        root_cursor.apply_spacing(spacing);
        let content_start = root_cursor.location();
        ctx.place_child(node, &mut root_cursor);
        let mut flow = root_cursor.finish();

        let last_line = flow.lines.len().saturating_sub(1);
        for (k, (page, line)) in flow.lines.iter_mut().enumerate() {
            if k < last_line && wants_justify(ctx, line) {
                let width = formats.format_for(*page).active_area().width;
                justify_line(ctx, line, width);
            }
        }

        let order = ctx.session.reading_order;
        let mut items = Vec::new();
        for (page, line) in &flow.lines {
            self.ensure_page(ctx.scene, formats, *page);
            let entry = &self.pages[*page];
            let area = entry.active_area;
            place_line(ctx.scene, line, entry.group, area.origin(), area.width, order);
            items.extend(line.entries.iter().map(|e| (e.area.item, *page)));
        }

        let (content_top, height, spans_pages) = match (flow.lines.first(), flow.lines.last()) {
            (Some((first_page, first)), Some((last_page, last))) => (
                PageLocation::new(*first_page, first.top),
                last.bottom() - first.top,
                first_page != last_page,
            ),
            _ => (content_start, 0.0, false),
        };

        let loc = &mut self.locations[index];
        loc.top = start;
        loc.bottom = flow.bottom;
        loc.content_top = content_top;
        loc.top_spacing = spacing;
        loc.height = height;
        loc.line_count = flow.lines.len();
        loc.spans_pages = spans_pages;
        loc.items = items;
    }

    fn apply_move(
        &mut self,
        scene: &mut Scene,
        formats: &PaperFormats,
        index: usize,
        start: PageLocation,
        plan: MovePlan,
    ) {
        self.ensure_page(scene, formats, plan.content_top.page);
        let group = self.pages[plan.content_top.page].group;
        let loc = &mut self.locations[index];
        let dy = plan.content_top.y - loc.content_top.y;
        for (item, page) in &mut loc.items {
            if *page != plan.content_top.page {
                scene.set_parent(*item, group);
                *page = plan.content_top.page;
            }
            scene.translate(*item, 0.0, dy);
        }
        loc.top = start;
        loc.content_top = plan.content_top;
        loc.bottom = plan.bottom;
    }

    /// Create pages up to and including `index`.
    fn ensure_page(&mut self, scene: &mut Scene, formats: &PaperFormats, index: usize) {
        while self.pages.len() <= index {
            let page = self.pages.len();
            let format = formats.format_for(page);
            let origin = match self.pages.last() {
                Some(prev) => Point::new(0.0, prev.origin.y + prev.paper_size().height + PAGE_GAP),
                None => Point::ZERO,
            };
            let group = scene.create_group();
            scene.set_parent(group, scene.root());
            scene.set_position(group, origin);
            let entry = PageEntry {
                index: page,
                format,
                active_area: format.active_area(),
                group,
                origin,
            };
            scene.set_size(group, entry.paper_size());
            log::debug!(target: "folio::pagination", "created page {page}");
            self.pages.push(entry);
        }
    }

    /// Re-read every page's format and restack the pages.
    fn refresh_pages(&mut self, scene: &mut Scene, formats: &PaperFormats) {
        let mut y = 0.0;
        for entry in &mut self.pages {
            entry.format = formats.format_for(entry.index);
            entry.active_area = entry.format.active_area();
            entry.origin = Point::new(0.0, y);
            scene.set_position(entry.group, entry.origin);
            scene.set_size(entry.group, entry.paper_size());
            y += entry.paper_size().height + PAGE_GAP;
        }
    }

    fn truncate_pages(&mut self, scene: &mut Scene, count: usize) {
        while self.pages.len() > count {
            if let Some(page) = self.pages.pop() {
                log::debug!(target: "folio::pagination", "dropped page {}", page.index);
                scene.remove(page.group);
            }
        }
    }

    fn used_pages(&self) -> usize {
        self.locations
            .iter()
            .filter(|l| l.state == ChildState::PlacedStable)
            .map(ChildLocation::last_page)
            .max()
            .map_or(1, |p| p + 1)
    }

    fn update_bounds(&self, scene: &mut Scene) {
        let width = self
            .pages
            .iter()
            .map(|p| p.paper_size().width)
            .fold(0.0, f64::max);
        let height = self
            .pages
            .last()
            .map_or(0.0, |p| p.origin.y + p.paper_size().height);
        scene.set_bounds(Rect::new(0.0, 0.0, width, height));
    }

    /// Check that every child starts where the previous one ended, the
    /// first one at the top of page 0. Returns the first offending index.
    pub fn verify_continuity(&self, tolerance: f64) -> Result<(), usize> {
        let mut expected = PageLocation::default();
        for (i, loc) in self.locations.iter().enumerate() {
            if !loc.top.approx_eq(&expected, tolerance) {
                return Err(i);
            }
            expected = loc.bottom;
        }
        Ok(())
    }
}

/// Where a single-line, single-page child lands if it starts at `cursor`.
/// Mirrors what [`RootCursor`] would do; `None` when the child must be laid
/// out again instead.
fn plan_move(
    loc: &ChildLocation,
    formats: &PaperFormats,
    tolerance: f64,
    cursor: PageLocation,
    spacing: f64,
) -> Option<MovePlan> {
    if loc.line_count != 1 || loc.spans_pages {
        return None;
    }
    let height_of = |page: usize| formats.format_for(page).active_area().height;
    let mut page = cursor.page;
    let mut y = cursor.y;
    if spacing > 0.0 && y > tolerance {
        y += spacing;
        if y >= height_of(page) - tolerance {
            page += 1;
            y = 0.0;
        }
    }
    if y > tolerance && loc.height > height_of(page) - y + tolerance {
        page += 1;
        y = 0.0;
    }
    if formats.format_for(page) != formats.format_for(loc.content_top.page) {
        return None;
    }
    let bottom_y = y + loc.height;
    let bottom = if bottom_y >= height_of(page) - tolerance {
        PageLocation::new(page + 1, 0.0)
    } else {
        PageLocation::new(page, bottom_y)
    };
    Some(MovePlan {
        content_top: PageLocation::new(page, y),
        bottom,
    })
}
