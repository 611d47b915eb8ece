//! # Presentations
//!
//! The per-node half of layout. Every attached document node gets a
//! [`Presentation`]: its placement state, the areas it last allocated and the
//! drawable items behind them. What a node does when it is placed depends on
//! its [`PresentationKind`]:
//!
//! * **Leaf**: literals, computed values, text, images, page breaks. They
//!   consume space and never host children.
//! * **FixedChildren**: operators. Operands are placed in isolation and
//!   arranged on a shared baseline.
//! * **FloatingChildren**: frames. Children sit at explicit positions.
//! * **GridChildren**: grids. Children fill row-major cells.
//! * **Root**: placed by [`crate::pagination::RootPagination`], never by a
//!   parent.
//!
//! Presentations live in [`Presentations`], keyed by the document's
//! [`NodeId`]. A presentation is taken out of the map while it places itself,
//! which is what lets a composite recurse into its children through the same
//! map.

pub mod area;
pub mod datatype;
pub mod diagnostic;
pub mod flow;
pub mod floating;
pub mod grid;
pub mod image;
pub mod literal;
pub mod operator;
pub mod page_break;
pub mod text;

use std::collections::HashMap;

use crate::font::GlyphMetrics;
use crate::geometry::Size;
use crate::image_loader::ImageCache;
use crate::model::{Document, Element, ElementKind, NodeId};
use crate::pagination::LayoutSession;
use crate::placement::{PlacementTracker, SpaceNegotiator};
use crate::scene::{ItemId, ItemKind, Scene};
use crate::style::{Color, FontSpec, ResolvedFormat, ScriptPosition};

pub use area::PresentationArea;
pub use datatype::{DataTypePresentationGenerator, DataTypePresenter};

use datatype::ValueLayout;
use floating::FrameLayout;
use grid::GridLayout;
use image::ImageLayout;
use literal::LiteralLayout;
use operator::OperatorLayout;
use page_break::PageBreakLayout;
use text::LineFlowNode;

/// Font size factor of superscript and subscript runs.
pub const SCRIPT_SIZE_FACTOR: f64 = 0.7;
/// Baseline rise of a superscript, as a fraction of the base line height.
pub const SUPERSCRIPT_RISE: f64 = 0.4;
/// Baseline drop of a subscript, as a fraction of the base line height.
pub const SUBSCRIPT_DROP: f64 = 0.2;

/// Everything a presentation needs while it places itself.
pub struct LayoutContext<'a> {
    pub document: &'a Document,
    pub metrics: &'a dyn GlyphMetrics,
    pub scene: &'a mut Scene,
    pub presentations: &'a mut Presentations,
    pub tracker: &'a mut dyn PlacementTracker,
    pub session: &'a LayoutSession,
    pub generator: &'a DataTypePresentationGenerator,
    pub images: &'a ImageCache,
    /// Lay out every descendant again instead of reusing cached placements.
    pub remeasure: bool,
}

impl<'a> LayoutContext<'a> {
    /// The element behind `node`.
    ///
    /// # Panics
    ///
    /// Panics if `node` was removed; layout never places dead nodes.
    pub fn element(&self, node: NodeId) -> &'a Element {
        let document: &'a Document = self.document;
        document
            .element(node)
            .unwrap_or_else(|| panic!("{node:?} was removed from the document but is being placed"))
    }

    /// The resolved format of `node`, cascading from the root.
    pub fn format(&self, node: NodeId) -> ResolvedFormat {
        resolve_format(self.document, node)
    }

    /// Place `child` against `parent` and return the areas it allocated.
    pub fn place_child(
        &mut self,
        child: NodeId,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea> {
        let mut presentation = match self.presentations.take(child) {
            Some(p) => p,
            None => {
                log::debug!(
                    target: "folio::presentation",
                    "{child:?} had no presentation; creating one on demand"
                );
                Presentation::new(child, PresentationKind::for_element(&self.element(child).kind))
            }
        };
        presentation.place(self, parent);
        let areas = presentation.areas().to_vec();
        self.presentations.put(presentation);
        areas
    }

    /// Whether `child` has a valid placement from an earlier pass.
    pub fn is_placed(&self, child: NodeId) -> bool {
        self.presentations
            .get(child)
            .is_some_and(|p| p.is_placed())
    }

    /// Areas of an already placed `child`.
    pub fn areas_of(&self, child: NodeId) -> Vec<PresentationArea> {
        self.presentations
            .get(child)
            .map(|p| p.areas().to_vec())
            .unwrap_or_default()
    }

    /// Stretch the area of `child` drawn by `item` by `factor` and return
    /// its new width.
    pub fn stretch(&mut self, child: NodeId, item: ItemId, factor: f64) -> f64 {
        let presentation = self
            .presentations
            .get_mut(child)
            .unwrap_or_else(|| panic!("{child:?} has no presentation to stretch"));
        presentation.apply_stretch_item(self.scene, item, factor)
    }
}

/// Resolve the format of `node` against all of its ancestors.
pub fn resolve_format(document: &Document, node: NodeId) -> ResolvedFormat {
    let mut chain = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        if let Some(element) = document.element(id) {
            chain.push(element);
        }
        current = document.parent(id);
    }
    chain
        .iter()
        .rev()
        .fold(None, |parent: Option<ResolvedFormat>, element| {
            Some(element.format.resolve(parent.as_ref()))
        })
        .unwrap_or_default()
}

/// Whether a node moved to a new position needs a full re-layout or can be
/// relocated as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflowHint {
    /// Position-independent: relocating the items is enough.
    MoveOnly,
    /// The result depends on where the node starts (wrapping text, page
    /// breaks).
    AlwaysReflow,
}

/// The child side of the placement protocol.
pub trait Placeable {
    /// Negotiate space for `node` with `parent`, create its items, and
    /// return the allocated areas in order.
    fn place(
        &mut self,
        node: NodeId,
        ctx: &mut LayoutContext<'_>,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea>;

    /// Stretch `area` horizontally by `factor`.
    ///
    /// # Panics
    ///
    /// Only stretchable kinds implement this; the default panics.
    fn apply_stretch(&mut self, _scene: &mut Scene, area: &mut PresentationArea, _factor: f64) {
        panic!(
            "placement contract violated: {:?} does not support stretching",
            area.item
        );
    }

    /// Delete items this layout created besides its area items.
    fn release(&mut self, _scene: &mut Scene) {}

    fn reflow_hint(&self) -> ReflowHint {
        ReflowHint::MoveOnly
    }

    /// `child` must be fully re-measured the next time this node is placed.
    fn invalidate_child(&mut self, _child: NodeId) {}
}

#[derive(Debug)]
pub enum Leaf {
    Literal(LiteralLayout),
    Value(ValueLayout),
    Text(LineFlowNode),
    Image(ImageLayout),
    PageBreak(PageBreakLayout),
}

#[derive(Debug)]
pub enum PresentationKind {
    Leaf(Leaf),
    FixedChildren(OperatorLayout),
    FloatingChildren(FrameLayout),
    GridChildren(GridLayout),
    Root,
}

impl PresentationKind {
    pub fn for_element(kind: &ElementKind) -> Self {
        match kind {
            ElementKind::Root => PresentationKind::Root,
            ElementKind::Operator { .. } => {
                PresentationKind::FixedChildren(OperatorLayout::default())
            }
            ElementKind::Literal { .. } => PresentationKind::Leaf(Leaf::Literal(LiteralLayout)),
            ElementKind::Value => PresentationKind::Leaf(Leaf::Value(ValueLayout::default())),
            ElementKind::Text { .. } => {
                PresentationKind::Leaf(Leaf::Text(LineFlowNode::default()))
            }
            ElementKind::Image { .. } => PresentationKind::Leaf(Leaf::Image(ImageLayout)),
            ElementKind::PageBreak => PresentationKind::Leaf(Leaf::PageBreak(PageBreakLayout)),
            ElementKind::Grid { .. } => PresentationKind::GridChildren(GridLayout::default()),
            ElementKind::Frame { .. } => PresentationKind::FloatingChildren(FrameLayout),
        }
    }

    fn placeable(&mut self) -> Option<&mut dyn Placeable> {
        match self {
            PresentationKind::Leaf(Leaf::Literal(l)) => Some(l),
            PresentationKind::Leaf(Leaf::Value(l)) => Some(l),
            PresentationKind::Leaf(Leaf::Text(l)) => Some(l),
            PresentationKind::Leaf(Leaf::Image(l)) => Some(l),
            PresentationKind::Leaf(Leaf::PageBreak(l)) => Some(l),
            PresentationKind::FixedChildren(l) => Some(l),
            PresentationKind::FloatingChildren(l) => Some(l),
            PresentationKind::GridChildren(l) => Some(l),
            PresentationKind::Root => None,
        }
    }

    fn reflow_hint(&self) -> ReflowHint {
        match self {
            PresentationKind::Leaf(Leaf::Text(l)) => l.reflow_hint(),
            PresentationKind::Leaf(Leaf::PageBreak(l)) => l.reflow_hint(),
            _ => ReflowHint::MoveOnly,
        }
    }
}

/// Layout state of one document node.
#[derive(Debug)]
pub struct Presentation {
    node: NodeId,
    kind: PresentationKind,
    areas: Vec<PresentationArea>,
    placed: bool,
}

impl Presentation {
    pub fn new(node: NodeId, kind: PresentationKind) -> Self {
        Self {
            node,
            kind,
            areas: Vec::new(),
            placed: false,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> &PresentationKind {
        &self.kind
    }

    pub fn areas(&self) -> &[PresentationArea] {
        &self.areas
    }

    pub fn is_placed(&self) -> bool {
        self.placed
    }

    /// The drawable item of area `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn graphics_item(&self, index: usize) -> ItemId {
        self.areas
            .get(index)
            .map(|a| a.item)
            .unwrap_or_else(|| {
                panic!(
                    "area index {index} out of range ({:?} has {} areas)",
                    self.node,
                    self.areas.len()
                )
            })
    }

    pub fn reflow_hint(&self) -> ReflowHint {
        self.kind.reflow_hint()
    }

    /// Lay the node out afresh against `parent`, replacing its areas.
    ///
    /// # Panics
    ///
    /// Panics for the root presentation, which pagination places.
    pub fn place(&mut self, ctx: &mut LayoutContext<'_>, parent: &mut dyn SpaceNegotiator) {
        ctx.tracker.job_started();
        self.reset(ctx.scene);
        let node = self.node;
        let layout = self
            .kind
            .placeable()
            .unwrap_or_else(|| panic!("the document root is placed by pagination, not by a parent"));
        let areas = layout.place(node, ctx, parent);
        if let Some(diag) = ctx.element(node).diagnostic.as_ref() {
            diagnostic::decorate(ctx.scene, diag, &areas);
        }
        log::trace!(
            target: "folio::presentation",
            "placed {node:?} in {} area(s)",
            areas.len()
        );
        self.areas = areas;
        self.placed = true;
        ctx.tracker.job_finished();
    }

    /// Stretch the area drawn by `item` and return its new width.
    ///
    /// # Panics
    ///
    /// Panics if the area is not stretchable or `item` is not one of this
    /// presentation's area items.
    pub fn apply_stretch_item(&mut self, scene: &mut Scene, item: ItemId, factor: f64) -> f64 {
        let node = self.node;
        let area = self
            .areas
            .iter_mut()
            .find(|a| a.item == item)
            .unwrap_or_else(|| panic!("{item:?} is not an area of {node:?}"));
        assert!(
            area.can_stretch,
            "placement contract violated: area {item:?} of {node:?} is not stretchable"
        );
        if let Some(layout) = self.kind.placeable() {
            layout.apply_stretch(scene, area, factor);
        }
        area.size.width
    }

    /// Delete every item this presentation owns and forget its areas.
    pub fn reset(&mut self, scene: &mut Scene) {
        if let Some(layout) = self.kind.placeable() {
            layout.release(scene);
        }
        for area in self.areas.drain(..) {
            scene.remove(area.item);
        }
        self.placed = false;
    }

    fn invalidate(&mut self) {
        self.placed = false;
    }

    fn invalidate_child(&mut self, child: NodeId) {
        if let Some(layout) = self.kind.placeable() {
            layout.invalidate_child(child);
        }
        self.placed = false;
    }
}

/// Outcome of a repositioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repositioning {
    /// The node is not reachable from the root; nothing happens.
    Suppressed,
    /// The root itself changed; everything must be laid out again.
    Root,
    /// The top-level block containing the node must be laid out again.
    TopLevel(NodeId),
}

/// All presentations of an attached document.
#[derive(Debug, Default)]
pub struct Presentations {
    map: HashMap<NodeId, Presentation>,
}

impl Presentations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<&Presentation> {
        self.map.get(&node)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut Presentation> {
        self.map.get_mut(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.map.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn take(&mut self, node: NodeId) -> Option<Presentation> {
        self.map.remove(&node)
    }

    pub(crate) fn put(&mut self, presentation: Presentation) {
        self.map.insert(presentation.node, presentation);
    }

    /// Create presentations for `node` and its descendants. Returns the
    /// nodes that did not have one yet.
    pub fn attach_subtree(&mut self, document: &Document, node: NodeId) -> Vec<NodeId> {
        let mut added = Vec::new();
        for id in document.subtree(node) {
            if self.map.contains_key(&id) {
                continue;
            }
            if let Some(element) = document.element(id) {
                self.map
                    .insert(id, Presentation::new(id, PresentationKind::for_element(&element.kind)));
                added.push(id);
            }
        }
        added
    }

    /// Drop the presentation of `node`, deleting its items.
    pub fn detach(&mut self, node: NodeId, scene: &mut Scene) -> bool {
        match self.map.remove(&node) {
            Some(mut presentation) => {
                presentation.reset(scene);
                true
            }
            None => false,
        }
    }

    /// Mark `node` for re-layout and propagate the request up to the
    /// top-level block that contains it. Each ancestor forgets only its
    /// cached placement of the child on the path.
    pub fn request_repositioning(&mut self, document: &Document, node: NodeId) -> Repositioning {
        if !document.is_grafted(node) {
            log::trace!(
                target: "folio::presentation",
                "ignoring repositioning request from ungrafted {node:?}"
            );
            return Repositioning::Suppressed;
        }
        let root = document.root();
        if node == root {
            return Repositioning::Root;
        }
        // Descendants inherit the node's format, so none of their cached
        // placements survive a change of the node itself.
        for id in document.subtree(node) {
            if let Some(p) = self.map.get_mut(&id) {
                p.invalidate();
            }
        }
        if let Some(p) = self.map.get_mut(&node) {
            for child in document.children(node) {
                p.invalidate_child(child);
            }
        }
        let mut current = node;
        while let Some(parent) = document.parent(current) {
            if parent == root {
                return Repositioning::TopLevel(current);
            }
            if let Some(p) = self.map.get_mut(&parent) {
                p.invalidate_child(current);
            }
            current = parent;
        }
        Repositioning::Suppressed
    }
}

/// Font and baseline rise for a run set in `format`'s script position.
/// The rise is positive upwards.
pub fn script_font(format: &ResolvedFormat, metrics: &dyn GlyphMetrics) -> (FontSpec, f64) {
    let base = &format.font;
    match format.script {
        ScriptPosition::Normal => (base.clone(), 0.0),
        ScriptPosition::Superscript => {
            let line = metrics.measure(base, "").line_height;
            (base.adjusted(SCRIPT_SIZE_FACTOR, 0), line * SUPERSCRIPT_RISE)
        }
        ScriptPosition::Subscript => {
            let line = metrics.measure(base, "").line_height;
            (base.adjusted(SCRIPT_SIZE_FACTOR, 0), -line * SUBSCRIPT_DROP)
        }
    }
}

/// Create a detached text item.
pub fn text_item(scene: &mut Scene, text: &str, font: &FontSpec, color: Color, size: Size) -> ItemId {
    scene.create(
        ItemKind::Text {
            text: text.to_string(),
            font: font.clone(),
            color,
            letter_spacing: 0.0,
            vertical_scale: 1.0,
        },
        size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeSpec, OperatorForm};
    use crate::placement::RecordingNegotiator;
    use crate::style::Format;
    use crate::testing::Fixture;

    fn literal(text: &str) -> NodeSpec {
        NodeSpec::new(ElementKind::Literal { text: text.into() })
    }

    fn sum() -> NodeSpec {
        let mut op = NodeSpec::new(ElementKind::Operator {
            form: OperatorForm::Binary,
            glyph: "+".into(),
            second_glyph: None,
        });
        op.children = vec![literal("a"), literal("b")];
        op
    }

    #[test]
    fn formats_cascade_from_the_root() {
        let root_format = Format {
            font_size: Some(20.0),
            ..Default::default()
        };
        let fx = Fixture::new(Document::from_specs(root_format, &[sum()]));
        let op = fx.document.children(fx.document.root())[0];
        let a = fx.document.child(op, 0);
        assert_eq!(resolve_format(&fx.document, a).font.size, 20.0);
    }

    #[test]
    fn repositioning_propagates_to_the_top_level_block() {
        let mut fx = Fixture::new(Document::from_specs(Format::default(), &[sum()]));
        let op = fx.document.children(fx.document.root())[0];
        let b = fx.document.child(op, 1);
        fx.place(op, &mut RecordingNegotiator::unbounded());
        assert!(fx.presentations.get(b).unwrap().is_placed());

        let outcome = fx.presentations.request_repositioning(&fx.document, b);
        assert_eq!(outcome, Repositioning::TopLevel(op));
        assert!(!fx.presentations.get(b).unwrap().is_placed());
        assert!(!fx.presentations.get(op).unwrap().is_placed());
        let a = fx.document.child(op, 0);
        assert!(fx.presentations.get(a).unwrap().is_placed());
    }

    #[test]
    fn ungrafted_requests_are_suppressed() {
        let mut fx = Fixture::new(Document::new());
        let loose = fx
            .document
            .create(Element::new(ElementKind::Literal { text: "x".into() }));
        fx.presentations.attach_subtree(&fx.document, loose);
        assert_eq!(
            fx.presentations.request_repositioning(&fx.document, loose),
            Repositioning::Suppressed
        );
    }

    #[test]
    fn reset_deletes_area_items() {
        let mut fx = Fixture::new(Document::from_specs(Format::default(), &[literal("x")]));
        let x = fx.document.children(fx.document.root())[0];
        fx.place(x, &mut RecordingNegotiator::unbounded());
        let item = fx.presentations.get(x).unwrap().graphics_item(0);
        assert!(fx.scene.is_alive(item));
        fx.presentations.detach(x, &mut fx.scene);
        assert!(!fx.scene.is_alive(item));
    }

    #[test]
    #[should_panic(expected = "not stretchable")]
    fn stretching_a_literal_panics() {
        let mut fx = Fixture::new(Document::from_specs(Format::default(), &[literal("x")]));
        let x = fx.document.children(fx.document.root())[0];
        fx.place(x, &mut RecordingNegotiator::unbounded());
        let item = fx.presentations.get(x).unwrap().graphics_item(0);
        fx.presentations
            .get_mut(x)
            .unwrap()
            .apply_stretch_item(&mut fx.scene, item, 2.0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn graphics_item_out_of_range_panics() {
        let p = Presentation::new(Document::new().root(), PresentationKind::Root);
        p.graphics_item(0);
    }
}
