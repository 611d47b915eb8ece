//! # Scene
//!
//! The drawable-item factory. Layout decides where things go; the scene only
//! records it. Items form a tree: group containers hold children whose
//! positions are relative to the group's origin, so moving a group moves
//! everything inside it.
//!
//! Every presentation owns the items it creates and is the only one that
//! deletes them. Deleting a group therefore detaches its children instead of
//! destroying them: the children belong to other presentations, which may
//! still want to re-parent them into a fresh group.

use indextree::{Arena, NodeId};
use serde::Serialize;

use crate::geometry::{Point, Rect, Size};
use crate::style::{Color, FontSpec};

/// Handle of a drawable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(NodeId);

/// What an item draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ItemKind {
    /// A container with no visual of its own.
    Group,
    /// A positioned glyph run. `vertical_scale` stretches glyphs vertically
    /// (used for scaled parenthesis glyphs).
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        font: FontSpec,
        color: Color,
        letter_spacing: f64,
        vertical_scale: f64,
    },
    /// A decoded image.
    #[serde(rename_all = "camelCase")]
    Image { width_px: u32, height_px: u32 },
    /// A box with an error glyph, drawn in place of an unloadable image.
    ImagePlaceholder { message: String },
    /// A vector bracket drawn to an exact height. `glyph` is the bracket
    /// character it stands in for.
    Bracket { glyph: char, color: Color },
    /// A plain rectangle.
    Rect {
        fill: Option<Color>,
        stroke: Option<Color>,
    },
}

/// A tinted border plus tooltip attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoration {
    pub tint: Color,
    pub tooltip: String,
}

/// One item in the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawItem {
    pub kind: ItemKind,
    /// Top-left corner, relative to the parent item.
    pub position: Point,
    pub size: Size,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoration: Option<Decoration>,
}

/// Serializable snapshot of an item subtree, with absolute positions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub kind: ItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoration: Option<Decoration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ItemSnapshot>,
}

/// The retained item tree.
#[derive(Debug)]
pub struct Scene {
    arena: Arena<DrawItem>,
    root: NodeId,
    bounds: Rect,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(DrawItem {
            kind: ItemKind::Group,
            position: Point::ZERO,
            size: Size::ZERO,
            decoration: None,
        });
        Self {
            arena,
            root,
            bounds: Rect::default(),
        }
    }

    /// The top-level container every page group hangs off.
    pub fn root(&self) -> ItemId {
        ItemId(self.root)
    }

    /// Create a detached item.
    pub fn create(&mut self, kind: ItemKind, size: Size) -> ItemId {
        ItemId(self.arena.new_node(DrawItem {
            kind,
            position: Point::ZERO,
            size,
            decoration: None,
        }))
    }

    /// Create a detached, empty group.
    pub fn create_group(&mut self) -> ItemId {
        self.create(ItemKind::Group, Size::ZERO)
    }

    pub fn is_alive(&self, item: ItemId) -> bool {
        !item.0.is_removed(&self.arena) && self.arena.get(item.0).is_some()
    }

    pub fn get(&self, item: ItemId) -> Option<&DrawItem> {
        if !self.is_alive(item) {
            return None;
        }
        self.arena.get(item.0).map(|n| n.get())
    }

    pub fn get_mut(&mut self, item: ItemId) -> Option<&mut DrawItem> {
        if !self.is_alive(item) {
            return None;
        }
        self.arena.get_mut(item.0).map(|n| n.get_mut())
    }

    /// Move `item` (with its subtree) under `parent`, as its last child.
    pub fn set_parent(&mut self, item: ItemId, parent: ItemId) {
        if !self.is_alive(item) || !self.is_alive(parent) {
            return;
        }
        item.0.detach(&mut self.arena);
        parent.0.append(item.0, &mut self.arena);
    }

    pub fn parent(&self, item: ItemId) -> Option<ItemId> {
        if !self.is_alive(item) {
            return None;
        }
        item.0.parent(&self.arena).map(ItemId)
    }

    pub fn children(&self, item: ItemId) -> Vec<ItemId> {
        if !self.is_alive(item) {
            return Vec::new();
        }
        item.0.children(&self.arena).map(ItemId).collect()
    }

    /// Detach `item` from its parent; it stays alive.
    pub fn detach(&mut self, item: ItemId) {
        if self.is_alive(item) {
            item.0.detach(&mut self.arena);
        }
    }

    /// Delete `item`. Its children are detached first and stay alive.
    pub fn remove(&mut self, item: ItemId) {
        if !self.is_alive(item) {
            return;
        }
        for child in self.children(item) {
            child.0.detach(&mut self.arena);
        }
        item.0.remove(&mut self.arena);
    }

    pub fn set_position(&mut self, item: ItemId, position: Point) {
        if let Some(it) = self.get_mut(item) {
            it.position = position;
        }
    }

    pub fn position(&self, item: ItemId) -> Point {
        self.get(item).map(|it| it.position).unwrap_or_default()
    }

    pub fn translate(&mut self, item: ItemId, dx: f64, dy: f64) {
        if let Some(it) = self.get_mut(item) {
            it.position = it.position.offset(dx, dy);
        }
    }

    pub fn set_size(&mut self, item: ItemId, size: Size) {
        if let Some(it) = self.get_mut(item) {
            it.size = size;
        }
    }

    pub fn size(&self, item: ItemId) -> Size {
        self.get(item).map(|it| it.size).unwrap_or_default()
    }

    pub fn decorate(&mut self, item: ItemId, decoration: Option<Decoration>) {
        if let Some(it) = self.get_mut(item) {
            it.decoration = decoration;
        }
    }

    /// Position of `item` in scene coordinates.
    pub fn absolute_position(&self, item: ItemId) -> Point {
        if !self.is_alive(item) {
            return Point::ZERO;
        }
        item.0
            .ancestors(&self.arena)
            .filter_map(|id| self.arena.get(id))
            .fold(Point::ZERO, |acc, n| acc.offset(n.get().position.x, n.get().position.y))
    }

    /// Number of live items, including the root.
    pub fn item_count(&self) -> usize {
        self.arena.iter().filter(|n| !n.is_removed()).count()
    }

    /// Logical extent of the document in scene space.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    /// Absolute-position snapshot of `item` and its subtree.
    pub fn snapshot(&self, item: ItemId) -> Option<ItemSnapshot> {
        let origin = self.absolute_position(item);
        let parent_origin = Point::new(
            origin.x - self.position(item).x,
            origin.y - self.position(item).y,
        );
        self.snapshot_at(item, parent_origin)
    }

    fn snapshot_at(&self, item: ItemId, parent_origin: Point) -> Option<ItemSnapshot> {
        let it = self.get(item)?;
        let origin = parent_origin.offset(it.position.x, it.position.y);
        Some(ItemSnapshot {
            x: origin.x,
            y: origin.y,
            width: it.size.width,
            height: it.size.height,
            kind: it.kind.clone(),
            decoration: it.decoration.clone(),
            children: self
                .children(item)
                .into_iter()
                .filter_map(|c| self.snapshot_at(c, origin))
                .collect(),
        })
    }
}
