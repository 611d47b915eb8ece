//! # Document Model
//!
//! The content the layout engine presents. A document is a tree of typed
//! elements (operators, literals, computed values, text, images, page breaks,
//! grids, frames) under a single root, each with a format, an optional
//! diagnostic, and an optional calculated value.
//!
//! Elements live in an [`indextree::Arena`]; everything outside the model
//! refers to them by [`NodeId`] and checks liveness with
//! [`Document::is_alive`] before dereferencing. The model never holds layout
//! state. Every mutation posts a [`DocumentEvent`] on an `mpsc` channel so the
//! engine can react on its own thread, at its own pace.
//!
//! Documents can also be described as JSON, in the same shape the CLI reads:
//!
//! ```json
//! { "kind": { "type": "Operator", "form": "Binary", "glyph": "+" },
//!   "children": [ { "kind": { "type": "Literal", "text": "a" } },
//!                 { "kind": { "type": "Literal", "text": "b" } } ] }
//! ```

use std::sync::mpsc::{channel, Receiver, Sender};

use indextree::Arena;
use serde::{Deserialize, Serialize};

pub use indextree::NodeId;

use crate::events::DocumentEvent;
use crate::geometry::Point;
use crate::style::{Format, Severity};

/// One element of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub format: Format,
    pub diagnostic: Option<Diagnostic>,
    /// Calculated value cache, owned by the evaluator. Read-only for layout.
    pub value: Option<Value>,
    /// Explicit position inside a floating parent (frame).
    pub position: Option<Point>,
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            format: Format::default(),
            diagnostic: None,
            value: None,
            position: None,
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_position(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }
}

/// The different kinds of elements in the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementKind {
    /// The document root. Its children are the top-level blocks.
    Root,

    /// A math operator applied to its children (the operands).
    Operator {
        form: OperatorForm,
        /// The operator glyph, e.g. `+`, `!`, `Σ`.
        glyph: String,
        /// Second glyph of trinary operators (`?` ... `:`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        second_glyph: Option<String>,
    },

    /// A literal token of source: a number, a name.
    Literal { text: String },

    /// A leaf whose content is its calculated value.
    Value,

    /// A run of prose that wraps.
    Text { content: String },

    /// An image.
    Image {
        /// Base64-encoded image data, a data URI, or a file path.
        src: String,
        /// Display width in points (intrinsic if not set).
        #[serde(default)]
        width: Option<f64>,
        /// Display height in points (intrinsic if not set).
        #[serde(default)]
        height: Option<f64>,
    },

    /// An explicit page break.
    PageBreak,

    /// Children laid out row-major in a grid of `columns` columns.
    Grid {
        columns: usize,
        /// Fixed column widths in points; missing entries share the rest.
        #[serde(default)]
        column_widths: Vec<f64>,
        /// Gap between rows and between columns.
        #[serde(default)]
        gap: f64,
    },

    /// Children positioned at their explicit `position`.
    Frame {
        #[serde(default)]
        width: Option<f64>,
        #[serde(default)]
        height: Option<f64>,
    },
}

/// How an operator arranges its glyph(s) relative to its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorForm {
    /// `−a`
    Prefix,
    /// `a!`
    Postfix,
    /// `aᵀ`: the glyph is set as a superscript after the operand.
    Superscript,
    /// `a + b (+ c ...)`
    Binary,
    /// `a ? b : c`
    Trinary,
    /// `(a)`: a single operand enclosed in parentheses.
    Grouping,
    /// `Σ a`: an oversized glyph before the operand.
    Large,
}

impl OperatorForm {
    /// The minimum number of operands this form lays out.
    pub fn min_operands(&self) -> usize {
        match self {
            OperatorForm::Binary => 2,
            OperatorForm::Trinary => 3,
            _ => 1,
        }
    }
}

/// A diagnostic attached to an element by the document model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// A calculated value produced by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// The evaluator has not produced a value (yet).
    NoData,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    Matrix(Vec<Vec<Value>>),
}

/// Discriminant of [`Value`], used to pick a presentation generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    NoData,
    Boolean,
    Integer,
    Real,
    Text,
    Tuple,
    Set,
    Matrix,
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::NoData => ValueType::NoData,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Real(_) => ValueType::Real,
            Value::Text(_) => ValueType::Text,
            Value::Tuple(_) => ValueType::Tuple,
            Value::Set(_) => ValueType::Set,
            Value::Matrix(_) => ValueType::Matrix,
        }
    }
}

/// Serializable description of an element and its subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub kind: ElementKind,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub diagnostic: Option<Diagnostic>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            format: Format::default(),
            diagnostic: None,
            value: None,
            position: None,
            children: Vec::new(),
        }
    }

    fn to_element(&self) -> Element {
        Element {
            kind: self.kind.clone(),
            format: self.format.clone(),
            diagnostic: self.diagnostic.clone(),
            value: self.value.clone(),
            position: self.position,
        }
    }
}

/// The document tree.
#[derive(Debug)]
pub struct Document {
    arena: Arena<Element>,
    root: NodeId,
    events: Sender<DocumentEvent>,
    receiver: Option<Receiver<DocumentEvent>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document containing only its root.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(Element::new(ElementKind::Root));
        let (events, receiver) = channel();
        Self {
            arena,
            root,
            events,
            receiver: Some(receiver),
        }
    }

    /// Build a document whose root carries `format` and has `children`.
    ///
    /// Construction does not post events: a freshly built document is
    /// presented in full when the engine attaches to it.
    pub fn from_specs(format: Format, children: &[NodeSpec]) -> Self {
        let mut doc = Self::new();
        if let Some(root) = doc.arena.get_mut(doc.root) {
            root.get_mut().format = format;
        }
        for spec in children {
            let id = doc.build_subtree(spec);
            doc.root.append(id, &mut doc.arena);
        }
        doc
    }

    fn build_subtree(&mut self, spec: &NodeSpec) -> NodeId {
        let id = self.arena.new_node(spec.to_element());
        for child in &spec.children {
            let child_id = self.build_subtree(child);
            id.append(child_id, &mut self.arena);
        }
        id
    }

    /// Hand out the single consumer end of the event channel.
    ///
    /// Returns `None` once it has been taken.
    pub fn take_event_receiver(&mut self) -> Option<Receiver<DocumentEvent>> {
        self.receiver.take()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        !id.is_removed(&self.arena) && self.arena.get(id).is_some()
    }

    /// Whether `id` is reachable from the root.
    pub fn is_grafted(&self, id: NodeId) -> bool {
        self.is_alive(id) && id.ancestors(&self.arena).any(|a| a == self.root)
    }

    /// The element behind `id`, or `None` if it was removed.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        if !self.is_alive(id) {
            return None;
        }
        self.arena.get(id).map(|n| n.get())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_alive(id) {
            return None;
        }
        id.parent(&self.arena)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        if !self.is_alive(id) {
            return Vec::new();
        }
        id.children(&self.arena).collect()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        if !self.is_alive(id) {
            return 0;
        }
        id.children(&self.arena).count()
    }

    /// The `index`-th child of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn child(&self, id: NodeId, index: usize) -> NodeId {
        let count = self.child_count(id);
        id.children(&self.arena)
            .nth(index)
            .unwrap_or_else(|| panic!("child index {index} out of range (node has {count} children)"))
    }

    /// Position of `child` among its parent's children.
    pub fn index_of(&self, child: NodeId) -> Option<usize> {
        let parent = self.parent(child)?;
        parent.children(&self.arena).position(|c| c == child)
    }

    /// `id` and all of its live descendants, pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        if !self.is_alive(id) {
            return Vec::new();
        }
        id.descendants(&self.arena).collect()
    }

    /// Create a detached (ungrafted) element.
    pub fn create(&mut self, element: Element) -> NodeId {
        self.arena.new_node(element)
    }

    /// Create a detached subtree from a spec.
    pub fn create_subtree(&mut self, spec: &NodeSpec) -> NodeId {
        self.build_subtree(spec)
    }

    /// Attach `child` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        parent.append(child, &mut self.arena);
        self.post(DocumentEvent::NodeInserted {
            parent,
            node: child,
        });
    }

    /// Attach `child` so that it becomes the `index`-th child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is greater than the child count.
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        let count = self.child_count(parent);
        assert!(
            index <= count,
            "insert index {index} out of range (node has {count} children)"
        );
        if index == count {
            parent.append(child, &mut self.arena);
        } else {
            let sibling = self.child(parent, index);
            sibling.insert_before(child, &mut self.arena);
        }
        self.post(DocumentEvent::NodeInserted {
            parent,
            node: child,
        });
    }

    /// Remove `id` and its subtree from the document.
    ///
    /// # Panics
    ///
    /// Panics when asked to remove the root.
    pub fn remove(&mut self, id: NodeId) {
        assert!(id != self.root, "the document root cannot be removed");
        let parent = self.parent(id);
        let index = self.index_of(id);
        let subtree = self.subtree(id);
        id.remove_subtree(&mut self.arena);
        if let (Some(parent), Some(index)) = (parent, index) {
            self.post(DocumentEvent::NodeRemoved {
                parent,
                index,
                node: id,
                subtree,
            });
        }
    }

    pub fn set_format(&mut self, id: NodeId, format: Format) {
        self.modify(id, |e| e.format = format);
    }

    pub fn set_value(&mut self, id: NodeId, value: Option<Value>) {
        self.modify(id, |e| e.value = value);
    }

    pub fn set_diagnostic(&mut self, id: NodeId, diagnostic: Option<Diagnostic>) {
        self.modify(id, |e| e.diagnostic = diagnostic);
    }

    /// Replace the textual content of a `Text` or `Literal` element.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.modify(id, |e| match &mut e.kind {
            ElementKind::Text { content } => *content = text.to_string(),
            ElementKind::Literal { text: t } => *t = text.to_string(),
            _ => {}
        });
    }

    fn modify(&mut self, id: NodeId, f: impl FnOnce(&mut Element)) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(node) = self.arena.get_mut(id) {
            f(node.get_mut());
            self.post(DocumentEvent::NodeChanged { node: id });
        }
    }

    fn post(&self, event: DocumentEvent) {
        // The receiver may have been dropped by a finished engine.
        let _ = self.events.send(event);
    }
}
