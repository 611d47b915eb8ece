//! # Calculated Values
//!
//! Elements of kind `Value` show the result the evaluator computed for
//! them. Which drawing a value gets depends on its type: scalars become a
//! text run, tuples and sets a delimited list, matrices a bracketed grid.
//!
//! [`DataTypePresentationGenerator`] maps each [`ValueType`] to a factory
//! producing a [`DataTypePresenter`]. Presenters render into the scene and
//! report their extent; they never touch the document.

use std::collections::HashMap;

use crate::font::GlyphMetrics;
use crate::geometry::{Point, Size};
use crate::model::{NodeId, Value, ValueType};
use crate::placement::{negotiate, SpaceNegotiator};
use crate::scene::{ItemId, ItemKind, Scene};
use crate::style::{Color, ResolvedFormat};

use super::literal::UNSET_GLYPH;
use super::{text_item, LayoutContext, Placeable, PresentationArea};

/// Horizontal gap between matrix columns, in ems.
pub const MATRIX_COLUMN_GAP: f64 = 0.8;
/// Vertical gap between matrix rows, in ems.
pub const MATRIX_ROW_GAP: f64 = 0.2;

/// A rendered value: the item that draws it and its extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rendered {
    pub item: ItemId,
    pub size: Size,
    pub ascent: f64,
}

/// Rendering surface handed to presenters. Tracks every item created so the
/// owning presentation can delete them later.
pub struct PresenterEnv<'s> {
    pub scene: &'s mut Scene,
    pub metrics: &'s dyn GlyphMetrics,
    pub format: &'s ResolvedFormat,
    created: Vec<ItemId>,
}

impl<'s> PresenterEnv<'s> {
    pub fn new(
        scene: &'s mut Scene,
        metrics: &'s dyn GlyphMetrics,
        format: &'s ResolvedFormat,
    ) -> Self {
        Self {
            scene,
            metrics,
            format,
            created: Vec::new(),
        }
    }

    /// A single text run in the value's font.
    pub fn text(&mut self, text: &str, color: Color) -> Rendered {
        let m = self.metrics.measure(&self.format.font, text);
        let size = Size::new(m.width, m.height());
        let item = text_item(self.scene, text, &self.format.font, color, size);
        self.created.push(item);
        Rendered {
            item,
            size,
            ascent: m.ascent,
        }
    }

    pub fn group(&mut self, size: Size) -> ItemId {
        let item = self.scene.create_group();
        self.scene.set_size(item, size);
        self.created.push(item);
        item
    }

    pub fn bracket(&mut self, glyph: char, size: Size) -> ItemId {
        let item = self.scene.create(
            ItemKind::Bracket {
                glyph,
                color: self.format.color,
            },
            size,
        );
        self.created.push(item);
        item
    }

    pub fn into_created(self) -> Vec<ItemId> {
        self.created
    }
}

/// Renders one calculated value.
pub trait DataTypePresenter {
    fn render(&self, env: &mut PresenterEnv<'_>) -> Rendered;
}

/// Builds a presenter for a value; receives the generator for nested values.
pub type PresenterFactory = fn(&Value, &DataTypePresentationGenerator) -> Box<dyn DataTypePresenter>;

/// Registry of presenter factories by value type.
pub struct DataTypePresentationGenerator {
    factories: HashMap<ValueType, PresenterFactory>,
}

impl std::fmt::Debug for DataTypePresentationGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTypePresentationGenerator")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for DataTypePresentationGenerator {
    fn default() -> Self {
        let mut generator = Self {
            factories: HashMap::new(),
        };
        generator.register(ValueType::NoData, |_, _| Box::new(UnsetPresenter));
        for ty in [
            ValueType::Boolean,
            ValueType::Integer,
            ValueType::Real,
            ValueType::Text,
        ] {
            generator.register(ty, |value, _| Box::new(ScalarPresenter::new(value)));
        }
        generator.register(ValueType::Tuple, |value, g| {
            Box::new(ListPresenter::new(value, ('(', ')'), g))
        });
        generator.register(ValueType::Set, |value, g| {
            Box::new(ListPresenter::new(value, ('{', '}'), g))
        });
        generator.register(ValueType::Matrix, |value, g| {
            Box::new(MatrixPresenter::new(value, g))
        });
        generator
    }
}

impl DataTypePresentationGenerator {
    /// Install or replace the factory for `ty`.
    pub fn register(&mut self, ty: ValueType, factory: PresenterFactory) {
        self.factories.insert(ty, factory);
    }

    /// A presenter for `value`; an absent value is presented as unset.
    pub fn presenter_for(&self, value: Option<&Value>) -> Box<dyn DataTypePresenter> {
        match value {
            Some(v) => match self.factories.get(&v.value_type()) {
                Some(factory) => factory(v, self),
                None => Box::new(UnsetPresenter),
            },
            None => Box::new(UnsetPresenter),
        }
    }
}

/// The grey placeholder glyph for missing data.
#[derive(Debug)]
pub struct UnsetPresenter;

impl DataTypePresenter for UnsetPresenter {
    fn render(&self, env: &mut PresenterEnv<'_>) -> Rendered {
        env.text(UNSET_GLYPH, Color::GRAY)
    }
}

/// Format a scalar for display.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) if r.is_nan() => "NaN".to_string(),
        Value::Real(r) if r.is_infinite() => {
            if *r > 0.0 { "∞".to_string() } else { "-∞".to_string() }
        }
        Value::Real(r) => r.to_string(),
        Value::Text(t) => format!("\"{t}\""),
        Value::NoData => UNSET_GLYPH.to_string(),
        Value::Tuple(_) | Value::Set(_) | Value::Matrix(_) => String::new(),
    }
}

#[derive(Debug)]
pub struct ScalarPresenter {
    text: String,
}

impl ScalarPresenter {
    pub fn new(value: &Value) -> Self {
        Self {
            text: scalar_text(value),
        }
    }
}

impl DataTypePresenter for ScalarPresenter {
    fn render(&self, env: &mut PresenterEnv<'_>) -> Rendered {
        let color = env.format.color;
        env.text(&self.text, color)
    }
}

/// Lay rendered pieces side by side on one baseline inside a new group.
fn row(env: &mut PresenterEnv<'_>, pieces: &[Rendered]) -> Rendered {
    let ascent = pieces.iter().map(|p| p.ascent).fold(0.0, f64::max);
    let descent = pieces
        .iter()
        .map(|p| p.size.height - p.ascent)
        .fold(0.0, f64::max);
    let width: f64 = pieces.iter().map(|p| p.size.width).sum();
    let size = Size::new(width, ascent + descent);
    let group = env.group(size);
    let mut x = 0.0;
    for piece in pieces {
        env.scene.set_parent(piece.item, group);
        env.scene
            .set_position(piece.item, Point::new(x, ascent - piece.ascent));
        x += piece.size.width;
    }
    Rendered {
        item: group,
        size,
        ascent,
    }
}

/// `(a, b, c)` or `{a, b, c}`.
pub struct ListPresenter {
    delimiters: (char, char),
    elements: Vec<Box<dyn DataTypePresenter>>,
}

impl ListPresenter {
    pub fn new(
        value: &Value,
        delimiters: (char, char),
        generator: &DataTypePresentationGenerator,
    ) -> Self {
        let elements = match value {
            Value::Tuple(items) | Value::Set(items) => items
                .iter()
                .map(|v| generator.presenter_for(Some(v)))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            delimiters,
            elements,
        }
    }
}

impl DataTypePresenter for ListPresenter {
    fn render(&self, env: &mut PresenterEnv<'_>) -> Rendered {
        let color = env.format.color;
        let mut buf = [0u8; 4];
        let mut pieces = vec![env.text(self.delimiters.0.encode_utf8(&mut buf), color)];
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                pieces.push(env.text(", ", color));
            }
            pieces.push(element.render(env));
        }
        pieces.push(env.text(self.delimiters.1.encode_utf8(&mut buf), color));
        row(env, &pieces)
    }
}

/// A bracketed grid of values.
pub struct MatrixPresenter {
    rows: Vec<Vec<Box<dyn DataTypePresenter>>>,
}

impl MatrixPresenter {
    pub fn new(value: &Value, generator: &DataTypePresentationGenerator) -> Self {
        let rows = match value {
            Value::Matrix(rows) => rows
                .iter()
                .map(|r| r.iter().map(|v| generator.presenter_for(Some(v))).collect())
                .collect(),
            _ => Vec::new(),
        };
        Self { rows }
    }
}

impl DataTypePresenter for MatrixPresenter {
    fn render(&self, env: &mut PresenterEnv<'_>) -> Rendered {
        let em = env.format.font.size;
        let cells: Vec<Vec<Rendered>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|p| p.render(env)).collect())
            .collect();

        let columns = cells.iter().map(Vec::len).max().unwrap_or(0);
        let mut col_widths = vec![0.0f64; columns];
        for r in &cells {
            for (c, cell) in r.iter().enumerate() {
                col_widths[c] = col_widths[c].max(cell.size.width);
            }
        }
        // (ascent, descent) per row.
        let row_metrics: Vec<(f64, f64)> = cells
            .iter()
            .map(|r| {
                r.iter().fold((0.0f64, 0.0f64), |(a, d), c| {
                    (a.max(c.ascent), d.max(c.size.height - c.ascent))
                })
            })
            .collect();

        let col_gap = em * MATRIX_COLUMN_GAP;
        let row_gap = em * MATRIX_ROW_GAP;
        let body_width = col_widths.iter().sum::<f64>()
            + col_gap * columns.saturating_sub(1) as f64;
        let body_height = row_metrics.iter().map(|(a, d)| a + d).sum::<f64>()
            + row_gap * cells.len().saturating_sub(1) as f64;
        let height = body_height.max(env.metrics.measure(&env.format.font, "").height());
        let bracket_width = env.metrics.measure(&env.format.font, "[").width;
        let size = Size::new(body_width + 2.0 * bracket_width, height);

        let group = env.group(size);
        let open = env.bracket('[', Size::new(bracket_width, height));
        env.scene.set_parent(open, group);
        let mut y = (height - body_height) / 2.0;
        for (r, cells_in_row) in cells.iter().enumerate() {
            let (row_ascent, row_descent) = row_metrics[r];
            let mut x = bracket_width;
            for (c, cell) in cells_in_row.iter().enumerate() {
                env.scene.set_parent(cell.item, group);
                env.scene
                    .set_position(cell.item, Point::new(x, y + row_ascent - cell.ascent));
                x += col_widths[c] + col_gap;
            }
            y += row_ascent + row_descent + row_gap;
        }
        let close = env.bracket(']', Size::new(bracket_width, height));
        env.scene.set_parent(close, group);
        env.scene
            .set_position(close, Point::new(bracket_width + body_width, 0.0));

        // Centre the matrix on the math axis of the surrounding text.
        let axis = env.metrics.measure(&env.format.font, "").ascent / 2.0;
        Rendered {
            item: group,
            size,
            ascent: (height / 2.0 + axis).min(height),
        }
    }
}

/// Layout of `Value` elements.
#[derive(Debug, Default)]
pub struct ValueLayout {
    items: Vec<ItemId>,
}

impl Placeable for ValueLayout {
    fn place(
        &mut self,
        node: NodeId,
        ctx: &mut LayoutContext<'_>,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea> {
        let value = ctx.element(node).value.as_ref();
        let format = ctx.format(node);
        let presenter = ctx.generator.presenter_for(value);
        let mut env = PresenterEnv::new(ctx.scene, ctx.metrics, &format);
        let rendered = presenter.render(&mut env);
        self.items = env.into_created();

        let area = PresentationArea::new(rendered.item, rendered.size, rendered.ascent);
        negotiate(parent, node, area.allocation());
        vec![area]
    }

    fn release(&mut self, scene: &mut Scene) {
        for item in self.items.drain(..) {
            scene.remove(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, ElementKind, NodeSpec};
    use crate::placement::RecordingNegotiator;
    use crate::style::Format;
    use crate::testing::{FixedMetrics, Fixture};

    fn texts(scene: &Scene, item: ItemId) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(ItemKind::Text { text, .. }) = scene.get(item).map(|i| &i.kind) {
            out.push(text.clone());
        }
        for child in scene.children(item) {
            out.extend(texts(scene, child));
        }
        out
    }

    fn render(value: &Value) -> (Scene, Rendered) {
        let mut scene = Scene::new();
        let format = ResolvedFormat::default();
        let generator = DataTypePresentationGenerator::default();
        let presenter = generator.presenter_for(Some(value));
        let mut env = PresenterEnv::new(&mut scene, &FixedMetrics, &format);
        let rendered = presenter.render(&mut env);
        (scene, rendered)
    }

    #[test]
    fn scalars_render_as_text() {
        assert_eq!(scalar_text(&Value::Integer(-3)), "-3");
        assert_eq!(scalar_text(&Value::Real(2.5)), "2.5");
        assert_eq!(scalar_text(&Value::Boolean(true)), "true");
        assert_eq!(scalar_text(&Value::Text("hi".into())), "\"hi\"");
    }

    #[test]
    fn tuples_are_delimited_lists() {
        let (scene, rendered) = render(&Value::Tuple(vec![Value::Integer(1), Value::Integer(2)]));
        assert_eq!(texts(&scene, rendered.item), vec!["(", "1", ", ", "2", ")"]);
    }

    #[test]
    fn matrices_get_brackets() {
        let m = Value::Matrix(vec![
            vec![Value::Integer(1), Value::Integer(0)],
            vec![Value::Integer(0), Value::Integer(1)],
        ]);
        let (scene, rendered) = render(&m);
        let children = scene.children(rendered.item);
        assert!(matches!(
            scene.get(children[0]).unwrap().kind,
            ItemKind::Bracket { glyph: '[', .. }
        ));
        assert_eq!(texts(&scene, rendered.item).len(), 4);
        assert!(rendered.size.height > 2.0 * 12.0);
    }

    #[test]
    fn missing_value_renders_unset() {
        let spec = NodeSpec::new(ElementKind::Value);
        let mut fx = Fixture::new(Document::from_specs(Format::default(), &[spec]));
        let node = fx.top_level(0);
        fx.place(node, &mut RecordingNegotiator::unbounded());
        let item = fx.presentations.get(node).unwrap().graphics_item(0);
        match &fx.scene.get(item).unwrap().kind {
            ItemKind::Text { text, color, .. } => {
                assert_eq!(text, UNSET_GLYPH);
                assert_eq!(*color, Color::GRAY);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn custom_factories_replace_builtins() {
        struct Stars;
        impl DataTypePresenter for Stars {
            fn render(&self, env: &mut PresenterEnv<'_>) -> Rendered {
                env.text("***", Color::BLACK)
            }
        }
        let mut generator = DataTypePresentationGenerator::default();
        generator.register(ValueType::Integer, |_, _| Box::new(Stars));
        let mut scene = Scene::new();
        let format = ResolvedFormat::default();
        let mut env = PresenterEnv::new(&mut scene, &FixedMetrics, &format);
        let rendered = generator
            .presenter_for(Some(&Value::Integer(7)))
            .render(&mut env);
        assert_eq!(texts(&scene, rendered.item), vec!["***"]);
    }

    #[test]
    fn relayout_deletes_previous_items() {
        let mut spec = NodeSpec::new(ElementKind::Value);
        spec.value = Some(Value::Tuple(vec![Value::Integer(1)]));
        let mut fx = Fixture::new(Document::from_specs(Format::default(), &[spec]));
        let node = fx.top_level(0);
        fx.place(node, &mut RecordingNegotiator::unbounded());
        let before = fx.scene.item_count();
        fx.place(node, &mut RecordingNegotiator::unbounded());
        assert_eq!(fx.scene.item_count(), before);
    }
}
