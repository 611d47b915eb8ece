//! # Operator Layout
//!
//! Math operators arrange their operands and glyphs on one line:
//!
//! ```text
//! [left paren] operand₀ [glyph] [operand₁ [glyph] operand₂] [right paren]
//! ```
//!
//! Operands are placed in isolation against an unbounded `UseProvided`
//! negotiator, then every operand and glyph shares a single baseline at the
//! tallest ascent. The operator reports one area (a group holding all of it)
//! to its own parent.
//!
//! Operand placements are cached; [`Placeable::invalidate_child`] drops the
//! cache of a single operand so editing one term of a long sum only
//! re-measures that term.

use std::collections::HashSet;

use crate::font::GlyphMetrics;
use crate::geometry::{Point, Size};
use crate::model::{ElementKind, NodeId, OperatorForm};
use crate::placement::{negotiate, RecordingNegotiator, SpaceNegotiator};
use crate::scene::{ItemId, ItemKind, Scene};
use crate::style::{FontSpec, ParenthesisStyle, ResolvedFormat};

use super::area::run_extent;
use super::{
    text_item, LayoutContext, Placeable, PresentationArea, SCRIPT_SIZE_FACTOR, SUPERSCRIPT_RISE,
};

/// Parentheses taller than this many natural line heights are drawn as
/// vector brackets instead of scaled glyphs.
pub const PAREN_GLYPH_TOLERANCE: f64 = 1.2;
/// Weight adjustment of superscript operator glyphs.
pub const SCRIPT_WEIGHT_DELTA: i32 = -100;
/// Font size factor of large operators (Σ, Π, ∫).
pub const LARGE_OPERATOR_SCALE: f64 = 1.6;
/// Weight adjustment of large operator glyphs.
pub const LARGE_OPERATOR_WEIGHT_DELTA: i32 = 100;
/// Baseline drop of large operator glyphs, as a fraction of the base line
/// height.
pub const LARGE_OPERATOR_DROP: f64 = 0.15;
/// Space on each side of binary and trinary glyphs, in ems.
pub const OPERATOR_SPACING: f64 = 0.2;

/// What occupies a horizontal slot of the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Paren,
    Glyph,
    Operand(NodeId),
}

/// Geometry of one slot, relative to the operator's group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub kind: SlotKind,
    pub x: f64,
    pub top: f64,
    pub width: f64,
    pub ascent: f64,
    pub descent: f64,
}

/// Result of the last placement, kept for inspection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorGeometry {
    pub width: f64,
    pub ascent: f64,
    pub descent: f64,
    pub slots: Vec<Slot>,
}

impl OperatorGeometry {
    pub fn height(&self) -> f64 {
        self.ascent + self.descent
    }
}

#[derive(Debug)]
enum Piece {
    Operand {
        node: NodeId,
        areas: Vec<PresentationArea>,
        width: f64,
        ascent: f64,
        descent: f64,
    },
    Glyph {
        text: String,
        font: FontSpec,
        /// Side bearing added on both sides.
        pad: f64,
        width: f64,
        /// Glyph ascent plus baseline rise.
        ascent: f64,
        /// Glyph descent minus baseline rise; may be negative for raised
        /// glyphs.
        descent: f64,
        height: f64,
    },
}

impl Piece {
    fn width(&self) -> f64 {
        match self {
            Piece::Operand { width, .. } => *width,
            Piece::Glyph { width, .. } => *width,
        }
    }

    fn ascent(&self) -> f64 {
        match self {
            Piece::Operand { ascent, .. } | Piece::Glyph { ascent, .. } => *ascent,
        }
    }

    fn descent(&self) -> f64 {
        match self {
            Piece::Operand { descent, .. } | Piece::Glyph { descent, .. } => *descent,
        }
    }
}

fn glyph(metrics: &dyn GlyphMetrics, text: &str, font: FontSpec, rise: f64, pad: f64) -> Piece {
    let m = metrics.measure(&font, text);
    Piece::Glyph {
        text: text.to_string(),
        font,
        pad,
        width: m.width + 2.0 * pad,
        ascent: m.ascent + rise,
        descent: m.descent - rise,
        height: m.height(),
    }
}

/// Layout of all operator forms.
#[derive(Debug, Default)]
pub struct OperatorLayout {
    clean: HashSet<NodeId>,
    items: Vec<ItemId>,
    geometry: Option<OperatorGeometry>,
}

impl OperatorLayout {
    pub fn geometry(&self) -> Option<&OperatorGeometry> {
        self.geometry.as_ref()
    }

    /// Place (or reuse) each operand and measure it as one run.
    fn measure_operands(&mut self, ctx: &mut LayoutContext<'_>, operands: &[NodeId]) -> Vec<Piece> {
        operands
            .iter()
            .map(|&child| {
                let cached = !ctx.remeasure && self.clean.contains(&child) && ctx.is_placed(child);
                let areas = if cached {
                    ctx.areas_of(child)
                } else {
                    let mut cursor = RecordingNegotiator::unbounded();
                    let areas = ctx.place_child(child, &mut cursor);
                    self.clean.insert(child);
                    areas
                };
                let (width, ascent, descent) = run_extent(&areas);
                Piece::Operand {
                    node: child,
                    areas,
                    width,
                    ascent,
                    descent,
                }
            })
            .collect()
    }

    /// Arrange operands and glyphs in reading order.
    fn sequence(
        operands: Vec<Piece>,
        form: OperatorForm,
        glyph_text: &str,
        second_glyph: Option<&str>,
        format: &ResolvedFormat,
        metrics: &dyn GlyphMetrics,
    ) -> Vec<Piece> {
        let base = format.font.clone();
        let line = metrics.measure(&base, "").line_height;
        let spacing = base.size * OPERATOR_SPACING;
        let mut pieces = Vec::with_capacity(operands.len() * 2 + 1);
        match form {
            OperatorForm::Prefix => {
                pieces.push(glyph(metrics, glyph_text, base, 0.0, 0.0));
                pieces.extend(operands);
            }
            OperatorForm::Large => {
                let font = base.adjusted(LARGE_OPERATOR_SCALE, LARGE_OPERATOR_WEIGHT_DELTA);
                let drop = line * LARGE_OPERATOR_DROP;
                pieces.push(glyph(metrics, glyph_text, font, -drop, spacing));
                pieces.extend(operands);
            }
            OperatorForm::Postfix => {
                pieces.extend(operands);
                pieces.push(glyph(metrics, glyph_text, base, 0.0, 0.0));
            }
            OperatorForm::Superscript => {
                let font = base.adjusted(SCRIPT_SIZE_FACTOR, SCRIPT_WEIGHT_DELTA);
                pieces.extend(operands);
                pieces.push(glyph(metrics, glyph_text, font, line * SUPERSCRIPT_RISE, 0.0));
            }
            OperatorForm::Binary | OperatorForm::Trinary => {
                for (i, operand) in operands.into_iter().enumerate() {
                    if i > 0 {
                        let text = match (form, i) {
                            (OperatorForm::Trinary, i) if i > 1 => {
                                second_glyph.unwrap_or(glyph_text)
                            }
                            _ => glyph_text,
                        };
                        pieces.push(glyph(metrics, text, base.clone(), 0.0, spacing));
                    }
                    pieces.push(operand);
                }
            }
            OperatorForm::Grouping => pieces.extend(operands),
        }
        pieces
    }

    /// Parenthesis item for the full operator height: a vertically scaled
    /// glyph while the height is close to the natural line height, a vector
    /// bracket beyond that.
    fn parenthesis(
        scene: &mut Scene,
        metrics: &dyn GlyphMetrics,
        ch: char,
        format: &ResolvedFormat,
        height: f64,
    ) -> (ItemId, f64) {
        let mut buf = [0u8; 4];
        let text = ch.encode_utf8(&mut buf);
        let m = metrics.measure(&format.font, text);
        let size = Size::new(m.width, height);
        let item = if height <= m.line_height * PAREN_GLYPH_TOLERANCE {
            scene.create(
                ItemKind::Text {
                    text: text.to_string(),
                    font: format.font.clone(),
                    color: format.color,
                    letter_spacing: 0.0,
                    vertical_scale: if m.height() > 0.0 { height / m.height() } else { 1.0 },
                },
                size,
            )
        } else {
            scene.create(
                ItemKind::Bracket {
                    glyph: ch,
                    color: format.color,
                },
                size,
            )
        };
        (item, m.width)
    }
}

impl Placeable for OperatorLayout {
    fn place(
        &mut self,
        node: NodeId,
        ctx: &mut LayoutContext<'_>,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea> {
        let element = ctx.element(node);
        let ElementKind::Operator {
            form,
            glyph: glyph_text,
            second_glyph,
        } = &element.kind
        else {
            panic!("{node:?} is not an operator");
        };
        let format = ctx.format(node);
        let operands = ctx.document.children(node);
        assert!(
            !operands.is_empty(),
            "operator {node:?} ({form:?}) has no operands"
        );
        self.clean.retain(|c| operands.contains(c));

        let measured = self.measure_operands(ctx, &operands);
        let pieces = Self::sequence(
            measured,
            *form,
            glyph_text,
            second_glyph.as_deref(),
            &format,
            ctx.metrics,
        );

        let ascent = pieces.iter().map(Piece::ascent).fold(0.0, f64::max);
        let descent = pieces.iter().map(|p| p.descent().max(0.0)).fold(0.0, f64::max);
        let height = ascent + descent;

        let parens = format
            .parenthesis
            .or((*form == OperatorForm::Grouping).then_some(ParenthesisStyle::Parentheses))
            .and_then(|style| style.glyphs());

        let group = ctx.scene.create_group();
        let mut slots = Vec::with_capacity(pieces.len() + 2);
        let mut x = 0.0;

        if let Some((open, _)) = parens {
            let (item, slot) = place_paren(ctx, open, &format, group, x, ascent, descent);
            x += slot.width;
            slots.push(slot);
            self.items.push(item);
        }

        for piece in &pieces {
            let top = ascent - piece.ascent();
            match piece {
                Piece::Operand { node: child, areas, .. } => {
                    let mut run_x = x;
                    for area in areas {
                        ctx.scene.set_parent(area.item, group);
                        ctx.scene
                            .set_position(area.item, Point::new(run_x, ascent - area.ascent));
                        run_x += area.size.width;
                    }
                    slots.push(Slot {
                        kind: SlotKind::Operand(*child),
                        x,
                        top,
                        width: piece.width(),
                        ascent: piece.ascent(),
                        descent: piece.descent(),
                    });
                }
                Piece::Glyph {
                    text,
                    font,
                    pad,
                    width,
                    height: glyph_height,
                    ..
                } => {
                    let item = text_item(
                        ctx.scene,
                        text,
                        font,
                        format.color,
                        Size::new(width - 2.0 * pad, *glyph_height),
                    );
                    ctx.scene.set_parent(item, group);
                    ctx.scene.set_position(item, Point::new(x + pad, top));
                    self.items.push(item);
                    slots.push(Slot {
                        kind: SlotKind::Glyph,
                        x,
                        top,
                        width: *width,
                        ascent: piece.ascent(),
                        descent: piece.descent(),
                    });
                }
            }
            x += piece.width();
        }

        if let Some((_, close)) = parens {
            let (item, slot) = place_paren(ctx, close, &format, group, x, ascent, descent);
            x += slot.width;
            slots.push(slot);
            self.items.push(item);
        }

        let size = Size::new(x, height);
        ctx.scene.set_size(group, size);
        self.geometry = Some(OperatorGeometry {
            width: x,
            ascent,
            descent,
            slots,
        });

        let area = PresentationArea::new(group, size, ascent);
        negotiate(parent, node, area.allocation());
        vec![area]
    }

    fn release(&mut self, scene: &mut Scene) {
        for item in self.items.drain(..) {
            scene.remove(item);
        }
    }

    fn invalidate_child(&mut self, child: NodeId) {
        self.clean.remove(&child);
    }
}

fn place_paren(
    ctx: &mut LayoutContext<'_>,
    ch: char,
    format: &ResolvedFormat,
    group: ItemId,
    x: f64,
    ascent: f64,
    descent: f64,
) -> (ItemId, Slot) {
    let (item, width) =
        OperatorLayout::parenthesis(ctx.scene, ctx.metrics, ch, format, ascent + descent);
    ctx.scene.set_parent(item, group);
    ctx.scene.set_position(item, Point::new(x, 0.0));
    let slot = Slot {
        kind: SlotKind::Paren,
        x,
        top: 0.0,
        width,
        ascent,
        descent,
    };
    (item, slot)
}
