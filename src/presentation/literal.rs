//! Literal tokens: numbers, names, anything typed verbatim.

use crate::geometry::Size;
use crate::model::{ElementKind, NodeId};
use crate::placement::{negotiate, SpaceNegotiator};
use crate::style::Color;

use super::{script_font, text_item, LayoutContext, Placeable, PresentationArea};

/// Drawn in place of content that has not been filled in.
pub const UNSET_GLYPH: &str = "\u{25A1}";

#[derive(Debug, Default)]
pub struct LiteralLayout;

impl Placeable for LiteralLayout {
    fn place(
        &mut self,
        node: NodeId,
        ctx: &mut LayoutContext<'_>,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea> {
        let text = match &ctx.element(node).kind {
            ElementKind::Literal { text } => text.as_str(),
            other => panic!("{node:?} is not a literal: {other:?}"),
        };
        let format = ctx.format(node);
        let (font, rise) = script_font(&format, ctx.metrics);
        let (text, color) = if text.is_empty() {
            (UNSET_GLYPH, Color::GRAY)
        } else {
            (text, format.color)
        };

        let m = ctx.metrics.measure(&font, text);
        let ascent = m.ascent + rise;
        let descent = (m.descent - rise).max(0.0);
        let item = text_item(ctx.scene, text, &font, color, Size::new(m.width, m.height()));
        let area = PresentationArea::new(item, Size::new(m.width, ascent + descent), ascent);
        negotiate(parent, node, area.allocation());
        vec![area]
    }
}
