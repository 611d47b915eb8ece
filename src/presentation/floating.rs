//! Frames: children float at explicit positions inside a box. Each child
//! flows on its own from its position, so frames can overlap content.

use crate::geometry::{Point, Size};
use crate::model::{ElementKind, NodeId};
use crate::placement::{negotiate, SpaceNegotiator};

use super::flow::{place_block, FlowCursor};
use super::{LayoutContext, Placeable, PresentationArea};

#[derive(Debug, Default)]
pub struct FrameLayout;

impl Placeable for FrameLayout {
    fn place(
        &mut self,
        node: NodeId,
        ctx: &mut LayoutContext<'_>,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea> {
        let (width, height) = match &ctx.element(node).kind {
            ElementKind::Frame { width, height } => (*width, *height),
            other => panic!("{node:?} is not a frame: {other:?}"),
        };

        let group = ctx.scene.create_group();
        let mut extent = Size::ZERO;
        for child in ctx.document.children(node) {
            let at = ctx.element(child).position.unwrap_or_default();
            let available = width.map_or(f64::INFINITY, |w| (w - at.x).max(0.0));
            let mut cursor = FlowCursor::new(available, f64::INFINITY);
            ctx.place_child(child, &mut cursor);
            let mut block = cursor.finish();
            let flow_width = if available.is_finite() { available } else { block.width };
            place_block(ctx, &mut block, group, at, flow_width);
            extent.width = extent.width.max(at.x + block.width);
            extent.height = extent.height.max(at.y + block.height);
        }

        let size = Size::new(
            width.unwrap_or(extent.width),
            height.unwrap_or(extent.height),
        );
        ctx.scene.set_size(group, size);
        let area = PresentationArea::new(group, size, size.height);
        negotiate(parent, node, area.allocation());
        vec![area]
    }
}
