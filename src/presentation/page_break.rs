//! Explicit page breaks.
//!
//! A page break consumes whatever height the parent still offers, so the
//! next block starts on a fresh page.

use crate::geometry::Size;
use crate::model::NodeId;
use crate::placement::SpaceNegotiator;

use super::{LayoutContext, Placeable, PresentationArea, ReflowHint};

#[derive(Debug, Default)]
pub struct PageBreakLayout;

impl Placeable for PageBreakLayout {
    fn place(
        &mut self,
        node: NodeId,
        ctx: &mut LayoutContext<'_>,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea> {
        let offer = parent.request_area(node);
        let height = if offer.size.height.is_finite() {
            offer.size.height.max(0.0)
        } else {
            0.0
        };
        let size = Size::new(0.0, height);
        let item = ctx.scene.create_group();
        ctx.scene.set_size(item, size);
        let area = PresentationArea::new(item, size, 0.0);
        parent.allocate_area(node, area.allocation());
        vec![area]
    }

    fn reflow_hint(&self) -> ReflowHint {
        ReflowHint::AlwaysReflow
    }
}
