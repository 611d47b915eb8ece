//! Grid containers: children laid out row-major in a fixed number of
//! columns. Each cell is a small flow of its own, so wrapping text inside a
//! cell works the same as on a page.

use crate::geometry::{Point, Size};
use crate::model::{ElementKind, NodeId};
use crate::placement::{SpaceNegotiator, MAX_NEGOTIATION_ROUNDS};

use super::flow::{place_block, FlowBlock, FlowCursor};
use super::{LayoutContext, Placeable, PresentationArea};

#[derive(Debug, Default)]
pub struct GridLayout {
    column_widths: Vec<f64>,
    row_heights: Vec<f64>,
}

impl GridLayout {
    /// Column widths of the last placement.
    pub fn column_widths(&self) -> &[f64] {
        &self.column_widths
    }

    /// Row heights of the last placement.
    pub fn row_heights(&self) -> &[f64] {
        &self.row_heights
    }
}

/// Widths of the columns for an offered width. Columns without a fixed
/// width share what is left; with an unbounded offer they stay unbounded
/// until the cells are measured.
fn resolve_columns(columns: usize, fixed: &[f64], gap: f64, offered: f64) -> Vec<f64> {
    let mut widths: Vec<f64> = (0..columns)
        .map(|c| fixed.get(c).copied().unwrap_or(f64::INFINITY))
        .collect();
    let open = widths.iter().filter(|w| w.is_infinite()).count();
    if offered.is_finite() && open > 0 {
        let used: f64 = widths.iter().filter(|w| w.is_finite()).sum();
        let share = ((offered - used - gap * (columns - 1) as f64) / open as f64).max(0.0);
        for w in widths.iter_mut().filter(|w| w.is_infinite()) {
            *w = share;
        }
    }
    widths
}

impl Placeable for GridLayout {
    fn place(
        &mut self,
        node: NodeId,
        ctx: &mut LayoutContext<'_>,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea> {
        let (columns, fixed, gap) = match &ctx.element(node).kind {
            ElementKind::Grid {
                columns,
                column_widths,
                gap,
            } => ((*columns).max(1), column_widths.as_slice(), (*gap).max(0.0)),
            other => panic!("{node:?} is not a grid: {other:?}"),
        };

        // A grid always starts on a line of its own.
        let mut offer = parent.request_area(node);
        let mut rounds = 0;
        while offer.qualifier.may_reject() {
            rounds += 1;
            assert!(
                rounds <= MAX_NEGOTIATION_ROUNDS,
                "placement contract violated: {node:?} still rejected after {MAX_NEGOTIATION_ROUNDS} offers"
            );
            parent.area_insufficient(node, offer.size);
            offer = parent.request_area(node);
        }

        let mut widths = resolve_columns(columns, fixed, gap, offer.size.width);
        let cells = ctx.document.children(node);
        let mut blocks: Vec<FlowBlock> = cells
            .iter()
            .enumerate()
            .map(|(i, &child)| {
                let mut cursor = FlowCursor::new(widths[i % columns], f64::INFINITY);
                ctx.place_child(child, &mut cursor);
                cursor.finish()
            })
            .collect();

        for (c, width) in widths.iter_mut().enumerate() {
            if width.is_infinite() {
                *width = blocks
                    .iter()
                    .skip(c)
                    .step_by(columns)
                    .map(|b| b.width)
                    .fold(0.0, f64::max);
            }
        }
        let rows = blocks.len().div_ceil(columns);
        let heights: Vec<f64> = (0..rows)
            .map(|r| {
                blocks
                    .iter()
                    .skip(r * columns)
                    .take(columns)
                    .map(|b| b.height)
                    .fold(0.0, f64::max)
            })
            .collect();

        let size = Size::new(
            widths.iter().sum::<f64>() + gap * (columns - 1) as f64,
            heights.iter().sum::<f64>() + gap * rows.saturating_sub(1) as f64,
        );
        let group = ctx.scene.create_group();
        ctx.scene.set_size(group, size);

        let mut y = 0.0;
        for (r, height) in heights.iter().enumerate() {
            let mut x = 0.0;
            for (c, width) in widths.iter().enumerate() {
                if let Some(block) = blocks.get_mut(r * columns + c) {
                    place_block(ctx, block, group, Point::new(x, y), *width);
                }
                x += width + gap;
            }
            y += height + gap;
        }

        self.column_widths = widths;
        self.row_heights = heights;

        let area = PresentationArea::new(group, size, size.height);
        parent.allocate_area(node, area.allocation());
        vec![area]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, NodeSpec};
    use crate::placement::{Offer, RecordingNegotiator, SpaceQualifier};
    use crate::style::Format;
    use crate::testing::Fixture;

    fn grid(columns: usize, column_widths: Vec<f64>, gap: f64, cells: &[&str]) -> Fixture {
        let mut spec = NodeSpec::new(ElementKind::Grid {
            columns,
            column_widths,
            gap,
        });
        spec.children = cells
            .iter()
            .map(|t| NodeSpec::new(ElementKind::Literal { text: t.to_string() }))
            .collect();
        Fixture::new(Document::from_specs(Format::default(), &[spec]))
    }

    #[test]
    fn test_resolve_columns() {
        assert_eq!(resolve_columns(2, &[30.0], 0.0, 100.0), vec![30.0, 70.0]);
        assert_eq!(resolve_columns(3, &[], 5.0, 100.0), vec![30.0, 30.0, 30.0]);
        assert!(resolve_columns(2, &[], 0.0, f64::INFINITY)[0].is_infinite());
    }

    #[test]
    fn unbounded_grid_uses_natural_widths() {
        let mut fx = grid(2, vec![], 2.0, &["a", "bb", "ccc"]);
        let node = fx.top_level(0);
        let mut parent = RecordingNegotiator::unbounded();
        fx.place(node, &mut parent);
        assert_eq!(parent.allocations[0].1.size, Size::new(32.0, 26.0));

        let third = fx.document.child(node, 2);
        let item = fx.presentations.get(third).unwrap().graphics_item(0);
        assert_eq!(fx.scene.position(item), Point::new(0.0, 14.0));
        let second = fx.document.child(node, 1);
        let item = fx.presentations.get(second).unwrap().graphics_item(0);
        assert_eq!(fx.scene.position(item), Point::new(20.0, 0.0));
    }

    #[test]
    fn open_columns_share_the_offered_width() {
        let mut fx = grid(2, vec![30.0], 0.0, &["a", "b"]);
        let node = fx.top_level(0);
        let mut parent = RecordingNegotiator::new(vec![Offer::new(
            Size::new(100.0, f64::INFINITY),
            SpaceQualifier::MaximumWidth,
        )]);
        fx.place(node, &mut parent);
        assert_eq!(parent.allocations[0].1.size.width, 100.0);
        match fx.presentations.get(node).unwrap().kind() {
            crate::presentation::PresentationKind::GridChildren(layout) => {
                assert_eq!(layout.column_widths(), &[30.0, 70.0]);
                assert_eq!(layout.row_heights(), &[12.0]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn grid_turns_down_the_rest_of_a_line() {
        let mut fx = grid(1, vec![], 0.0, &["a"]);
        let node = fx.top_level(0);
        let mut parent = RecordingNegotiator::new(vec![
            Offer::new(Size::new(500.0, 500.0), SpaceQualifier::CurrentRemaining),
            Offer::new(Size::new(500.0, 500.0), SpaceQualifier::MaximumWidth),
        ]);
        fx.place(node, &mut parent);
        assert_eq!(parent.rejections, 1);
    }
}
