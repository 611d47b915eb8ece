//! Images, scaled to fit the offered width with their aspect ratio kept.
//! An image that cannot be loaded becomes a placeholder box carrying the
//! loader's message.

use crate::geometry::Size;
use crate::model::{ElementKind, NodeId};
use crate::placement::{SpaceNegotiator, FIT_TOLERANCE, MAX_NEGOTIATION_ROUNDS};
use crate::scene::{Decoration, ItemKind};
use crate::style::Severity;

use super::{LayoutContext, Placeable, PresentationArea};

/// Size of a placeholder when the element gives none.
pub const PLACEHOLDER_SIZE: Size = Size {
    width: 120.0,
    height: 90.0,
};

/// Display size for an image of `intrinsic` pixels, honouring explicit
/// dimensions. One pixel is one point.
fn display_size(intrinsic: (f64, f64), width: Option<f64>, height: Option<f64>) -> Size {
    let (iw, ih) = intrinsic;
    let aspect = if iw > 0.0 { ih / iw } else { 0.75 };
    match (width, height) {
        (Some(w), Some(h)) => Size::new(w, h),
        (Some(w), None) => Size::new(w, w * aspect),
        (None, Some(h)) if aspect > 0.0 => Size::new(h / aspect, h),
        (None, _) => Size::new(iw, ih),
    }
}

/// Shrink `size` to `max_width`, keeping the aspect ratio.
fn fit_width(size: Size, max_width: f64) -> Size {
    if size.width <= max_width + FIT_TOLERANCE || size.width <= 0.0 {
        return size;
    }
    let scale = max_width.max(0.0) / size.width;
    Size::new(size.width * scale, size.height * scale)
}

#[derive(Debug, Default)]
pub struct ImageLayout;

impl Placeable for ImageLayout {
    fn place(
        &mut self,
        node: NodeId,
        ctx: &mut LayoutContext<'_>,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea> {
        let (src, width, height) = match &ctx.element(node).kind {
            ElementKind::Image { src, width, height } => (src.as_str(), *width, *height),
            other => panic!("{node:?} is not an image: {other:?}"),
        };

        let (kind, natural, message) = match ctx.images.load(src) {
            Ok(info) => {
                let size = display_size(
                    (info.width_px as f64, info.height_px as f64),
                    width,
                    height,
                );
                (
                    ItemKind::Image {
                        width_px: info.width_px,
                        height_px: info.height_px,
                    },
                    size,
                    None,
                )
            }
            Err(e) => {
                log::warn!(target: "folio::presentation", "{node:?}: {e}");
                let message = e.to_string();
                let size = Size::new(
                    width.unwrap_or(PLACEHOLDER_SIZE.width),
                    height.unwrap_or(PLACEHOLDER_SIZE.height),
                );
                (
                    ItemKind::ImagePlaceholder {
                        message: message.clone(),
                    },
                    size,
                    Some(message),
                )
            }
        };

        let mut size = natural;
        for round in 0.. {
            assert!(
                round < MAX_NEGOTIATION_ROUNDS,
                "placement contract violated: {node:?} still rejected after {MAX_NEGOTIATION_ROUNDS} offers"
            );
            let offer = parent.request_area(node);
            if offer.qualifier.may_reject() {
                if !size.fits_within(offer.size, FIT_TOLERANCE) {
                    parent.area_insufficient(node, size);
                    continue;
                }
            } else if offer.size.width.is_finite() {
                size = fit_width(natural, offer.size.width);
            }
            break;
        }

        let item = ctx.scene.create(kind, size);
        if let Some(message) = message {
            ctx.scene.decorate(
                item,
                Some(Decoration {
                    tint: Severity::Runtime.color(),
                    tooltip: message,
                }),
            );
        }
        let area = PresentationArea::new(item, size, size.height);
        parent.allocate_area(node, area.allocation());
        vec![area]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::png_data_uri;
    use crate::model::{Document, NodeSpec};
    use crate::placement::{Offer, RecordingNegotiator, SpaceQualifier};
    use crate::style::Format;
    use crate::testing::Fixture;

    fn fixture(src: String, width: Option<f64>) -> Fixture {
        let spec = NodeSpec::new(ElementKind::Image {
            src,
            width,
            height: None,
        });
        Fixture::new(Document::from_specs(Format::default(), &[spec]))
    }

    #[test]
    fn test_display_size() {
        assert_eq!(display_size((200.0, 100.0), None, None), Size::new(200.0, 100.0));
        assert_eq!(display_size((200.0, 100.0), Some(50.0), None), Size::new(50.0, 25.0));
        assert_eq!(display_size((200.0, 100.0), None, Some(50.0)), Size::new(100.0, 50.0));
    }

    #[test]
    fn image_scales_down_to_the_offered_width() {
        let mut fx = fixture(png_data_uri(40, 20), None);
        let node = fx.top_level(0);
        let mut parent = RecordingNegotiator::new(vec![Offer::new(
            Size::new(20.0, 500.0),
            SpaceQualifier::MaximumWidth,
        )]);
        fx.place(node, &mut parent);
        assert_eq!(parent.allocations[0].1.size, Size::new(20.0, 10.0));
    }

    #[test]
    fn unloadable_image_becomes_a_placeholder() {
        let mut fx = fixture("data:image/png;base64,@@@".into(), Some(30.0));
        let node = fx.top_level(0);
        let mut parent = RecordingNegotiator::unbounded();
        fx.place(node, &mut parent);
        let item = fx.presentations.get(node).unwrap().graphics_item(0);
        let drawn = fx.scene.get(item).unwrap();
        assert!(matches!(drawn.kind, ItemKind::ImagePlaceholder { .. }));
        assert!(drawn.decoration.as_ref().unwrap().tooltip.contains("base64"));
        assert_eq!(drawn.size, Size::new(30.0, PLACEHOLDER_SIZE.height));
    }
}
