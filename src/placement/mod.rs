//! # Space Negotiation
//!
//! Every placeable node gets its space through the same handshake with its
//! parent:
//!
//! 1. The child computes the size it needs, bottom-up, without looking at
//!    the parent.
//! 2. It asks the parent for the next free region ([`SpaceNegotiator::request_area`]).
//!    The answer is an [`Offer`]: a size plus a [`SpaceQualifier`] saying how
//!    negotiable that size is.
//! 3. If the requirement fits, or the qualifier says the offer must be taken
//!    anyway, the child consumes it ([`SpaceNegotiator::allocate_area`]).
//!    Otherwise it rejects the offer ([`SpaceNegotiator::area_insufficient`])
//!    and the parent makes a fresh, larger one on the next request.
//!
//! Only [`SpaceQualifier::CurrentRemaining`] may be rejected. Rejecting
//! anything else is a broken contract and panics, which is what guarantees
//! the loop terminates: every parent eventually offers an always-accept
//! qualifier.
//!
//! The child side of the protocol (placing, stretching, handing out drawable
//! items) is [`crate::presentation::Placeable`].

pub mod tracker;

use serde::Serialize;

use crate::geometry::Size;
use crate::model::NodeId;
use crate::scene::ItemId;

pub use tracker::{AbortHandle, JobTracker, PlacementTracker};

/// Upper bound on request/reject rounds for a single area.
pub const MAX_NEGOTIATION_ROUNDS: usize = 32;

/// Slack allowed when comparing a requirement against an offer.
pub const FIT_TOLERANCE: f64 = 1e-6;

/// How negotiable an offered area is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpaceQualifier {
    /// Start of a page or cell: take it even if it overflows.
    MaximumAvailable,
    /// Start of a line: the width is final, the parent sorts out the height.
    MaximumWidth,
    /// Non-negotiable space, e.g. inside an equation.
    UseProvided,
    /// The rest of the current line. Rejecting it gets a fresh line.
    CurrentRemaining,
}

impl SpaceQualifier {
    /// Whether a child may answer this offer with `area_insufficient`.
    pub fn may_reject(self) -> bool {
        matches!(self, SpaceQualifier::CurrentRemaining)
    }

    /// Whether the offer starts a fresh line (or page, or cell).
    pub fn at_line_start(self) -> bool {
        matches!(
            self,
            SpaceQualifier::MaximumAvailable | SpaceQualifier::MaximumWidth
        )
    }
}

/// A region offered by a parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Offer {
    pub size: Size,
    pub qualifier: SpaceQualifier,
}

impl Offer {
    pub fn new(size: Size, qualifier: SpaceQualifier) -> Self {
        Self { size, qualifier }
    }

    /// Unbounded space that must be used as provided.
    pub fn unbounded() -> Self {
        Self::new(Size::UNBOUNDED, SpaceQualifier::UseProvided)
    }

    /// Whether a child needing `required` takes this offer.
    pub fn accepts(&self, required: Size) -> bool {
        !self.qualifier.may_reject() || required.fits_within(self.size, FIT_TOLERANCE)
    }
}

/// An area a child consumes from the most recent offer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaAllocation {
    /// The child's drawable for this area; the parent positions it.
    pub item: ItemId,
    pub size: Size,
    /// Baseline offset from the top of the area.
    pub ascent: f64,
    /// Whether the parent may later ask the child to stretch it horizontally.
    pub can_stretch: bool,
}

impl AreaAllocation {
    pub fn descent(&self) -> f64 {
        (self.size.height - self.ascent).max(0.0)
    }
}

/// The parent side of the placement protocol.
pub trait SpaceNegotiator {
    /// The next free region on the current line for `child`. Never mutates
    /// the parent.
    fn request_area(&self, child: NodeId) -> Offer;

    /// `child` consumes `area` from the last offer. The parent advances its
    /// write cursor and keeps track of the area.
    fn allocate_area(&mut self, child: NodeId, area: AreaAllocation);

    /// `child` rejects the last offer as too small for `size`. The next
    /// `request_area` must return a different offer.
    ///
    /// Implementations panic if the last offer was not rejectable.
    fn area_insufficient(&mut self, child: NodeId, size: Size);
}

/// Panics unless `qualifier` may be rejected. Negotiators call this at the
/// top of `area_insufficient`.
pub fn assert_rejectable(qualifier: Option<SpaceQualifier>, child: NodeId) {
    match qualifier {
        Some(q) if q.may_reject() => {}
        Some(q) => panic!("placement contract violated: {child:?} rejected a {q:?} offer"),
        None => panic!("placement contract violated: {child:?} rejected an area it never requested"),
    }
}

/// Run the request/allocate/reject loop for an area whose size is already
/// known. Returns the offer that was accepted.
///
/// # Panics
///
/// Panics when the parent never makes an acceptable offer within
/// [`MAX_NEGOTIATION_ROUNDS`].
pub fn negotiate(
    parent: &mut dyn SpaceNegotiator,
    child: NodeId,
    area: AreaAllocation,
) -> Offer {
    for round in 0..MAX_NEGOTIATION_ROUNDS {
        let offer = parent.request_area(child);
        if offer.accepts(area.size) {
            log::trace!(
                target: "folio::placement",
                "{child:?} took {:?} after {round} rejection(s)",
                offer.qualifier
            );
            parent.allocate_area(child, area);
            return offer;
        }
        parent.area_insufficient(child, area.size);
    }
    panic!(
        "placement contract violated: {child:?} still rejected after {MAX_NEGOTIATION_ROUNDS} offers"
    );
}

/// A negotiator that hands out a fixed offer and records what was taken.
/// Used wherever a composite places a child in isolation: operands inside an
/// expression, measurements, tests.
#[derive(Debug)]
pub struct RecordingNegotiator {
    offers: Vec<Offer>,
    next: usize,
    pub allocations: Vec<(NodeId, AreaAllocation)>,
    pub rejections: usize,
}

impl RecordingNegotiator {
    /// Offers `offers` in order; the last one repeats forever.
    pub fn new(offers: Vec<Offer>) -> Self {
        assert!(!offers.is_empty(), "a negotiator needs at least one offer");
        Self {
            offers,
            next: 0,
            allocations: Vec::new(),
            rejections: 0,
        }
    }

    /// Always offers unbounded `UseProvided` space.
    pub fn unbounded() -> Self {
        Self::new(vec![Offer::unbounded()])
    }

    fn current(&self) -> Offer {
        self.offers[self.next.min(self.offers.len() - 1)]
    }

    /// Total width and the shared ascent/descent of everything allocated.
    pub fn extent(&self) -> (f64, f64, f64) {
        self.allocations
            .iter()
            .fold((0.0, 0.0, 0.0), |(w, a, d), (_, area)| {
                (w + area.size.width, a.max(area.ascent), d.max(area.descent()))
            })
    }
}

impl SpaceNegotiator for RecordingNegotiator {
    fn request_area(&self, _child: NodeId) -> Offer {
        self.current()
    }

    fn allocate_area(&mut self, child: NodeId, area: AreaAllocation) {
        self.allocations.push((child, area));
    }

    fn area_insufficient(&mut self, child: NodeId, _size: Size) {
        assert_rejectable(Some(self.current().qualifier), child);
        self.rejections += 1;
        self.next += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Element, ElementKind};
    use crate::scene::Scene;

    fn node() -> NodeId {
        let mut doc = Document::new();
        doc.create(Element::new(ElementKind::PageBreak))
    }

    fn area(scene: &mut Scene, w: f64, h: f64) -> AreaAllocation {
        AreaAllocation {
            item: scene.create_group(),
            size: Size::new(w, h),
            ascent: h * 0.8,
            can_stretch: false,
        }
    }

    #[test]
    fn only_current_remaining_is_rejectable() {
        assert!(SpaceQualifier::CurrentRemaining.may_reject());
        for q in [
            SpaceQualifier::MaximumAvailable,
            SpaceQualifier::MaximumWidth,
            SpaceQualifier::UseProvided,
        ] {
            assert!(!q.may_reject());
            assert!(Offer::new(Size::ZERO, q).accepts(Size::new(1e6, 1e6)));
        }
    }

    #[test]
    fn negotiation_terminates_on_always_accept_offer() {
        let mut scene = Scene::new();
        let small = Size::new(10.0, 10.0);
        let mut parent = RecordingNegotiator::new(vec![
            Offer::new(small, SpaceQualifier::CurrentRemaining),
            Offer::new(small, SpaceQualifier::CurrentRemaining),
            Offer::new(small, SpaceQualifier::MaximumWidth),
        ]);
        let child = node();
        let offer = negotiate(&mut parent, child, area(&mut scene, 50.0, 20.0));
        assert_eq!(offer.qualifier, SpaceQualifier::MaximumWidth);
        assert_eq!(parent.rejections, 2);
        assert_eq!(parent.allocations.len(), 1);
    }

    #[test]
    fn fitting_requirement_takes_first_offer() {
        let mut scene = Scene::new();
        let mut parent = RecordingNegotiator::new(vec![Offer::new(
            Size::new(100.0, 100.0),
            SpaceQualifier::CurrentRemaining,
        )]);
        negotiate(&mut parent, node(), area(&mut scene, 50.0, 20.0));
        assert_eq!(parent.rejections, 0);
    }

    #[test]
    #[should_panic(expected = "rejected a MaximumAvailable offer")]
    fn rejecting_maximum_available_is_a_contract_violation() {
        let mut parent = RecordingNegotiator::new(vec![Offer::new(
            Size::new(10.0, 10.0),
            SpaceQualifier::MaximumAvailable,
        )]);
        let child = node();
        let _ = parent.request_area(child);
        parent.area_insufficient(child, Size::new(20.0, 20.0));
    }

    #[test]
    #[should_panic(expected = "still rejected")]
    fn endless_rejection_is_caught() {
        let mut scene = Scene::new();
        let mut parent = RecordingNegotiator::new(vec![Offer::new(
            Size::new(1.0, 1.0),
            SpaceQualifier::CurrentRemaining,
        )]);
        negotiate(&mut parent, node(), area(&mut scene, 50.0, 20.0));
    }

    #[test]
    fn extent_combines_allocations() {
        let mut scene = Scene::new();
        let mut parent = RecordingNegotiator::unbounded();
        let child = node();
        parent.allocate_area(
            child,
            AreaAllocation {
                item: scene.create_group(),
                size: Size::new(10.0, 12.0),
                ascent: 10.0,
                can_stretch: false,
            },
        );
        parent.allocate_area(
            child,
            AreaAllocation {
                item: scene.create_group(),
                size: Size::new(5.0, 10.0),
                ascent: 6.0,
                can_stretch: false,
            },
        );
        assert_eq!(parent.extent(), (15.0, 10.0, 4.0));
    }
}
