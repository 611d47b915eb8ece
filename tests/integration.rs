//! Integration tests for the Folio layout pipeline.
//!
//! These tests drive the public API the way a host editor would. They verify:
//! - The negotiation loop terminates and enforces its contract
//! - Expressions share one baseline
//! - Blocks fill pages in order with no gaps or overlaps
//! - A second pass over an unchanged document changes nothing
//! - Aborted passes resume to the same layout as uninterrupted ones
//! - Wrapped text reassembles to its source
//! - Edits only lay out what they touched

use std::time::Duration;

use folio::font::{GlyphMetrics, TextMetrics};
use folio::geometry::Size;
use folio::model::{Document, Element, ElementKind, NodeId, NodeSpec, OperatorForm};
use folio::pagination::{ChildDecision, EventPump, LayoutSession, PassOutcome, PAGE_GAP};
use folio::paper::{PageFormat, PaperFormats};
use folio::placement::{
    negotiate, AbortHandle, AreaAllocation, Offer, RecordingNegotiator, SpaceNegotiator,
    SpaceQualifier,
};
use folio::presentation::{Leaf, PresentationKind};
use folio::scene::Scene;
use folio::style::{FontSpec, Format};
use folio::LayoutEngine;

// ─── Helpers ────────────────────────────────────────────────────

/// Half an em per character; a few glyphs get exact boxes.
struct Metrics;

impl GlyphMetrics for Metrics {
    fn measure(&self, font: &FontSpec, text: &str) -> TextMetrics {
        let (width, ascent, descent) = match text {
            "a" => (10.0, 10.0, 2.0),
            "b" => (10.0, 6.0, 4.0),
            "+" => (8.0, 8.0, 3.0),
            _ => (
                text.chars().count() as f64 * font.size * 0.5,
                font.size * 0.8,
                font.size * 0.2,
            ),
        };
        TextMetrics {
            width,
            ascent,
            descent,
            line_height: ascent + descent,
        }
    }
}

fn literal(text: &str) -> NodeSpec {
    NodeSpec::new(ElementKind::Literal {
        text: text.to_string(),
    })
}

fn block(height: f64) -> NodeSpec {
    NodeSpec::new(ElementKind::Frame {
        width: Some(50.0),
        height: Some(height),
    })
}

fn text(content: &str) -> NodeSpec {
    NodeSpec::new(ElementKind::Text {
        content: content.to_string(),
    })
}

fn engine_for(document: &mut Document, width: f64, height: f64, session: LayoutSession) -> LayoutEngine {
    let formats = PaperFormats::uniform(PageFormat::borderless(width, height));
    let mut engine = LayoutEngine::new(session, formats);
    engine.attach(document);
    engine
}

fn placements(engine: &LayoutEngine) -> Vec<(usize, f64, usize, f64)> {
    engine
        .report()
        .children
        .iter()
        .map(|c| (c.page, c.y, c.bottom_page, c.bottom_y))
        .collect()
}

fn child(document: &Document, index: usize) -> NodeId {
    document.child(document.root(), index)
}

/// Requests an abort on the `at`-th poll.
struct AbortOn {
    handle: AbortHandle,
    polls: usize,
    at: usize,
}

impl EventPump for AbortOn {
    fn poll(&mut self, _budget: Duration) {
        self.polls += 1;
        if self.polls == self.at {
            self.handle.request();
        }
    }
}

// ─── Negotiation ────────────────────────────────────────────────

#[test]
fn test_negotiation_takes_the_first_fitting_offer() {
    let mut doc = Document::new();
    let node = doc.create(Element::new(ElementKind::PageBreak));
    let mut scene = Scene::new();
    let area = AreaAllocation {
        item: scene.create_group(),
        size: Size::new(40.0, 10.0),
        ascent: 8.0,
        can_stretch: false,
    };
    let mut parent = RecordingNegotiator::new(vec![
        Offer::new(Size::new(10.0, 10.0), SpaceQualifier::CurrentRemaining),
        Offer::new(Size::new(20.0, 10.0), SpaceQualifier::CurrentRemaining),
        Offer::new(Size::new(30.0, 10.0), SpaceQualifier::MaximumWidth),
    ]);
    let offer = negotiate(&mut parent, node, area);
    assert_eq!(offer.qualifier, SpaceQualifier::MaximumWidth);
    assert_eq!(parent.rejections, 2);
    assert_eq!(parent.allocations.len(), 1);
}

#[test]
#[should_panic(expected = "placement contract violated")]
fn test_rejecting_a_page_top_offer_panics() {
    let mut doc = Document::new();
    let node = doc.create(Element::new(ElementKind::PageBreak));
    let mut parent = RecordingNegotiator::new(vec![Offer::new(
        Size::new(10.0, 10.0),
        SpaceQualifier::MaximumAvailable,
    )]);
    parent.area_insufficient(node, Size::new(20.0, 10.0));
}

// ─── Expressions ────────────────────────────────────────────────

#[test]
fn test_binary_operator_shares_one_baseline() {
    let mut op = NodeSpec::new(ElementKind::Operator {
        form: OperatorForm::Binary,
        glyph: "+".into(),
        second_glyph: None,
    });
    op.children = vec![literal("a"), literal("b")];
    let mut doc = Document::from_specs(Format::default(), &[op]);
    let mut engine = engine_for(&mut doc, 300.0, 100.0, LayoutSession::default());
    engine.paginate(&doc, &Metrics);

    let op = child(&doc, 0);
    let geometry = match engine.presentations().get(op).unwrap().kind() {
        PresentationKind::FixedChildren(layout) => layout.geometry().unwrap().clone(),
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(geometry.ascent, 10.0);
    assert_eq!(geometry.descent, 4.0);
    assert_eq!(engine.locations()[0].height, 14.0);

    let b = doc.child(op, 1);
    let item = engine.presentations().get(b).unwrap().graphics_item(0);
    assert_eq!(engine.scene().position(item).y, 4.0);
}

// ─── Pagination ─────────────────────────────────────────────────

#[test]
fn test_blocks_fill_pages_in_order() {
    let mut doc = Document::from_specs(
        Format::default(),
        &[block(100.0), block(500.0), block(100.0)],
    );
    let mut engine = engine_for(&mut doc, 200.0, 600.0, LayoutSession::default());
    let outcome = engine.paginate(&doc, &Metrics);
    assert_eq!(outcome, PassOutcome::Completed { page_count: 2 });

    let pages: Vec<usize> = engine.locations().iter().map(|l| l.content_top.page).collect();
    assert_eq!(pages, vec![0, 0, 1]);
    assert_eq!(engine.pagination().verify_continuity(1e-3), Ok(()));

    let report = engine.report();
    assert_eq!(report.pages[1].y, 600.0 + PAGE_GAP);
}

#[test]
fn test_page_break_starts_a_new_page() {
    let mut doc = Document::from_specs(
        Format::default(),
        &[literal("x"), NodeSpec::new(ElementKind::PageBreak), literal("y")],
    );
    let mut engine = engine_for(&mut doc, 200.0, 100.0, LayoutSession::default());
    engine.paginate(&doc, &Metrics);
    assert_eq!(engine.pages().len(), 2);
    assert_eq!(engine.locations()[2].content_top.page, 1);
    assert_eq!(engine.locations()[2].content_top.y, 0.0);
}

#[test]
fn test_unchanged_document_is_skipped() {
    let mut doc = Document::from_specs(
        Format::default(),
        &[block(100.0), text("some words that wrap"), block(80.0)],
    );
    let mut engine = engine_for(&mut doc, 120.0, 200.0, LayoutSession::default());
    engine.paginate(&doc, &Metrics);
    let before = placements(&engine);

    assert_eq!(engine.paginate(&doc, &Metrics), PassOutcome::Idle);
    engine.revalidate();
    engine.paginate(&doc, &Metrics);
    assert!(engine
        .pagination()
        .decisions()
        .iter()
        .all(|(_, d)| *d == ChildDecision::Skip));
    assert_eq!(placements(&engine), before);
}

// ─── Abort and Resume ───────────────────────────────────────────

#[test]
fn test_restarted_pass_matches_uninterrupted_layout() {
    let specs: Vec<NodeSpec> = (0..6).map(|i| block(60.0 + 10.0 * i as f64)).collect();

    let mut plain_doc = Document::from_specs(Format::default(), &specs);
    let mut plain = engine_for(&mut plain_doc, 200.0, 250.0, LayoutSession::default());
    plain.paginate(&plain_doc, &Metrics);

    let session = LayoutSession::default().with_yield_interval(Duration::ZERO);
    let mut doc = Document::from_specs(Format::default(), &specs);
    let mut interrupted = engine_for(&mut doc, 200.0, 250.0, session);
    let mut pump = AbortOn {
        handle: interrupted.abort_handle(),
        polls: 0,
        at: 3,
    };
    let outcome = interrupted.paginate_with(&doc, &Metrics, &mut pump);
    assert!(matches!(outcome, PassOutcome::Completed { .. }));
    assert!(interrupted
        .take_notifications()
        .iter()
        .any(|e| matches!(e, folio::events::LayoutEvent::PlacementRestarted { .. })));

    assert_eq!(placements(&interrupted), placements(&plain));
    assert_eq!(interrupted.pages().len(), plain.pages().len());
}

#[test]
fn test_abort_without_restarts_resumes_on_the_next_call() {
    let specs: Vec<NodeSpec> = (0..4).map(|_| block(100.0)).collect();

    let mut plain_doc = Document::from_specs(Format::default(), &specs);
    let mut plain = engine_for(&mut plain_doc, 200.0, 250.0, LayoutSession::default());
    plain.paginate(&plain_doc, &Metrics);

    let session = LayoutSession::default()
        .with_yield_interval(Duration::ZERO)
        .with_max_restarts(0);
    let mut doc = Document::from_specs(Format::default(), &specs);
    let mut engine = engine_for(&mut doc, 200.0, 250.0, session);
    let mut pump = AbortOn {
        handle: engine.abort_handle(),
        polls: 0,
        at: 2,
    };
    let outcome = engine.paginate_with(&doc, &Metrics, &mut pump);
    assert_eq!(outcome, PassOutcome::Aborted { after_child: 1 });
    assert_eq!(engine.pagination().dirty_window(), Some((0, 3)));
    assert!(!engine.monitor().state().is_settled());

    let outcome = engine.paginate(&doc, &Metrics);
    assert!(matches!(outcome, PassOutcome::Completed { .. }));
    assert!(engine.monitor().state().is_settled());
    assert_eq!(placements(&engine), placements(&plain));
}

// ─── Text ───────────────────────────────────────────────────────

#[test]
fn test_wrapped_text_reassembles_to_its_source() {
    let source = "Every line of this paragraph is broken at a space  and nothing is lost.";
    let mut doc = Document::from_specs(Format::default(), &[text(source)]);
    let mut engine = engine_for(&mut doc, 90.0, 400.0, LayoutSession::default().with_justify(true));
    engine.paginate(&doc, &Metrics);

    let node = child(&doc, 0);
    let segments = match engine.presentations().get(node).unwrap().kind() {
        PresentationKind::Leaf(Leaf::Text(flow)) => flow.segments().to_vec(),
        other => panic!("unexpected {other:?}"),
    };
    assert!(segments.len() > 1);
    let mut rebuilt = String::new();
    for s in &segments {
        rebuilt.extend(s.elided_before);
        rebuilt.push_str(&s.text);
        rebuilt.extend(s.elided_after);
    }
    assert_eq!(rebuilt, source);
}

// ─── Edits ──────────────────────────────────────────────────────

#[test]
fn test_insertion_moves_the_blocks_below() {
    let mut doc = Document::from_specs(Format::default(), &[block(100.0), block(100.0)]);
    let mut engine = engine_for(&mut doc, 200.0, 600.0, LayoutSession::default());
    engine.paginate(&doc, &Metrics);
    let jobs = engine.jobs_run();

    let inserted = doc.create_subtree(&block(50.0));
    let root = doc.root();
    doc.insert(root, 0, inserted);
    engine.paginate(&doc, &Metrics);

    assert_eq!(
        engine.pagination().decisions(),
        &[
            (0, ChildDecision::Recompute),
            (1, ChildDecision::Move),
            (2, ChildDecision::Move),
        ]
    );
    assert_eq!(engine.locations()[2].content_top.y, 150.0);
    assert!(engine.jobs_run() > jobs);
}

#[test]
fn test_text_edit_relays_only_its_block() {
    let mut doc = Document::from_specs(
        Format::default(),
        &[literal("a"), text("short"), block(40.0)],
    );
    let mut engine = engine_for(&mut doc, 200.0, 600.0, LayoutSession::default());
    engine.paginate(&doc, &Metrics);

    let t = child(&doc, 1);
    doc.set_text(t, "a little longer");
    engine.paginate(&doc, &Metrics);

    let decisions = engine.pagination().decisions();
    assert_eq!(decisions[0], (1, ChildDecision::Recompute));
    assert_eq!(decisions[1], (2, ChildDecision::Skip));
    assert_eq!(engine.pagination().verify_continuity(1e-3), Ok(()));
}

#[test]
fn test_removing_a_node_inside_an_expression() {
    let mut op = NodeSpec::new(ElementKind::Operator {
        form: OperatorForm::Binary,
        glyph: "+".into(),
        second_glyph: None,
    });
    op.children = vec![literal("a"), literal("b"), literal("a")];
    let mut doc = Document::from_specs(Format::default(), &[op, block(30.0)]);
    let mut engine = engine_for(&mut doc, 300.0, 200.0, LayoutSession::default());
    engine.paginate(&doc, &Metrics);

    let op = child(&doc, 0);
    let last = doc.child(op, 2);
    doc.remove(last);
    engine.paginate(&doc, &Metrics);

    assert!(!engine.presentations().contains(last));
    assert_eq!(engine.pagination().decisions()[0], (0, ChildDecision::Recompute));
    assert_eq!(engine.pagination().verify_continuity(1e-3), Ok(()));
}

// ─── JSON ───────────────────────────────────────────────────────

#[test]
fn test_layout_json_end_to_end() {
    let json = r#"{
        "pages": { "default": { "size": { "Custom": { "width": 200, "height": 120 } }, "margin": { "top": 10, "right": 10, "bottom": 10, "left": 10 } } },
        "children": [
            { "kind": { "type": "Text", "content": "hello world" } },
            { "kind": { "type": "Value" }, "value": { "type": "Tuple", "value": [ { "type": "Integer", "value": 1 }, { "type": "Integer", "value": 2 } ] } },
            { "kind": { "type": "PageBreak" } },
            { "kind": { "type": "Literal", "text": "x" } }
        ]
    }"#;
    let report = folio::layout_json(json).unwrap();
    assert_eq!(report.page_count, 2);
    assert_eq!(report.children.len(), 4);
    assert_eq!(report.children[3].page, 1);
    assert_eq!(report.pages[0].content_x, 10.0);
    assert_eq!(report.scene.len(), 2);
}
