//! # Layout Engine
//!
//! The façade that owns everything layout produces: the scene, the
//! presentations, the page list. A host attaches it to a [`Document`],
//! mutates the document as the user edits, and calls
//! [`LayoutEngine::paginate`] whenever it wants the pages brought up to
//! date. Document events queued since the last call are drained first, so
//! only the affected part of the document is laid out again.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FolioError;
use crate::events::{DocumentEvent, LayoutEvent, Notifications};
use crate::font::{FontContext, GlyphMetrics};
use crate::image_loader::ImageCache;
use crate::model::{Document, NodeId, NodeSpec};
use crate::pagination::{
    ChildLocation, EventPump, LayoutSession, NoopPump, PageEntry, PassMonitor, PassOutcome,
    RootPagination,
};
use crate::paper::{PageFormat, PaperFormats};
use crate::placement::{AbortHandle, JobTracker};
use crate::presentation::{
    DataTypePresentationGenerator, LayoutContext, Presentations, Repositioning,
};
use crate::scene::{ItemSnapshot, Scene};
use crate::style::Format;

/// Keeps the layout of one document current.
pub struct LayoutEngine {
    session: LayoutSession,
    formats: PaperFormats,
    scene: Scene,
    presentations: Presentations,
    pagination: RootPagination,
    generator: DataTypePresentationGenerator,
    images: ImageCache,
    notifications: Notifications,
    events: Option<Receiver<DocumentEvent>>,
    tracker: JobTracker,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutSession::default(), PaperFormats::default())
    }
}

impl LayoutEngine {
    pub fn new(session: LayoutSession, formats: PaperFormats) -> Self {
        Self {
            session,
            formats,
            scene: Scene::new(),
            presentations: Presentations::new(),
            pagination: RootPagination::new(),
            generator: DataTypePresentationGenerator::default(),
            images: ImageCache::new(),
            notifications: Notifications::new(),
            events: None,
            tracker: JobTracker::new(),
        }
    }

    /// Use `generator` to present calculated values.
    pub fn with_generator(mut self, generator: DataTypePresentationGenerator) -> Self {
        self.generator = generator;
        self.pagination.recompute_everything();
        self
    }

    /// Start presenting `document`, dropping any earlier layout. The engine
    /// becomes the consumer of the document's event queue.
    pub fn attach(&mut self, document: &mut Document) {
        self.scene = Scene::new();
        self.presentations = Presentations::new();
        self.pagination = RootPagination::new();
        self.events = document.take_event_receiver();
        if self.events.is_none() {
            log::warn!(
                target: "folio::events",
                "document event queue already taken; edits will not be noticed"
            );
        }
        for node in self.presentations.attach_subtree(document, document.root()) {
            self.notifications
                .push(LayoutEvent::PresentationAdded { node });
        }
        let root = document.root();
        self.pagination.reconcile(&document.children(root));
        log::debug!(
            target: "folio::events",
            "attached document with {} presentation(s)",
            self.presentations.len()
        );
    }

    /// Drain queued document events and turn them into layout work.
    /// Returns how many events were handled.
    pub fn process_events(&mut self, document: &Document) -> usize {
        let events: Vec<DocumentEvent> = match &self.events {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        };
        let mut touched = Vec::new();
        let mut everything = false;
        for event in &events {
            log::trace!(target: "folio::events", "{event:?}");
            match event {
                DocumentEvent::NodeInserted { parent, node } => {
                    if !document.is_grafted(*node) {
                        continue;
                    }
                    for added in self.presentations.attach_subtree(document, *node) {
                        self.notifications
                            .push(LayoutEvent::PresentationAdded { node: added });
                    }
                    if *parent != document.root() {
                        self.reposition(document, *parent, &mut touched, &mut everything);
                    }
                }
                DocumentEvent::NodeRemoved {
                    parent, subtree, ..
                } => {
                    for &id in subtree {
                        if self.presentations.detach(id, &mut self.scene) {
                            self.notifications
                                .push(LayoutEvent::PresentationRemoved { node: id });
                        }
                    }
                    if *parent != document.root() && document.is_alive(*parent) {
                        self.reposition(document, *parent, &mut touched, &mut everything);
                    }
                }
                DocumentEvent::NodeChanged { node } => {
                    self.reposition(document, *node, &mut touched, &mut everything);
                }
            }
        }

        self.pagination.reconcile(&document.children(document.root()));
        if everything {
            self.pagination.recompute_everything();
        }
        for node in touched {
            self.pagination.node_changed(node);
        }
        events.len()
    }

    fn reposition(
        &mut self,
        document: &Document,
        node: NodeId,
        touched: &mut Vec<NodeId>,
        everything: &mut bool,
    ) {
        match self.presentations.request_repositioning(document, node) {
            Repositioning::Suppressed => {}
            Repositioning::Root => *everything = true,
            Repositioning::TopLevel(top) => touched.push(top),
        }
    }

    /// Bring the pages up to date.
    pub fn paginate(&mut self, document: &Document, metrics: &dyn GlyphMetrics) -> PassOutcome {
        self.paginate_with(document, metrics, &mut NoopPump)
    }

    /// Bring the pages up to date, calling `pump` between children so the
    /// host can stay responsive. An aborted pass is restarted up to
    /// [`LayoutSession::max_restarts`] times; after that the abort is
    /// returned and the next call resumes the same window.
    pub fn paginate_with(
        &mut self,
        document: &Document,
        metrics: &dyn GlyphMetrics,
        pump: &mut dyn EventPump,
    ) -> PassOutcome {
        let mut restarts = 0;
        loop {
            self.process_events(document);
            let mut ctx = LayoutContext {
                document,
                metrics,
                scene: &mut self.scene,
                presentations: &mut self.presentations,
                tracker: &mut self.tracker,
                session: &self.session,
                generator: &self.generator,
                images: &self.images,
                remeasure: false,
            };
            let outcome =
                self.pagination
                    .run_pass(&mut ctx, &self.formats, pump, &mut self.notifications);
            // An abort request never outlives the pass it arrived in, even
            // when that pass finished before noticing it.
            self.tracker.abort_handle().clear();
            match outcome {
                PassOutcome::Aborted { after_child } if restarts < self.session.max_restarts => {
                    restarts += 1;
                    let first_dirty = self
                        .pagination
                        .dirty_window()
                        .map_or(0, |(first, _)| first);
                    log::debug!(
                        target: "folio::pagination",
                        "restarting from child {first_dirty} after abort at {after_child} (restart {restarts})"
                    );
                    self.notifications
                        .push(LayoutEvent::PlacementRestarted { first_dirty });
                }
                other => return other,
            }
        }
    }

    /// Give `page` its own format. Every child is laid out again.
    pub fn set_page_format(&mut self, page: usize, format: PageFormat) {
        self.formats.set_format(page, format);
        self.notifications
            .push(LayoutEvent::PageFormatChanged { page });
        self.pagination.recompute_everything();
    }

    /// Replace the session settings. Every child is laid out again.
    pub fn set_session(&mut self, session: LayoutSession) {
        if session != self.session {
            self.session = session;
            self.pagination.recompute_everything();
        }
    }

    /// Lay out every child on the next pass without invalidating any; a
    /// consistent layout skips them all.
    pub fn revalidate(&mut self) {
        self.pagination.revisit_all();
    }

    pub fn session(&self) -> &LayoutSession {
        &self.session
    }

    pub fn formats(&self) -> &PaperFormats {
        &self.formats
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn presentations(&self) -> &Presentations {
        &self.presentations
    }

    pub fn pagination(&self) -> &RootPagination {
        &self.pagination
    }

    pub fn pages(&self) -> &[PageEntry] {
        self.pagination.pages()
    }

    pub fn locations(&self) -> &[ChildLocation] {
        self.pagination.locations()
    }

    /// A handle that aborts the running pass at the next child boundary.
    pub fn abort_handle(&self) -> AbortHandle {
        self.tracker.abort_handle()
    }

    /// Shared pass state, for printing threads.
    pub fn monitor(&self) -> PassMonitor {
        self.pagination.monitor()
    }

    /// Block until no pass is in flight, or `timeout` elapses.
    pub fn wait_until_settled(&self, timeout: Duration) -> bool {
        self.pagination
            .monitor()
            .wait_until_settled(timeout, self.session.print_poll_interval())
    }

    /// Notifications queued since the last call.
    pub fn take_notifications(&mut self) -> Vec<LayoutEvent> {
        self.notifications.drain()
    }

    /// Number of placements run since the engine was created.
    pub fn jobs_run(&self) -> usize {
        self.tracker.finished()
    }

    /// Serializable summary of the current layout.
    pub fn report(&self) -> LayoutReport {
        let bounds = self.scene.bounds();
        LayoutReport {
            page_count: self.pages().len(),
            width: bounds.width,
            height: bounds.height,
            pages: self
                .pages()
                .iter()
                .map(|p| {
                    let paper = p.paper_size();
                    let content = p.content_origin();
                    PageReport {
                        index: p.index,
                        x: p.origin.x,
                        y: p.origin.y,
                        width: paper.width,
                        height: paper.height,
                        content_x: content.x,
                        content_y: content.y,
                        content_width: p.active_area.width,
                        content_height: p.active_area.height,
                    }
                })
                .collect(),
            children: self
                .locations()
                .iter()
                .map(|l| ChildReport {
                    page: l.content_top.page,
                    y: l.content_top.y,
                    height: l.height,
                    bottom_page: l.bottom.page,
                    bottom_y: l.bottom.y,
                })
                .collect(),
            scene: self
                .pages()
                .iter()
                .filter_map(|p| self.scene.snapshot(p.group))
                .collect(),
        }
    }
}

/// One page of a [`LayoutReport`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub content_x: f64,
    pub content_y: f64,
    pub content_width: f64,
    pub content_height: f64,
}

/// Where one top-level child ended up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildReport {
    pub page: usize,
    pub y: f64,
    pub height: f64,
    pub bottom_page: usize,
    pub bottom_y: f64,
}

/// The layout of a whole document, as the CLI prints it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutReport {
    pub page_count: usize,
    pub width: f64,
    pub height: f64,
    pub pages: Vec<PageReport>,
    pub children: Vec<ChildReport>,
    /// One snapshot per page, with absolute positions.
    pub scene: Vec<ItemSnapshot>,
}

/// A custom font to register before layout.
#[derive(Debug, Clone, Deserialize)]
pub struct FontEntry {
    pub family: String,
    /// Base64-encoded font data, or a data URI.
    pub src: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub italic: bool,
}

fn default_weight() -> u32 {
    400
}

/// A complete layout job as JSON input: the document plus everything the
/// engine needs to lay it out.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSpec {
    #[serde(default)]
    pub children: Vec<NodeSpec>,
    /// Format of the root; every element inherits from it.
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub pages: PaperFormats,
    #[serde(default)]
    pub session: LayoutSession,
    #[serde(default)]
    pub fonts: Vec<FontEntry>,
}

impl DocumentSpec {
    pub fn from_json(json: &str) -> Result<Self, FolioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_document(&self) -> Document {
        Document::from_specs(self.format.clone(), &self.children)
    }

    /// A font context with the standard families plus every listed font.
    pub fn font_context(&self) -> Result<FontContext, FolioError> {
        let mut fonts = FontContext::new();
        for entry in &self.fonts {
            fonts.register_base64(&entry.family, entry.weight, entry.italic, &entry.src)?;
        }
        Ok(fonts)
    }
}

/// Lay out a document described as JSON and return its report.
pub fn layout_json(json: &str) -> Result<LayoutReport, FolioError> {
    let spec = DocumentSpec::from_json(json)?;
    let fonts = spec.font_context()?;
    let mut document = spec.to_document();
    let mut engine = LayoutEngine::new(spec.session.clone(), spec.pages.clone());
    engine.attach(&mut document);
    let outcome = engine.paginate(&document, &fonts);
    log::debug!(target: "folio::pagination", "layout finished: {outcome:?}");
    Ok(engine.report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, ElementKind};
    use crate::testing::FixedMetrics;

    fn literal(text: &str) -> NodeSpec {
        NodeSpec::new(ElementKind::Literal {
            text: text.to_string(),
        })
    }

    fn engine_for(document: &mut Document) -> LayoutEngine {
        let formats = PaperFormats::uniform(PageFormat::borderless(300.0, 100.0));
        let mut engine = LayoutEngine::new(LayoutSession::default(), formats);
        engine.attach(document);
        engine
    }

    #[test]
    fn attach_creates_presentations_and_notifies() {
        let mut doc = Document::from_specs(Format::default(), &[literal("a"), literal("b")]);
        let mut engine = engine_for(&mut doc);
        assert_eq!(engine.presentations().len(), 3);
        let added = engine
            .take_notifications()
            .into_iter()
            .filter(|e| matches!(e, LayoutEvent::PresentationAdded { .. }))
            .count();
        assert_eq!(added, 3);
    }

    #[test]
    fn edits_become_dirty_children() {
        let mut doc = Document::from_specs(Format::default(), &[literal("a"), literal("b")]);
        let mut engine = engine_for(&mut doc);
        engine.paginate(&doc, &FixedMetrics);
        let b = doc.child(doc.root(), 1);
        doc.set_text(b, "bbb");
        engine.process_events(&doc);
        assert_eq!(engine.pagination().dirty_window(), Some((1, 1)));
    }

    #[test]
    fn removal_detaches_presentations() {
        let mut doc = Document::from_specs(Format::default(), &[literal("a"), literal("b")]);
        let mut engine = engine_for(&mut doc);
        engine.paginate(&doc, &FixedMetrics);
        engine.take_notifications();
        let a = doc.child(doc.root(), 0);
        doc.remove(a);
        engine.paginate(&doc, &FixedMetrics);
        assert!(!engine.presentations().contains(a));
        assert!(engine
            .take_notifications()
            .contains(&LayoutEvent::PresentationRemoved { node: a }));
        assert_eq!(engine.locations().len(), 1);
        assert_eq!(engine.locations()[0].content_top.y, 0.0);
    }

    #[test]
    fn ungrafted_insertions_are_ignored() {
        let mut doc = Document::from_specs(Format::default(), &[literal("a")]);
        let mut engine = engine_for(&mut doc);
        let loose = doc.create(Element::new(ElementKind::Literal { text: "x".into() }));
        doc.set_text(loose, "y");
        engine.process_events(&doc);
        assert!(!engine.presentations().contains(loose));
    }

    #[test]
    fn page_format_change_recomputes_everything() {
        let mut doc = Document::from_specs(Format::default(), &[literal("a")]);
        let mut engine = engine_for(&mut doc);
        engine.paginate(&doc, &FixedMetrics);
        engine.set_page_format(0, PageFormat::borderless(400.0, 100.0));
        engine.paginate(&doc, &FixedMetrics);
        assert_eq!(engine.pages()[0].active_area.width, 400.0);
        assert_eq!(
            engine.pagination().decisions()[0].1,
            crate::pagination::ChildDecision::Recompute
        );
        assert!(engine
            .take_notifications()
            .contains(&LayoutEvent::PageFormatChanged { page: 0 }));
    }

    #[test]
    fn layout_json_reports_pages() {
        let json = r#"{
            "pages": { "default": { "size": { "Custom": { "width": 200, "height": 100 } }, "margin": { "top": 0, "right": 0, "bottom": 0, "left": 0 } } },
            "children": [
                { "kind": { "type": "Frame", "width": 50, "height": 60 } },
                { "kind": { "type": "Frame", "width": 50, "height": 60 } }
            ]
        }"#;
        let report = layout_json(json).unwrap();
        assert_eq!(report.page_count, 2);
        assert_eq!(report.children[1].page, 1);
        assert_eq!(report.pages[1].y, 100.0 + crate::pagination::PAGE_GAP);
    }

    fn binary(glyph: &str, operands: Vec<NodeSpec>) -> NodeSpec {
        let mut op = NodeSpec::new(ElementKind::Operator {
            form: crate::model::OperatorForm::Binary,
            glyph: glyph.into(),
            second_glyph: None,
        });
        op.children = operands;
        op
    }

    fn font_size_of(engine: &LayoutEngine, node: NodeId) -> f64 {
        let item = engine.presentations().get(node).unwrap().graphics_item(0);
        match &engine.scene().get(item).unwrap().kind {
            crate::scene::ItemKind::Text { font, .. } => font.size,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn sized(size: f64) -> Format {
        Format {
            font_size: Some(size),
            ..Default::default()
        }
    }

    #[test]
    fn operator_format_change_remeasures_operands() {
        let mut doc = Document::from_specs(
            Format::default(),
            &[binary("+", vec![literal("a"), literal("b")])],
        );
        let mut engine = engine_for(&mut doc);
        engine.paginate(&doc, &FixedMetrics);
        let op = doc.child(doc.root(), 0);
        let a = doc.child(op, 0);
        assert_eq!(font_size_of(&engine, a), 12.0);

        doc.set_format(op, sized(36.0));
        engine.paginate(&doc, &FixedMetrics);
        assert_eq!(font_size_of(&engine, a), 36.0);
        assert_eq!(font_size_of(&engine, doc.child(op, 1)), 36.0);
        assert_eq!(engine.locations()[0].height, 36.0);
    }

    #[test]
    fn root_format_change_remeasures_nested_operands() {
        let inner = binary("*", vec![literal("b"), literal("c")]);
        let mut doc = Document::from_specs(
            Format::default(),
            &[binary("+", vec![literal("a"), inner])],
        );
        let mut engine = engine_for(&mut doc);
        engine.paginate(&doc, &FixedMetrics);
        let op = doc.child(doc.root(), 0);
        let c = doc.child(doc.child(op, 1), 1);
        assert_eq!(font_size_of(&engine, c), 12.0);

        let root = doc.root();
        doc.set_format(root, sized(24.0));
        engine.paginate(&doc, &FixedMetrics);
        assert_eq!(font_size_of(&engine, c), 24.0);
        assert_eq!(font_size_of(&engine, doc.child(op, 0)), 24.0);
    }

    #[test]
    fn late_abort_request_does_not_leak_into_the_next_pass() {
        struct AbortOnSecondPoll(AbortHandle, usize);
        impl EventPump for AbortOnSecondPoll {
            fn poll(&mut self, _budget: Duration) {
                self.1 += 1;
                if self.1 == 2 {
                    self.0.request();
                }
            }
        }
        let mut doc = Document::from_specs(Format::default(), &[literal("a"), literal("b")]);
        let session = LayoutSession::default()
            .with_yield_interval(Duration::ZERO)
            .with_max_restarts(0);
        let mut engine = LayoutEngine::new(
            session,
            PaperFormats::uniform(PageFormat::borderless(300.0, 100.0)),
        );
        engine.attach(&mut doc);
        let mut pump = AbortOnSecondPoll(engine.abort_handle(), 0);
        let outcome = engine.paginate_with(&doc, &FixedMetrics, &mut pump);
        assert_eq!(outcome, PassOutcome::Completed { page_count: 1 });
        assert!(!engine.abort_handle().is_requested());

        let a = doc.child(doc.root(), 0);
        doc.set_text(a, "aaa");
        let outcome = engine.paginate_with(&doc, &FixedMetrics, &mut NoopPump);
        assert_eq!(outcome, PassOutcome::Completed { page_count: 1 });
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        assert!(matches!(
            layout_json("{ \"children\": 3 }"),
            Err(FolioError::Parse { .. })
        ));
    }
}
