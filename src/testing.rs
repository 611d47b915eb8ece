//! Helpers shared by unit tests.

use std::collections::HashMap;

use crate::font::{GlyphMetrics, TextMetrics};
use crate::image_loader::ImageCache;
use crate::model::{Document, NodeId};
use crate::pagination::LayoutSession;
use crate::placement::{JobTracker, SpaceNegotiator};
use crate::presentation::{DataTypePresentationGenerator, LayoutContext, Presentations};
use crate::scene::Scene;
use crate::style::FontSpec;

/// Every character advances half an em; ascent 0.8 em, descent 0.2 em,
/// line height 1.2 em.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedMetrics;

impl GlyphMetrics for FixedMetrics {
    fn measure(&self, font: &FontSpec, text: &str) -> TextMetrics {
        TextMetrics {
            width: text.chars().count() as f64 * font.size * 0.5,
            ascent: font.size * 0.8,
            descent: font.size * 0.2,
            line_height: font.size * 1.2,
        }
    }
}

/// Exact metrics for listed strings, [`FixedMetrics`] for everything else.
#[derive(Debug, Default, Clone)]
pub struct TableMetrics {
    entries: HashMap<String, (f64, f64, f64)>,
}

impl TableMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, width: f64, ascent: f64, descent: f64) -> Self {
        self.entries
            .insert(text.to_string(), (width, ascent, descent));
        self
    }
}

impl GlyphMetrics for TableMetrics {
    fn measure(&self, font: &FontSpec, text: &str) -> TextMetrics {
        match self.entries.get(text) {
            Some(&(width, ascent, descent)) => TextMetrics {
                width,
                ascent,
                descent,
                line_height: ascent + descent,
            },
            None => FixedMetrics.measure(font, text),
        }
    }
}

/// A document plus everything needed to place its nodes by hand.
pub struct Fixture {
    pub document: Document,
    pub scene: Scene,
    pub presentations: Presentations,
    pub tracker: JobTracker,
    pub session: LayoutSession,
    pub generator: DataTypePresentationGenerator,
    pub images: ImageCache,
    pub metrics: Box<dyn GlyphMetrics>,
}

impl Fixture {
    pub fn new(document: Document) -> Self {
        Self::with_metrics(document, Box::new(FixedMetrics))
    }

    pub fn with_metrics(document: Document, metrics: Box<dyn GlyphMetrics>) -> Self {
        let mut presentations = Presentations::new();
        presentations.attach_subtree(&document, document.root());
        Self {
            document,
            scene: Scene::new(),
            presentations,
            tracker: JobTracker::new(),
            session: LayoutSession::default(),
            generator: DataTypePresentationGenerator::default(),
            images: ImageCache::new(),
            metrics,
        }
    }

    /// The `index`-th child of the root.
    pub fn top_level(&self, index: usize) -> NodeId {
        self.document.child(self.document.root(), index)
    }

    pub fn context(&mut self) -> LayoutContext<'_> {
        LayoutContext {
            document: &self.document,
            metrics: self.metrics.as_ref(),
            scene: &mut self.scene,
            presentations: &mut self.presentations,
            tracker: &mut self.tracker,
            session: &self.session,
            generator: &self.generator,
            images: &self.images,
            remeasure: false,
        }
    }

    pub fn place(&mut self, node: NodeId, parent: &mut dyn SpaceNegotiator) {
        let mut ctx = self.context();
        ctx.place_child(node, parent);
    }
}
