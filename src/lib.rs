//! # Folio
//!
//! A negotiated, incremental layout engine for structured math documents.
//!
//! Every node of the document tree gets its space by asking its parent for
//! it. The parent answers with an offer and a qualifier saying how firm the
//! offer is; the child either takes it or turns it down and asks again.
//! Expressions measure themselves bottom-up and then negotiate, so their
//! internal geometry never depends on where they land. Text and images use
//! the offer to decide how much to lay out.
//!
//! At the top, pagination flows the document's blocks onto pages and keeps
//! them there across edits: only the blocks an edit touched are laid out
//! again, the rest are moved or left alone. Long passes can be aborted
//! between blocks and resume where they stopped.
//!
//! ## Architecture
//!
//! ```text
//! Document (model) ── DocumentEvent queue ──┐
//!                                           ↓
//!   [engine]        — drains events, runs passes, reports
//!       ↓
//!   [pagination]    — dirty window, per-child decisions, pages
//!       ↓
//!   [presentation]  — operators, literals, text, values, images, grids
//!       ↓               (negotiating through [placement])
//!   [scene]         — positioned drawable items, grouped per page
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod font;
pub mod geometry;
pub mod image_loader;
pub mod model;
pub mod pagination;
pub mod paper;
pub mod placement;
pub mod presentation;
pub mod scene;
pub mod style;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{layout_json, DocumentSpec, LayoutEngine, LayoutReport};
pub use error::FolioError;
pub use model::{Document, NodeId, NodeSpec};
pub use pagination::{LayoutSession, PassOutcome};
