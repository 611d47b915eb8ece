//! # Events
//!
//! Two directions of traffic cross the layout engine's boundary:
//!
//! * [`DocumentEvent`]s flow *in*. The document model posts them onto an
//!   `mpsc` channel whenever it mutates; the engine drains the channel on
//!   the layout thread before each pass. There is exactly one consumer.
//! * [`LayoutEvent`]s flow *out*. The engine queues notifications for UI
//!   chrome (rulers, progress indicators) in a [`Notifications`] queue that
//!   the UI drains whenever it likes.

use std::collections::VecDeque;

use crate::model::NodeId;

/// A mutation of the document model that layout must react to.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    /// `node` (and its whole subtree) was attached under `parent`.
    NodeInserted { parent: NodeId, node: NodeId },
    /// `node` was removed from `parent` at `index`. `subtree` lists the node
    /// and all of its descendants, collected before the arena freed them.
    NodeRemoved {
        parent: NodeId,
        index: usize,
        node: NodeId,
        subtree: Vec<NodeId>,
    },
    /// Content, format, diagnostic or calculated value of `node` changed.
    NodeChanged { node: NodeId },
}

/// A notification for UI chrome outside the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutEvent {
    PlacementStarted { first_dirty: usize },
    PlacementCompleted { page_count: usize },
    PlacementAborted { after_child: Option<usize> },
    PlacementRestarted { first_dirty: usize },
    PendingJobsChanged { pending: usize },
    PresentationAdded { node: NodeId },
    PresentationRemoved { node: NodeId },
    PageFormatChanged { page: usize },
}

/// FIFO queue of outgoing notifications.
#[derive(Debug, Default)]
pub struct Notifications {
    queue: VecDeque<LayoutEvent>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: LayoutEvent) {
        log::trace!(target: "folio::events", "notify {event:?}");
        self.queue.push_back(event);
    }

    /// Remove and return every queued notification in order.
    pub fn drain(&mut self) -> Vec<LayoutEvent> {
        self.queue.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
