//! Severity decoration of items whose element carries a diagnostic.

use crate::model::Diagnostic;
use crate::scene::{Decoration, Scene};

use super::PresentationArea;

/// Tint every area item with the severity color and attach the message as
/// tooltip.
pub fn decorate(scene: &mut Scene, diagnostic: &Diagnostic, areas: &[PresentationArea]) {
    let decoration = Decoration {
        tint: diagnostic.severity.color(),
        tooltip: diagnostic.message.clone(),
    };
    for area in areas {
        scene.decorate(area.item, Some(decoration.clone()));
    }
}
