//! # Text Flow
//!
//! Prose that wraps. Each offered line is filled greedily: a binary search
//! over prefix widths finds how many characters fit, then the break backs
//! off to the nearest preceding UAX #14 opportunity. A word that cannot be
//! broken goes to the next line when the offer was only the rest of the
//! current line, and is split mid-word when the offer is a whole line.
//!
//! Every line segment becomes one area. Segments of wrapped lines are
//! stretchable, so a justifying parent can widen them.

use std::collections::HashMap;

use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::geometry::Size;
use crate::model::{ElementKind, NodeId};
use crate::placement::{negotiate, SpaceNegotiator, FIT_TOLERANCE, MAX_NEGOTIATION_ROUNDS};
use crate::scene::{ItemId, ItemKind, Scene};

use super::{script_font, text_item, LayoutContext, Placeable, PresentationArea, ReflowHint};

/// Compute UAX#14 break opportunities indexed by char position.
///
/// Returns a vec of length `text.chars().count()`. Each entry is the break
/// opportunity *before* that character position. Index 0 is always `None`.
pub(crate) fn compute_break_opportunities(text: &str) -> Vec<Option<BreakOpportunity>> {
    let char_count = text.chars().count();
    let mut result = vec![None; char_count];

    // linebreaks() yields the byte offset *after* each break.
    let byte_to_char: Vec<usize> = {
        let mut map = vec![0usize; text.len() + 1];
        for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
            map[byte_idx] = char_idx;
        }
        map[text.len()] = char_count;
        map
    };

    for (byte_offset, opp) in linebreaks(text) {
        let char_idx = byte_to_char[byte_offset];
        if char_idx > 0 && char_idx < char_count {
            result[char_idx] = Some(opp);
        }
    }

    result
}

/// Largest `k` such that the `k` characters after `start` (and before
/// `limit`) fit in `width`.
fn longest_fit(prefix: &[f64], start: usize, limit: usize, width: f64) -> usize {
    let budget = prefix[start] + width + FIT_TOLERANCE;
    let (mut lo, mut hi) = (0, limit - start);
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if prefix[start + mid] <= budget {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Last break opportunity `b` with `start < b <= end`.
fn last_break(breaks: &[Option<BreakOpportunity>], start: usize, end: usize) -> Option<usize> {
    (start + 1..=end.min(breaks.len().saturating_sub(1)))
        .rev()
        .find(|&b| breaks[b].is_some())
}

fn reject(parent: &mut dyn SpaceNegotiator, node: NodeId, needed: Size, rejections: &mut usize) {
    *rejections += 1;
    assert!(
        *rejections <= MAX_NEGOTIATION_ROUNDS,
        "placement contract violated: {node:?} still rejected after {MAX_NEGOTIATION_ROUNDS} offers"
    );
    parent.area_insufficient(node, needed);
}

/// One laid out line of a text run.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Character range in the source text.
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub width: f64,
    /// Whitespace dropped just before this segment (trimmed indentation).
    pub elided_before: Option<char>,
    /// Character dropped at the break after this segment.
    pub elided_after: Option<char>,
}

/// Layout of a wrapping text run.
#[derive(Debug, Default)]
pub struct LineFlowNode {
    segments: Vec<Segment>,
    /// Natural width and character count of each segment item.
    natural: HashMap<ItemId, (f64, usize)>,
}

impl LineFlowNode {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl Placeable for LineFlowNode {
    fn place(
        &mut self,
        node: NodeId,
        ctx: &mut LayoutContext<'_>,
        parent: &mut dyn SpaceNegotiator,
    ) -> Vec<PresentationArea> {
        let content = match &ctx.element(node).kind {
            ElementKind::Text { content } => content.as_str(),
            other => panic!("{node:?} is not text: {other:?}"),
        };
        let format = ctx.format(node);
        let (font, rise) = script_font(&format, ctx.metrics);
        let base = ctx.metrics.measure(&font, "");
        let line_height = base.line_height.max(base.height());
        let leading = (line_height - base.height()) / 2.0;
        let ascent = leading + base.ascent + rise;
        let height = ascent + (line_height - leading - base.ascent - rise).max(0.0);

        self.segments.clear();
        self.natural.clear();

        let chars: Vec<char> = content.chars().collect();
        let n = chars.len();
        if n == 0 {
            let item = text_item(ctx.scene, "", &font, format.color, Size::new(0.0, height));
            let area = PresentationArea::new(item, Size::new(0.0, height), ascent);
            negotiate(parent, node, area.allocation());
            return vec![area];
        }

        let advances = ctx.metrics.char_advances(&font, content);
        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0.0);
        for w in &advances {
            prefix.push(prefix.last().copied().unwrap_or(0.0) + w);
        }
        let breaks = compute_break_opportunities(content);

        let mut areas = Vec::new();
        let mut start = 0;
        let mut want_new_line = false;
        let mut elided_at_break = true;
        let mut rejections = 0;

        while start < n {
            let offer = parent.request_area(node);
            let may_reject = offer.qualifier.may_reject();

            if may_reject && (want_new_line || height > offer.size.height + FIT_TOLERANCE) {
                reject(parent, node, Size::new(0.0, height), &mut rejections);
                continue;
            }

            let mut elided_before = None;
            if !areas.is_empty() && !elided_at_break && chars[start] != '\n' && chars[start].is_whitespace() {
                elided_before = Some(chars[start]);
                start += 1;
                if start == n {
                    break;
                }
            }

            let newline = (start..n).find(|&i| chars[i] == '\n');
            let limit = newline.unwrap_or(n);
            let fit = longest_fit(&prefix, start, limit, offer.size.width);

            let (end, next, hard) = if start + fit == limit {
                match newline {
                    Some(j) => (j, j + 1, true),
                    None => (n, n, false),
                }
            } else if let Some(b) = last_break(&breaks, start, start + fit) {
                let end = if chars[b - 1].is_whitespace() { b - 1 } else { b };
                (end, b, false)
            } else if may_reject {
                if elided_before.is_some() {
                    start -= 1;
                }
                let needed = Size::new(prefix[limit] - prefix[start], height);
                reject(parent, node, needed, &mut rejections);
                continue;
            } else {
                let end = start + fit.max(1);
                let next = if end < limit && chars[end].is_whitespace() {
                    end + 1
                } else {
                    end
                };
                (end, next, false)
            };

            let text: String = chars[start..end].iter().collect();
            let width = prefix[end] - prefix[start];
            let wrapped = !hard && next < n;
            let item = text_item(ctx.scene, &text, &font, format.color, Size::new(width, height));
            let area = PresentationArea::new(item, Size::new(width, height), ascent).stretchable(wrapped);
            parent.allocate_area(node, area.allocation());

            let elided_after = (next > end).then(|| chars[end]);
            self.natural.insert(item, (width, end - start));
            self.segments.push(Segment {
                start,
                end,
                text,
                width,
                elided_before,
                elided_after,
            });
            areas.push(area);

            elided_at_break = elided_after.is_some();
            want_new_line = next < n;
            rejections = 0;
            start = next;
        }

        log::trace!(
            target: "folio::presentation",
            "{node:?} flowed {n} chars into {} line(s)",
            areas.len()
        );
        areas
    }

    fn apply_stretch(&mut self, scene: &mut Scene, area: &mut PresentationArea, factor: f64) {
        assert!(
            area.can_stretch,
            "placement contract violated: {:?} is not stretchable",
            area.item
        );
        let (natural, count) = self
            .natural
            .get(&area.item)
            .copied()
            .unwrap_or((area.size.width, 1));
        let width = natural * factor;
        let spacing = (width - natural) / count.max(1) as f64;
        if let Some(item) = scene.get_mut(area.item) {
            if let ItemKind::Text { letter_spacing, .. } = &mut item.kind {
                *letter_spacing = spacing;
            }
            item.size.width = width;
        }
        area.size.width = width;
    }

    fn reflow_hint(&self) -> ReflowHint {
        ReflowHint::AlwaysReflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, NodeSpec};
    use crate::placement::{Offer, RecordingNegotiator, SpaceQualifier};
    use crate::presentation::flow::FlowCursor;
    use crate::presentation::{Leaf, PresentationKind};
    use crate::style::Format;
    use crate::testing::Fixture;

    fn fixture(text: &str) -> Fixture {
        let spec = NodeSpec::new(ElementKind::Text {
            content: text.into(),
        });
        Fixture::new(Document::from_specs(Format::default(), &[spec]))
    }

    fn segments(fx: &Fixture, node: NodeId) -> Vec<Segment> {
        match fx.presentations.get(node).unwrap().kind() {
            PresentationKind::Leaf(Leaf::Text(flow)) => flow.segments().to_vec(),
            _ => panic!("not text"),
        }
    }

    fn reassemble(segments: &[Segment]) -> String {
        let mut out = String::new();
        for s in segments {
            out.extend(s.elided_before);
            out.push_str(&s.text);
            out.extend(s.elided_after);
        }
        out
    }

    #[test]
    fn test_break_opportunities() {
        let opps = compute_break_opportunities("ab cd");
        assert_eq!(opps.len(), 5);
        assert_eq!(opps[3], Some(BreakOpportunity::Allowed));
        assert_eq!(opps[0], None);
    }

    #[test]
    fn test_longest_fit() {
        let prefix = [0.0, 6.0, 12.0, 18.0, 24.0];
        assert_eq!(longest_fit(&prefix, 0, 4, 13.0), 2);
        assert_eq!(longest_fit(&prefix, 1, 4, 100.0), 3);
        assert_eq!(longest_fit(&prefix, 0, 4, 1.0), 0);
        assert_eq!(longest_fit(&prefix, 0, 4, f64::INFINITY), 4);
    }

    #[test]
    fn wraps_at_spaces() {
        let mut fx = fixture("aaaa bbbb cccc");
        let node = fx.top_level(0);
        let mut cursor = FlowCursor::new(60.0, f64::INFINITY);
        fx.place(node, &mut cursor);
        let texts: Vec<String> = segments(&fx, node).into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["aaaa bbbb", "cccc"]);
        let block = cursor.finish();
        assert_eq!(block.lines.len(), 2);
        assert!(block.lines[0].entries[0].area.can_stretch);
        assert!(!block.lines[1].entries[0].area.can_stretch);
    }

    #[test]
    fn line_break_round_trip() {
        let text = "The quick brown fox jumps over the lazy dog, twice  over.";
        for width in [20.0, 35.0, 50.0, 80.0, 200.0] {
            let mut fx = fixture(text);
            let node = fx.top_level(0);
            fx.place(node, &mut FlowCursor::new(width, f64::INFINITY));
            let segs = segments(&fx, node);
            assert_eq!(reassemble(&segs), text, "width {width}");
            for pair in segs.windows(2) {
                let elided = pair[0].elided_after.is_some() as usize
                    + pair[1].elided_before.is_some() as usize;
                assert!(elided <= 1, "one elided character per break");
            }
        }
    }

    #[test]
    fn unbreakable_word_rejects_current_remaining() {
        let mut fx = fixture("abcdefgh");
        let node = fx.top_level(0);
        let mut parent = RecordingNegotiator::new(vec![
            Offer::new(Size::new(10.0, 100.0), SpaceQualifier::CurrentRemaining),
            Offer::new(Size::new(30.0, 100.0), SpaceQualifier::MaximumWidth),
        ]);
        fx.place(node, &mut parent);
        assert_eq!(parent.rejections, 1);
        let texts: Vec<String> = segments(&fx, node).into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["abcde", "fgh"]);
    }

    #[test]
    fn mandatory_break_ends_the_line() {
        let mut fx = fixture("one\ntwo");
        let node = fx.top_level(0);
        let mut cursor = FlowCursor::new(500.0, f64::INFINITY);
        fx.place(node, &mut cursor);
        let segs = segments(&fx, node);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].elided_after, Some('\n'));
        assert_eq!(cursor.finish().lines.len(), 2);
    }

    #[test]
    fn empty_text_takes_one_empty_line() {
        let mut fx = fixture("");
        let node = fx.top_level(0);
        let mut parent = RecordingNegotiator::unbounded();
        fx.place(node, &mut parent);
        assert_eq!(parent.allocations.len(), 1);
        let area = parent.allocations[0].1;
        assert_eq!(area.size.width, 0.0);
        assert!((area.size.height - 14.4).abs() < 1e-9);
    }

    #[test]
    fn stretch_widens_by_factor() {
        let mut fx = fixture("aaaa bbbb cccc");
        let node = fx.top_level(0);
        fx.place(node, &mut FlowCursor::new(60.0, f64::INFINITY));
        let item = fx.presentations.get(node).unwrap().graphics_item(0);
        let width = fx.context().stretch(node, item, 1.2);
        assert!((width - 54.0 * 1.2).abs() < 1e-9);
        match &fx.scene.get(item).unwrap().kind {
            ItemKind::Text { letter_spacing, .. } => assert!(*letter_spacing > 0.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "not stretchable")]
    fn last_line_cannot_stretch() {
        let mut fx = fixture("aaaa bbbb cccc");
        let node = fx.top_level(0);
        fx.place(node, &mut FlowCursor::new(60.0, f64::INFINITY));
        let item = fx.presentations.get(node).unwrap().graphics_item(1);
        fx.context().stretch(node, item, 1.2);
    }
}
