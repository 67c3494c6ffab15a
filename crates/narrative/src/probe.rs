//! Forward probe: the words that follow a selection on the rendered page.
//!
//! The probe disambiguates a selection whose text occurs many times in the
//! narrative. It is read from the page's own runs, in reading order, with
//! the same noise, join, cleanup, classification and header/footer rules
//! as extraction, so its tokens look like the narrative tokens they are
//! compared against.

use lector_core::match_key::{keys_match, match_key};
use lector_core::selection::NormalizedRect;

use crate::columns::order_segments;
use crate::config::ExtractionConfig;
use crate::geometry::{page_geometry, sanitize_page};
use crate::lines::{build_line, build_segments, LineOutcome};
use crate::noise::noise_reason;
use crate::pipeline::{is_hyphenated, DocumentProfile};
use crate::types::{PageGeometry, PageRuns, Segment};

/// Segments read past the selection point while looking for the
/// selection's first word.
const MAX_LOOKAHEAD_SEGMENTS: usize = 6;

/// Build a probe of up to `max_tokens` words starting at the selection's
/// first word.
///
/// Returns `None` when the page has no size, nothing on the page lies
/// under the rectangle, the selection's first word is not found near it, or
/// fewer than two words remain.
pub fn forward_probe(
    page: &PageRuns,
    rect: &NormalizedRect,
    selection: &str,
    profile: &DocumentProfile,
    config: &ExtractionConfig,
    max_tokens: usize,
) -> Option<String> {
    let first_key = selection
        .split_whitespace()
        .map(match_key)
        .find(|k| !k.is_empty())?;

    let page = sanitize_page(page.clone());
    let geometry = page_geometry(&page, profile.body_font_size);
    if geometry.width <= 0.0 || geometry.height <= 0.0 {
        return None;
    }

    let runs = page
        .runs
        .into_iter()
        .filter(|run| noise_reason(run, &geometry, &profile.stamps, &config.noise).is_none())
        .collect();
    let order = order_segments(
        build_segments(runs, geometry.body_font_size, &config.lines),
        &geometry,
        &config.columns,
    );

    let start = order
        .segments
        .iter()
        .position(|s| under_rect(s, rect, &geometry))?;

    let mut words: Vec<String> = Vec::new();
    let mut found: Option<usize> = None;
    for (read, segment) in order.segments[start..].iter().enumerate() {
        if let Some(text) = narrative_text(segment, &geometry, profile, config) {
            append_words(&mut words, &text);
        }

        if found.is_none() {
            found = words
                .iter()
                .position(|w| keys_match(&match_key(w), &first_key));
        }
        match found {
            Some(pos) if words.len() - pos > max_tokens => break,
            None if read + 1 >= MAX_LOOKAHEAD_SEGMENTS => return None,
            _ => {}
        }
    }

    let pos = found?;
    let probe: Vec<String> = words.into_iter().skip(pos).take(max_tokens).collect();
    if probe.len() < 2 {
        return None;
    }
    log::debug!("forward probe on page {}: {:?}", page.number, probe);
    Some(probe.join(" "))
}

/// A segment's line as the narrative holds it, or `None` when extraction
/// drops it.
fn narrative_text(
    segment: &Segment,
    geometry: &PageGeometry,
    profile: &DocumentProfile,
    config: &ExtractionConfig,
) -> Option<String> {
    match build_line(segment, geometry, &config.lines) {
        LineOutcome::Kept(line) => profile
            .signatures
            .edge_reason(&line, &config.boilerplate)
            .is_none()
            .then_some(line.text),
        LineOutcome::Excluded(..) | LineOutcome::Empty => None,
    }
}

/// Whether a segment's glyph box overlaps the rectangle.
fn under_rect(segment: &Segment, rect: &NormalizedRect, geometry: &PageGeometry) -> bool {
    let top = (segment.y - segment.font_size) / geometry.height;
    let bottom = segment.y / geometry.height;
    let left = segment.x0 / geometry.width;
    let right = segment.x1 / geometry.width;
    bottom >= rect.top && top <= rect.bottom && right >= rect.left && left <= rect.right
}

/// Append the words of a line, rejoining a word hyphenated across the
/// line break.
///
/// Heading and callout markers carry no match key and are left out.
fn append_words(words: &mut Vec<String>, text: &str) {
    let mut incoming = text
        .split_whitespace()
        .filter(|w| !match_key(w).is_empty())
        .peekable();
    if let (Some(last), Some(next)) = (words.last_mut(), incoming.peek().copied()) {
        if is_hyphenated(last) && next.starts_with(char::is_lowercase) {
            last.pop();
            last.push_str(next);
            incoming.next();
        }
    }
    words.extend(incoming.map(str::to_string));
}
