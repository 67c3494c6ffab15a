//! Selection anchoring: map a noisy selection onto a token index.
//!
//! # Stages
//!
//! ```text
//! probe sequence  ->  page + position hint  ->  windowed search  ->  not found
//!  (page, then doc)    (distance-capped)        (±window tokens)
//! ```
//!
//! Resolution stops at the first stage that produces an index. Ambiguous
//! single-token selections (acronyms such as "CD4") are re-scored against
//! the words surrounding the selection, and candidates that share none of
//! them are dropped. When nothing qualifies the resolver reports a miss with
//! the full search trace instead of guessing.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::index::NarrativeIndex;
use crate::match_key::{is_acronym_like, keys_match, match_key};
use crate::tokens;

/// Maximum number of candidates kept in the diagnostics.
const MAX_REPORTED_CANDIDATES: usize = 32;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Half-width of the document-wide fallback window, in tokens.
    pub window: usize,
    /// Page-hint search radius as a fraction of the page's token count.
    pub distance_cap_ratio: f32,
    /// Lower bound on the page-hint search radius.
    pub min_distance_cap: usize,
    /// Offset and geometry hints further apart than this fraction of the
    /// page length are resolved in favour of geometry.
    pub disagreement_ratio: f32,
    /// Context words captured on each side of an ambiguous selection.
    pub context_radius: usize,
    pub context_bonus: f32,
    pub context_penalty: f32,
    pub probe_max_tokens: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            window: 400,
            distance_cap_ratio: 0.35,
            min_distance_cap: 24,
            disagreement_ratio: 0.35,
            context_radius: 3,
            context_bonus: 25.0,
            context_penalty: 15.0,
            probe_max_tokens: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Request / report types
// ---------------------------------------------------------------------------

/// Everything the caller knows about a selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorRequest {
    pub selection: String,
    /// Text surrounding the selection as captured by the UI, if any.
    pub raw_text: Option<String>,
    /// 1-based page the selection was made on.
    pub page: Option<usize>,
    /// Word offset within `page`.
    pub offset: Option<usize>,
    /// Vertical position of the selection as a fraction of page height.
    pub y_fraction: Option<f32>,
    /// Words read forward from the selection point.
    pub probe: Option<String>,
    pub crosses_page: bool,
}

impl AnchorRequest {
    pub fn new(selection: impl Into<String>) -> Self {
        Self {
            selection: selection.into(),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_y_fraction(mut self, y_fraction: f32) -> Self {
        self.y_fraction = Some(y_fraction);
        self
    }

    pub fn with_probe(mut self, probe: impl Into<String>) -> Self {
        self.probe = Some(probe.into());
        self
    }

    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = Some(raw_text.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorStage {
    Probe,
    PageHint,
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissReason {
    CrossesPage,
    EmptySelection,
    EmptyIndex,
    /// Candidates exist but none could be told apart from the others.
    Ambiguous,
    NoCandidates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum AnchorOutcome {
    Found { index: usize, stage: AnchorStage },
    NotFound { reason: MissReason },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub index: usize,
    pub token: String,
    pub distance: usize,
    pub context_score: Option<f32>,
}

/// One range examined by one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTrace {
    pub stage: AnchorStage,
    pub start: usize,
    pub end: usize,
    pub hits: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorDiagnostics {
    pub normalized_selection: String,
    pub match_key: String,
    pub preferred_index: Option<usize>,
    pub candidates: Vec<Candidate>,
    pub chosen_index: Option<usize>,
    pub chosen_reason: String,
    pub searches: Vec<SearchTrace>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorReport {
    pub outcome: AnchorOutcome,
    pub diagnostics: AnchorDiagnostics,
}

impl AnchorReport {
    pub fn index(&self) -> Option<usize> {
        match self.outcome {
            AnchorOutcome::Found { index, .. } => Some(index),
            AnchorOutcome::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.index().is_some()
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolve `request` against `index`.
pub fn resolve(index: &NarrativeIndex, request: &AnchorRequest, config: &AnchorConfig) -> AnchorReport {
    let mut resolver = Resolver {
        keys: Vec::new(),
        tokens: &index.tokens,
        config,
        diagnostics: AnchorDiagnostics::default(),
        excluded_by_context: false,
    };

    if request.crosses_page {
        return resolver.miss(MissReason::CrossesPage, "selection spans a page boundary");
    }
    if index.tokens.is_empty() {
        return resolver.miss(MissReason::EmptyIndex, "narrative index has no tokens");
    }

    let Some(selection) = snap_selection(request) else {
        return resolver.miss(MissReason::EmptySelection, "selection has no word characters");
    };
    let key = match_key(&selection[0]);
    resolver.diagnostics.normalized_selection = selection.join(" ");
    resolver.diagnostics.match_key = key.clone();
    resolver.keys = index.tokens.iter().map(|t| match_key(t)).collect();

    let page_range = request
        .page
        .and_then(|page| index.page_range(page))
        .filter(|range| !range.is_empty());
    let preferred = page_range
        .clone()
        .and_then(|range| preferred_index(request, range, config));
    resolver.diagnostics.preferred_index = preferred;

    // 1. Probe sequence.
    if let Some(probe) = probe_keys(request, &selection, &key, config) {
        let mut scopes = Vec::new();
        if let Some(range) = page_range.clone() {
            scopes.push(range);
        }
        scopes.push(0..index.tokens.len());
        for scope in scopes {
            if let Some(found) = resolver.probe_search(&probe, scope, preferred) {
                return found;
            }
        }
    }

    let ambiguous = selection.len() == 1 && is_acronym_like(&selection[0]);
    let context = if ambiguous {
        capture_context(request, &selection[0], &key, &resolver.keys, preferred, config)
    } else {
        Context::default()
    };

    // 2. Page and position hint.
    if let (Some(range), Some(pref)) = (page_range.clone(), preferred) {
        let cap = config
            .min_distance_cap
            .max((config.distance_cap_ratio * range.len() as f32).round() as usize);
        let scope = pref.saturating_sub(cap)
            ..pref.saturating_add(cap).saturating_add(1).min(index.tokens.len());
        if let Some(found) =
            resolver.nearest(&key, scope, pref, &context, AnchorStage::PageHint)
        {
            return found;
        }
    }

    // 3. Window around the best preferred index so far.
    let center = preferred.or_else(|| page_range.map(|r| r.start + r.len() / 2));
    match center {
        Some(center) => {
            let scope = center.saturating_sub(config.window)
                ..center
                    .saturating_add(config.window)
                    .saturating_add(1)
                    .min(index.tokens.len());
            if let Some(found) = resolver.nearest(&key, scope, center, &context, AnchorStage::Window)
            {
                return found;
            }
        }
        None => {
            if let Some(found) = resolver.unique(&key, &context) {
                return found;
            }
        }
    }

    // 4. Nothing qualified.
    if resolver.excluded_by_context || !resolver.diagnostics.candidates.is_empty() {
        resolver.miss(MissReason::Ambiguous, "candidates could not be disambiguated")
    } else {
        resolver.miss(MissReason::NoCandidates, "no token matched the selection")
    }
}

struct Resolver<'a> {
    keys: Vec<String>,
    tokens: &'a [String],
    config: &'a AnchorConfig,
    diagnostics: AnchorDiagnostics,
    excluded_by_context: bool,
}

impl Resolver<'_> {
    fn miss(self, reason: MissReason, why: &str) -> AnchorReport {
        let mut diagnostics = self.diagnostics;
        diagnostics.chosen_index = None;
        diagnostics.chosen_reason = why.to_string();
        AnchorReport {
            outcome: AnchorOutcome::NotFound { reason },
            diagnostics,
        }
    }

    fn found(&mut self, index: usize, stage: AnchorStage, why: &str) -> AnchorReport {
        self.diagnostics.chosen_index = Some(index);
        self.diagnostics.chosen_reason = why.to_string();
        AnchorReport {
            outcome: AnchorOutcome::Found { index, stage },
            diagnostics: std::mem::take(&mut self.diagnostics),
        }
    }

    fn trace(&mut self, stage: AnchorStage, scope: &Range<usize>, hits: usize) {
        self.diagnostics.searches.push(SearchTrace {
            stage,
            start: scope.start,
            end: scope.end,
            hits,
        });
    }

    fn candidate(&self, index: usize, anchor: usize) -> Candidate {
        Candidate {
            index,
            token: self.tokens[index].clone(),
            distance: index.abs_diff(anchor),
            context_score: None,
        }
    }

    /// Find every start of `probe` whose first token lies in `scope`.
    fn probe_search(
        &mut self,
        probe: &[String],
        scope: Range<usize>,
        preferred: Option<usize>,
    ) -> Option<AnchorReport> {
        // Marker and punctuation tokens have empty keys and are skipped.
        let keyed: Vec<usize> = (0..self.keys.len())
            .filter(|&i| !self.keys[i].is_empty())
            .collect();

        let hits: Vec<usize> = keyed
            .iter()
            .enumerate()
            .filter(|&(_, &start)| scope.contains(&start))
            .filter(|&(k, _)| {
                probe.iter().enumerate().all(|(offset, wanted)| {
                    keyed
                        .get(k + offset)
                        .is_some_and(|&i| keys_match(wanted, &self.keys[i]))
                })
            })
            .map(|(_, &start)| start)
            .collect();

        self.trace(AnchorStage::Probe, &scope, hits.len());
        let anchor = preferred.unwrap_or(scope.start);
        self.diagnostics.candidates = hits
            .iter()
            .take(MAX_REPORTED_CANDIDATES)
            .map(|&h| self.candidate(h, anchor))
            .collect();

        // Without a position there is nothing to rank repeated sequences by.
        if preferred.is_none() {
            return match hits.as_slice() {
                [only] => {
                    let index = *only;
                    Some(self.found(index, AnchorStage::Probe, "only probe sequence in scope"))
                }
                _ => None,
            };
        }
        let best = hits
            .iter()
            .copied()
            .min_by_key(|&h| (h.abs_diff(anchor), h))?;
        Some(self.found(best, AnchorStage::Probe, "probe sequence nearest the preferred index"))
    }

    fn matches_in(&self, key: &str, scope: Range<usize>, anchor: usize) -> Vec<Candidate> {
        scope
            .filter(|&i| keys_match(key, &self.keys[i]))
            .map(|i| self.candidate(i, anchor))
            .collect()
    }

    /// Pick the best match in `scope` relative to `anchor`.
    fn nearest(
        &mut self,
        key: &str,
        scope: Range<usize>,
        anchor: usize,
        context: &Context,
        stage: AnchorStage,
    ) -> Option<AnchorReport> {
        let candidates = self.matches_in(key, scope.clone(), anchor);
        self.trace(stage, &scope, candidates.len());
        let chosen = self.choose(candidates, context)?;
        let reason = if context.is_empty() {
            "nearest match to the preferred index"
        } else {
            "best context-weighted match"
        };
        Some(self.found(chosen, stage, reason))
    }

    /// Whole-document search used when there is no positional hint: only a
    /// single surviving candidate is accepted.
    fn unique(&mut self, key: &str, context: &Context) -> Option<AnchorReport> {
        let scope = 0..self.keys.len();
        let candidates = self.matches_in(key, scope.clone(), 0);
        self.trace(AnchorStage::Window, &scope, candidates.len());

        let survivors = if context.is_empty() {
            candidates
        } else {
            self.score(candidates, context)
        };
        self.record(&survivors);
        match survivors.as_slice() {
            [only] => {
                let index = only.index;
                Some(self.found(index, AnchorStage::Window, "only match in the document"))
            }
            _ => None,
        }
    }

    fn choose(&mut self, candidates: Vec<Candidate>, context: &Context) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        if context.is_empty() {
            self.record(&candidates);
            return candidates
                .iter()
                .min_by_key(|c| (c.distance, c.index))
                .map(|c| c.index);
        }

        let scored = self.score(candidates, context);
        self.record(&scored);
        scored
            .iter()
            .min_by(|a, b| {
                let sa = a.context_score.unwrap_or(f32::MAX);
                let sb = b.context_score.unwrap_or(f32::MAX);
                sa.total_cmp(&sb).then(a.distance.cmp(&b.distance))
            })
            .map(|c| c.index)
    }

    /// Attach context scores and drop candidates sharing no context word.
    fn score(&mut self, candidates: Vec<Candidate>, context: &Context) -> Vec<Candidate> {
        let before = candidates.len();
        let radius = self.config.context_radius;
        let scored: Vec<Candidate> = candidates
            .into_iter()
            .filter_map(|mut c| {
                let agreements = context.agreements(&self.keys, c.index, radius);
                if agreements == 0 {
                    return None;
                }
                let mismatches = context.len() - agreements;
                c.context_score = Some(
                    c.distance as f32 - self.config.context_bonus * agreements as f32
                        + self.config.context_penalty * mismatches as f32,
                );
                Some(c)
            })
            .collect();
        if scored.len() < before {
            self.excluded_by_context = true;
        }
        scored
    }

    fn record(&mut self, candidates: &[Candidate]) {
        self.diagnostics.candidates = candidates
            .iter()
            .take(MAX_REPORTED_CANDIDATES)
            .cloned()
            .collect();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Words of the selection, or the nearest word when the selection is
/// punctuation only.
fn snap_selection(request: &AnchorRequest) -> Option<Vec<String>> {
    let selected: Vec<String> = tokens::words(&request.selection)
        .into_iter()
        .filter(|w| !match_key(w).is_empty())
        .map(str::to_string)
        .collect();
    if !selected.is_empty() {
        return Some(selected);
    }

    if let Some(raw) = request.raw_text.as_deref() {
        let needle = request.selection.trim();
        let position = if needle.is_empty() {
            None
        } else {
            raw.find(needle)
        };
        let mut spans: Vec<(usize, &str)> = word_spans(raw)
            .into_iter()
            .filter(|(_, w)| !match_key(w).is_empty())
            .collect();
        if let Some(pos) = position {
            spans.sort_by_key(|(start, w)| start.abs_diff(pos).min((start + w.len()).abs_diff(pos)));
        }
        if let Some((_, word)) = spans.first() {
            return Some(vec![word.to_string()]);
        }
    }

    request
        .probe
        .as_deref()
        .and_then(|probe| {
            tokens::words(probe)
                .into_iter()
                .find(|w| !match_key(w).is_empty())
        })
        .map(|w| vec![w.to_string()])
}

/// Byte offset and text of each whitespace-delimited word.
fn word_spans(text: &str) -> Vec<(usize, &str)> {
    text.split_whitespace()
        .map(|w| (w.as_ptr() as usize - text.as_ptr() as usize, w))
        .collect()
}

/// Token index suggested by the page-relative hints.
fn preferred_index(request: &AnchorRequest, page: Range<usize>, config: &AnchorConfig) -> Option<usize> {
    let last = page.len().checked_sub(1)?;
    let from_offset = request.offset.map(|o| page.start + o.min(last));
    let from_geometry = request
        .y_fraction
        .filter(|f| f.is_finite())
        .map(|f| page.start + (f.clamp(0.0, 1.0) * last as f32).round() as usize);

    match (from_offset, from_geometry) {
        (Some(offset), Some(geometry)) => {
            let limit = config.disagreement_ratio * page.len() as f32;
            if offset.abs_diff(geometry) as f32 > limit {
                Some(geometry)
            } else {
                Some(offset)
            }
        }
        (offset, geometry) => offset.or(geometry),
    }
}

/// Probe match keys trimmed to start at the selection token.
fn probe_keys(
    request: &AnchorRequest,
    selection: &[String],
    key: &str,
    config: &AnchorConfig,
) -> Option<Vec<String>> {
    let source: Vec<String> = match request.probe.as_deref() {
        Some(probe) => tokens::words(probe).into_iter().map(str::to_string).collect(),
        None if selection.len() >= 2 => selection.to_vec(),
        None => return None,
    };

    let keys: Vec<String> = source
        .iter()
        .map(|w| match_key(w))
        .filter(|k| !k.is_empty())
        .collect();
    let start = keys.iter().position(|k| keys_match(k, key))?;
    let trimmed: Vec<String> = keys
        .into_iter()
        .skip(start)
        .take(config.probe_max_tokens)
        .collect();

    (trimmed.len() >= 2).then_some(trimmed)
}

/// Context words on either side of an ambiguous selection.
#[derive(Debug, Default)]
struct Context {
    left: Vec<String>,
    right: Vec<String>,
}

impl Context {
    fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    fn agreements(&self, keys: &[String], index: usize, radius: usize) -> usize {
        let before: HashSet<&str> = keys[index.saturating_sub(radius)..index]
            .iter()
            .map(String::as_str)
            .collect();
        let end = (index + 1).saturating_add(radius).min(keys.len());
        let after: HashSet<&str> = keys[(index + 1).min(keys.len())..end]
            .iter()
            .map(String::as_str)
            .collect();
        self.left.iter().filter(|k| before.contains(k.as_str())).count()
            + self.right.iter().filter(|k| after.contains(k.as_str())).count()
    }
}

fn capture_context(
    request: &AnchorRequest,
    word: &str,
    key: &str,
    keys: &[String],
    preferred: Option<usize>,
    config: &AnchorConfig,
) -> Context {
    let radius = config.context_radius;

    if let Some(raw) = request.raw_text.as_deref() {
        let raw_keys: Vec<String> = tokens::words(raw)
            .into_iter()
            .map(match_key)
            .filter(|k| !k.is_empty())
            .collect();
        if raw_keys.len() > 1 {
            if let Some(at) = raw_keys.iter().position(|k| k == key || keys_match(k, key)) {
                return Context {
                    left: raw_keys[at.saturating_sub(radius)..at].to_vec(),
                    right: raw_keys[at + 1..(at + 1).saturating_add(radius).min(raw_keys.len())].to_vec(),
                };
            }
        }
    }

    let Some(pref) = preferred else {
        return Context::default();
    };
    log::trace!("capturing index context around {pref} for {word:?}");
    let non_empty = |slice: &[String]| -> Vec<String> {
        slice.iter().filter(|k| !k.is_empty()).cloned().collect()
    };
    Context {
        left: non_empty(&keys[pref.saturating_sub(radius)..pref]),
        right: non_empty(&keys[(pref + 1).min(keys.len())..(pref + 1).saturating_add(radius).min(keys.len())]),
    }
}
