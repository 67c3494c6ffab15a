//! Document-wide header/footer signature learning.
//!
//! Pass 1 (the per-page line builder) runs first on every page. This module
//! then learns which edge-band lines repeat across the document and strips
//! them, but only from the band they were learned in, so the same words in
//! a page body survive.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use lector_core::index::{Exclusion, ExclusionReason};

use crate::config::BoilerplateConfig;
use crate::types::{Line, PageLines};

/// Fingerprint of a line: lower-cased, digits folded to `#`, whitespace
/// collapsed. Punctuation is kept so density checks can see it.
pub fn signature(text: &str) -> String {
    let folded: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_ascii_digit() { '#' } else { c })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce a signature to the part that stays stable across pages, or
/// reject it as unusable.
///
/// Leading and trailing page-number placeholders are dropped, so "12 Title"
/// and "Title 13" share the canonical form "title".
pub fn canonicalize(signature: &str, config: &BoilerplateConfig) -> Option<String> {
    let is_placeholder = |t: &&str| t.chars().all(|c| c == '#' || c == '.' || c == '-');
    let tokens: Vec<&str> = signature.split_whitespace().collect();
    let start = tokens.iter().position(|t| !is_placeholder(t))?;
    let end = tokens.iter().rposition(|t| !is_placeholder(t))?;
    let canonical = tokens[start..=end].join(" ");

    let letters = canonical.chars().filter(|c| c.is_alphabetic()).count();
    let digits = canonical.chars().filter(|c| *c == '#').count();
    let alnum = letters + digits;
    let visible = canonical.chars().filter(|c| !c.is_whitespace()).count();

    if letters < config.min_letters {
        return None;
    }
    if digits as f32 / alnum as f32 > config.max_digit_share {
        return None;
    }
    if (alnum as f32) / (visible.max(1) as f32) < config.min_alnum_density {
        return None;
    }
    Some(canonical)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureSet {
    pub header: HashSet<String>,
    pub footer: HashSet<String>,
    pub header_band: f32,
    pub footer_band: f32,
}

impl SignatureSet {
    fn in_header_band(&self, line: &Line) -> bool {
        line.y_norm <= self.header_band
    }

    fn in_footer_band(&self, line: &Line) -> bool {
        line.y_norm >= 1.0 - self.footer_band
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.footer.is_empty()
    }

    /// Why `line` is a learned header or footer, if it is one.
    pub fn edge_reason(&self, line: &Line, config: &BoilerplateConfig) -> Option<ExclusionReason> {
        let canonical = canonicalize(&line.signature, config)?;
        if self.in_header_band(line) && self.header.contains(&canonical) {
            Some(ExclusionReason::Header)
        } else if self.in_footer_band(line) && self.footer.contains(&canonical) {
            Some(ExclusionReason::Footer)
        } else {
            None
        }
    }
}

/// Learn header and footer signatures from every page's edge bands.
pub fn learn(pages: &[PageLines], config: &BoilerplateConfig) -> SignatureSet {
    let mut set = SignatureSet {
        header_band: config.header_band,
        footer_band: config.footer_band,
        ..SignatureSet::default()
    };
    if !config.enabled {
        return set;
    }

    let mut header_pages: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
    let mut footer_pages: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();

    for page in pages {
        for line in &page.lines {
            let Some(canonical) = canonicalize(&line.signature, config) else {
                continue;
            };
            if set.in_header_band(line) {
                header_pages
                    .entry(canonical.clone())
                    .or_default()
                    .insert(page.number);
            }
            if set.in_footer_band(line) {
                footer_pages.entry(canonical).or_default().insert(page.number);
            }
        }
    }

    let page_count = pages.len();
    set.header = accept(header_pages, page_count, config.header_fraction, config.header_floor);
    set.footer = accept(footer_pages, page_count, config.footer_fraction, config.footer_floor);

    log::debug!(
        "learned {} header and {} footer signatures over {} pages",
        set.header.len(),
        set.footer.len(),
        page_count
    );
    set
}

fn accept(
    occurrences: BTreeMap<String, BTreeSet<usize>>,
    page_count: usize,
    fraction: f32,
    floor: usize,
) -> HashSet<String> {
    let minimum = floor.max((fraction * page_count as f32).ceil() as usize);
    occurrences
        .into_iter()
        .filter(|(_, pages)| recurs(pages, minimum))
        .map(|(canonical, _)| canonical)
        .collect()
}

fn recurs(pages: &BTreeSet<usize>, minimum: usize) -> bool {
    let ordered: Vec<usize> = pages.iter().copied().collect();
    let consecutive = ordered.windows(2).any(|w| w[1] == w[0] + 1);
    let odd = ordered.iter().filter(|p| *p % 2 == 1).count();
    let same_parity = odd >= 2 || ordered.len() - odd >= 2;
    consecutive || same_parity || ordered.len() >= minimum
}

/// Remove learned header/footer lines from the page's own edge bands.
pub fn strip(page: PageLines, set: &SignatureSet, config: &BoilerplateConfig) -> PageLines {
    if set.is_empty() {
        return page;
    }

    let PageLines {
        number,
        lines,
        mut exclusions,
        two_column,
    } = page;

    let mut kept = Vec::with_capacity(lines.len());
    for line in lines {
        match set.edge_reason(&line, config) {
            Some(reason) => exclusions.push(Exclusion {
                page: number,
                reason,
                text: line.text,
            }),
            None => kept.push(line),
        }
    }

    PageLines {
        number,
        lines: kept,
        exclusions,
        two_column,
    }
}
