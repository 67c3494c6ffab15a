//! Run-level noise filter: body box, stationary stamps, diagonal
//! watermarks and figure overlays.
//!
//! Rules are cumulative and checked in that order; the first rule that
//! fires names the exclusion reason. A rule that cannot compute its input
//! (zero page size, zero body font) does not fire.

use std::collections::{HashMap, HashSet};

use lector_core::index::{Exclusion, ExclusionReason};

use crate::config::NoiseConfig;
use crate::lines::glue::is_script_fragment;
use crate::types::{GeometricTextRun, PageGeometry, PageRuns};

type StampKey = (String, u16, u16);

/// Runs that sit at the same spot with the same text on several pages.
#[derive(Debug, Clone, Default)]
pub struct StampIndex {
    stamps: HashSet<StampKey>,
}

impl StampIndex {
    /// Index every (signature, grid cell) pair seen on at least
    /// `stamp_min_pages` distinct pages.
    pub fn build(pages: &[PageRuns], config: &NoiseConfig) -> Self {
        if !config.stamps {
            return Self::default();
        }

        let mut seen: HashMap<StampKey, HashSet<usize>> = HashMap::new();
        for page in pages {
            for run in &page.runs {
                if let Some(key) = stamp_key(run, page.width, page.height, config) {
                    seen.entry(key).or_default().insert(page.number);
                }
            }
        }

        let stamps: HashSet<StampKey> = seen
            .into_iter()
            .filter(|(_, pages)| pages.len() >= config.stamp_min_pages)
            .map(|(key, _)| key)
            .collect();
        if !stamps.is_empty() {
            log::debug!("indexed {} repeated stationary stamps", stamps.len());
        }
        Self { stamps }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    fn contains(&self, run: &GeometricTextRun, geometry: &PageGeometry, config: &NoiseConfig) -> bool {
        stamp_key(run, geometry.width, geometry.height, config)
            .is_some_and(|key| self.stamps.contains(&key))
    }
}

/// Lower-cased alphanumerics with digits folded to `#`.
pub fn stamp_signature(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_ascii_digit() { '#' } else { c })
        .collect()
}

fn stamp_key(run: &GeometricTextRun, width: f32, height: f32, config: &NoiseConfig) -> Option<StampKey> {
    if width <= 0.0 || height <= 0.0 || config.stamp_grid == 0 {
        return None;
    }
    let signature = stamp_signature(&run.content);
    if signature.chars().count() < config.stamp_min_signature {
        return None;
    }
    let cell = |value: f32, extent: f32| {
        let grid = config.stamp_grid as f32;
        ((value / extent).clamp(0.0, 1.0) * grid).floor().min(grid - 1.0) as u16
    };
    Some((signature, cell(run.x, width), cell(run.y, height)))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoiseOutcome {
    pub runs: Vec<GeometricTextRun>,
    pub exclusions: Vec<Exclusion>,
}

/// Apply the noise rules to one sanitized page.
pub fn filter_runs(
    page: PageRuns,
    geometry: &PageGeometry,
    stamps: &StampIndex,
    config: &NoiseConfig,
) -> NoiseOutcome {
    let mut outcome = NoiseOutcome::default();
    for run in page.runs {
        match noise_reason(&run, geometry, stamps, config) {
            Some(reason) => outcome.exclusions.push(Exclusion {
                page: page.number,
                reason,
                text: run.content,
            }),
            None => outcome.runs.push(run),
        }
    }
    outcome
}

pub fn noise_reason(
    run: &GeometricTextRun,
    geometry: &PageGeometry,
    stamps: &StampIndex,
    config: &NoiseConfig,
) -> Option<ExclusionReason> {
    if config.body_box && outside_body_box(run, geometry, config) {
        return Some(ExclusionReason::BodyBox);
    }
    if config.stamps && stamps.contains(run, geometry, config) {
        return Some(ExclusionReason::RepeatedStamp);
    }
    if config.watermarks
        && run.rotation > config.watermark_min_degrees
        && run.rotation < config.watermark_max_degrees
    {
        return Some(ExclusionReason::Watermark);
    }
    if config.overlays && is_overlay(run, geometry.body_font_size, config) {
        return Some(ExclusionReason::FigureOverlay);
    }
    None
}

fn outside_body_box(run: &GeometricTextRun, geometry: &PageGeometry, config: &NoiseConfig) -> bool {
    if geometry.width <= 0.0 || geometry.height <= 0.0 {
        return false;
    }
    let x = run.x / geometry.width;
    let y = run.y / geometry.height;
    y < config.body_box_header
        || y > 1.0 - config.body_box_footer
        || x < config.body_box_margin
        || x > 1.0 - config.body_box_margin
}

/// Short chart/axis labels: tiny or huge relative to body text, or turned,
/// and without a real word in them. Superscript charges and qualifiers are
/// left for the script merge.
fn is_overlay(run: &GeometricTextRun, body: f32, config: &NoiseConfig) -> bool {
    let chars = run.content.chars().filter(|c| !c.is_whitespace()).count();
    if chars > config.overlay_max_chars || is_script_fragment(&run.content) {
        return false;
    }
    let has_long_word = run
        .content
        .split(|c: char| !c.is_alphabetic())
        .any(|w| w.chars().count() >= config.overlay_long_word);
    if has_long_word {
        return false;
    }

    let extreme_size = body > 0.0 && {
        let ratio = run.font_size / body;
        ratio < config.overlay_min_ratio || ratio > config.overlay_max_ratio
    };
    let rotated = run.rotation >= config.overlay_min_degrees;
    extreme_size || rotated
}
