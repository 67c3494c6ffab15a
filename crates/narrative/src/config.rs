//! Extraction thresholds.
//!
//! Every value here was tuned against multi-column academic papers and is
//! exposed as configuration so it can be re-tuned for other corpora. All
//! tables deserialize with defaults, so a partial TOML table is enough.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Only the first `max_pages` pages are extracted.
    pub max_pages: usize,
    /// Remove affiliation and correspondence lines from page 1 of
    /// documents that look scholarly.
    pub front_matter: bool,
    /// Samples kept per exclusion reason and page in the report.
    pub report_samples: usize,
    pub noise: NoiseConfig,
    pub lines: LineConfig,
    pub columns: ColumnConfig,
    pub boilerplate: BoilerplateConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_pages: 500,
            front_matter: true,
            report_samples: 3,
            noise: NoiseConfig::default(),
            lines: LineConfig::default(),
            columns: ColumnConfig::default(),
            boilerplate: BoilerplateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub body_box: bool,
    pub body_box_header: f32,
    pub body_box_footer: f32,
    pub body_box_margin: f32,

    pub stamps: bool,
    /// Cells per page axis.
    pub stamp_grid: u16,
    /// Shorter signatures are too common to be treated as stamps.
    pub stamp_min_signature: usize,
    pub stamp_min_pages: usize,

    pub watermarks: bool,
    pub watermark_min_degrees: f32,
    pub watermark_max_degrees: f32,

    pub overlays: bool,
    pub overlay_max_chars: usize,
    pub overlay_min_ratio: f32,
    pub overlay_max_ratio: f32,
    pub overlay_min_degrees: f32,
    /// A word at least this long marks a run as real text.
    pub overlay_long_word: usize,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            body_box: true,
            body_box_header: 0.12,
            body_box_footer: 0.10,
            body_box_margin: 0.08,
            stamps: true,
            stamp_grid: 100,
            stamp_min_signature: 6,
            stamp_min_pages: 2,
            watermarks: true,
            watermark_min_degrees: 12.0,
            watermark_max_degrees: 78.0,
            overlays: true,
            overlay_max_chars: 12,
            overlay_min_ratio: 0.62,
            overlay_max_ratio: 1.9,
            overlay_min_degrees: 3.0,
            overlay_long_word: 6,
        }
    }
}

/// Line building, glue and classification. Ratios are multiples of the
/// body font size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub line_tolerance_ratio: f32,
    pub min_line_tolerance: f32,
    pub gutter_ratio: f32,
    pub min_gutter: f32,

    pub merge_scripts: bool,
    pub script_max_chars: usize,
    pub script_min_ratio: f32,
    pub script_max_ratio: f32,
    pub script_max_dy_ratio: f32,
    pub script_max_dx_ratio: f32,

    pub word_gap_ratio: f32,
    pub glyph_gap_ratio: f32,
    /// Glue rules only fire across gaps up to this size.
    pub glue_max_gap_ratio: f32,

    pub drop_boilerplate: bool,
    pub route_equations: bool,
    pub annotate_headings: bool,
    pub heading_font_boost: f32,
    pub heading_max_words: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            line_tolerance_ratio: 0.45,
            min_line_tolerance: 1.5,
            gutter_ratio: 6.5,
            min_gutter: 24.0,
            merge_scripts: true,
            script_max_chars: 10,
            script_min_ratio: 0.45,
            script_max_ratio: 1.15,
            script_max_dy_ratio: 0.9,
            script_max_dx_ratio: 2.0,
            word_gap_ratio: 0.10,
            glyph_gap_ratio: 0.16,
            glue_max_gap_ratio: 0.35,
            drop_boilerplate: true,
            route_equations: true,
            annotate_headings: true,
            heading_font_boost: 1.12,
            heading_max_words: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub full_width_ratio: f32,
    pub full_width_left: f32,
    pub full_width_right: f32,
    pub min_midpoints: usize,
    pub min_per_side: usize,
    pub min_gap_ratio: f32,
    pub min_gap_font_ratio: f32,
    /// Segments shorter than this do not vote on the layout.
    pub min_segment_chars: usize,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            full_width_ratio: 0.78,
            full_width_left: 0.10,
            full_width_right: 0.90,
            min_midpoints: 18,
            min_per_side: 7,
            min_gap_ratio: 0.18,
            min_gap_font_ratio: 10.0,
            min_segment_chars: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoilerplateConfig {
    pub enabled: bool,
    /// Lines with `y_norm <= header_band` are header candidates.
    pub header_band: f32,
    /// Lines with `y_norm >= 1 - footer_band` are footer candidates.
    pub footer_band: f32,
    pub header_fraction: f32,
    pub footer_fraction: f32,
    pub header_floor: usize,
    pub footer_floor: usize,
    pub min_letters: usize,
    pub max_digit_share: f32,
    pub min_alnum_density: f32,
}

impl Default for BoilerplateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_band: 0.12,
            footer_band: 0.12,
            header_fraction: 0.12,
            footer_fraction: 0.08,
            header_floor: 3,
            footer_floor: 2,
            min_letters: 4,
            max_digit_share: 0.5,
            min_alnum_density: 0.5,
        }
    }
}
