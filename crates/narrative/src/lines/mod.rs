//! Line builder: raw lines, column segments, glyph joining, cleanup and
//! classification.
//!
//! Every stage takes a list and returns a fresh list, so stages can be
//! tested and reordered independently.

pub mod classify;
pub mod cleanup;
pub mod glue;

use lector_core::index::ExclusionReason;

use crate::boilerplate::signature;
use crate::config::LineConfig;
use crate::types::{GeometricTextRun, Line, LineKind, PageGeometry, Segment};

use self::classify::LineClass;

/// Result of turning one segment into narrative text.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Kept(Line),
    Excluded(ExclusionReason, String),
    Empty,
}

/// Cluster runs into raw lines by baseline.
///
/// Runs are visited in (baseline, x) order; a run joins the current line
/// while its baseline stays within the tolerance of the line's running mean.
pub fn cluster_rows(mut runs: Vec<GeometricTextRun>, body: f32, config: &LineConfig) -> Vec<Vec<GeometricTextRun>> {
    let tolerance = config.min_line_tolerance.max(config.line_tolerance_ratio * body);
    runs.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<Vec<GeometricTextRun>> = Vec::new();
    let mut mean = 0.0_f32;
    for run in runs {
        match rows.last_mut() {
            Some(row) if (run.y - mean).abs() <= tolerance => {
                mean = (mean * row.len() as f32 + run.y) / (row.len() + 1) as f32;
                row.push(run);
            }
            _ => {
                mean = run.y;
                rows.push(vec![run]);
            }
        }
    }

    for row in &mut rows {
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    rows
}

/// Split one raw line wherever the gap between runs exceeds the gutter.
pub fn split_segments(row: Vec<GeometricTextRun>, row_index: usize, body: f32, config: &LineConfig) -> Vec<Segment> {
    let gutter = config.min_gutter.max(config.gutter_ratio * body);
    let mut segments = Vec::new();
    let mut current: Vec<GeometricTextRun> = Vec::new();
    let mut right_edge = f32::NEG_INFINITY;

    for run in row {
        if !current.is_empty() && run.x - right_edge > gutter {
            segments.push(Segment::from_runs(std::mem::take(&mut current), row_index));
            right_edge = f32::NEG_INFINITY;
        }
        right_edge = right_edge.max(run.right());
        current.push(run);
    }
    if !current.is_empty() {
        segments.push(Segment::from_runs(current, row_index));
    }
    segments
}

/// Runs to segments: rows, gutter splits, then script merging.
pub fn build_segments(runs: Vec<GeometricTextRun>, body: f32, config: &LineConfig) -> Vec<Segment> {
    let segments = cluster_rows(runs, body, config)
        .into_iter()
        .enumerate()
        .flat_map(|(index, row)| split_segments(row, index, body, config))
        .collect();
    glue::merge_scripts(segments, body, config)
}

/// Join, clean and classify one segment.
pub fn build_line(segment: &Segment, geometry: &PageGeometry, config: &LineConfig) -> LineOutcome {
    let body = geometry.body_font_size;
    let text = cleanup::clean_line(&glue::segment_text(segment, body, config));
    if text.is_empty() {
        return LineOutcome::Empty;
    }

    let class = classify::classify(&text, segment.font_size, body, config);
    if let Some(reason) = class.drop_reason() {
        return LineOutcome::Excluded(reason, text);
    }
    let kind = match class {
        LineClass::Heading(level) => LineKind::Heading(level),
        LineClass::Callout => LineKind::Callout,
        _ => LineKind::Ordinary,
    };

    let y_norm = if geometry.height > 0.0 {
        (segment.y / geometry.height).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let signature = signature(&text);
    let annotated = classify::annotate(&text, class);
    LineOutcome::Kept(Line {
        token_count: annotated.split_whitespace().count(),
        text: annotated,
        signature,
        y_norm,
        kind,
    })
}
