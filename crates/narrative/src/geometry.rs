//! Geometric text item model: run sanitation and body-font estimation.

use crate::types::{GeometricTextRun, PageGeometry, PageRuns};

/// Below this many runs a page's own median is too noisy and the
/// document-wide estimate is used instead.
const MIN_RUNS_FOR_PAGE_MEDIAN: usize = 8;

/// Fold an angle in degrees into 0..=90 so that mirrored orientations
/// (30°, 150°, 210°, 330°) compare equal.
pub fn fold_rotation(degrees: f32) -> f32 {
    let r = degrees.rem_euclid(180.0);
    if r > 90.0 {
        180.0 - r
    } else {
        r
    }
}

/// Normalize one run, or drop it if it cannot be placed on the page.
pub fn sanitize_run(run: GeometricTextRun) -> Option<GeometricTextRun> {
    if run.content.trim().is_empty() {
        return None;
    }
    let finite = [run.x, run.y, run.width, run.font_size]
        .iter()
        .all(|v| v.is_finite());
    if !finite {
        return None;
    }
    let font_size = run.font_size.abs();
    if font_size == 0.0 && run.width == 0.0 {
        return None;
    }
    let rotation = if run.rotation.is_finite() {
        fold_rotation(run.rotation)
    } else {
        0.0
    };
    Some(GeometricTextRun {
        width: run.width.abs(),
        font_size,
        rotation,
        ..run
    })
}

pub fn sanitize_page(page: PageRuns) -> PageRuns {
    let runs = page.runs.into_iter().filter_map(sanitize_run).collect();
    PageRuns { runs, ..page }
}

/// Median of the positive values, if any.
pub fn median(values: impl IntoIterator<Item = f32>) -> Option<f32> {
    let mut sorted: Vec<f32> = values.into_iter().filter(|v| *v > 0.0).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

pub fn body_font_size(runs: &[GeometricTextRun]) -> Option<f32> {
    median(runs.iter().map(|r| r.font_size))
}

/// Median font size over every run in the document, zero if none.
pub fn document_body_font(pages: &[PageRuns]) -> f32 {
    median(pages.iter().flat_map(|p| p.runs.iter().map(|r| r.font_size))).unwrap_or(0.0)
}

pub fn page_geometry(page: &PageRuns, document_body: f32) -> PageGeometry {
    let own = if page.runs.len() >= MIN_RUNS_FOR_PAGE_MEDIAN {
        body_font_size(&page.runs)
    } else {
        None
    };
    PageGeometry {
        width: page.width,
        height: page.height,
        body_font_size: own.unwrap_or(document_body),
    }
}
