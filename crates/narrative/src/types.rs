use serde::{Deserialize, Serialize};

use lector_core::index::Exclusion;

// ---------------------------------------------------------------------------
// Runs and pages
// ---------------------------------------------------------------------------

/// A positioned text fragment as delivered by a rendering backend.
///
/// Coordinates are page space with the origin at the top-left corner: `x`
/// grows rightwards and `y` is the baseline's distance from the top edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricTextRun {
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    /// Degrees, counter-clockwise.
    pub rotation: f32,
}

impl GeometricTextRun {
    pub fn new(content: impl Into<String>, x: f32, y: f32, width: f32, font_size: f32) -> Self {
        Self {
            content: content.into(),
            x,
            y,
            width,
            font_size,
            rotation: 0.0,
        }
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// The raw runs of one page plus its dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRuns {
    /// 1-based page number.
    pub number: usize,
    pub width: f32,
    pub height: f32,
    pub runs: Vec<GeometricTextRun>,
}

impl PageRuns {
    pub fn new(number: usize, width: f32, height: f32, runs: Vec<GeometricTextRun>) -> Self {
        Self {
            number,
            width,
            height,
            runs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    /// Median run font size; zero when nothing on the page or in the
    /// document had a usable size.
    pub body_font_size: f32,
}

// ---------------------------------------------------------------------------
// Segments and lines
// ---------------------------------------------------------------------------

/// A horizontal stretch of runs on one raw line, bounded by gutters.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Runs sorted left to right.
    pub runs: Vec<GeometricTextRun>,
    /// Index of the raw line this segment came from, top to bottom.
    pub row: usize,
    pub x0: f32,
    pub x1: f32,
    /// Mean baseline.
    pub y: f32,
    /// Size of the font carrying the most characters.
    pub font_size: f32,
}

impl Segment {
    pub fn from_runs(mut runs: Vec<GeometricTextRun>, row: usize) -> Self {
        runs.sort_by(|a, b| a.x.total_cmp(&b.x));
        let x0 = runs.iter().map(|r| r.x).fold(f32::INFINITY, f32::min);
        let x1 = runs.iter().map(|r| r.right()).fold(f32::NEG_INFINITY, f32::max);
        let y = if runs.is_empty() {
            0.0
        } else {
            runs.iter().map(|r| r.y).sum::<f32>() / runs.len() as f32
        };
        let font_size = dominant_font_size(&runs);
        Self {
            runs,
            row,
            x0: if x0.is_finite() { x0 } else { 0.0 },
            x1: if x1.is_finite() { x1 } else { 0.0 },
            y,
            font_size,
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn mid(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Run contents concatenated without separators.
    pub fn compact_text(&self) -> String {
        self.runs
            .iter()
            .flat_map(|r| r.content.chars())
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    pub fn char_count(&self) -> usize {
        self.runs
            .iter()
            .map(|r| r.content.chars().filter(|c| !c.is_whitespace()).count())
            .sum()
    }
}

fn dominant_font_size(runs: &[GeometricTextRun]) -> f32 {
    let mut weights: Vec<(f32, usize)> = Vec::new();
    for run in runs {
        let chars = run.content.chars().count();
        match weights
            .iter_mut()
            .find(|(size, _)| (size - run.font_size).abs() < 0.25)
        {
            Some((_, count)) => *count += chars,
            None => weights.push((run.font_size, chars)),
        }
    }
    weights
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(size, _)| size)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineKind {
    Ordinary,
    Heading(u8),
    Callout,
}

/// A cleaned line of narrative text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Cleaned text, prefixed with a heading or callout marker if any.
    pub text: String,
    /// Fingerprint of the cleaned text before annotation.
    pub signature: String,
    pub y_norm: f32,
    pub token_count: usize,
    pub kind: LineKind,
}

/// Output of the per-page pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLines {
    /// 1-based page number.
    pub number: usize,
    pub lines: Vec<Line>,
    pub exclusions: Vec<Exclusion>,
    pub two_column: bool,
}
