//! Content-stream text state machine producing top-origin runs.

use super::backend::{ContentOp, PageBox, PageId, PdfBackend, PdfValue};
use crate::types::{GeometricTextRun, PageRuns};
use crate::NarrativeError;

/// Glyph widths are not resolved; each character is assumed to be this
/// fraction of the font size wide.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;
/// Kerning larger than this fraction of an average glyph reads as a space.
const KERNING_SPACE_RATIO: f32 = 0.3;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `a × b` in PDF row-vector convention.
fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn matrix_from(op: &ContentOp) -> Option<Matrix> {
    let mut m = IDENTITY;
    for (i, slot) in m.iter_mut().enumerate() {
        *slot = op.number(i)?;
    }
    Some(m)
}

#[derive(Debug, Clone)]
struct TextState {
    font_key: Vec<u8>,
    font_size: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
    ctm: Matrix,
    saved: Vec<Matrix>,
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_size: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            ctm: IDENTITY,
            saved: Vec::new(),
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    /// Text space to device space.
    fn rendering_matrix(&self) -> Matrix {
        multiply(&self.text_matrix, &self.ctm)
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    fn advance(&mut self, dx: f32) {
        self.text_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, dx, 0.0], &self.text_matrix);
    }

    /// Advance past `text` and return the displacement in text space.
    fn advance_after_show(&mut self, text: &str) -> f32 {
        let glyph = self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale;
        let dx: f32 = text
            .chars()
            .map(|c| glyph + self.char_spacing + if c == ' ' { self.word_spacing } else { 0.0 })
            .sum();
        self.advance(dx);
        dx
    }

    /// Place `text` at the current position on a page with a top-left origin.
    fn place(&self, text: String, width_text_space: f32, page: &PageBox) -> GeometricTextRun {
        let m = self.rendering_matrix();
        let x = self.rise * m[2] + m[4];
        let y = self.rise * m[3] + m[5];
        let horizontal = (m[0] * m[0] + m[1] * m[1]).sqrt();
        let vertical = (m[2] * m[2] + m[3] * m[3]).sqrt();
        GeometricTextRun {
            content: text,
            x: x - page.left,
            y: page.top - y,
            width: width_text_space * horizontal,
            font_size: self.font_size * vertical,
            rotation: m[1].atan2(m[0]).to_degrees(),
        }
    }
}

/// Walk one page's content stream and collect its text runs.
///
/// Handles BT/ET, cm, q/Q, Tf, Tm, Td, TD, T*, TL, Tc, Tw, Tz, Ts, Tj, TJ,
/// `'` and `"`. Everything else is ignored.
pub fn page_runs(backend: &dyn PdfBackend, page_id: PageId, number: usize) -> Result<PageRuns, NarrativeError> {
    let page = backend.page_box(page_id);
    let ops = backend.page_ops(page_id)?;
    let mut state = TextState::default();
    let mut runs = Vec::new();

    let show = |operand: &PdfValue, state: &mut TextState, runs: &mut Vec<GeometricTextRun>| {
        let PdfValue::Str(bytes) = operand else {
            return;
        };
        let text = backend.decode_text(page_id, &state.font_key, bytes);
        let before = state.clone();
        let dx = state.advance_after_show(&text);
        if !text.trim().is_empty() {
            runs.push(before.place(text, dx, &page));
        }
    };

    for op in &ops {
        match op.operator.as_str() {
            "q" => state.saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = state.saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix_from(op) {
                    state.ctm = multiply(&m, &state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let (Some(PdfValue::Name(key)), Some(size)) = (op.operands.first(), op.number(1)) {
                    state.font_key = key.clone();
                    state.font_size = size;
                }
            }
            "Tm" => {
                if let Some(m) = matrix_from(op) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "T*" => state.next_line(),
            "TL" => state.leading = op.number(0).unwrap_or(state.leading),
            "Tc" => state.char_spacing = op.number(0).unwrap_or(state.char_spacing),
            "Tw" => state.word_spacing = op.number(0).unwrap_or(state.word_spacing),
            "Tz" => {
                if let Some(scale) = op.number(0) {
                    state.horiz_scale = scale / 100.0;
                }
            }
            "Ts" => state.rise = op.number(0).unwrap_or(state.rise),
            "Tj" => {
                if let Some(operand) = op.operands.first() {
                    show(operand, &mut state, &mut runs);
                }
            }
            "'" => {
                state.next_line();
                if let Some(operand) = op.operands.first() {
                    show(operand, &mut state, &mut runs);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac), Some(operand)) = (op.number(0), op.number(1), op.operands.get(2)) {
                    state.word_spacing = aw;
                    state.char_spacing = ac;
                    state.next_line();
                    show(operand, &mut state, &mut runs);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(items)) = op.operands.first() {
                    show_array(items, backend, page_id, &page, &mut state, &mut runs);
                }
            }
            _ => {}
        }
    }

    Ok(PageRuns::new(number, page.width(), page.height(), runs))
}

/// `TJ`: strings with kerning adjustments in thousandths of text space.
/// Contiguous strings become one run; large negative kerning inserts a
/// space.
fn show_array(
    items: &[PdfValue],
    backend: &dyn PdfBackend,
    page_id: PageId,
    page: &PageBox,
    state: &mut TextState,
    runs: &mut Vec<GeometricTextRun>,
) {
    let start = state.clone();
    let mut text = String::new();
    let mut width = 0.0;

    for item in items {
        match item {
            PdfValue::Str(bytes) => {
                let fragment = backend.decode_text(page_id, &state.font_key, bytes);
                width += state.advance_after_show(&fragment);
                text.push_str(&fragment);
            }
            other => {
                let Some(adjust) = other.as_number() else {
                    continue;
                };
                let dx = -adjust / 1000.0 * state.font_size * state.horiz_scale;
                let threshold =
                    state.font_size * APPROX_CHAR_WIDTH_RATIO * state.horiz_scale * KERNING_SPACE_RATIO;
                if dx > threshold && !text.is_empty() && !text.ends_with(' ') {
                    text.push(' ');
                }
                state.advance(dx);
                width += dx;
            }
        }
    }

    let trimmed = text.trim_end();
    if !trimmed.trim_start().is_empty() {
        runs.push(start.place(trimmed.to_string(), width, page));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::parser::backend::decode_text_simple;

    struct MockBackend {
        page_box: PageBox,
        ops: Vec<ContentOp>,
    }

    impl PdfBackend for MockBackend {
        fn pages(&self) -> BTreeMap<u32, PageId> {
            BTreeMap::from([(1, (1, 0))])
        }

        fn page_box(&self, _page: PageId) -> PageBox {
            self.page_box
        }

        fn page_ops(&self, _page: PageId) -> Result<Vec<ContentOp>, NarrativeError> {
            Ok(self.ops.clone())
        }

        fn decode_text(&self, _page: PageId, _font_key: &[u8], bytes: &[u8]) -> String {
            decode_text_simple(bytes)
        }
    }

    fn make_op(operator: &str, operands: Vec<PdfValue>) -> ContentOp {
        ContentOp {
            operator: operator.to_string(),
            operands,
        }
    }

    fn numbers(values: &[f32]) -> Vec<PdfValue> {
        values.iter().map(|v| PdfValue::Number(*v)).collect()
    }

    fn tf_op(size: f32) -> ContentOp {
        make_op("Tf", vec![PdfValue::Name(b"F1".to_vec()), PdfValue::Number(size)])
    }

    fn tm_op(m: [f32; 6]) -> ContentOp {
        make_op("Tm", numbers(&m))
    }

    fn tj_op(text: &str) -> ContentOp {
        make_op("Tj", vec![PdfValue::Str(text.as_bytes().to_vec())])
    }

    fn extract(ops: Vec<ContentOp>) -> PageRuns {
        let backend = MockBackend {
            page_box: PageBox::LETTER,
            ops,
        };
        page_runs(&backend, (1, 0), 1).unwrap()
    }

    #[test]
    fn test_simple_show_is_flipped_to_top_origin() {
        let page = extract(vec![
            make_op("BT", vec![]),
            tf_op(12.0),
            tm_op([1.0, 0.0, 0.0, 1.0, 72.0, 700.0]),
            tj_op("Hello World"),
            make_op("ET", vec![]),
        ]);
        assert_eq!((page.width, page.height), (612.0, 792.0));
        assert_eq!(page.runs.len(), 1);
        let run = &page.runs[0];
        assert_eq!(run.content, "Hello World");
        assert!((run.x - 72.0).abs() < 0.01);
        assert!((run.y - 92.0).abs() < 0.01);
        assert!((run.font_size - 12.0).abs() < 0.01);
        assert!((run.width - 66.0).abs() < 0.01);
        assert_eq!(run.rotation, 0.0);
    }

    #[test]
    fn test_td_and_leading_move_lines_down() {
        let page = extract(vec![
            make_op("BT", vec![]),
            tf_op(10.0),
            make_op("Td", numbers(&[50.0, 700.0])),
            tj_op("first"),
            make_op("TL", numbers(&[14.0])),
            make_op("T*", vec![]),
            tj_op("second"),
            make_op("'", vec![PdfValue::Str(b"third".to_vec())]),
        ]);
        let ys: Vec<f32> = page.runs.iter().map(|r| r.y).collect();
        assert_eq!(ys, vec![92.0, 106.0, 120.0]);
        assert!(page.runs.iter().all(|r| (r.x - 50.0).abs() < 0.01));
    }

    #[test]
    fn test_cm_scales_font_and_position() {
        let page = extract(vec![
            make_op("q", vec![]),
            make_op("cm", numbers(&[2.0, 0.0, 0.0, 2.0, 0.0, 0.0])),
            make_op("BT", vec![]),
            tf_op(5.0),
            tm_op([1.0, 0.0, 0.0, 1.0, 10.0, 300.0]),
            tj_op("scaled"),
            make_op("ET", vec![]),
            make_op("Q", vec![]),
            make_op("BT", vec![]),
            tf_op(5.0),
            tm_op([1.0, 0.0, 0.0, 1.0, 10.0, 300.0]),
            tj_op("plain"),
        ]);
        assert!((page.runs[0].font_size - 10.0).abs() < 0.01);
        assert!((page.runs[0].x - 20.0).abs() < 0.01);
        assert!((page.runs[0].y - 192.0).abs() < 0.01);
        assert!((page.runs[1].font_size - 5.0).abs() < 0.01);
        assert!((page.runs[1].y - 492.0).abs() < 0.01);
    }

    #[test]
    fn test_rotated_text_matrix_reports_rotation() {
        let (s, c) = 45.0_f32.to_radians().sin_cos();
        let page = extract(vec![
            make_op("BT", vec![]),
            tf_op(40.0),
            tm_op([c, s, -s, c, 100.0, 100.0]),
            tj_op("DRAFT"),
        ]);
        assert!((page.runs[0].rotation - 45.0).abs() < 0.01);
        assert!((page.runs[0].font_size - 40.0).abs() < 0.01);
    }

    #[test]
    fn test_tj_array_kerning_inserts_spaces() {
        let page = extract(vec![
            make_op("BT", vec![]),
            tf_op(10.0),
            tm_op([1.0, 0.0, 0.0, 1.0, 72.0, 700.0]),
            make_op(
                "TJ",
                vec![PdfValue::Array(vec![
                    PdfValue::Str(b"Hel".to_vec()),
                    PdfValue::Number(-20.0),
                    PdfValue::Str(b"lo".to_vec()),
                    PdfValue::Number(-400.0),
                    PdfValue::Str(b"world".to_vec()),
                ])],
            ),
        ]);
        assert_eq!(page.runs.len(), 1);
        assert_eq!(page.runs[0].content, "Hello world");
    }

    #[test]
    fn test_whitespace_only_shows_are_skipped() {
        let page = extract(vec![make_op("BT", vec![]), tf_op(10.0), tj_op("   ")]);
        assert!(page.runs.is_empty());
    }
}
