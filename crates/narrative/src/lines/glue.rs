//! Glyph joining inside a segment and superscript/subscript merging.

use lector_core::match_key::QUALIFIERS;

use crate::config::LineConfig;
use crate::types::{GeometricTextRun, Segment};

const CHARGE_RUNS: &[&str] = &[
    "+", "++", "-", "\u{2212}", "\u{00B1}", "\u{2213}", "+/-", "+/\u{2212}", "-/+", "+-",
];
const CHARGE_CHARS: &[char] = &['+', '-', '\u{2212}', '\u{00B1}', '\u{2213}'];

/// How a run attaches to the text before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    Glue,
    Space,
}

/// A charge marker, optionally after a digit count: "+", "++", "2+", "±".
pub fn is_charge_run(text: &str) -> bool {
    let trimmed = text.trim();
    let rest = trimmed.trim_start_matches(|c: char| c.is_ascii_digit());
    CHARGE_RUNS.contains(&rest)
}

/// A lowercase marker qualifier with an optional leading slash: "dim", "/hi".
pub fn is_qualifier(text: &str) -> bool {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix('/').unwrap_or(trimmed);
    QUALIFIERS.contains(&rest)
}

/// Fragments that typeset above or below a baseline and belong to the
/// word beside them.
pub fn is_script_fragment(text: &str) -> bool {
    is_charge_run(text) || is_qualifier(text)
}

/// Decide how `right` attaches to the text built so far.
///
/// Rules apply in priority order, and only across gaps up to
/// `glue_max_gap_ratio × body`. Beyond that the word/glyph gap thresholds
/// decide.
pub fn join_decision(left: &str, right: &str, gap: f32, body: f32, config: &LineConfig) -> Join {
    if gap <= config.glue_max_gap_ratio * body {
        if let Some(join) = rule_join(left, right) {
            return join;
        }
    }

    let single_glyph = |s: &str| s.trim().chars().count() == 1;
    let threshold = if single_glyph(left_word(left)) || single_glyph(right) {
        config.glyph_gap_ratio * body
    } else {
        config.word_gap_ratio * body
    };
    if gap > threshold {
        Join::Space
    } else {
        Join::Glue
    }
}

fn left_word(left: &str) -> &str {
    left.rsplit(char::is_whitespace).next().unwrap_or(left)
}

fn rule_join(left: &str, right: &str) -> Option<Join> {
    let last = left.chars().last()?;
    let first = right.chars().next()?;
    let second = right.chars().nth(1);
    let before_last = left.chars().rev().nth(1);

    // closing bracket before a word
    if matches!(last, ')' | ']') && first.is_alphanumeric() {
        return Some(Join::Space);
    }
    // word before an opening bracket
    if last.is_alphanumeric() && matches!(first, '(' | '[') {
        return Some(Join::Space);
    }
    // charge marker after an alphanumeric
    if last.is_alphanumeric() && is_charge_run(right) {
        return Some(Join::Glue);
    }
    // digit/slash continuation
    if last.is_ascii_digit() && first == '/' && second.is_some_and(|c| c.is_ascii_digit()) {
        return Some(Join::Glue);
    }
    if last == '/' {
        if before_last.is_some_and(|c| c.is_ascii_digit()) && first.is_ascii_digit() {
            return Some(Join::Glue);
        }
        if first.is_alphabetic() && !is_qualifier(right) {
            return Some(Join::Space);
        }
    }
    // qualifier after a charge or slash
    if (CHARGE_CHARS.contains(&last) || last == '/') && is_qualifier(right) {
        return Some(Join::Glue);
    }
    // bracket, dash, suffix
    if last == ')' && CHARGE_CHARS.contains(&first) && second.is_some_and(char::is_alphanumeric) {
        return Some(Join::Glue);
    }
    None
}

/// Join a segment's runs into a single line of text.
pub fn segment_text(segment: &Segment, body: f32, config: &LineConfig) -> String {
    let mut text = String::new();
    let mut previous: Option<&GeometricTextRun> = None;

    for run in &segment.runs {
        if let Some(prev) = previous {
            let already_spaced = text.ends_with(char::is_whitespace)
                || run.content.starts_with(char::is_whitespace);
            if !already_spaced {
                let gap = run.x - prev.right();
                if join_decision(&text, &run.content, gap, body, config) == Join::Space {
                    text.push(' ');
                }
            }
        }
        text.push_str(&run.content);
        previous = Some(run);
    }
    text
}

/// Fold short charge/qualifier fragments into the nearest segment whose
/// baseline and horizontal extent are close enough.
///
/// Returns a fresh segment list; unmatched fragments are kept as they are.
pub fn merge_scripts(segments: Vec<Segment>, body: f32, config: &LineConfig) -> Vec<Segment> {
    if !config.merge_scripts || body <= 0.0 {
        return segments;
    }

    let is_fragment = |s: &Segment| {
        let text = s.compact_text();
        let ratio = s.font_size / body;
        text.chars().count() <= config.script_max_chars
            && is_script_fragment(&text)
            && (config.script_min_ratio..=config.script_max_ratio).contains(&ratio)
    };
    let fragments: Vec<bool> = segments.iter().map(is_fragment).collect();

    let max_dy = config.script_max_dy_ratio * body;
    let max_dx = config.script_max_dx_ratio * body;
    let targets: Vec<Option<usize>> = segments
        .iter()
        .enumerate()
        .map(|(i, fragment)| {
            if !fragments[i] {
                return None;
            }
            segments
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i && !fragments[*j])
                .filter(|(_, other)| (other.y - fragment.y).abs() <= max_dy)
                .map(|(j, other)| (j, horizontal_distance(fragment, other)))
                .filter(|(_, dx)| *dx <= max_dx)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(j, _)| j)
        })
        .collect();

    let mut absorbed: Vec<Vec<GeometricTextRun>> = vec![Vec::new(); segments.len()];
    for (i, target) in targets.iter().enumerate() {
        if let Some(j) = target {
            absorbed[*j].extend(segments[i].runs.iter().cloned());
        }
    }

    segments
        .into_iter()
        .zip(absorbed)
        .zip(targets)
        .filter(|(_, target)| target.is_none())
        .map(|((segment, extra), _)| {
            if extra.is_empty() {
                return segment;
            }
            let mut runs = segment.runs;
            runs.extend(extra);
            Segment {
                y: segment.y,
                font_size: segment.font_size,
                ..Segment::from_runs(runs, segment.row)
            }
        })
        .collect()
}

fn horizontal_distance(a: &Segment, b: &Segment) -> f32 {
    (a.x0 - b.x1).max(b.x0 - a.x1).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: f32 = 10.0;

    fn make_run(text: &str, x: f32, width: f32) -> GeometricTextRun {
        GeometricTextRun::new(text, x, 100.0, width, BODY)
    }

    /// Runs laid out left to right with `gap` points between them.
    fn make_segment(parts: &[&str], gap: f32) -> Segment {
        let mut x = 50.0;
        let runs = parts
            .iter()
            .map(|p| {
                let width = p.chars().count() as f32 * 5.0;
                let run = make_run(p, x, width);
                x += width + gap;
                run
            })
            .collect();
        Segment::from_runs(runs, 0)
    }

    fn joined(parts: &[&str], gap: f32) -> String {
        segment_text(&make_segment(parts, gap), BODY, &LineConfig::default())
    }

    // =====================================================================
    // Fragment predicates
    // =====================================================================

    #[test]
    fn test_charge_runs() {
        for text in ["+", "++", "-", "\u{2212}", "\u{00B1}", "+/-", "2+", " + "] {
            assert!(is_charge_run(text), "{text:?}");
        }
        for text in ["a+", "+a", "", "12"] {
            assert!(!is_charge_run(text), "{text:?}");
        }
    }

    #[test]
    fn test_qualifiers() {
        assert!(is_qualifier("dim"));
        assert!(is_qualifier("/hi"));
        assert!(!is_qualifier("Dim"));
        assert!(!is_qualifier("dimension"));
    }

    // =====================================================================
    // Glue rules
    // =====================================================================

    #[test]
    fn test_charge_glues_to_marker() {
        assert_eq!(joined(&["CD16", "+"], 1.0), "CD16+");
    }

    #[test]
    fn test_glue_rules_hold_for_touching_runs() {
        assert_eq!(joined(&["CD16", "+"], 0.0), "CD16+");
        assert_eq!(joined(&["(CCL)", "-3"], 0.0), "(CCL)-3");
        assert_eq!(joined(&["CD47/", "SIRP"], 0.0), "CD47/ SIRP");
    }

    #[test]
    fn test_bracket_dash_suffix_glues() {
        assert_eq!(joined(&["(CCL)", "-3"], 1.0), "(CCL)-3");
    }

    #[test]
    fn test_trailing_slash_before_word_splits() {
        assert_eq!(joined(&["CD47/", "SIRP"], 0.2), "CD47/ SIRP");
    }

    #[test]
    fn test_brackets_split_from_words() {
        assert_eq!(joined(&["cells", "(n=3)"], 0.2), "cells (n=3)");
        assert_eq!(joined(&["(n=3)", "were"], 0.2), "(n=3) were");
    }

    #[test]
    fn test_digit_slash_continuation() {
        assert_eq!(joined(&["1", "/2"], 0.5), "1/2");
        assert_eq!(joined(&["24/", "7"], 0.5), "24/7");
    }

    #[test]
    fn test_qualifier_after_charge() {
        assert_eq!(joined(&["CD56-", "/dim"], 1.0), "CD56-/dim");
    }

    #[test]
    fn test_wide_gap_ignores_glue_rules() {
        assert_eq!(joined(&["CD16", "+"], 5.0), "CD16 +");
    }

    #[test]
    fn test_default_gap_thresholds() {
        // word gap is 1.0 at body 10, glyph gap 1.6
        assert_eq!(joined(&["exam", "ple"], 0.8), "example");
        assert_eq!(joined(&["two", "words"], 3.0), "two words");
        assert_eq!(joined(&["a", "word"], 1.4), "aword");
        assert_eq!(joined(&["a", "word"], 2.0), "a word");
    }

    #[test]
    fn test_existing_whitespace_is_kept() {
        assert_eq!(joined(&["already ", "spaced"], 0.0), "already spaced");
    }

    // =====================================================================
    // merge_scripts
    // =====================================================================

    #[test]
    fn test_superscript_merges_into_neighbour() {
        let config = LineConfig::default();
        let word = Segment::from_runs(vec![make_run("CD4", 50.0, 15.0)], 0);
        let plus = Segment::from_runs(vec![GeometricTextRun::new("+", 65.5, 96.5, 3.0, 6.0)], 1);

        let merged = merge_scripts(vec![word, plus], BODY, &config);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].row, 0);
        assert_eq!(merged[0].y, 100.0);
        assert_eq!(segment_text(&merged[0], BODY, &config), "CD4+");
    }

    #[test]
    fn test_distant_fragment_is_kept() {
        let config = LineConfig::default();
        let word = Segment::from_runs(vec![make_run("CD4", 50.0, 15.0)], 0);
        let far = Segment::from_runs(vec![GeometricTextRun::new("+", 300.0, 100.0, 3.0, 6.0)], 0);
        assert_eq!(merge_scripts(vec![word, far], BODY, &config).len(), 2);
    }

    #[test]
    fn test_large_font_fragment_is_not_a_script() {
        let config = LineConfig::default();
        let word = Segment::from_runs(vec![make_run("CD4", 50.0, 15.0)], 0);
        let big = Segment::from_runs(vec![GeometricTextRun::new("+", 66.0, 100.0, 8.0, 20.0)], 1);
        assert_eq!(merge_scripts(vec![word, big], BODY, &config).len(), 2);
    }
}
