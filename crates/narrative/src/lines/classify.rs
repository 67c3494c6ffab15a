//! Line classification: boilerplate, display equations, headings, callouts.

use std::sync::OnceLock;

use lector_core::index::ExclusionReason;
use regex::Regex;

use crate::config::LineConfig;

const MAX_HEADING_LEVEL: usize = 6;
const EQUATION_MAX_LONG_WORDS: usize = 5;
const EQUATION_MIN_SCORE: u32 = 3;
const RELATIONS: &[char] = &[
    '=', '<', '>', '\u{2264}', '\u{2265}', '\u{2248}', '\u{2260}', '\u{221D}', '\u{00B1}',
    '\u{00D7}', '\u{00F7}', '\u{2211}', '\u{222B}', '\u{2202}', '\u{221A}', '\u{2192}',
    '\u{2212}',
];
const SUPERSCRIPTS: &[char] = &[
    '\u{00B2}', '\u{00B3}', '\u{00B9}', '\u{2070}', '\u{2074}', '\u{2075}', '\u{2076}',
    '\u{2077}', '\u{2078}', '\u{2079}', '\u{207A}', '\u{207B}',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Boilerplate,
    Equation,
    Heading(u8),
    Callout,
    Ordinary,
}

impl LineClass {
    /// Classes that never reach the narrative.
    pub fn drop_reason(self) -> Option<ExclusionReason> {
        match self {
            LineClass::Boilerplate => Some(ExclusionReason::BoilerplatePattern),
            LineClass::Equation => Some(ExclusionReason::DisplayEquation),
            _ => None,
        }
    }
}

/// Classify a cleaned line. Anything that does not clearly match a class
/// is ordinary narrative.
pub fn classify(text: &str, font_size: f32, body: f32, config: &LineConfig) -> LineClass {
    if config.drop_boilerplate && is_boilerplate(text) {
        return LineClass::Boilerplate;
    }
    if config.route_equations && is_display_equation(text) {
        return LineClass::Equation;
    }
    if !config.annotate_headings {
        return LineClass::Ordinary;
    }
    if is_callout(text) {
        return LineClass::Callout;
    }
    if let Some(level) = numbered_heading_level(text, config)
        .or_else(|| boosted_heading_level(text, font_size, body, config))
    {
        return LineClass::Heading(level);
    }
    LineClass::Ordinary
}

/// Prefix a line with its heading or callout marker.
pub fn annotate(text: &str, class: LineClass) -> String {
    match class {
        LineClass::Heading(level) => format!("{} {text}", "#".repeat(level as usize)),
        LineClass::Callout => format!("\u{00BB} {text}"),
        _ => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Boilerplate
// ---------------------------------------------------------------------------

const BOILERPLATE_MAX_WORDS: usize = 12;

pub fn is_boilerplate(text: &str) -> bool {
    static RE_PAGE: OnceLock<Regex> = OnceLock::new();
    let re_page = RE_PAGE.get_or_init(|| {
        Regex::new(r"(?i)^(?:[-\u{2013}\s]*\d{1,4}[-\u{2013}\s]*|page\s+\d+(?:\s+(?:of|/)\s+\d+)?|\d+\s*/\s*\d+)$")
            .unwrap()
    });
    if re_page.is_match(text.trim()) {
        return true;
    }

    if text.split_whitespace().count() > BOILERPLATE_MAX_WORDS {
        return false;
    }
    static RE_NOTICE: OnceLock<Regex> = OnceLock::new();
    let re_notice = RE_NOTICE.get_or_init(|| {
        Regex::new(
            r"(?i)\bdoi\b|\b10\.\d{4,9}/\S+|\bissn\b|https?://|\bwww\.|[\w.+-]+@[\w-]+\.[\w.]+|\u{00A9}|\(c\)\s*\d{4}|\bcopyright\b|all rights reserved",
        )
        .unwrap()
    });
    re_notice.is_match(text)
}

// ---------------------------------------------------------------------------
// Display equations
// ---------------------------------------------------------------------------

/// Score a line for display-equation features. Lines without a relation or
/// operator, or with more than a handful of real words, score zero.
pub fn equation_score(text: &str) -> u32 {
    if !text.contains(RELATIONS) {
        return 0;
    }
    let long_words = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() >= 4)
        .count();
    if long_words > EQUATION_MAX_LONG_WORDS {
        return 0;
    }

    let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let letters = visible.iter().filter(|c| c.is_alphabetic()).count();
    let symbols = visible.iter().filter(|c| !c.is_alphanumeric()).count();

    let mut score = 0;
    if !visible.is_empty() && symbols as f32 / visible.len() as f32 >= 0.18 {
        score += 2;
    }
    if text.split_whitespace().filter(|t| t.contains('/')).count() >= 2 {
        score += 1;
    }
    if text.contains('^') || text.contains(SUPERSCRIPTS) {
        score += 1;
    }
    if text.chars().any(|c| ('\u{0391}'..='\u{03C9}').contains(&c)) {
        score += 1;
    }
    if symbols > 0 && (letters == 0 || symbols as f32 / letters as f32 >= 0.5) {
        score += 2;
    }
    score
}

pub fn is_display_equation(text: &str) -> bool {
    equation_score(text) >= EQUATION_MIN_SCORE
}

// ---------------------------------------------------------------------------
// Headings and callouts
// ---------------------------------------------------------------------------

fn is_callout(text: &str) -> bool {
    static RE_CALLOUT: OnceLock<Regex> = OnceLock::new();
    let re_callout = RE_CALLOUT.get_or_init(|| {
        Regex::new(r"^(?:Supplementary\s+)?(?:Figure|Fig\.|Table|Scheme)\s*S?\d+").unwrap()
    });
    re_callout.is_match(text)
}

/// "2.6.1 Methods" is level 3.
fn numbered_heading_level(text: &str, config: &LineConfig) -> Option<u8> {
    static RE_NUMBERED: OnceLock<Regex> = OnceLock::new();
    let re_numbered = RE_NUMBERED
        .get_or_init(|| Regex::new(r"^(\d{1,2}(?:\.\d{1,2})*)\.?\s+\p{Lu}").unwrap());

    if text.split_whitespace().count() > config.heading_max_words {
        return None;
    }
    let numbering = re_numbered.captures(text)?.get(1)?.as_str();
    let level = (numbering.matches('.').count() + 1).min(MAX_HEADING_LEVEL);
    Some(level as u8)
}

/// Short, title-cased lines set noticeably larger than the body font.
fn boosted_heading_level(text: &str, font_size: f32, body: f32, config: &LineConfig) -> Option<u8> {
    if body <= 0.0 || font_size < config.heading_font_boost * body {
        return None;
    }
    let words = text.split_whitespace().count();
    if words == 0 || words > config.heading_max_words {
        return None;
    }
    if text.ends_with(['.', ',', ';', ':']) {
        return None;
    }
    let first = text.chars().find(|c| c.is_alphabetic())?;
    first.is_uppercase().then_some(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_class(text: &str) -> LineClass {
        classify(text, 10.0, 10.0, &LineConfig::default())
    }

    // =====================================================================
    // Boilerplate
    // =====================================================================

    #[test]
    fn test_page_numbers_are_boilerplate() {
        for text in ["12", "- 4 -", "Page 3", "Page 3 of 12", "3 / 12"] {
            assert!(is_boilerplate(text), "{text:?}");
        }
    }

    #[test]
    fn test_short_notice_lines_are_boilerplate() {
        assert!(is_boilerplate("https://doi.org/10.1000/xyz123"));
        assert!(is_boilerplate("Contact: jane.doe@example.org"));
        assert!(is_boilerplate("\u{00A9} 2021 The Authors"));
        assert!(is_boilerplate("ISSN 1234-5678"));
    }

    #[test]
    fn test_long_lines_with_urls_are_kept() {
        let text = "The data are available at https://example.org and were collected over three years in five separate clinical sites";
        assert!(!is_boilerplate(text));
        assert!(!is_boilerplate("The 12 patients"));
    }

    // =====================================================================
    // Equations
    // =====================================================================

    #[test]
    fn test_display_equation_is_routed() {
        assert_eq!(make_class("E = mc^2 + \u{03B1}/\u{03B2}"), LineClass::Equation);
        assert_eq!(make_class("f(x) = (a + b)/(c - d)"), LineClass::Equation);
    }

    #[test]
    fn test_prose_with_relation_is_ordinary() {
        assert_eq!(
            make_class("Survival was higher when treatment started early (p < 0.05) overall."),
            LineClass::Ordinary
        );
        assert_eq!(equation_score("no relation symbols here"), 0);
    }

    // =====================================================================
    // Headings and callouts
    // =====================================================================

    #[test]
    fn test_numbered_headings() {
        assert_eq!(make_class("2.6.1 Flow cytometry"), LineClass::Heading(3));
        assert_eq!(make_class("1 Introduction"), LineClass::Heading(1));
        assert_eq!(make_class("3. Results"), LineClass::Heading(1));
        assert_eq!(make_class("2.6 results in lower case"), LineClass::Ordinary);
    }

    #[test]
    fn test_boosted_heading() {
        let config = LineConfig::default();
        assert_eq!(
            classify("Materials and Methods", 12.0, 10.0, &config),
            LineClass::Heading(3)
        );
        assert_eq!(
            classify("Materials and Methods", 10.5, 10.0, &config),
            LineClass::Ordinary
        );
        assert_eq!(
            classify("This sentence ends.", 14.0, 10.0, &config),
            LineClass::Ordinary
        );
    }

    #[test]
    fn test_callouts() {
        assert_eq!(make_class("Figure 2. Expression of CD4"), LineClass::Callout);
        assert_eq!(make_class("Fig. 3 Survival curves"), LineClass::Callout);
        assert_eq!(make_class("Table 1 Baseline characteristics"), LineClass::Callout);
        assert_eq!(make_class("Figures were drawn by hand"), LineClass::Ordinary);
    }

    #[test]
    fn test_only_boilerplate_and_equations_are_dropped() {
        assert_eq!(
            LineClass::Boilerplate.drop_reason(),
            Some(ExclusionReason::BoilerplatePattern)
        );
        assert_eq!(
            LineClass::Equation.drop_reason(),
            Some(ExclusionReason::DisplayEquation)
        );
        assert_eq!(LineClass::Heading(2).drop_reason(), None);
        assert_eq!(LineClass::Callout.drop_reason(), None);
        assert_eq!(LineClass::Ordinary.drop_reason(), None);
    }

    #[test]
    fn test_annotate_prefixes_markers() {
        assert_eq!(annotate("Methods", LineClass::Heading(2)), "## Methods");
        assert_eq!(annotate("Figure 1", LineClass::Callout), "\u{00BB} Figure 1");
        assert_eq!(annotate("text", LineClass::Ordinary), "text");
    }

    #[test]
    fn test_toggles_disable_classes() {
        let config = LineConfig {
            drop_boilerplate: false,
            route_equations: false,
            annotate_headings: false,
            ..LineConfig::default()
        };
        assert_eq!(classify("12", 10.0, 10.0, &config), LineClass::Ordinary);
        assert_eq!(classify("E = mc^2", 10.0, 10.0, &config), LineClass::Ordinary);
        assert_eq!(classify("1 Introduction", 10.0, 10.0, &config), LineClass::Ordinary);
    }
}
