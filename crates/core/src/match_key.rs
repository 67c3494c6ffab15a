//! Match keys: the aggressively normalized token form used only when
//! comparing a selection against the narrative token stream.
//!
//! A match key never replaces the token itself. The narrative text stays as
//! extracted; keys are computed on both sides at comparison time.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Prefixes the line builder puts in front of headings and callouts.
const MARKERS: &[char] = &['#', '»'];

/// Lowercase qualifiers that may trail a marker acronym ("CD4hi", "CD56dim").
pub const QUALIFIERS: &[&str] = &[
    "hi", "lo", "dim", "bright", "high", "low", "neg", "pos", "int",
];

const ROMAN: &[&str] = &[
    "i", "ii", "iii", "iv", "v", "vi", "vii", "viii", "ix", "x", "xi", "xii",
];

/// Canonical charge suffixes, longest first.
const CHARGE_SUFFIXES: &[&str] = &["+-", "++", "+", "-"];

/// Compute the match key of a single token.
///
/// Returns an empty string for tokens with no alphanumeric content, such as
/// bare heading markers or punctuation; an empty key never matches.
pub fn match_key(token: &str) -> String {
    let unmarked = token.trim_start_matches(|c| MARKERS.contains(&c));
    if unmarked.is_empty() {
        return String::new();
    }

    // Compatibility decomposition expands ligatures and super/subscripts.
    let folded: String = unmarked
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(fold_punctuation)
        .collect();

    let keep_charge = is_marker_like(&folded);
    let lowered = collapse_charges(&folded.to_lowercase());
    trim_edges(strip_brackets(&lowered), keep_charge)
}

/// Whether two match keys refer to the same word.
pub fn keys_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }

    let (stem_a, charge_a) = split_charge(a);
    let (stem_b, charge_b) = split_charge(b);
    if stem_a == stem_b && (charge_a.is_empty() || charge_b.is_empty()) {
        return true;
    }

    if acronym_prefix(stem_a, stem_b) || acronym_prefix(stem_b, stem_a) {
        return true;
    }

    chain_match(a, b) || chain_match(b, a)
}

/// Short, capitalised tokens such as "CD4", "IL", or "NK" that occur too
/// often in technical text to be located by text alone.
pub fn is_acronym_like(token: &str) -> bool {
    let core: Vec<char> = token.chars().filter(|c| c.is_alphanumeric()).collect();
    if core.is_empty() || core.len() > 6 {
        return false;
    }
    let upper = core.iter().filter(|c| c.is_uppercase()).count();
    let digits = core.iter().filter(|c| c.is_ascii_digit()).count();
    upper >= 2 || (upper >= 1 && digits >= 1) || (core.len() == 1 && upper == 1)
}

/// Split a key into its stem and canonical charge suffix (possibly empty).
pub fn split_charge(key: &str) -> (&str, &str) {
    for suffix in CHARGE_SUFFIXES {
        if let Some(stem) = key.strip_suffix(suffix) {
            if stem.chars().last().is_some_and(|c| c.is_alphanumeric()) {
                return (stem, &key[stem.len()..]);
            }
        }
    }
    (key, "")
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn fold_punctuation(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '`' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
        other => other,
    }
}

fn collapse_charges(text: &str) -> String {
    text.replace("+/-", "+-")
        .replace("-/+", "+-")
        .replace(['\u{00B1}', '\u{2213}'], "+-")
}

/// A stem that reads like a marker name: letters mixed with digits, or at
/// least two capitals.
fn is_marker_like(text: &str) -> bool {
    let stem: Vec<char> = text.chars().filter(|c| c.is_alphanumeric()).collect();
    if stem.len() < 2 || stem.len() > 12 {
        return false;
    }
    let upper = stem.iter().filter(|c| c.is_uppercase()).count();
    let digits = stem.iter().filter(|c| c.is_ascii_digit()).count();
    let letters = stem.iter().filter(|c| c.is_alphabetic()).count();
    (digits > 0 && letters > 0) || upper >= 2
}

fn strip_brackets(text: &str) -> &str {
    let mut current = text;
    loop {
        let mut chars = current.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            return current;
        };
        let paired = matches!((first, last), ('(', ')') | ('[', ']') | ('{', '}'));
        if !paired {
            return current;
        }
        current = &current[first.len_utf8()..current.len() - last.len_utf8()];
    }
}

fn trim_edges(text: &str, keep_charge: bool) -> String {
    let leading = text.trim_start_matches(|c: char| !c.is_alphanumeric());
    let core = leading.trim_end_matches(|c: char| !c.is_alphanumeric());
    if core.is_empty() {
        return String::new();
    }

    if keep_charge {
        let tail: String = leading[core.len()..]
            .chars()
            .take_while(|c| *c == '+' || *c == '-')
            .collect();
        if let Some(suffix) = canonical_charge(&tail) {
            return format!("{core}{suffix}");
        }
    }

    core.to_string()
}

fn canonical_charge(raw: &str) -> Option<&'static str> {
    match raw {
        "+" => Some("+"),
        "++" | "+++" => Some("++"),
        "-" | "--" => Some("-"),
        "+-" | "-+" => Some("+-"),
        _ => None,
    }
}

fn acronym_prefix(short: &str, long: &str) -> bool {
    if short.chars().count() < 2 || long.len() <= short.len() || !long.starts_with(short) {
        return false;
    }
    if !short.chars().all(|c| c.is_alphanumeric()) {
        return false;
    }
    let rest = long[short.len()..].trim_start_matches('-');
    if rest.is_empty() {
        return false;
    }
    rest.chars().all(|c| c.is_ascii_digit()) || ROMAN.contains(&rest) || QUALIFIERS.contains(&rest)
}

fn chain_match(chain: &str, other: &str) -> bool {
    // A trailing charge dash is not a chain separator.
    let (chain_stem, _) = split_charge(chain);
    if !chain_stem.contains(['/', '-']) {
        return false;
    }
    let (other_stem, _) = split_charge(other);
    chain_stem
        .split(['/', '-'])
        .filter(|segment| segment.chars().count() >= 2)
        .any(|segment| segment == other || split_charge(segment).0 == other_stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // match_key
    // =====================================================================

    #[test]
    fn test_key_lowercases_and_trims_punctuation() {
        assert_eq!(match_key("Hello,"), "hello");
        assert_eq!(match_key("\u{201C}quoted\u{201D}"), "quoted");
        assert_eq!(match_key("end."), "end");
    }

    #[test]
    fn test_key_strips_heading_and_callout_markers() {
        assert_eq!(match_key("##"), "");
        assert_eq!(match_key("###Methods"), "methods");
        assert_eq!(match_key("»Figure"), "figure");
    }

    #[test]
    fn test_key_folds_ligatures_and_diacritics() {
        assert_eq!(match_key("\u{FB01}nal"), "final");
        assert_eq!(match_key("na\u{00EF}ve"), "naive");
        assert_eq!(match_key("x\u{00B2}"), "x2");
    }

    #[test]
    fn test_key_keeps_charge_on_markers() {
        assert_eq!(match_key("CD16+"), "cd16+");
        assert_eq!(match_key("(CD4+)"), "cd4+");
        assert_eq!(match_key("CD8\u{00B1}"), "cd8+-");
        assert_eq!(match_key("CD8+/\u{2212}"), "cd8+-");
        assert_eq!(match_key("CD3++,"), "cd3++");
    }

    #[test]
    fn test_key_drops_dash_on_plain_words() {
        assert_eq!(match_key("well-"), "well");
        assert_eq!(match_key("and\u{2014}"), "and");
    }

    #[test]
    fn test_key_keeps_internal_brackets() {
        assert_eq!(match_key("(CCL)-3"), "ccl)-3");
    }

    #[test]
    fn test_key_of_punctuation_is_empty() {
        assert_eq!(match_key("\u{2014}"), "");
        assert_eq!(match_key("()"), "");
    }

    // =====================================================================
    // keys_match
    // =====================================================================

    #[test]
    fn test_equal_keys_match() {
        assert!(keys_match("apple", "apple"));
        assert!(!keys_match("apple", "banana"));
        assert!(!keys_match("", ""));
    }

    #[test]
    fn test_charge_suffix_added_or_removed() {
        assert!(keys_match("cd4", "cd4+"));
        assert!(keys_match("cd8+-", "cd8"));
        assert!(!keys_match("cd4+", "cd4-"));
    }

    #[test]
    fn test_acronym_prefix_with_suffix() {
        assert!(keys_match("il", "il6"));
        assert!(keys_match("cd56", "cd56dim"));
        assert!(keys_match("type", "typeii"));
        assert!(!keys_match("the", "then"));
        assert!(!keys_match("c", "c4"));
    }

    #[test]
    fn test_chain_segment_matches() {
        assert!(keys_match("sirp", "cd47/sirp"));
        assert!(keys_match("cd56-/dim", "cd56"));
        assert!(keys_match("t-cell", "cell"));
        assert!(!keys_match("t-cell", "t"));
    }

    // =====================================================================
    // is_acronym_like / split_charge
    // =====================================================================

    #[test]
    fn test_acronym_like() {
        assert!(is_acronym_like("CD4"));
        assert!(is_acronym_like("IL"));
        assert!(is_acronym_like("NK,"));
        assert!(!is_acronym_like("apple"));
        assert!(!is_acronym_like("Table"));
        assert!(!is_acronym_like("ABCDEFGH"));
    }

    #[test]
    fn test_split_charge() {
        assert_eq!(split_charge("cd4+-"), ("cd4", "+-"));
        assert_eq!(split_charge("cd4++"), ("cd4", "++"));
        assert_eq!(split_charge("plain"), ("plain", ""));
        assert_eq!(split_charge("+"), ("+", ""));
    }
}
