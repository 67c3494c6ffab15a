use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Chains are split one boundary per pass; this bounds the passes.
const MAX_CHAIN_PASSES: usize = 8;

/// Clean one line of joined text.
///
/// Applies unicode NFC normalization, ligature and private-use glyph
/// replacement, invisible character removal, punctuation spacing, a forced
/// space after closing brackets, and marker-chain splitting. Whitespace is
/// collapsed to single spaces.
pub fn clean_line(text: &str) -> String {
    // 1. Unicode NFC normalization.
    let mut result: String = text.nfc().collect();

    // 2. Ligatures and private-use glyphs.
    let ligatures = [
        ("\u{FB00}", "ff"),
        ("\u{FB01}", "fi"),
        ("\u{FB02}", "fl"),
        ("\u{FB03}", "ffi"),
        ("\u{FB04}", "ffl"),
        ("\u{FB05}", "st"),
        ("\u{FB06}", "st"),
    ];
    for (lig, replacement) in &ligatures {
        result = result.replace(lig, replacement);
    }
    result = result.chars().filter_map(private_use_glyph).collect();

    // 3. Soft hyphens, zero-width characters, replacement characters.
    result.retain(|c| {
        !matches!(
            c,
            '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{FFFD}'
        )
    });

    // 4. Collapse whitespace.
    result = result.split_whitespace().collect::<Vec<_>>().join(" ");

    // 5. Punctuation spacing.
    static RE_BEFORE: OnceLock<Regex> = OnceLock::new();
    let re_before = RE_BEFORE.get_or_init(|| Regex::new(r" +([,.;:!?)\]])").unwrap());
    result = re_before.replace_all(&result, "$1").to_string();

    static RE_AFTER: OnceLock<Regex> = OnceLock::new();
    let re_after = RE_AFTER.get_or_init(|| Regex::new(r"([(\[]) +").unwrap());
    result = re_after.replace_all(&result, "$1").to_string();

    // 6. Closing bracket directly before a word.
    static RE_BRACKET: OnceLock<Regex> = OnceLock::new();
    let re_bracket = RE_BRACKET.get_or_init(|| Regex::new(r"([)\]])([\p{L}\p{N}])").unwrap());
    result = re_bracket.replace_all(&result, "$1 $2").to_string();

    // 7. Marker chains: "CD33+CD15-" -> "CD33+ CD15-".
    static RE_CHAIN: OnceLock<Regex> = OnceLock::new();
    let re_chain = RE_CHAIN.get_or_init(|| {
        Regex::new(r"(\p{Lu}[\p{L}]*\d+[\p{L}]*[+\-\u{2212}]+)(\p{Lu}[\p{L}]*\d)").unwrap()
    });
    for _ in 0..MAX_CHAIN_PASSES {
        let next = re_chain.replace_all(&result, "$1 $2").to_string();
        if next == result {
            break;
        }
        result = next;
    }

    result.trim().to_string()
}

/// Map private-use glyphs that symbol fonts commonly emit; drop the rest.
fn private_use_glyph(c: char) -> Option<char> {
    match c {
        '\u{F0B7}' | '\u{F0A7}' => Some('\u{2022}'),
        '\u{F02D}' => Some('-'),
        '\u{F02B}' => Some('+'),
        '\u{F0B1}' => Some('\u{00B1}'),
        '\u{E000}'..='\u{F8FF}' => None,
        other => Some(other),
    }
}
