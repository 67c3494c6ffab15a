//! Whitespace tokenizer shared with the playback engine.
//!
//! Tokens are maximal runs of non-whitespace characters. The sentinel form
//! additionally reports line breaks so a consumer can pause on paragraph and
//! line boundaries; word indices are always counted without sentinels, which
//! keeps positions computed from either form interchangeable.

use serde::Serialize;

/// The literal a line-break sentinel renders as.
pub const LINE_BREAK: &str = "\n";

/// A single token in sentinel form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Token<'a> {
    Word(&'a str),
    LineBreak,
}

impl<'a> Token<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            Token::Word(w) => w,
            Token::LineBreak => LINE_BREAK,
        }
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self, Token::LineBreak)
    }
}

/// Tokenize `text` into words and line-break sentinels.
///
/// One sentinel is emitted for every whitespace run that contains at least
/// one line break and sits between two words. Leading and trailing
/// whitespace never produces a sentinel.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;
    let mut pending_break = false;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(start) = word_start.take() {
                tokens.push(Token::Word(&text[start..i]));
            }
            if ch == '\n' && !tokens.is_empty() {
                pending_break = true;
            }
        } else if word_start.is_none() {
            if pending_break {
                tokens.push(Token::LineBreak);
                pending_break = false;
            }
            word_start = Some(i);
        }
    }

    if let Some(start) = word_start {
        tokens.push(Token::Word(&text[start..]));
    }

    tokens
}

/// Tokenize `text` into words only.
pub fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Number of words (non-sentinel tokens) in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Owned sentinel-form tokens, the representation handed to playback.
pub fn playback_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .map(|t| t.as_str().to_string())
        .collect()
}
