//! The published narrative index.
//!
//! A `NarrativeIndex` is assembled once from ordered per-page texts and is
//! immutable afterwards. Token positions are word positions: `tokens` never
//! contains line-break sentinels, so `page_word_starts[i]` is both the index
//! of page `i`'s first token and the number of words preceding it.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::tokens;

/// Why a run or line was left out of the narrative text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExclusionReason {
    Header,
    Footer,
    DisplayEquation,
    BodyBox,
    RepeatedStamp,
    Watermark,
    FigureOverlay,
    BoilerplatePattern,
    FrontMatter,
}

impl ExclusionReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExclusionReason::Header => "header",
            ExclusionReason::Footer => "footer",
            ExclusionReason::DisplayEquation => "display-equation",
            ExclusionReason::BodyBox => "body-box",
            ExclusionReason::RepeatedStamp => "repeated-stamp",
            ExclusionReason::Watermark => "watermark",
            ExclusionReason::FigureOverlay => "figure-overlay",
            ExclusionReason::BoilerplatePattern => "boilerplate-pattern",
            ExclusionReason::FrontMatter => "front-matter",
        }
    }
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single removed item, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    /// 1-based page number.
    pub page: usize,
    pub reason: ExclusionReason,
    pub text: String,
}

/// Document-level heuristics observed during extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScholarlyFlags {
    pub looks_scholarly: bool,
    pub has_abstract: bool,
    pub has_references: bool,
    /// 1-based numbers of pages laid out in two columns.
    pub two_column_pages: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeIndex {
    pub full_text: String,
    pub page_texts: Vec<String>,
    pub page_word_starts: Vec<usize>,
    pub tokens: Vec<String>,
    pub exclusions: Vec<Exclusion>,
    pub page_count: usize,
    pub flags: ScholarlyFlags,
}

impl NarrativeIndex {
    /// Assemble an index from ordered page texts.
    ///
    /// Pages are joined with a blank line so a page boundary always reads
    /// as a paragraph break to the sentinel tokenizer.
    pub fn from_pages(
        page_texts: Vec<String>,
        exclusions: Vec<Exclusion>,
        flags: ScholarlyFlags,
    ) -> Self {
        let mut page_word_starts = Vec::with_capacity(page_texts.len());
        let mut tokens = Vec::new();

        for text in &page_texts {
            page_word_starts.push(tokens.len());
            tokens.extend(tokens::words(text).into_iter().map(str::to_string));
        }

        let full_text = page_texts
            .iter()
            .map(|t| t.trim())
            .collect::<Vec<_>>()
            .join("\n\n");

        Self {
            full_text,
            page_count: page_texts.len(),
            page_texts,
            page_word_starts,
            tokens,
            exclusions,
            flags,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.tokens.len()
    }

    /// Token range covered by a 1-based page number.
    pub fn page_range(&self, page: usize) -> Option<Range<usize>> {
        if page == 0 || page > self.page_count {
            return None;
        }
        let start = self.page_word_starts[page - 1];
        let end = self
            .page_word_starts
            .get(page)
            .copied()
            .unwrap_or(self.tokens.len());
        Some(start..end)
    }

    /// 1-based page holding the token at `index`.
    pub fn page_of(&self, index: usize) -> Option<usize> {
        if index >= self.tokens.len() {
            return None;
        }
        // Last page whose start is <= index; empty pages share a start with
        // their successor and are skipped by taking the last match.
        let position = self.page_word_starts.partition_point(|&start| start <= index);
        Some(position)
    }

    /// Map a 1-based page and a word offset within it to a global index,
    /// clamped to the page.
    pub fn global_index(&self, page: usize, offset: usize) -> Option<usize> {
        let range = self.page_range(page)?;
        if range.is_empty() {
            return None;
        }
        Some((range.start + offset).min(range.end - 1))
    }

    /// Exclusions recorded for a 1-based page.
    pub fn exclusions_for(&self, page: usize) -> impl Iterator<Item = &Exclusion> {
        self.exclusions.iter().filter(move |e| e.page == page)
    }
}
