//! Per-page diagnostics: kept lines and removed items by reason.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lector_core::index::ExclusionReason;

use crate::types::PageLines;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonTally {
    pub count: usize,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub page: usize,
    pub kept_lines: usize,
    pub kept_words: usize,
    pub two_column: bool,
    pub removed: BTreeMap<ExclusionReason, ReasonTally>,
}

impl PageReport {
    pub fn removed_count(&self) -> usize {
        self.removed.values().map(|t| t.count).sum()
    }
}

/// Human-oriented summary of what extraction kept and dropped. Not a
/// stable machine contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub pages: Vec<PageReport>,
}

impl ExtractionReport {
    pub fn from_pages(pages: &[PageLines], samples: usize) -> Self {
        let pages = pages
            .iter()
            .map(|page| {
                let mut removed: BTreeMap<ExclusionReason, ReasonTally> = BTreeMap::new();
                for exclusion in &page.exclusions {
                    let tally = removed.entry(exclusion.reason).or_default();
                    tally.count += 1;
                    if tally.samples.len() < samples {
                        tally.samples.push(exclusion.text.clone());
                    }
                }
                PageReport {
                    page: page.number,
                    kept_lines: page.lines.len(),
                    kept_words: page.lines.iter().map(|l| l.token_count).sum(),
                    two_column: page.two_column,
                    removed,
                }
            })
            .collect();
        Self { pages }
    }

    /// Removed items per reason across the document.
    pub fn totals(&self) -> BTreeMap<ExclusionReason, usize> {
        let mut totals = BTreeMap::new();
        for page in &self.pages {
            for (reason, tally) in &page.removed {
                *totals.entry(*reason).or_insert(0) += tally.count;
            }
        }
        totals
    }

    pub fn kept_lines(&self) -> usize {
        self.pages.iter().map(|p| p.kept_lines).sum()
    }
}
