//! Where runs come from.

use std::collections::BTreeMap;

use crate::parser::backend::{LopdfBackend, PageId, PdfBackend};
use crate::parser::runs::page_runs;
use crate::types::PageRuns;
use crate::NarrativeError;

/// Supplies page count and per-page runs with page dimensions.
pub trait RunSource {
    fn page_count(&self) -> usize;

    /// Runs of a 1-based page.
    fn page_runs(&self, page: usize) -> Result<PageRuns, NarrativeError>;

    /// The first `max_pages` pages. A page that cannot be read is logged
    /// and yields no runs rather than failing the document.
    fn all_pages(&self, max_pages: usize) -> Vec<PageRuns> {
        let count = self.page_count().min(max_pages);
        (1..=count)
            .map(|page| {
                self.page_runs(page).unwrap_or_else(|e| {
                    log::warn!("page {page}: {e}; treating as empty");
                    PageRuns::new(page, 0.0, 0.0, Vec::new())
                })
            })
            .collect()
    }
}

/// Pre-built pages, used by tests and by callers that already hold runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: Vec<PageRuns>,
}

impl MemorySource {
    pub fn new(pages: Vec<PageRuns>) -> Self {
        Self { pages }
    }
}

impl RunSource for MemorySource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_runs(&self, page: usize) -> Result<PageRuns, NarrativeError> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .cloned()
            .ok_or(NarrativeError::PageOutOfRange {
                page,
                count: self.pages.len(),
            })
    }
}

/// Runs read from a PDF through lopdf.
pub struct LopdfSource {
    backend: LopdfBackend,
    pages: BTreeMap<u32, PageId>,
}

impl LopdfSource {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NarrativeError> {
        let backend = LopdfBackend::load_bytes(bytes)?;
        let pages = backend.pages();
        Ok(Self { backend, pages })
    }
}

impl RunSource for LopdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_runs(&self, page: usize) -> Result<PageRuns, NarrativeError> {
        let page_id = u32::try_from(page)
            .ok()
            .and_then(|n| self.pages.get(&n).copied())
            .ok_or(NarrativeError::PageOutOfRange {
                page,
                count: self.page_count(),
            })?;
        page_runs(&self.backend, page_id, page)
    }
}
