//! Narrative extraction from positioned page text.
//!
//! Turns the geometric text runs of a rendered document into the ordered
//! narrative a reader would hear: noise, headers, footers, display
//! equations and page-1 front matter removed, columns read in order, and
//! glyph fragments glued back into words. The result is a
//! [`NarrativeIndex`](lector_core::index::NarrativeIndex) plus a
//! per-page [`ExtractionReport`](report::ExtractionReport).
//!
//! Runs come from a [`RunSource`](source::RunSource); the bundled
//! [`LopdfSource`](source::LopdfSource) reads them from PDF bytes.

use std::path::Path;

use thiserror::Error;

pub mod boilerplate;
pub mod columns;
pub mod config;
pub mod front_matter;
pub mod geometry;
pub mod lines;
pub mod noise;
pub mod parser;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod source;
pub mod types;

pub use config::ExtractionConfig;
pub use pipeline::{extract_from_source, extract_pages, DocumentProfile, Extraction};
pub use probe::forward_probe;
pub use report::ExtractionReport;
pub use source::{LopdfSource, MemorySource, RunSource};
pub use types::*;

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Document unavailable: {0}")]
    Unavailable(String),
    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract the narrative of a PDF held in memory.
pub fn extract_narrative(bytes: &[u8], config: &ExtractionConfig) -> Result<Extraction, NarrativeError> {
    let source = LopdfSource::from_bytes(bytes)?;
    Ok(extract_from_source(&source, config))
}

/// Extract the narrative of a PDF file.
pub fn extract_file(path: &Path, config: &ExtractionConfig) -> Result<Extraction, NarrativeError> {
    if !path.is_file() {
        return Err(NarrativeError::Unavailable(format!(
            "{} is not a readable file",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)?;
    extract_narrative(&bytes, config)
}
