//! Core library for lector
//!
//! This crate implements the **Functional Core** of the lector reader,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! The lector project splits its work across three crates:
//!
//! - **`lector_core`** (this crate): tokenization, match keys, the narrative
//!   index and selection anchoring. Pure functions with zero I/O.
//! - **`narrative`**: geometric extraction from page text runs into a
//!   [`NarrativeIndex`].
//! - **`lector`**: I/O, caching and orchestration (the Imperative Shell).
//!
//! ## Functional Core Principles
//!
//! - **Pure functions**: same input, same output. Clocks are passed in.
//! - **No side effects**: no file or network access.
//! - **Testable**: fixtures are plain strings and numbers.
//!
//! # Module Organization
//!
//! - [`tokens`]: the whitespace tokenizer shared with playback
//! - [`match_key`]: normalization used only for selection comparison
//! - [`index`]: the immutable narrative index and page/offset mapping
//! - [`anchor`]: the staged selection anchoring resolver
//! - [`selection`]: selection snapshots, the capture slot and target memory
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use lector_core::anchor::{resolve, AnchorConfig, AnchorRequest};
//! use lector_core::index::{NarrativeIndex, ScholarlyFlags};
//!
//! let index = NarrativeIndex::from_pages(
//!     vec!["an apple a day".to_string()],
//!     Vec::new(),
//!     ScholarlyFlags::default(),
//! );
//! let report = resolve(&index, &AnchorRequest::new("apple"), &AnchorConfig::default());
//! assert_eq!(report.index(), Some(1));
//! ```

pub mod anchor;
pub mod index;
pub mod match_key;
pub mod selection;
pub mod tokens;

pub use anchor::{resolve, AnchorConfig, AnchorOutcome, AnchorReport, AnchorRequest};
pub use index::{Exclusion, ExclusionReason, NarrativeIndex, ScholarlyFlags};
pub use selection::{NormalizedRect, SelectionSlot, SelectionSnapshot, TargetMemory};
