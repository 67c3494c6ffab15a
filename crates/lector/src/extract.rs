use std::path::PathBuf;

use colored::Colorize;
use lector_core::index::NarrativeIndex;

use crate::cache::IndexCache;
use crate::config::Settings;
use crate::prelude::{eprintln, println, *};

#[derive(Debug, clap::Args, serde::Serialize, serde::Deserialize, Clone)]
pub struct ExtractOptions {
    /// Path to the PDF file
    pub path: PathBuf,

    /// Only print this page (1-indexed)
    #[arg(short, long)]
    pub page: Option<usize>,

    /// Extract at most this many pages
    #[arg(long, env = "LECTOR_MAX_PAGES")]
    pub max_pages: Option<usize>,

    /// Output the full index as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(options: ExtractOptions, global: crate::Global, mut settings: Settings) -> Result<()> {
    if let Some(max_pages) = options.max_pages {
        settings.extraction.max_pages = max_pages;
    }
    let cache = IndexCache::new(settings.extraction);
    let document = cache.get(&options.path).await?;
    let index = &document.extraction.index;

    if global.verbose {
        eprintln!(
            "{} pages, {} words, {} removed items",
            index.page_count,
            index.word_count(),
            index.exclusions.len()
        );
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(index)?);
        return Ok(());
    }

    match options.page {
        Some(page) => println!("{}", page_text(index, page)?),
        None => println!("{}", format_pages(index)),
    }
    Ok(())
}

fn page_text(index: &NarrativeIndex, page: usize) -> Result<&str> {
    page.checked_sub(1)
        .and_then(|i| index.page_texts.get(i))
        .map(String::as_str)
        .ok_or_else(|| eyre!("Page {page} out of range (document has {} pages)", index.page_count))
}

/// Page texts under a banner per page.
fn format_pages(index: &NarrativeIndex) -> String {
    let mut result = String::new();
    for (i, text) in index.page_texts.iter().enumerate() {
        let banner = f!("=== page {} ===", i + 1);
        result.push_str(&f!("{}\n", banner.bright_cyan()));
        if text.is_empty() {
            result.push_str(&f!("{}\n", "(no narrative text)".dimmed()));
        } else {
            result.push_str(text);
            result.push('\n');
        }
        result.push('\n');
    }
    result
}
