use std::path::PathBuf;

use lector_core::index::ExclusionReason;
use narrative::report::ExtractionReport;
use prettytable::{Cell, Row};

use crate::cache::IndexCache;
use crate::config::Settings;
use crate::prelude::{println, *};

#[derive(Debug, clap::Args, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReportOptions {
    /// Path to the PDF file
    pub path: PathBuf,

    /// Print the removed samples under the table
    #[arg(short, long)]
    pub samples: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(options: ReportOptions, global: crate::Global, settings: Settings) -> Result<()> {
    let cache = IndexCache::new(settings.extraction);
    let document = cache.get(&options.path).await?;
    let report = &document.extraction.report;

    if options.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let flags = &document.extraction.index.flags;
    if global.verbose {
        println!(
            "scholarly: {}, abstract: {}, references: {}",
            flags.looks_scholarly, flags.has_abstract, flags.has_references
        );
    }

    if report.pages.is_empty() {
        println!("No pages extracted.");
        return Ok(());
    }

    build_table(report).printstd();
    if options.samples {
        println!();
        println!("{}", format_samples(report));
    }
    Ok(())
}

/// Reasons that removed anything, in a stable order.
fn active_reasons(report: &ExtractionReport) -> Vec<ExclusionReason> {
    report.totals().into_keys().collect()
}

fn build_table(report: &ExtractionReport) -> prettytable::Table {
    let reasons = active_reasons(report);
    let mut table = new_table();

    let mut header = vec![Cell::new("Page"), Cell::new("Layout"), Cell::new("Lines"), Cell::new("Words")];
    header.extend(reasons.iter().map(|r| Cell::new(r.label())));
    table.add_row(Row::new(header));

    for page in &report.pages {
        let layout = if page.two_column { "2-col" } else { "1-col" };
        let mut cells = vec![
            Cell::new(&page.page.to_string()),
            Cell::new(layout),
            Cell::new(&page.kept_lines.to_string()),
            Cell::new(&page.kept_words.to_string()),
        ];
        cells.extend(reasons.iter().map(|reason| {
            let count = page.removed.get(reason).map_or(0, |t| t.count);
            Cell::new(&count.to_string())
        }));
        table.add_row(Row::new(cells));
    }

    let totals = report.totals();
    let mut footer = vec![
        Cell::new("total"),
        Cell::new(""),
        Cell::new(&report.kept_lines().to_string()),
        Cell::new(&report.pages.iter().map(|p| p.kept_words).sum::<usize>().to_string()),
    ];
    footer.extend(reasons.iter().map(|r| Cell::new(&totals[r].to_string())));
    table.add_row(Row::new(footer));

    table
}

fn format_samples(report: &ExtractionReport) -> String {
    let mut result = String::new();
    for page in &report.pages {
        for (reason, tally) in &page.removed {
            for sample in &tally.samples {
                result.push_str(&f!("p{} {:<20} {}\n", page.page, reason.label(), sample));
            }
        }
    }
    result
}
