use std::path::PathBuf;

use colored::Colorize;
use lector_core::anchor::{resolve, AnchorConfig, AnchorReport, AnchorRequest};
use lector_core::selection::NormalizedRect;
use serde::{Deserialize, Serialize};

use crate::cache::{Document, IndexCache};
use crate::config::Settings;
use crate::prelude::{eprintln, println, *};

/// Words of narrative shown after an anchored index.
const PREVIEW_WORDS: usize = 12;

pub const MISS_NOTICE: &str = "Could not place the selection in the document; reading it as selected.";

#[derive(Debug, clap::Args, serde::Serialize, serde::Deserialize, Clone)]
pub struct AnchorOptions {
    /// Path to the PDF file
    pub path: PathBuf,

    /// The selected text
    pub selection: String,

    /// Page the selection was made on (1-indexed)
    #[arg(short, long)]
    pub page: Option<usize>,

    /// Word offset of the selection within its page
    #[arg(long)]
    pub offset: Option<usize>,

    /// Selection rectangle as page fractions: left,top,right,bottom
    #[arg(long, value_parser = parse_rect)]
    pub rect: Option<NormalizedRect>,

    /// Text around the selection as captured by the viewer
    #[arg(long)]
    pub raw_text: Option<String>,

    /// Output the answer with full diagnostics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Where a selection landed, or the literal selection when it did not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorAnswer {
    pub index: Option<usize>,
    pub page: Option<usize>,
    /// Narrative from the anchored word onward, or the selection itself.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub report: AnchorReport,
}

pub async fn run(options: AnchorOptions, global: crate::Global, settings: Settings) -> Result<()> {
    let cache = IndexCache::new(settings.extraction.clone());
    let document = cache.get(&options.path).await?;

    let mut request = AnchorRequest::new(options.selection.clone());
    request.page = options.page;
    request.offset = options.offset;
    request.raw_text = options.raw_text.clone();
    if let Some(rect) = &options.rect {
        request.y_fraction = Some(rect.top.clamp(0.0, 1.0));
        request.crosses_page = rect.leaves_page();
        request = attach_probe(request, &document, rect, &settings);
    }
    if global.verbose {
        eprintln!("probe: {:?}", request.probe);
    }

    let answer = answer(&document, &request, &settings.anchor);
    if options.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    match (answer.index, answer.page) {
        (Some(index), page) => {
            let page = page.map_or_else(|| "?".to_string(), |p| p.to_string());
            println!("{} token {index} (page {page})", "found".green().bold());
            println!("{}", answer.text);
        }
        _ => {
            println!("{} {}", "not found".yellow().bold(), answer.notice.unwrap_or_default());
            println!("{}", answer.text);
        }
    }
    Ok(())
}

/// Read a forward probe from the page the request names, unless the
/// selection leaves the page.
pub fn attach_probe(
    mut request: AnchorRequest,
    document: &Document,
    rect: &NormalizedRect,
    settings: &Settings,
) -> AnchorRequest {
    if request.crosses_page || request.probe.is_some() {
        return request;
    }
    let Some(page) = request.page.and_then(|p| document.page(p)) else {
        return request;
    };
    request.probe = narrative::forward_probe(
        page,
        rect,
        &request.selection,
        &document.extraction.profile,
        &settings.extraction,
        settings.anchor.probe_max_tokens,
    );
    request
}

pub fn answer(document: &Document, request: &AnchorRequest, config: &AnchorConfig) -> AnchorAnswer {
    let index = &document.extraction.index;
    let report = resolve(index, request, config);

    match report.index() {
        Some(found) => AnchorAnswer {
            index: Some(found),
            page: index.page_of(found),
            text: index
                .tokens
                .iter()
                .skip(found)
                .take(PREVIEW_WORDS)
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
            notice: None,
            report,
        },
        None => {
            log::info!(
                "selection {:?} not anchored: {:?}",
                request.selection,
                report.outcome
            );
            AnchorAnswer {
                index: None,
                page: None,
                text: request.selection.clone(),
                notice: Some(MISS_NOTICE.to_string()),
                report,
            }
        }
    }
}

fn parse_rect(raw: &str) -> std::result::Result<NormalizedRect, String> {
    let values: Vec<f32> = raw
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| f!("invalid rectangle {raw:?}: {e}"))?;
    match values.as_slice() {
        [left, top, right, bottom] => Ok(NormalizedRect::new(*left, *top, *right, *bottom)),
        _ => Err(f!("expected left,top,right,bottom, got {raw:?}")),
    }
}
