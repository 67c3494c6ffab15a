//! Long-running JSON-lines session over stdio.
//!
//! One request per line, one response per line. Requests share a single
//! index cache, selection slot and target memory, so a viewer can open a
//! document once, push selections as the user makes them, and ask where
//! to start reading.
//!
//! ```text
//! {"id":1,"op":"open","path":"paper.pdf"}
//! {"id":2,"op":"capture","path":"paper.pdf","text":"apple","page":2,"rect":{"left":0.1,"top":0.3,"right":0.2,"bottom":0.32}}
//! {"id":3,"op":"anchor"}
//! {"id":4,"op":"text","page":2}
//! ```

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use lector_core::anchor::AnchorRequest;
use lector_core::selection::{NormalizedRect, SelectionSlot, SelectionSnapshot, TargetMemory};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::anchor::{answer, attach_probe};
use crate::cache::IndexCache;
use crate::config::Settings;
use crate::prelude::{eprintln, *};

#[derive(Debug, Deserialize)]
struct SessionRequest {
    #[serde(default)]
    id: Option<Value>,
    #[serde(flatten)]
    command: Command,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum Command {
    Open {
        path: PathBuf,
    },
    Capture {
        path: PathBuf,
        text: String,
        #[serde(default)]
        raw_text: String,
        page: usize,
        rect: NormalizedRect,
        #[serde(default)]
        captured_at: Option<DateTime<Utc>>,
    },
    Anchor {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Text {
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        page: Option<usize>,
    },
    Clear,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub struct Session {
    cache: IndexCache,
    slot: SelectionSlot,
    target: TargetMemory,
    settings: Settings,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self::with_cache(IndexCache::new(settings.extraction.clone()), settings)
    }

    pub fn with_cache(cache: IndexCache, settings: Settings) -> Self {
        Self {
            cache,
            slot: SelectionSlot::new(),
            target: TargetMemory::new(settings.session.target_ttl()),
            settings,
        }
    }

    pub async fn handle_line(&mut self, line: &str, now: DateTime<Utc>) -> SessionResponse {
        let request: SessionRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                return SessionResponse {
                    id: None,
                    result: None,
                    error: Some(f!("Parse error: {e}")),
                }
            }
        };

        match self.dispatch(request.command, now).await {
            Ok(result) => SessionResponse {
                id: request.id,
                result: Some(result),
                error: None,
            },
            Err(e) => SessionResponse {
                id: request.id,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn dispatch(&mut self, command: Command, now: DateTime<Utc>) -> Result<Value> {
        match command {
            Command::Open { path } => {
                let document = self.cache.get(&path).await?;
                self.target.touch(&path, now);
                let index = &document.extraction.index;
                Ok(json!({
                    "path": path,
                    "pages": index.page_count,
                    "words": index.word_count(),
                    "flags": index.flags,
                }))
            }
            Command::Capture {
                path,
                text,
                raw_text,
                page,
                rect,
                captured_at,
            } => {
                let snapshot = SelectionSnapshot {
                    text,
                    raw_text,
                    file_path: path.clone(),
                    page,
                    rect,
                    captured_at: captured_at.unwrap_or(now),
                };
                let crosses_page = snapshot.crosses_page();
                self.target.touch(path, now);
                self.slot.capture(snapshot);
                Ok(json!({ "captured": true, "crosses_page": crosses_page }))
            }
            Command::Anchor { path } => {
                let snapshot = self
                    .slot
                    .for_anchoring(now, self.settings.session.selection_max_age())
                    .ok_or_else(|| eyre!(Error::Session("no selection captured".to_string())))?;
                let explicit = path.as_deref().unwrap_or(snapshot.file_path.as_path());
                let path = self
                    .target
                    .resolve(Some(explicit), now)
                    .ok_or_else(|| eyre!(Error::NoTarget))?;
                let document = self.cache.get(&path).await?;

                let request = attach_probe(
                    AnchorRequest::from(&snapshot),
                    &document,
                    &snapshot.rect,
                    &self.settings,
                );
                let answer = answer(&document, &request, &self.settings.anchor);
                Ok(serde_json::to_value(answer)?)
            }
            Command::Text { path, page } => {
                let path = self
                    .target
                    .resolve(path.as_deref(), now)
                    .ok_or_else(|| eyre!(Error::NoTarget))?;
                let document = self.cache.get(&path).await?;
                let index = &document.extraction.index;
                match page {
                    Some(page) => {
                        let range = index
                            .page_range(page)
                            .ok_or_else(|| eyre!("Page {page} out of range"))?;
                        Ok(json!({
                            "page": page,
                            "text": index.page_texts[page - 1],
                            "first_word": range.start,
                        }))
                    }
                    None => Ok(json!({
                        "text": index.full_text,
                        "page_word_starts": index.page_word_starts,
                    })),
                }
            }
            Command::Clear => {
                self.slot.clear();
                self.target.forget();
                Ok(json!({ "cleared": true }))
            }
        }
    }
}

pub async fn run(global: crate::Global, settings: Settings) -> Result<()> {
    if global.verbose {
        eprintln!("Starting lector session on stdio...");
        eprintln!();
    }

    let mut session = Session::new(settings);
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if global.verbose {
            eprintln!("Received: {trimmed}");
        }

        let response = session.handle_line(trimmed, Utc::now()).await;
        let response_json = serde_json::to_string(&response)?;

        stdout.write_all(response_json.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}
