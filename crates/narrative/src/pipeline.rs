//! The extraction pipeline: runs in, narrative index and report out.
//!
//! Stages, in order:
//!
//! 1. sanitize every page and estimate the document body font
//! 2. index stationary stamps across pages
//! 3. per page, in parallel: noise filter, segments, reading order, lines
//! 4. learn header/footer signatures from every page, then strip them
//! 5. scholarly flags and the page-1 front-matter filter
//! 6. assemble page texts and build the index

use rayon::prelude::*;

use lector_core::index::{Exclusion, NarrativeIndex};

use crate::boilerplate::{self, SignatureSet};
use crate::columns::order_segments;
use crate::config::ExtractionConfig;
use crate::front_matter;
use crate::geometry::{document_body_font, page_geometry, sanitize_page};
use crate::lines::{build_line, build_segments, LineOutcome};
use crate::noise::{self, NoiseOutcome, StampIndex};
use crate::report::ExtractionReport;
use crate::source::RunSource;
use crate::types::{PageLines, PageRuns};

/// A built index together with what was removed to build it.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub index: NarrativeIndex,
    pub report: ExtractionReport,
    pub profile: DocumentProfile,
}

/// Document-wide facts learned during extraction. Anything read from a
/// page later, such as a forward probe, filters with the same ones.
#[derive(Debug, Clone, Default)]
pub struct DocumentProfile {
    pub body_font_size: f32,
    pub stamps: StampIndex,
    pub signatures: SignatureSet,
}

pub fn extract_from_source(source: &dyn RunSource, config: &ExtractionConfig) -> Extraction {
    let pages = source.all_pages(config.max_pages);
    log::debug!(
        "read {} of {} pages",
        pages.len(),
        source.page_count()
    );
    extract_pages(pages, config)
}

pub fn extract_pages(pages: Vec<PageRuns>, config: &ExtractionConfig) -> Extraction {
    let pages: Vec<PageRuns> = pages
        .into_iter()
        .take(config.max_pages)
        .map(sanitize_page)
        .collect();
    let document_body = document_body_font(&pages);
    let stamps = StampIndex::build(&pages, &config.noise);
    log::debug!(
        "extracting {} pages, body font {:.1}",
        pages.len(),
        document_body
    );

    let first_pass: Vec<PageLines> = pages
        .into_par_iter()
        .map(|page| page_lines(page, &stamps, document_body, config))
        .collect();

    let signatures = boilerplate::learn(&first_pass, &config.boilerplate);
    let stripped: Vec<PageLines> = first_pass
        .into_iter()
        .map(|page| boilerplate::strip(page, &signatures, &config.boilerplate))
        .collect();

    let flags = front_matter::detect_flags(&stripped);
    let pages: Vec<PageLines> = if config.front_matter {
        stripped
            .into_iter()
            .map(|page| front_matter::filter_first_page(page, &flags))
            .collect()
    } else {
        stripped
    };

    let report = ExtractionReport::from_pages(&pages, config.report_samples);
    let page_texts = pages.iter().map(assemble_page_text).collect();
    let exclusions = pages.into_iter().flat_map(|p| p.exclusions).collect();
    let index = NarrativeIndex::from_pages(page_texts, exclusions, flags);
    log::debug!(
        "index built: {} words, {} exclusions",
        index.word_count(),
        index.exclusions.len()
    );

    Extraction {
        index,
        report,
        profile: DocumentProfile {
            body_font_size: document_body,
            stamps,
            signatures,
        },
    }
}

/// The per-page pass. Touches nothing outside its own page.
fn page_lines(page: PageRuns, stamps: &StampIndex, document_body: f32, config: &ExtractionConfig) -> PageLines {
    let number = page.number;
    let geometry = page_geometry(&page, document_body);
    let NoiseOutcome {
        runs,
        mut exclusions,
    } = noise::filter_runs(page, &geometry, stamps, &config.noise);

    let segments = build_segments(runs, geometry.body_font_size, &config.lines);
    let order = order_segments(segments, &geometry, &config.columns);
    if let Some(split_x) = order.split_x {
        log::debug!("page {number}: two columns split at x={split_x:.1}");
    }

    let mut lines = Vec::with_capacity(order.segments.len());
    for segment in &order.segments {
        match build_line(segment, &geometry, &config.lines) {
            LineOutcome::Kept(line) => lines.push(line),
            LineOutcome::Excluded(reason, text) => exclusions.push(Exclusion {
                page: number,
                reason,
                text,
            }),
            LineOutcome::Empty => {}
        }
    }

    PageLines {
        number,
        lines,
        exclusions,
        two_column: order.two_column,
    }
}

/// Join a page's lines with newlines, rejoining words hyphenated across a
/// line break.
pub fn assemble_page_text(page: &PageLines) -> String {
    let mut text = String::new();
    for line in &page.lines {
        if text.is_empty() {
            text.push_str(&line.text);
            continue;
        }
        let continues = text
            .split_whitespace()
            .next_back()
            .is_some_and(is_hyphenated)
            && line.text.starts_with(char::is_lowercase);
        if continues {
            text.pop();
        } else {
            text.push('\n');
        }
        text.push_str(&line.text);
    }
    text
}

/// A word cut at the end of a line: lowercase letter, then a hyphen.
pub fn is_hyphenated(word: &str) -> bool {
    let mut chars = word.chars().rev();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boilerplate::signature;
    use crate::source::MemorySource;
    use crate::types::{GeometricTextRun, Line, LineKind};
    use lector_core::index::ExclusionReason;
    use lector_core::tokens;

    const WIDTH: f32 = 612.0;
    const HEIGHT: f32 = 792.0;
    const BODY: f32 = 10.0;

    fn make_run(text: &str, x: f32, y: f32) -> GeometricTextRun {
        GeometricTextRun::new(text, x, y, text.chars().count() as f32 * 5.0, BODY)
    }

    fn make_wide_run(text: &str, x: f32, y: f32, width: f32) -> GeometricTextRun {
        GeometricTextRun::new(text, x, y, width, BODY)
    }

    fn make_page(number: usize, runs: Vec<GeometricTextRun>) -> PageRuns {
        PageRuns::new(number, WIDTH, HEIGHT, runs)
    }

    fn make_prose_page(number: usize, sentences: &[&str]) -> PageRuns {
        let runs = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| make_run(s, 72.0, 200.0 + i as f32 * 14.0))
            .collect();
        make_page(number, runs)
    }

    /// Two bands of five two-column rows around a full-width caption at
    /// 40% of the page height.
    fn make_two_column_page(number: usize) -> PageRuns {
        let mut runs = Vec::new();
        for (band, top) in [(1, 100.0), (2, 400.0)] {
            for row in 0..5 {
                let y = top + row as f32 * 14.0;
                runs.push(make_wide_run(&format!("band{band} left row{row} words"), 60.0, y, 210.0));
                runs.push(make_wide_run(&format!("band{band} right row{row} words"), 342.0, y, 210.0));
            }
        }
        runs.push(make_wide_run(
            "Figure 1. Caption spanning both columns",
            60.0,
            317.0,
            492.0,
        ));
        make_page(number, runs)
    }

    fn make_line(text: &str) -> Line {
        Line {
            text: text.to_string(),
            signature: signature(text),
            y_norm: 0.5,
            token_count: text.split_whitespace().count(),
            kind: LineKind::Ordinary,
        }
    }

    fn page_lines_of(index: &NarrativeIndex, page: usize) -> Vec<&str> {
        index.page_texts[page - 1].lines().collect()
    }

    // =====================================================================
    // Reading order
    // =====================================================================

    #[test]
    fn test_single_column_round_trip() {
        let sentences = [
            "The first sentence opens the page.",
            "A second sentence follows it.",
            "The third one closes the paragraph.",
        ];
        let extraction = extract_pages(vec![make_prose_page(1, &sentences)], &ExtractionConfig::default());
        assert_eq!(page_lines_of(&extraction.index, 1), sentences);
        assert!(!extraction.report.pages[0].two_column);
    }

    #[test]
    fn test_two_column_scenario() {
        let pages = vec![
            make_prose_page(1, &["Opening page of the document."]),
            make_two_column_page(2),
            make_prose_page(3, &["Closing page of the document."]),
        ];
        let extraction = extract_pages(pages, &ExtractionConfig::default());
        let index = &extraction.index;

        let mut expected: Vec<String> = Vec::new();
        for side in ["left", "right"] {
            expected.extend((0..5).map(|row| format!("band1 {side} row{row} words")));
        }
        expected.push("\u{00BB} Figure 1. Caption spanning both columns".to_string());
        for side in ["left", "right"] {
            expected.extend((0..5).map(|row| format!("band2 {side} row{row} words")));
        }
        assert_eq!(page_lines_of(index, 2), expected);
        assert_eq!(page_lines_of(index, 1), vec!["Opening page of the document."]);
        assert_eq!(page_lines_of(index, 3), vec!["Closing page of the document."]);
        assert_eq!(index.flags.two_column_pages, vec![2]);
    }

    // =====================================================================
    // Index invariants
    // =====================================================================

    #[test]
    fn test_extraction_is_idempotent() {
        let pages = vec![
            make_prose_page(1, &["Opening page of the document."]),
            make_two_column_page(2),
        ];
        let config = ExtractionConfig::default();
        let first = extract_pages(pages.clone(), &config).index;
        let second = extract_pages(pages, &config).index;
        assert_eq!(first.full_text, second.full_text);
        assert_eq!(first.page_word_starts, second.page_word_starts);
    }

    #[test]
    fn test_page_word_starts_count_words_before_each_page() {
        let pages = vec![
            make_prose_page(1, &["Opening page of the document."]),
            make_two_column_page(2),
            make_prose_page(3, &["Closing page of the document."]),
        ];
        let index = extract_pages(pages, &ExtractionConfig::default()).index;

        let words_in_full_text = tokens::tokenize(&index.full_text)
            .iter()
            .filter(|t| !t.is_line_break())
            .count();
        assert_eq!(words_in_full_text, index.tokens.len());

        let mut before = 0;
        for (i, text) in index.page_texts.iter().enumerate() {
            assert_eq!(index.page_word_starts[i], before);
            before += tokens::word_count(text);
        }
    }

    #[test]
    fn test_empty_input_builds_empty_index() {
        let extraction = extract_pages(Vec::new(), &ExtractionConfig::default());
        assert!(extraction.index.is_empty());
        assert_eq!(extraction.index.full_text, "");
        assert!(extraction.report.pages.is_empty());
    }

    #[test]
    fn test_max_pages_truncates() {
        let pages = (1..=4)
            .map(|n| make_prose_page(n, &["Some narrative text on this page."]))
            .collect();
        let config = ExtractionConfig {
            max_pages: 2,
            ..ExtractionConfig::default()
        };
        assert_eq!(extract_pages(pages, &config).index.page_count, 2);
    }

    // =====================================================================
    // Headers
    // =====================================================================

    #[test]
    fn test_running_header_removed_but_body_copy_kept() {
        let header = "Journal of Testing Methods";
        let pages = (1..=4)
            .map(|n| {
                let mut runs = vec![
                    make_run(header, 72.0, 40.0),
                    make_run(&format!("Narrative content for page number {n}."), 72.0, 200.0),
                ];
                if n == 2 {
                    runs.push(make_run(header, 72.0, 300.0));
                }
                make_page(n, runs)
            })
            .collect();
        let mut config = ExtractionConfig::default();
        config.noise.stamps = false;
        config.noise.body_box = false;

        let extraction = extract_pages(pages, &config);
        let index = &extraction.index;
        for page in 1..=4 {
            let headers: Vec<_> = index
                .exclusions_for(page)
                .filter(|e| e.reason == ExclusionReason::Header)
                .collect();
            assert_eq!(headers.len(), 1, "page {page}");
            assert_eq!(headers[0].text, header);
        }
        assert_eq!(
            page_lines_of(index, 2),
            vec!["Narrative content for page number 2.", header]
        );
        assert_eq!(extraction.report.totals()[&ExclusionReason::Header], 4);
    }

    #[test]
    fn test_edge_bands_removed_as_body_box_by_default() {
        let page = make_page(
            1,
            vec![
                make_run("Preprint header", 72.0, 40.0),
                make_run("Narrative content in the body.", 72.0, 200.0),
                make_run("margin", 20.0, 300.0),
                make_run("Footer line", 72.0, 770.0),
            ],
        );
        let extraction = extract_pages(vec![page], &ExtractionConfig::default());

        assert_eq!(
            page_lines_of(&extraction.index, 1),
            vec!["Narrative content in the body."]
        );
        let tally = &extraction.report.pages[0].removed[&ExclusionReason::BodyBox];
        assert_eq!(tally.count, 3);
        assert!(tally.samples.contains(&"margin".to_string()));
        let json = serde_json::to_value(&extraction.report).unwrap();
        assert_eq!(json["pages"][0]["removed"]["body-box"]["count"], 3);
    }

    // =====================================================================
    // Glue, end to end
    // =====================================================================

    #[test]
    fn test_glue_rules_through_pipeline() {
        let page = make_page(
            1,
            vec![
                make_run("Cells", 72.0, 200.0),
                make_run("CD16", 102.0, 200.0),
                make_run("+", 122.5, 200.0),
                make_run("and", 131.0, 200.0),
                make_run("(CCL)", 150.0, 200.0),
                make_run("-3", 175.5, 200.0),
                make_run("CD47/", 72.0, 214.0),
                make_run("SIRP", 98.0, 214.0),
                make_run("axis", 122.0, 214.0),
            ],
        );
        let index = extract_pages(vec![page], &ExtractionConfig::default()).index;
        assert_eq!(
            page_lines_of(&index, 1),
            vec!["Cells CD16+ and (CCL)-3", "CD47/ SIRP axis"]
        );
    }

    #[test]
    fn test_glue_rules_for_touching_runs_through_pipeline() {
        // widths are 5 points per character, so each run starts where the
        // previous one ends
        let page = make_page(
            1,
            vec![
                make_run("Cells", 72.0, 200.0),
                make_run("CD16", 102.0, 200.0),
                make_run("+", 122.0, 200.0),
                make_run("and", 131.0, 200.0),
                make_run("(CCL)", 150.0, 200.0),
                make_run("-3", 175.0, 200.0),
                make_run("CD47/", 72.0, 214.0),
                make_run("SIRP", 97.0, 214.0),
                make_run("axis", 121.0, 214.0),
            ],
        );
        let index = extract_pages(vec![page], &ExtractionConfig::default()).index;
        assert_eq!(
            page_lines_of(&index, 1),
            vec!["Cells CD16+ and (CCL)-3", "CD47/ SIRP axis"]
        );
    }

    // =====================================================================
    // Assembly
    // =====================================================================

    #[test]
    fn test_assemble_dehyphenates_across_lines() {
        let page = PageLines {
            number: 1,
            lines: vec![
                make_line("the immune re-"),
                make_line("sponse was strong"),
                make_line("CD4-"),
                make_line("cells remained"),
            ],
            ..PageLines::default()
        };
        assert_eq!(
            assemble_page_text(&page),
            "the immune response was strong\nCD4-\ncells remained"
        );
    }

    #[test]
    fn test_is_hyphenated() {
        assert!(is_hyphenated("re-"));
        assert!(!is_hyphenated("CD4-"));
        assert!(!is_hyphenated("-"));
        assert!(!is_hyphenated("word"));
    }

    #[test]
    fn test_extract_from_memory_source() {
        let source = MemorySource::new(vec![make_prose_page(1, &["Only page here."])]);
        let extraction = extract_from_source(&source, &ExtractionConfig::default());
        assert_eq!(extraction.index.page_texts, vec!["Only page here."]);
    }
}
