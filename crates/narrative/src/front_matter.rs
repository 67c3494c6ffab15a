//! Scholarly heuristics and the first-page front-matter filter.

use std::sync::OnceLock;

use regex::Regex;

use lector_core::index::{Exclusion, ExclusionReason, ScholarlyFlags};

use crate::types::PageLines;

fn unmarked(text: &str) -> &str {
    text.trim_start_matches(['#', '\u{00BB}']).trim_start()
}

fn is_abstract(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^abstract\b").unwrap());
    re.is_match(unmarked(text))
}

fn is_introduction(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^(?:\d{1,2}\.?\s+)?introduction\b").unwrap());
    re.is_match(unmarked(text))
}

fn is_references_heading(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:\d{1,2}\.?\s+)?(?:references|bibliography|literature cited|works cited)$")
            .unwrap()
    });
    re.is_match(unmarked(text).trim())
}

fn has_doi(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)\bdoi\b|\b10\.\d{4,9}/\S+").unwrap());
    re.is_match(text)
}

fn is_front_matter(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:university|universit[äé]|department|dept|institute|hospital|school of|laboratory|faculty|college|cent(?:er|re) for)\b|[\w.+-]+@[\w-]+\.[\w.]+|correspond|to whom|^\*|\b(?:received|accepted|revised|published online|available online)\b|\bkey\s?words\b|article history|article info",
        )
        .unwrap()
    });
    re.is_match(unmarked(text))
}

/// Derive document-level flags from the per-page pass.
///
/// Excluded lines count too: a DOI line is usually dropped as boilerplate
/// but still marks the document as scholarly.
pub fn detect_flags(pages: &[PageLines]) -> ScholarlyFlags {
    let texts = || {
        pages.iter().flat_map(|p| {
            p.lines
                .iter()
                .map(|l| l.text.as_str())
                .chain(p.exclusions.iter().map(|e| e.text.as_str()))
        })
    };

    let has_abstract = texts().any(is_abstract);
    let has_references = texts().any(is_references_heading);
    let doi = texts().any(has_doi);

    ScholarlyFlags {
        looks_scholarly: has_abstract || has_references || doi,
        has_abstract,
        has_references,
        two_column_pages: pages
            .iter()
            .filter(|p| p.two_column)
            .map(|p| p.number)
            .collect(),
    }
}

/// Drop affiliation, correspondence, date and keyword lines that precede
/// the abstract or introduction on page 1 of a scholarly document.
pub fn filter_first_page(page: PageLines, flags: &ScholarlyFlags) -> PageLines {
    if page.number != 1 || !flags.looks_scholarly {
        return page;
    }
    let Some(stop) = page
        .lines
        .iter()
        .position(|l| is_abstract(&l.text) || is_introduction(&l.text))
    else {
        return page;
    };

    let PageLines {
        number,
        lines,
        mut exclusions,
        two_column,
    } = page;

    let mut kept = Vec::with_capacity(lines.len());
    for (i, line) in lines.into_iter().enumerate() {
        if i < stop && is_front_matter(&line.text) {
            exclusions.push(Exclusion {
                page: number,
                reason: ExclusionReason::FrontMatter,
                text: line.text,
            });
        } else {
            kept.push(line);
        }
    }
    log::debug!(
        "front matter filter removed {} lines from page 1",
        exclusions
            .iter()
            .filter(|e| e.reason == ExclusionReason::FrontMatter)
            .count()
    );

    PageLines {
        number,
        lines: kept,
        exclusions,
        two_column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boilerplate::signature;
    use crate::types::{Line, LineKind};

    fn make_line(text: &str) -> Line {
        Line {
            text: text.to_string(),
            signature: signature(text),
            y_norm: 0.3,
            token_count: text.split_whitespace().count(),
            kind: LineKind::Ordinary,
        }
    }

    fn make_page(number: usize, texts: &[&str]) -> PageLines {
        PageLines {
            number,
            lines: texts.iter().map(|t| make_line(t)).collect(),
            ..PageLines::default()
        }
    }

    fn make_first_page() -> PageLines {
        make_page(
            1,
            &[
                "Tumour Immunity in Practice",
                "Jane Doe, John Roe",
                "1 Department of Immunology, Example University",
                "Correspondence: jane@example.org",
                "Received 3 March 2020; accepted 9 May 2020",
                "Abstract",
                "We studied the department of health records.",
            ],
        )
    }

    #[test]
    fn test_flags_from_abstract_and_references() {
        let mut last = make_page(5, &["## References", "1. Doe J. Paper."]);
        last.two_column = true;
        let flags = detect_flags(&[make_first_page(), last]);
        assert!(flags.looks_scholarly);
        assert!(flags.has_abstract);
        assert!(flags.has_references);
        assert_eq!(flags.two_column_pages, vec![5]);
    }

    #[test]
    fn test_doi_in_exclusions_marks_scholarly() {
        let mut page = make_page(1, &["Plain text"]);
        page.exclusions.push(Exclusion {
            page: 1,
            reason: ExclusionReason::BoilerplatePattern,
            text: "doi:10.1000/abc".to_string(),
        });
        let flags = detect_flags(&[page]);
        assert!(flags.looks_scholarly);
        assert!(!flags.has_abstract);
    }

    #[test]
    fn test_front_matter_removed_before_abstract_only() {
        let flags = detect_flags(&[make_first_page()]);
        let page = filter_first_page(make_first_page(), &flags);
        let texts: Vec<&str> = page.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Tumour Immunity in Practice",
                "Jane Doe, John Roe",
                "Abstract",
                "We studied the department of health records.",
            ]
        );
        assert_eq!(page.exclusions.len(), 3);
        assert!(page
            .exclusions
            .iter()
            .all(|e| e.reason == ExclusionReason::FrontMatter));
    }

    #[test]
    fn test_non_scholarly_or_later_pages_untouched() {
        let flags = ScholarlyFlags::default();
        assert_eq!(filter_first_page(make_first_page(), &flags).lines.len(), 7);

        let flags = ScholarlyFlags {
            looks_scholarly: true,
            ..ScholarlyFlags::default()
        };
        let mut second = make_first_page();
        second.number = 2;
        assert_eq!(filter_first_page(second, &flags).lines.len(), 7);
    }

    #[test]
    fn test_no_abstract_or_introduction_keeps_page() {
        let flags = ScholarlyFlags {
            looks_scholarly: true,
            ..ScholarlyFlags::default()
        };
        let page = make_page(1, &["Department of Physics", "Body text"]);
        assert_eq!(filter_first_page(page, &flags).lines.len(), 2);
    }
}
