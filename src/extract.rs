//! Chapter content extraction and text normalization.
//!
//! Given a chapter page's HTML, locates the content region among a priority
//! list of selector candidates (falling back to `<body>` with a warning),
//! replaces `<br>` elements with a textual marker so explicit line-break
//! intent survives flattening, then runs a fixed sequence of normalization
//! passes. The pass order is part of the observable contract — chapter text
//! fidelity depends on collapse-before-strip precedence — so it is applied
//! literally rather than as an equivalent rewrite.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use tracing::debug;

use crate::report::{Level, Reporter};

/// Marker substituted for `<br>` elements; distinct from ordinary newlines
/// so soft-wrap collapsing cannot eat explicit breaks.
const BR_MARKER: &str = "__BR_BREAK__";

/// Content region candidates, in priority order.
const CONTENT_SELECTORS: [&str; 4] = [
    "#chp_raw",
    "#chapter-content",
    "div.chapter-content",
    "#chp_contents",
];

/// Trailing site-name suffix stripped from chapter page titles.
const TITLE_SUFFIX: &str = " \u{2013} Scribble Hub";

/// Placeholder title when the page has no `<title>` element.
const UNTITLED: &str = "Untitled Chapter";

/// Maximum trimmed length of a line eligible for navigation stripping.
const NAV_LINE_MAX_LEN: usize = 30;

/// Keywords identifying short navigation/boilerplate lines.
const NAV_KEYWORDS: [&str; 5] = ["previous", "next", "index", "advertisements", "shortcut:"];

/// Extraction failure. A single unextractable chapter aborts the whole run
/// rather than producing a gap in the output.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Nothing was left after normalization and boilerplate removal.
    #[error("chapter body extraction resulted in empty text")]
    EmptyBody,
}

/// Title and normalized plain-text body of one chapter page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterContent {
    /// Page `<title>` with the site suffix stripped.
    pub title: String,
    /// Normalized body text. Never empty.
    pub body: String,
}

/// Parses a selector that is a compile-time constant.
#[allow(clippy::expect_used)]
fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector must parse")
}

/// Compiles a regex that is a compile-time constant.
#[allow(clippy::expect_used)]
fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern must compile")
}

static HORIZONTAL_RUNS: LazyLock<Regex> = LazyLock::new(|| re(r"[ \t]+"));
static LINE_LEADING_WS: LazyLock<Regex> = LazyLock::new(|| re(r"\n[ \t]+"));
static LINE_TRAILING_WS: LazyLock<Regex> = LazyLock::new(|| re(r"[ \t]+\n"));
static EXCESS_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| re(r"\n{3,}"));

/// Extracts the title and normalized body from a chapter page.
///
/// Selector fallback to `<body>` is a recoverable degradation reported as a
/// warning through `reporter`, not a failure.
///
/// # Errors
///
/// Returns [`ExtractionError::EmptyBody`] when no text survives cleanup.
pub fn extract_chapter(
    html: &str,
    reporter: &dyn Reporter,
) -> Result<ChapterContent, ExtractionError> {
    let doc = Html::parse_document(html);

    let region = CONTENT_SELECTORS.iter().find_map(|selector| {
        doc.select(&sel(selector))
            .next()
            .filter(|el| el.text().any(|t| !t.trim().is_empty()))
    });
    let region = match region {
        Some(el) => el,
        None => {
            reporter.log_event(
                "Falling back to <body> for chapter content extraction.",
                Level::Warning,
            );
            doc.select(&sel("body"))
                .next()
                .unwrap_or_else(|| doc.root_element())
        }
    };

    let raw_body = flatten_with_markers(region);
    let body = strip_navigation_lines(&normalize_text(&raw_body));
    if body.is_empty() {
        return Err(ExtractionError::EmptyBody);
    }
    debug!(chars = body.len(), "chapter body extracted");

    let title = doc
        .select(&sel("title"))
        .next()
        .map_or_else(|| UNTITLED.to_string(), element_text);
    let title = title
        .strip_suffix(TITLE_SUFFIX)
        .map_or(title.clone(), ToString::to_string);

    Ok(ChapterContent { title, body })
}

/// Concatenation of an element's text nodes, each trimmed, empties skipped.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Flattens an element subtree to text: every text node verbatim, every
/// `<br>` as `\n{marker}\n`, all parts joined with newlines.
fn flatten_with_markers(el: ElementRef<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();
    collect_parts(el, &mut parts);
    parts.join("\n")
}

fn collect_parts(el: ElementRef<'_>, parts: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => parts.push(text.to_string()),
            Node::Element(element) => {
                if element.name() == "br" {
                    parts.push(format!("\n{BR_MARKER}\n"));
                } else if let Some(child_el) = ElementRef::wrap(child) {
                    collect_parts(child_el, parts);
                }
            }
            _ => {}
        }
    }
}

/// Normalizes flattened chapter text. Pass order matters:
///
/// 1. Unify line endings, convert NBSP to plain spaces.
/// 2. Collapse lone newlines (soft wraps) into spaces; newlines adjacent to
///    another newline or to the break marker are preserved.
/// 3. A marker between single newlines becomes exactly one newline.
/// 4. Remaining markers are removed.
/// 5. Horizontal whitespace runs collapse to one space; line-edge
///    whitespace is stripped; 3+ blank lines collapse to one blank line.
/// 6. Lines are right-trimmed and the whole text is trimmed.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let cleaned = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{a0}', " ");
    let cleaned = collapse_soft_wraps(&cleaned);
    let cleaned = cleaned.replace(&format!("\n{BR_MARKER}\n"), "\n");
    let cleaned = cleaned.replace(BR_MARKER, "");
    let cleaned = HORIZONTAL_RUNS.replace_all(&cleaned, " ");
    let cleaned = LINE_LEADING_WS.replace_all(&cleaned, "\n");
    let cleaned = LINE_TRAILING_WS.replace_all(&cleaned, "\n");
    let cleaned = EXCESS_BLANK_LINES.replace_all(&cleaned, "\n\n");
    cleaned
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Replaces every newline that is not adjacent to another newline or to the
/// break marker with a single space. Equivalent to the lookaround pattern
/// `(?<!\n)(?<!MARKER)\n(?!\n|MARKER)`, which the regex engine here cannot
/// express directly.
fn collapse_soft_wraps(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let marker: Vec<char> = BR_MARKER.chars().collect();
    let marker_len = marker.len();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if c != '\n' {
            out.push(c);
            continue;
        }
        let prev_is_newline = i > 0 && chars[i - 1] == '\n';
        let prev_is_marker = i >= marker_len && chars[i - marker_len..i] == marker[..];
        let next_is_newline = chars.get(i + 1) == Some(&'\n');
        let next_is_marker = chars[i + 1..].starts_with(marker.as_slice());
        if prev_is_newline || prev_is_marker || next_is_newline || next_is_marker {
            out.push('\n');
        } else {
            out.push(' ');
        }
    }
    out
}

/// Drops short navigation lines: any line whose trimmed form is at most 30
/// characters and contains one of the navigation keywords
/// (case-insensitive). Blank lines pass through unchanged; the check is
/// line-local, so keyword text embedded in a long paragraph survives.
#[must_use]
pub fn strip_navigation_lines(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            kept.push(line);
            continue;
        }
        let lower = trimmed.to_lowercase();
        if trimmed.chars().count() <= NAV_LINE_MAX_LEN
            && NAV_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        {
            continue;
        }
        kept.push(line);
    }
    kept.join("\n").trim().to_string()
}
