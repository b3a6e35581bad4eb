//! Chapter listing discovery.
//!
//! Fetches the series page, extracts the origin's internal post identifier,
//! then POSTs to the origin's pagination endpoint for the full table of
//! contents fragment. The fragment is parsed by an ordered list of
//! strategies (list-style markup first, table-style as fallback) into a
//! de-duplicated, deterministically ordered sequence of [`ChapterListing`]s.
//!
//! Ordering is a pure function of `(numeric key or +infinity, URL)`:
//! entries without a numeric key sort after all keyed entries, ties break
//! lexicographically by URL. Positions are then assigned 1..N in sorted
//! order and become the authoritative download order.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::fetch::{FetchFailed, Request, RetryingClient};
use crate::report::{Level, Reporter};
use crate::types::ChapterListing;

/// Path of the origin-internal AJAX endpoint serving the TOC fragment,
/// resolved against the series URL's origin.
const TOC_ENDPOINT_PATH: &str = "/wp-admin/admin-ajax.php";

/// AJAX action name for the releases pagination.
const TOC_ACTION: &str = "wi_getreleases_pagination";

/// Page-number sentinel meaning "return all pages at once".
const ALL_PAGES: &str = "-1";

/// Errors that can occur before any chapter fetch begins.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A discovery HTTP call exhausted its retries.
    #[error(transparent)]
    Fetch(#[from] FetchFailed),

    /// The series URL could not be parsed as an absolute URL.
    #[error("invalid series URL: {url}")]
    InvalidSeriesUrl {
        /// The offending URL string.
        url: String,
    },

    /// The series page is missing its post-id marker.
    #[error("series post ID not found; is this a series page?")]
    PostIdNotFound,

    /// Neither parsing strategy found any chapter link in the fragment.
    #[error("no chapter links were detected in the table of contents")]
    NoChapterLinks,
}

/// Optional numeric ordering key from a listing row.
///
/// Entries lacking a key sort after all keyed entries (the derived variant
/// order puts `Ordered(_)` before `Unordered`), equivalent to mapping the
/// missing key to the maximum representable order value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Ordered(u64),
    Unordered,
}

/// Raw entry produced by a parsing strategy, prior to sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TocEntry {
    key: SortKey,
    url: String,
    title: String,
}

/// Fragment parsing strategy: container element in, candidate entries out.
type Strategy = for<'a> fn(ElementRef<'a>, &Url) -> Vec<TocEntry>;

/// Strategies in priority order; the first one yielding entries wins.
const STRATEGIES: [(&str, Strategy); 2] = [
    ("list", parse_list_entries),
    ("table", parse_table_entries),
];

/// Parses a selector that is a compile-time constant.
#[allow(clippy::expect_used)]
fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector must parse")
}

/// Concatenation of an element's text nodes, each trimmed, empties skipped.
fn stripped_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Discovers the ordered chapter listings for a series.
///
/// Returns the listings in authoritative download order plus the advisory
/// expected total from the series page's counter marker, when present. A
/// mismatch between the two is reported as a warning, never a failure.
///
/// # Errors
///
/// Fails when a discovery request exhausts its retries, when the series
/// page lacks the post-id marker, or when no chapter links are detected.
pub async fn collect_listings(
    client: &RetryingClient,
    series_url: &str,
    reporter: &dyn Reporter,
) -> Result<(Vec<ChapterListing>, Option<usize>), DiscoveryError> {
    reporter.update_status("Collecting chapter listings...", Level::Info);
    reporter.update_detail(None, Level::Muted);

    let base = Url::parse(series_url).map_err(|_| DiscoveryError::InvalidSeriesUrl {
        url: series_url.to_string(),
    })?;

    let series_html = client
        .request(Request::get(series_url, "Series page request"), reporter)
        .await?;
    let (post_id, expected_total) = parse_series_metadata(&series_html)?;
    debug!(post_id, ?expected_total, "parsed series metadata");

    let endpoint = base
        .join(TOC_ENDPOINT_PATH)
        .map_err(|_| DiscoveryError::InvalidSeriesUrl {
            url: series_url.to_string(),
        })?
        .to_string();
    let form = [
        ("action", TOC_ACTION),
        ("pagenum", ALL_PAGES),
        ("mypostid", post_id.as_str()),
    ];
    let toc_html = client
        .request(
            Request::post_form(&endpoint, "TOC request", &form)
                .referer(series_url)
                .validator(|body| !body.trim().is_empty())
                .log_prefix("  "),
            reporter,
        )
        .await?;

    let entries = parse_toc_entries(toc_html.trim(), &base);
    if entries.is_empty() {
        return Err(DiscoveryError::NoChapterLinks);
    }

    let listings = into_ordered_listings(entries);

    if let Some(expected) = expected_total {
        if expected != 0 && expected != listings.len() {
            reporter.log_event(
                &format!(
                    "Expected {expected} chapters but collected {}.",
                    listings.len()
                ),
                Level::Warning,
            );
        }
    }

    Ok((listings, expected_total))
}

/// Extracts the required post id and the advisory chapter counter from the
/// series page.
fn parse_series_metadata(html: &str) -> Result<(String, Option<usize>), DiscoveryError> {
    let doc = Html::parse_document(html);

    let post_id = doc
        .select(&sel("#mypostid"))
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or(DiscoveryError::PostIdNotFound)?;

    let expected_total = doc
        .select(&sel("#chpcounter"))
        .next()
        .and_then(|el| el.value().attr("value"))
        .and_then(|v| v.trim().parse::<usize>().ok());

    Ok((post_id, expected_total))
}

/// Runs the parsing strategies in priority order over the TOC fragment.
fn parse_toc_entries(fragment_html: &str, base: &Url) -> Vec<TocEntry> {
    let doc = Html::parse_fragment(fragment_html);
    let container = doc
        .select(&sel("div.wi_fic_table.main"))
        .next()
        .unwrap_or_else(|| doc.root_element());

    for (name, strategy) in &STRATEGIES {
        let entries = strategy(container, base);
        if !entries.is_empty() {
            debug!(strategy = name, count = entries.len(), "TOC fragment parsed");
            return entries;
        }
    }
    Vec::new()
}

/// List-style markup: every `li` containing a link is a candidate entry.
/// A numeric `order` attribute on the `li` is the optional sort key.
fn parse_list_entries(container: ElementRef<'_>, base: &Url) -> Vec<TocEntry> {
    let li_sel = sel("li");
    let link_sel = sel("a[href]");
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();

    for li in container.select(&li_sel) {
        let Some(link) = li.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let url = resolved.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }

        let key = li
            .value()
            .attr("order")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(SortKey::Unordered, SortKey::Ordered);

        entries.push(TocEntry {
            key,
            url,
            title: stripped_text(link),
        });
    }

    entries
}

/// Table-style markup: rows of `table#myTable` containing a link. The
/// numeric token at the start of the first cell is the optional sort key.
fn parse_table_entries(container: ElementRef<'_>, base: &Url) -> Vec<TocEntry> {
    let Some(table) = container.select(&sel("table#myTable")).next() else {
        return Vec::new();
    };

    let row_sel = sel("tbody tr");
    let link_sel = sel("a[href]");
    let cell_sel = sel("td");
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();

    for row in table.select(&row_sel) {
        let Some(link) = row.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let url = resolved.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }

        let key = row
            .select(&cell_sel)
            .next()
            .map(stripped_text)
            .and_then(|text| {
                text.split_whitespace()
                    .next()
                    .and_then(|token| token.parse::<u64>().ok())
            })
            .map_or(SortKey::Unordered, SortKey::Ordered);

        entries.push(TocEntry {
            key,
            url,
            title: stripped_text(link),
        });
    }

    entries
}

/// Sorts entries by `(key, url)` and assigns 1-based positions.
fn into_ordered_listings(mut entries: Vec<TocEntry>) -> Vec<ChapterListing> {
    entries.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.url.cmp(&b.url)));
    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| ChapterListing {
            position: idx + 1,
            url: entry.url,
            toc_title: entry.title,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/series/123/story/").unwrap()
    }

    fn entry(key: SortKey, url: &str, title: &str) -> TocEntry {
        TocEntry {
            key,
            url: url.to_string(),
            title: title.to_string(),
        }
    }

    // ==================== Series Metadata ====================

    #[test]
    fn test_parse_series_metadata_extracts_post_id_and_counter() {
        let html = r#"<html><body>
            <input id="mypostid" value=" 98765 ">
            <input id="chpcounter" value="42">
        </body></html>"#;
        let (post_id, expected) = parse_series_metadata(html).unwrap();
        assert_eq!(post_id, "98765");
        assert_eq!(expected, Some(42));
    }

    #[test]
    fn test_parse_series_metadata_counter_is_advisory() {
        let html = r#"<input id="mypostid" value="7"><input id="chpcounter" value="soon">"#;
        let (post_id, expected) = parse_series_metadata(html).unwrap();
        assert_eq!(post_id, "7");
        assert_eq!(expected, None);
    }

    #[test]
    fn test_parse_series_metadata_missing_post_id_fails() {
        let result = parse_series_metadata("<html><body><p>not a series</p></body></html>");
        assert!(matches!(result, Err(DiscoveryError::PostIdNotFound)));
    }

    #[test]
    fn test_parse_series_metadata_blank_post_id_fails() {
        let result = parse_series_metadata(r#"<input id="mypostid" value="   ">"#);
        assert!(matches!(result, Err(DiscoveryError::PostIdNotFound)));
    }

    // ==================== List Strategy ====================

    #[test]
    fn test_list_entries_resolve_and_deduplicate() {
        let fragment = r#"<ul>
            <li order="2"><a href="/read/1002">Chapter Two</a></li>
            <li order="1"><a href="/read/1001">Chapter One</a></li>
            <li order="9"><a href="/read/1001">Duplicate Of One</a></li>
            <li>no link here</li>
        </ul>"#;
        let doc = Html::parse_fragment(fragment);
        let entries = parse_list_entries(doc.root_element(), &base());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "https://example.com/read/1002");
        assert_eq!(entries[1].title, "Chapter One");
        // First occurrence wins for duplicated URLs.
        assert!(!entries.iter().any(|e| e.title == "Duplicate Of One"));
    }

    #[test]
    fn test_list_entries_non_numeric_order_is_unordered() {
        let fragment = r#"<ul><li order="first"><a href="/read/5">Ch</a></li></ul>"#;
        let doc = Html::parse_fragment(fragment);
        let entries = parse_list_entries(doc.root_element(), &base());
        assert_eq!(entries[0].key, SortKey::Unordered);
    }

    // ==================== Table Strategy ====================

    #[test]
    fn test_table_entries_take_leading_numeric_token() {
        let fragment = r#"<div class="wi_fic_table main"><table id="myTable"><tbody>
            <tr><td>12 releases ago</td><td><a href="/read/12">Twelve</a></td></tr>
            <tr><td>unnumbered</td><td><a href="/read/13">Thirteen</a></td></tr>
        </tbody></table></div>"#;
        let doc = Html::parse_fragment(fragment);
        let container = doc
            .select(&sel("div.wi_fic_table.main"))
            .next()
            .unwrap();
        let entries = parse_table_entries(container, &base());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, SortKey::Ordered(12));
        assert_eq!(entries[1].key, SortKey::Unordered);
    }

    #[test]
    fn test_table_strategy_requires_identified_table() {
        let fragment = r#"<table><tbody><tr><td>1</td><td><a href="/x">X</a></td></tr></tbody></table>"#;
        let doc = Html::parse_fragment(fragment);
        assert!(parse_table_entries(doc.root_element(), &base()).is_empty());
    }

    // ==================== Strategy Ordering ====================

    #[test]
    fn test_list_strategy_wins_when_both_shapes_present() {
        let fragment = r#"<div class="wi_fic_table main">
            <ul><li><a href="/read/1">From List</a></li></ul>
            <table id="myTable"><tbody><tr><td>1</td><td><a href="/read/2">From Table</a></td></tr></tbody></table>
        </div>"#;
        let entries = parse_toc_entries(fragment, &base());
        // The table rows also nest no <li>, so the list strategy only sees
        // the actual list entry.
        assert!(entries.iter().any(|e| e.title == "From List"));
    }

    #[test]
    fn test_table_strategy_used_when_list_yields_nothing() {
        let fragment = r#"<div class="wi_fic_table main">
            <table id="myTable"><tbody>
                <tr><td>3</td><td><a href="/read/3">Three</a></td></tr>
            </tbody></table>
        </div>"#;
        let entries = parse_toc_entries(fragment, &base());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Three");
    }

    #[test]
    fn test_no_entries_from_either_strategy() {
        assert!(parse_toc_entries("<div><p>maintenance</p></div>", &base()).is_empty());
    }

    // ==================== Ordering ====================

    #[test]
    fn test_sort_is_deterministic_for_any_input_order() {
        let entries = vec![
            entry(SortKey::Unordered, "https://e.com/c", "C"),
            entry(SortKey::Ordered(2), "https://e.com/b", "B"),
            entry(SortKey::Unordered, "https://e.com/a", "A"),
            entry(SortKey::Ordered(1), "https://e.com/d", "D"),
        ];
        let mut reversed = entries.clone();
        reversed.reverse();

        let first = into_ordered_listings(entries);
        let second = into_ordered_listings(reversed);
        assert_eq!(first, second);

        let urls: Vec<&str> = first.iter().map(|l| l.url.as_str()).collect();
        // Keyed entries first by key, unkeyed after, tie-broken by URL.
        assert_eq!(
            urls,
            [
                "https://e.com/d",
                "https://e.com/b",
                "https://e.com/a",
                "https://e.com/c"
            ]
        );
    }

    #[test]
    fn test_positions_are_assigned_in_sorted_order() {
        let listings = into_ordered_listings(vec![
            entry(SortKey::Ordered(20), "https://e.com/y", "Y"),
            entry(SortKey::Ordered(10), "https://e.com/x", "X"),
        ]);
        assert_eq!(listings[0].position, 1);
        assert_eq!(listings[0].toc_title, "X");
        assert_eq!(listings[1].position, 2);
        assert_eq!(listings[1].toc_title, "Y");
    }

    #[test]
    fn test_sort_key_literal_value_does_not_become_position() {
        let listings = into_ordered_listings(vec![
            entry(SortKey::Ordered(500), "https://e.com/a", "A"),
            entry(SortKey::Ordered(900), "https://e.com/b", "B"),
        ]);
        assert_eq!(listings[0].position, 1);
        assert_eq!(listings[1].position, 2);
    }

    #[test]
    fn test_ordered_keys_sort_before_unordered() {
        assert!(SortKey::Ordered(u64::MAX - 1) < SortKey::Unordered);
        assert!(SortKey::Ordered(1) < SortKey::Ordered(2));
    }
}
