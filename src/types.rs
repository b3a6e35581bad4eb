//! Value types shared across discovery and download.

/// A chapter reference discovered from the table of contents, prior to
/// fetching its content.
///
/// Immutable once produced by discovery. `position` is assigned after
/// sorting and is the authoritative download order (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterListing {
    /// 1-based position in sorted discovery order.
    pub position: usize,
    /// Absolute chapter URL, resolved against the series URL.
    pub url: String,
    /// Display title taken from the listing row's anchor text.
    pub toc_title: String,
}

/// A fully fetched and extracted chapter.
///
/// Created once per successful fetch and never mutated; owned by the chunk
/// buffer until written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based download order (distinct from any numeric key in the listing).
    pub index: usize,
    /// The chapter page URL.
    pub url: String,
    /// Title from the chapter page's own `<title>`, site suffix stripped.
    pub title: String,
    /// Normalized plain-text body. Never empty.
    pub body: String,
}
