//! Download orchestration.
//!
//! Drives one linear run: discovery, then a sequential fetch/extract loop
//! over every listing, buffering chapters into count-bounded chunks that are
//! flushed to disk as they fill. Progress accounting (elapsed, per-chapter
//! average, remaining estimate, ETA wall clock) is reported through the
//! injected [`Reporter`]. Any error is terminal; there is no
//! skip-and-continue, and already-written chunk files stay on disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::discovery::{self, DiscoveryError};
use crate::extract::{self, ExtractionError};
use crate::fetch::{FetchFailed, Request, RetryingClient};
use crate::report::{Level, Reporter};
use crate::types::Chapter;

/// Cells in the rendered progress bar.
const PROGRESS_BAR_WIDTH: usize = 24;

/// Maximum length of the status-line title preview; longer titles are cut
/// to 33 characters plus an ellipsis.
const TITLE_PREVIEW_MAX: usize = 36;

/// Width of the separator rule between chapters in a chunk file.
const SEPARATOR_WIDTH: usize = 80;

/// Completed chapters required before remaining/ETA estimates are shown.
const ETA_MIN_SAMPLES: usize = 5;

/// Output and pacing settings for one run.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory chunk files are written to; created if absent.
    pub output_dir: PathBuf,
    /// Chapters per output file (must be >= 1).
    pub group_size: usize,
    /// Politeness pause after each successful chapter fetch.
    pub delay: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            group_size: 15,
            delay: Duration::from_secs(5),
        }
    }
}

/// Terminal outcome of a failed run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Listing discovery failed before any chapter fetch.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// A chapter fetch exhausted its retries.
    #[error(transparent)]
    Fetch(#[from] FetchFailed),

    /// A chapter page yielded no usable body text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A filesystem operation on the output directory failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The path being written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The user asked to stop (Ctrl-C) between chapters.
    #[error("Download interrupted by user.")]
    Interrupted,
}

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Chapters fetched and written.
    pub chapters: usize,
    /// Chunk files produced.
    pub files: usize,
}

/// Downloads every chapter of the series at `series_url` into chunked text
/// files under the configured output directory.
///
/// `interrupted` is polled at the top of each chapter iteration; setting it
/// (the Ctrl-C handler does) aborts the run with
/// [`EngineError::Interrupted`] before the next fetch starts.
///
/// # Errors
///
/// Any discovery, fetch, extraction, or write failure is fatal and is
/// returned after the reporter has been told about it. Chunk files written
/// before the failure remain on disk.
pub async fn download_series(
    client: &RetryingClient,
    series_url: &str,
    config: &DownloadConfig,
    reporter: &dyn Reporter,
    interrupted: &AtomicBool,
) -> Result<RunSummary, EngineError> {
    fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| EngineError::Io {
            path: config.output_dir.clone(),
            source,
        })?;

    let (listings, _expected) = discovery::collect_listings(client, series_url, reporter).await?;
    let total = listings.len();
    reporter.log_event(
        &format!("Found {total} chapters to download."),
        Level::Success,
    );
    reporter.update_status("Preparing downloads...", Level::Info);
    reporter.update_detail(None, Level::Muted);

    let group_size = config.group_size.max(1);
    let mut chunk: Vec<Chapter> = Vec::with_capacity(group_size);
    let mut written = 0usize;
    let mut files = 0usize;
    let start = Instant::now();
    let start_wall: DateTime<Local> = Local::now();

    for (offset, listing) in listings.iter().enumerate() {
        if interrupted.load(Ordering::SeqCst) {
            return Err(EngineError::Interrupted);
        }
        let idx = offset + 1;
        let preview = preview_title(&listing.toc_title);
        reporter.update_status(
            &format!("Downloading chapter {idx}/{total}: {preview}"),
            Level::Info,
        );

        let purpose = format!("Chapter {idx} request");
        let html = client
            .request(
                Request::get(&listing.url, &purpose).log_prefix("    "),
                reporter,
            )
            .await?;
        let content = extract::extract_chapter(&html, reporter)?;
        if !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }
        chunk.push(Chapter {
            index: idx,
            url: listing.url.clone(),
            title: content.title,
            body: content.body,
        });

        reporter.update_progress(Some(&progress_line(
            idx,
            total,
            &preview,
            start.elapsed().as_secs_f64(),
            start_wall,
        )));
        let remaining = total - idx;
        reporter.update_detail(
            Some(&format!("Remaining downloads: {remaining}")),
            if remaining > 0 { Level::Muted } else { Level::Info },
        );

        if chunk.len() == group_size || idx == total {
            reporter.update_progress(None);
            let path = write_chunk(&chunk, &config.output_dir).await?;
            written += chunk.len();
            files += 1;
            let name = path
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            reporter.log_event(
                &format!(
                    "Saved {name} ({} chapters; {written}/{total} complete)",
                    chunk.len()
                ),
                Level::Success,
            );
            chunk.clear();
        }
    }

    let total_elapsed = start.elapsed().as_secs_f64();
    reporter.update_status("Download complete", Level::Success);
    reporter.update_progress(None);
    reporter.update_detail(None, Level::Muted);
    reporter.log_event(
        &format!(
            "All chapters downloaded in {total_elapsed:.1}s (~{:.2} min).",
            total_elapsed / 60.0
        ),
        Level::Success,
    );
    info!(chapters = written, files, "run complete");
    Ok(RunSummary {
        chapters: written,
        files,
    })
}

/// Status-line preview of a table-of-contents title.
fn preview_title(title: &str) -> String {
    if title.chars().count() > TITLE_PREVIEW_MAX {
        let cut: String = title.chars().take(TITLE_PREVIEW_MAX - 3).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}

/// Renders the single-line progress readout: bar, percentage, counts,
/// padded title preview, elapsed time, and (once enough samples exist)
/// remaining estimate plus ETA wall-clock time.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn progress_line(
    completed: usize,
    total: usize,
    preview: &str,
    elapsed_secs: f64,
    start_wall: DateTime<Local>,
) -> String {
    let fraction = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64
    };
    let filled = (fraction * PROGRESS_BAR_WIDTH as f64) as usize;
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled)
    );

    let average = if completed > 0 {
        elapsed_secs / completed as f64
    } else {
        0.0
    };
    let remaining = (total.saturating_sub(completed)) as f64 * average;

    let mut line = format!(
        "[{bar}] {:6.2}% ({completed}/{total}) {preview:<36} elapsed {elapsed_secs:7.1}s",
        fraction * 100.0
    );
    if completed >= ETA_MIN_SAMPLES {
        let eta = start_wall + chrono::Duration::milliseconds(((elapsed_secs + remaining) * 1000.0) as i64);
        line.push_str(&format!(
            " | remaining ~ {remaining:7.1}s | ETA {}",
            eta.format("%I:%M %p")
        ));
    } else {
        line.push_str(" | estimating ETA...");
    }
    line
}

/// Renders one chunk's file content: per-chapter header, URL, blank line,
/// body, with an 80-dash rule between chapters. Ends with exactly one
/// trailing newline.
fn render_chunk(chunk: &[Chapter]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for (offset, chapter) in chunk.iter().enumerate() {
        lines.push(format!("Chapter {}: {}", chapter.index, chapter.title));
        lines.push(format!("URL: {}", chapter.url));
        lines.push(String::new());
        lines.push(chapter.body.clone());
        if offset + 1 != chunk.len() {
            lines.push(String::new());
            lines.push("-".repeat(SEPARATOR_WIDTH));
            lines.push(String::new());
        }
    }
    format!("{}\n", lines.join("\n").trim())
}

/// Writes one chunk file named by its zero-padded first and last chapter
/// index, e.g. `0001-0015.txt`.
async fn write_chunk(chunk: &[Chapter], output_dir: &Path) -> Result<PathBuf, EngineError> {
    let start_index = chunk.first().map_or(0, |c| c.index);
    let end_index = chunk.last().map_or(0, |c| c.index);
    let path = output_dir.join(format!("{start_index:04}-{end_index:04}.txt"));
    fs::write(&path, render_chunk(chunk))
        .await
        .map_err(|source| EngineError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}
