//! Scribble-dl Core Library
//!
//! This library provides the core functionality for the scribble-dl tool,
//! which downloads every chapter of a ScribbleHub story and bundles them
//! into plain-text files.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - Retrying HTTP client with linear backoff
//! - [`discovery`] - Series metadata and table-of-contents parsing
//! - [`extract`] - Chapter content extraction and text normalization
//! - [`engine`] - Sequential download orchestration and chunked file output
//! - [`report`] - In-place terminal status rendering
//!
//! Data flows one direction: discovery produces ordered chapter listings,
//! the engine fetches and extracts each in turn, and full chunks are
//! written to disk as they fill. All user-facing output goes through the
//! [`report::Reporter`] sink.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod discovery;
pub mod engine;
pub mod extract;
pub mod fetch;
pub mod report;
pub mod types;

mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use discovery::{DiscoveryError, collect_listings};
pub use engine::{DownloadConfig, EngineError, RunSummary, download_series};
pub use extract::{ChapterContent, ExtractionError, extract_chapter};
pub use fetch::{ClientConfig, FetchFailed, Request, RequestError, RetryingClient};
pub use report::{ConsoleReporter, Level, Reporter};
pub use types::{Chapter, ChapterListing};
