//! Retrying HTTP access against a protected origin.
//!
//! One request primitive serves the whole pipeline: bounded attempts,
//! linear backoff with a half-second floor, an optional body validator for
//! empty-but-200 responses, and failure reporting through the injected
//! [`Reporter`](crate::report::Reporter) sink. Exhaustion is always fatal
//! to the calling operation; there is no silent partial result.

mod client;
mod error;

pub use client::{ClientConfig, Request, RetryingClient};
pub use error::{FetchFailed, RequestError};
