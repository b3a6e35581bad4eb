//! Retrying HTTP client.
//!
//! Wraps a single request in a bounded retry loop with linear backoff
//! (floored at half a second), an optional response-body validator, and
//! attempt-by-attempt reporting through the injected [`Reporter`] sink.
//! The client is created once per run and reused for every request, taking
//! advantage of connection pooling and the shared cookie store.

use std::time::Duration;

use reqwest::{Client, Method};
use tracing::{debug, warn};

use super::error::{FetchFailed, RequestError};
use crate::report::{Level, Reporter};
use crate::user_agent;

/// Floor applied to every backoff wait, in seconds.
const MIN_BACKOFF_SECS: f64 = 0.5;

/// Connection settings shared by every request in a run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Attempts per request, including the first (must be >= 1).
    pub retries: u32,
    /// Base backoff in seconds; the wait before retry `n+1` is
    /// `max(0.5, backoff_base * n)`.
    pub backoff_base: f64,
    /// Timeout applied to each individual HTTP call.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_base: 3.0,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Description of one HTTP call.
#[derive(Clone)]
pub struct Request<'a> {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL to request.
    pub url: &'a str,
    /// Human-readable label used in retry warnings ("TOC request", ...).
    pub purpose: &'a str,
    /// Optional form body (sent urlencoded, implies POST semantics).
    pub form: Option<&'a [(&'a str, &'a str)]>,
    /// Optional Referer header value.
    pub referer: Option<&'a str>,
    /// Optional body predicate; a `false` return counts as a retryable
    /// failure even on a success status.
    pub validator: Option<fn(&str) -> bool>,
    /// Indentation prefix for reported attempt messages.
    pub log_prefix: &'a str,
}

impl<'a> Request<'a> {
    /// Creates a plain GET request description.
    #[must_use]
    pub fn get(url: &'a str, purpose: &'a str) -> Self {
        Self {
            method: Method::GET,
            url,
            purpose,
            form: None,
            referer: None,
            validator: None,
            log_prefix: "",
        }
    }

    /// Creates a POST request description with a form body.
    #[must_use]
    pub fn post_form(url: &'a str, purpose: &'a str, form: &'a [(&'a str, &'a str)]) -> Self {
        Self {
            method: Method::POST,
            url,
            purpose,
            form: Some(form),
            referer: None,
            validator: None,
            log_prefix: "",
        }
    }

    /// Sets the Referer header.
    #[must_use]
    pub fn referer(mut self, referer: &'a str) -> Self {
        self.referer = Some(referer);
        self
    }

    /// Sets the response-body validator.
    #[must_use]
    pub fn validator(mut self, validator: fn(&str) -> bool) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Sets the indentation prefix for reported messages.
    #[must_use]
    pub fn log_prefix(mut self, prefix: &'a str) -> Self {
        self.log_prefix = prefix;
        self
    }
}

/// HTTP client with bounded retries and linear-floored backoff.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    http: Client,
    retries: u32,
    backoff_base: f64,
}

impl RetryingClient {
    /// Creates the shared client with browser-profile headers, a cookie
    /// store, and the configured per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying builder error if the TLS backend cannot be
    /// initialized.
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .default_headers(user_agent::default_headers())
            .cookie_store(true)
            .gzip(true)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            retries: config.retries.max(1),
            backoff_base: config.backoff_base,
        })
    }

    /// Returns the configured number of attempts per request.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Wait inserted after failed attempt number `attempt` (1-indexed):
    /// `max(0.5, backoff_base * attempt)` seconds. Linear in the attempt
    /// index with a floor, not exponential.
    #[must_use]
    pub fn backoff_wait(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64((self.backoff_base * f64::from(attempt)).max(MIN_BACKOFF_SECS))
    }

    /// Performs the request, retrying up to the configured attempt count.
    ///
    /// Each failed attempt before the last emits a warning detail through
    /// `reporter` and sleeps the backoff wait. Exhaustion emits an error
    /// detail and log event, then fails the calling operation.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailed`] once every attempt has failed (network error,
    /// non-success status, or validator rejection).
    pub async fn request(
        &self,
        request: Request<'_>,
        reporter: &dyn Reporter,
    ) -> Result<String, FetchFailed> {
        reporter.update_detail(None, Level::Muted);
        let mut attempt: u32 = 1;
        loop {
            match self.attempt(&request).await {
                Ok(body) => {
                    debug!(url = %request.url, attempt, "request succeeded");
                    if attempt > 1 {
                        reporter.update_detail(None, Level::Muted);
                    }
                    return Ok(body);
                }
                Err(error) if attempt < self.retries => {
                    let wait = self.backoff_wait(attempt);
                    warn!(
                        url = %request.url,
                        attempt,
                        retries = self.retries,
                        wait_secs = wait.as_secs_f64(),
                        error = %error,
                        "attempt failed, will retry"
                    );
                    reporter.update_detail(
                        Some(&format!(
                            "{}{} attempt {}/{} failed ({}). Retrying in {:.1}s...",
                            request.log_prefix,
                            request.purpose,
                            attempt,
                            self.retries,
                            error.brief(),
                            wait.as_secs_f64()
                        )),
                        Level::Warning,
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(error) => {
                    reporter.update_detail(
                        Some(&format!(
                            "{}{} failed after {} attempts.",
                            request.log_prefix, request.purpose, self.retries
                        )),
                        Level::Error,
                    );
                    reporter.log_event(
                        &format!(
                            "{}{} failed after {} attempts. Aborting.",
                            request.log_prefix, request.purpose, self.retries
                        ),
                        Level::Error,
                    );
                    return Err(FetchFailed {
                        purpose: request.purpose.to_string(),
                        url: request.url.to_string(),
                        attempts: self.retries,
                        last_error: error,
                    });
                }
            }
        }
    }

    /// One network attempt: send, check status, read the body, validate.
    async fn attempt(&self, request: &Request<'_>) -> Result<String, RequestError> {
        let mut builder = self.http.request(request.method.clone(), request.url);
        if let Some(referer) = request.referer {
            builder = builder.header(reqwest::header::REFERER, referer);
        }
        if let Some(form) = request.form {
            builder = builder.form(form);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RequestError::timeout(request.url)
            } else {
                RequestError::network(request.url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::http_status(request.url, status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RequestError::timeout(request.url)
            } else {
                RequestError::network(request.url, e)
            }
        })?;

        if let Some(validator) = request.validator {
            if !validator(&body) {
                return Err(RequestError::validation(request.url));
            }
        }

        Ok(body)
    }
}
