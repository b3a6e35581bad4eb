//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download every chapter of a ScribbleHub story and bundle them into
/// text files.
#[derive(Parser, Debug)]
#[command(name = "scribble-dl")]
#[command(author, version)]
pub struct Args {
    /// ScribbleHub series URL (e.g. https://www.scribblehub.com/series/...)
    pub url: String,

    /// Destination directory for the chapter bundles
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Number of chapters to store per text file
    #[arg(short, long, default_value_t = 15, value_parser = clap::value_parser!(u32).range(1..))]
    pub group_size: u32,

    /// Attempts per request before giving up
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub retries: u32,

    /// Base backoff (seconds) between retries
    #[arg(long, default_value_t = 3.0, value_parser = non_negative_seconds)]
    pub backoff: f64,

    /// Delay (seconds) between chapter requests to be polite to the server
    #[arg(long, default_value_t = 5.0, value_parser = non_negative_seconds)]
    pub delay: f64,

    /// HTTP timeout in seconds per request
    #[arg(long, default_value_t = 60.0, value_parser = positive_seconds)]
    pub timeout: f64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn non_negative_seconds(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err("must be zero or greater".to_string())
    }
}

fn positive_seconds(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err("must be a positive number".to_string())
    }
}
