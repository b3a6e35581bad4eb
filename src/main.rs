//! CLI entry point for the scribble-dl tool.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use scribble_dl_core::{
    ClientConfig, ConsoleReporter, DownloadConfig, Level, Reporter, RetryingClient,
    download_series,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Diagnostics go to stderr; stdout belongs to the live status display.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    if args.output.exists() && !args.output.is_dir() {
        eprintln!(
            "Output path exists and is not a directory: {}",
            args.output.display()
        );
        return ExitCode::FAILURE;
    }

    let client = match RetryingClient::new(&ClientConfig {
        retries: args.retries,
        backoff_base: args.backoff,
        timeout: Duration::from_secs_f64(args.timeout),
    }) {
        Ok(client) => client,
        Err(error) => {
            eprintln!("Failed to initialize HTTP client: {error}");
            return ExitCode::FAILURE;
        }
    };

    let config = DownloadConfig {
        output_dir: args.output.clone(),
        group_size: args.group_size as usize,
        delay: Duration::from_secs_f64(args.delay),
    };

    // Ctrl-C sets a flag checked between chapters, so the current chapter
    // finishes (or fails) before the run stops.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    info!(url = %args.url, "scribble-dl starting");
    let reporter = ConsoleReporter::new();
    match download_series(&client, &args.url, &config, &reporter, &interrupted).await {
        Ok(summary) => {
            reporter.finalize();
            info!(
                chapters = summary.chapters,
                files = summary.files,
                "download finished"
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            reporter.log_event(&error.to_string(), Level::Error);
            reporter.finalize();
            ExitCode::FAILURE
        }
    }
}
