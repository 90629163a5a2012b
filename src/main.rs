//! cachedfetch - Fetch JSON through an in-memory response cache
//!
//! Issues the request described on the command line, optionally repeating it
//! to show cache hits, and prints the payload as pretty JSON. Ctrl-C cancels
//! the in-flight request.

use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cachedfetch::cli::{Cli, Invocation};
use cachedfetch::fetcher::{CachedFetcher, FetchOutcome};

/// Exit status used when the user interrupts a request
const EXIT_INTERRUPTED: u8 = 130;

/// Sets up logging to stderr so stdout carries only the payload
///
/// `RUST_LOG` wins when set; otherwise `--verbose` switches this crate to debug.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "warn,cachedfetch=debug"
    } else {
        "warn,cachedfetch=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let invocation = match Invocation::from_cli(&cli) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(ExitCode::from(2));
        }
    };

    let fetcher = CachedFetcher::new(invocation.config.clone())?;
    let mut payload = None;

    for attempt in 1..=invocation.repeat {
        let fetch = fetcher.fetch(invocation.descriptor.clone());
        tokio::pin!(fetch);

        let finished = tokio::select! {
            result = &mut fetch => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        // Interrupted: abort the request and let the fetch resolve as canceled
        let result = match finished {
            Some(result) => result,
            None => {
                fetcher.cancel();
                fetch.await
            }
        };

        match result {
            Ok(FetchOutcome::Canceled) => {
                warn!("request canceled");
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
            Ok(outcome) => {
                info!(attempt, cached = outcome.is_cached(), "response received");
                payload = outcome.into_data();
            }
            Err(e) => {
                eprintln!("error: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    if let Some(value) = payload {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    Ok(ExitCode::SUCCESS)
}
