//! Revdiff CLI
//!
//! Compares the documents and leaf revisions of two replicated stores.
//!
//! ```text
//! revdiff <URL_A> <DB_A> <URL_B> <DB_B> [OPTIONS]
//! ```
//!
//! Exit status is 0 when every batch was diffed, 2 when some batches
//! failed, and 1 on setup errors.

mod report;

use clap::Parser;
use report::Format;
use revdiff_engine::{
    Comparator, CompareConfig, ComparisonReport, StoreRef, DEFAULT_BATCH_SIZE,
    DEFAULT_CONCURRENCY, DEFAULT_SENTINEL_REVISION,
};
use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compare documents and leaf revisions of two replicated stores.
#[derive(Parser)]
#[command(name = "revdiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the first server
    url_a: String,

    /// Database on the first server
    db_a: String,

    /// Base URL of the second server
    url_b: String,

    /// Database on the second server
    db_b: String,

    /// Documents per `_revs_diff` request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Maximum batches in flight per direction
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Overall timeout for the diff phase, in seconds
    #[arg(long, default_value_t = 36_000)]
    timeout_secs: u64,

    /// Timeout for a single HTTP request, in seconds
    #[arg(long, default_value_t = 300)]
    request_timeout_secs: u64,

    /// Rows per `_all_docs` page
    #[arg(long, default_value_t = 10_000)]
    page_size: usize,

    /// Revision that no store holds, used to discover leaves
    #[arg(long, default_value = DEFAULT_SENTINEL_REVISION)]
    sentinel: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> CompareConfig {
        CompareConfig::new()
            .with_batch_size(self.batch_size)
            .with_concurrency(self.concurrency)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_page_size(self.page_size)
            .with_sentinel(self.sentinel.clone())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli).await {
        Ok(report) if report.failures.is_empty() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(err) => {
            eprintln!("error: {}", err);
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<ComparisonReport, Box<dyn Error>> {
    let store_a = StoreRef::new(&cli.url_a, cli.db_a.clone())?;
    let store_b = StoreRef::new(&cli.url_b, cli.db_b.clone())?;
    info!(a = %store_a, b = %store_b, "Comparing stores");

    let comparator = Comparator::from_refs(store_a, store_b, cli.config())?;
    let report = comparator.compare().await?;

    let mut stdout = io::stdout().lock();
    report::write(&mut stdout, &report, cli.format)?;
    stdout.flush()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["revdiff", "http://a:5984", "db", "http://b:5984", "db"])
            .unwrap();
        assert_eq!(cli.batch_size, 500);
        assert_eq!(cli.concurrency, 16);
        assert_eq!(cli.timeout_secs, 36_000);
        assert_eq!(cli.format, Format::Text);

        let config = cli.config();
        assert_eq!(config, CompareConfig::default());
    }

    #[test]
    fn options_override_defaults() {
        let cli = Cli::try_parse_from([
            "revdiff",
            "http://a:5984",
            "left",
            "https://b",
            "right",
            "--batch-size",
            "50",
            "--concurrency",
            "4",
            "--sentinel",
            "8888-z",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.db_a, "left");
        assert_eq!(cli.db_b, "right");
        assert_eq!(cli.format, Format::Json);

        let config = cli.config();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.sentinel, "8888-z");
    }

    #[test]
    fn wrong_positional_count_is_rejected() {
        assert!(Cli::try_parse_from(["revdiff", "http://a:5984", "db", "http://b:5984"]).is_err());
    }
}
