use clap::Parser;
use sitegraph::{run, CrawlConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

/// Maps every page reachable inside a domain, one outbound link set per
/// page.
#[derive(Debug, Parser)]
#[command(name = "sitegraph")]
struct Cli {
    /// Seed url; the crawl never leaves urls prefixed by it
    seed: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Maximum number of pages fetched concurrently
    #[arg(long, default_value_t = 20)]
    max_in_flight: usize,

    /// Capacity of the discovered-link queue
    #[arg(long, default_value_t = 256)]
    queue_capacity: usize,

    /// File extensions that are never fetched
    #[arg(long = "skip-extension", value_name = "EXT", default_values_t = [String::from("pdf")])]
    skip_extensions: Vec<String>,

    /// Append-only record log
    #[arg(long, default_value = "records.jsonl")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let cli = Cli::parse();
    let config = CrawlConfig {
        timeout: Duration::from_secs(cli.timeout),
        max_in_flight: cli.max_in_flight,
        queue_capacity: cli.queue_capacity,
        skip_extensions: cli.skip_extensions,
        log_path: cli.log_file,
    };

    run(&cli.seed, &config).await?;
    Ok(())
}
