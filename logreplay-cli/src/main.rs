use anyhow::{Context, Result};
use clap::Parser;
use logreplay::prelude::*;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::fs::File;
use tokio::io::BufReader;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;

use cli::ReplayCli;

const DEFAULT_LOG_FILTER: &str = "logreplay=info";

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = ReplayCli::parse();
    let config = args.config().context("Invalid configuration")?;

    if let Some(addr) = args.metrics_listen {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .with_context(|| format!("Failed to start metrics listener on {addr}"))?;
        info!("Serving metrics on {addr}");
    }

    let log = File::open(&args.file)
        .await
        .with_context(|| format!("Unable to open log file {}", args.file.display()))?;

    let mut replay = Replay::new(config, BufReader::new(log));
    let outcome = replay.run().await?;
    if let Some(err) = &outcome.parser_error {
        warn!("Log was only partially replayed: {err}");
    }

    let report = outcome.report().context("Unable to build report")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        print!("{report}");
    }

    Ok(())
}
