use clap::Parser;
use logreplay_core::{ConfigError, ReplayConfig};
use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;
use std::time::Duration;

/// Replay HTTP benchmark: re-issue the GET requests of an access log against a live server.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct ReplayCli {
    /// HTTP server address, e.g. `http://127.0.0.1:8080`
    #[arg(short, long, env = "LOGREPLAY_ADDRESS")]
    pub address: String,

    /// Log file location
    #[arg(short, long, env = "LOGREPLAY_FILE")]
    pub file: PathBuf,

    /// Number of concurrent requests
    #[arg(short, long, default_value_t = 1)]
    pub concurrency: usize,

    /// Number of requests; zero or less replays the whole log
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub requests: i64,

    /// Request timeout in seconds
    #[arg(short, long, default_value_t = 1)]
    pub timeout: u64,

    /// Cap on requests per second across all workers
    #[arg(long)]
    pub rps: Option<NonZeroU32>,

    /// Records buffered between the log parser and the workers
    #[arg(long)]
    pub queue_size: Option<NonZeroUsize>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Serve Prometheus metrics on this address while the replay runs
    #[arg(long, env = "LOGREPLAY_METRICS_LISTEN")]
    pub metrics_listen: Option<SocketAddr>,
}

impl ReplayCli {
    pub fn config(&self) -> Result<ReplayConfig, ConfigError> {
        let mut builder = ReplayConfig::builder(&self.address)
            .concurrency(self.concurrency)
            .request_limit(self.requests)
            .timeout(Duration::from_secs(self.timeout))
            .max_rps(self.rps);

        if let Some(queue_size) = self.queue_size {
            builder = builder.queue_capacity(queue_size);
        }

        builder.build()
    }
}
