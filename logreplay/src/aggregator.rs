//! Run-wide request counters and latency samples.
use logreplay_core::RunMetrics;
use metrics_util::AtomicBucket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
const METRIC_TOTAL: &str = "logreplay_requests_total";
#[cfg(feature = "metrics")]
const METRIC_OK: &str = "logreplay_requests_ok";
#[cfg(feature = "metrics")]
const METRIC_ERROR: &str = "logreplay_requests_error";
#[cfg(feature = "metrics")]
const METRIC_LATENCY: &str = "logreplay_latency_seconds";

/// Shared by every worker for the length of a run.
///
/// Recording is lock-free; nothing is computed until [`ReplayMetrics::snapshot`] is taken after
/// the workers have been joined. The latency sample is pushed before `ok` is bumped and `total`
/// is bumped last, so a finished run always has `total == ok + error` and one sample per `ok`.
pub struct ReplayMetrics {
    total: AtomicU64,
    ok: AtomicU64,
    error: AtomicU64,
    latencies: AtomicBucket<Duration>,
    started: OnceLock<Instant>,
}

impl Default for ReplayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayMetrics {
    pub fn new() -> Self {
        #[cfg(feature = "metrics")]
        describe();

        Self {
            total: AtomicU64::new(0),
            ok: AtomicU64::new(0),
            error: AtomicU64::new(0),
            latencies: AtomicBucket::new(),
            started: OnceLock::new(),
        }
    }

    /// Mark the moment the worker pool started. Only the first call has an effect.
    pub fn mark_started(&self) -> Instant {
        *self.started.get_or_init(Instant::now)
    }

    /// Time since [`ReplayMetrics::mark_started`], or zero if the pool has not started.
    pub fn elapsed(&self) -> Duration {
        self.started
            .get()
            .map(Instant::elapsed)
            .unwrap_or_default()
    }

    /// Record a successful request. Returns the new total.
    pub fn record_ok(&self, latency: Duration) -> u64 {
        self.latencies.push(latency);
        self.ok.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!(METRIC_OK).increment(1);
            metrics::histogram!(METRIC_LATENCY).record(latency.as_secs_f64());
        }

        self.bump_total()
    }

    /// Record a failed request. Returns the new total.
    pub fn record_error(&self) -> u64 {
        self.error.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::counter!(METRIC_ERROR).increment(1);

        self.bump_total()
    }

    fn bump_total(&self) -> u64 {
        #[cfg(feature = "metrics")]
        metrics::counter!(METRIC_TOTAL).increment(1);

        self.total.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn ok(&self) -> u64 {
        self.ok.load(Ordering::Relaxed)
    }

    pub fn error(&self) -> u64 {
        self.error.load(Ordering::Relaxed)
    }

    /// Successful requests per second since the pool started.
    pub fn current_rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0. {
            self.ok() as f64 / secs
        } else {
            0.
        }
    }

    /// Copy out the counters and samples. Meant to be called once the workers are joined.
    pub fn snapshot(&self) -> RunMetrics {
        RunMetrics {
            total: self.total(),
            ok: self.ok(),
            error: self.error(),
            latencies: self.latencies.data(),
        }
    }
}

#[cfg(feature = "metrics")]
fn describe() {
    metrics::describe_counter!(METRIC_TOTAL, "Replayed requests, successful or not");
    metrics::describe_counter!(METRIC_OK, "Replayed requests that completed below status 400");
    metrics::describe_counter!(METRIC_ERROR, "Replayed requests that failed or returned >= 400");
    metrics::describe_histogram!(
        METRIC_LATENCY,
        metrics::Unit::Seconds,
        "Latency of successful replayed requests, including the response body"
    );
}
