//! Replay run lifecycle
use crate::aggregator::ReplayMetrics;
use crate::parser::LogParser;
use crate::queue;
use crate::transport::{HttpTransport, RequestError, Transport};
use crate::worker::{WorkerContext, WorkerPool};
use governor::{Quota, RateLimiter};
use humantime::format_duration;
use logreplay_core::{ReplayConfig, ReportError, RunMetrics, RunReport};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncBufRead;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Lifecycle of a [`Replay`]. Only ever moves forward; `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    /// Parser and workers are running.
    Running,
    /// The parser has finished; workers are emptying the queue.
    Draining,
    Done,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Replay can only be started once (currently {0:?})")]
    NotIdle(ReplayState),

    #[error("Failed to set up HTTP client: {0}")]
    Client(#[from] RequestError),

    #[error("All {0} workers failed before the queue was drained")]
    WorkersExhausted(usize),
}

/// Everything measured by a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub metrics: RunMetrics,
    /// From the moment the workers were started until the last one exited.
    pub elapsed: Duration,
    /// Records handed to the workers by the parser.
    pub queued: u64,
    pub queue_high_water: usize,
    /// Set when the parser stopped early on a failure.
    pub parser_error: Option<String>,
    /// Workers that died mid-run; the rest carried on without them.
    pub failed_workers: usize,
}

impl RunOutcome {
    pub fn report(&self) -> Result<RunReport, ReportError> {
        self.metrics.report(self.elapsed)
    }
}

/// Replays one access log against one target.
///
/// The parser feeds a bounded queue which `concurrency` workers drain; once the parser is done
/// and the queue is empty the workers exit and the run's measurements are returned.
///
/// # Example
/// ```no_run
/// use logreplay::prelude::*;
/// use tokio::io::BufReader;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ReplayConfig::builder("http://127.0.0.1:8080")
///     .concurrency(4)
///     .request_limit(10_000)
///     .build()?;
/// let log = tokio::fs::File::open("access.log").await?;
///
/// let mut replay = Replay::new(config, BufReader::new(log));
/// let outcome = replay.run().await?;
/// println!("{}", outcome.report()?);
/// # Ok(())
/// # }
/// ```
pub struct Replay<R> {
    config: Arc<ReplayConfig>,
    source: Option<R>,
    state: ReplayState,
}

impl<R> Replay<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(config: ReplayConfig, source: R) -> Self {
        Self {
            config: Arc::new(config),
            source: Some(source),
            state: ReplayState::Idle,
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    /// Run against the configured target over HTTP.
    pub async fn run(&mut self) -> Result<RunOutcome, ReplayError> {
        let timeout = self.config.timeout();
        self.run_with(|| HttpTransport::new(timeout)).await
    }

    /// Run with a custom transport; `make_transport` is called once per worker.
    #[instrument(name = "replay", skip_all, fields(target = self.config.target_address()))]
    pub async fn run_with<T, F>(&mut self, mut make_transport: F) -> Result<RunOutcome, ReplayError>
    where
        T: Transport + Sync + 'static,
        F: FnMut() -> Result<T, RequestError>,
    {
        if self.state != ReplayState::Idle {
            return Err(ReplayError::NotIdle(self.state));
        }

        let transports = (0..self.config.concurrency().get())
            .map(|_| make_transport())
            .collect::<Result<Vec<_>, _>>()?;
        let Some(source) = self.source.take() else {
            return Err(ReplayError::NotIdle(self.state));
        };

        info!("Running replay with config {:?}", &self.config);

        let metrics = Arc::new(ReplayMetrics::new());
        let (producer, consumer) = queue::bounded(self.config.queue_capacity());
        let gauge = producer.gauge();

        let parser = LogParser::new(
            source,
            producer,
            self.config.request_limit(),
            self.config.read_budget(),
        );
        let parser_task = tokio::spawn(parser.run().in_current_span());
        self.state = ReplayState::Running;

        let ctx = Arc::new(WorkerContext {
            config: self.config.clone(),
            metrics: metrics.clone(),
            limiter: self.config.max_rps().map(|rps| {
                Arc::new(RateLimiter::direct(
                    Quota::per_second(rps).allow_burst(NonZeroU32::MIN),
                ))
            }),
        });
        let pool = WorkerPool::spawn(transports, consumer, ctx);
        let start = metrics.mark_started();
        debug!("Started {} workers", pool.len());

        let parser_error = match parser_task.await {
            Ok(Ok(queued)) => {
                debug!("Parser finished, {queued} records queued");
                None
            }
            Ok(Err(err)) => {
                error!("Log parser exception: {err}");
                Some(err.to_string())
            }
            Err(err) => {
                error!("Log parser exception: {err}");
                Some(err.to_string())
            }
        };
        self.state = ReplayState::Draining;

        let exit = pool.join().await;
        let elapsed = start.elapsed();
        self.state = ReplayState::Done;

        if exit.finished == 0 {
            return Err(ReplayError::WorkersExhausted(exit.failed));
        }
        if exit.failed > 0 {
            warn!(
                "{} of {} workers failed during the run",
                exit.failed,
                exit.failed + exit.finished
            );
        }

        let metrics = metrics.snapshot();
        info!(
            "Replay complete: {} requests ({} ok, {} error) in {}",
            metrics.total,
            metrics.ok,
            metrics.error,
            format_duration(elapsed)
        );

        Ok(RunOutcome {
            metrics,
            elapsed,
            queued: gauge.pushed(),
            queue_high_water: gauge.high_water(),
            parser_error,
            failed_workers: exit.failed,
        })
    }
}
