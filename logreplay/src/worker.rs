use crate::aggregator::ReplayMetrics;
use crate::queue::{Consumer, Pull};
use crate::transport::Transport;
use governor::DefaultDirectRateLimiter;
use logreplay_core::{ReplayConfig, RequestRecord, PULL_TIMEOUT};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// State every worker reads; nothing in here is mutated except through the metrics atomics.
pub(crate) struct WorkerContext {
    pub config: Arc<ReplayConfig>,
    pub metrics: Arc<ReplayMetrics>,
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

pub(crate) struct WorkerPool {
    tasks: Vec<JoinHandle<()>>,
}

/// How the pool's workers ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolExit {
    pub finished: usize,
    pub failed: usize,
}

impl WorkerPool {
    /// Spawn one worker per transport, all draining the same queue.
    pub fn spawn<T>(transports: Vec<T>, consumer: Consumer, ctx: Arc<WorkerContext>) -> Self
    where
        T: Transport + Sync + 'static,
    {
        let tasks = transports
            .into_iter()
            .enumerate()
            .map(|(id, transport)| {
                let consumer = consumer.clone();
                let ctx = ctx.clone();
                tokio::spawn(
                    async move { worker_job(transport, consumer, ctx).await }
                        .instrument(tracing::info_span!("worker", id)),
                )
            })
            .collect();

        // The pool's own handle must not keep the queue open once every worker is gone.
        drop(consumer);

        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every worker to exit. A worker that panicked is counted as failed; the others are
    /// unaffected by it.
    pub async fn join(self) -> PoolExit {
        let mut exit = PoolExit::default();
        for task in self.tasks {
            match task.await {
                Ok(()) => exit.finished += 1,
                Err(err) => {
                    error!("Log consumer exception: {err}");
                    exit.failed += 1;
                }
            }
        }
        exit
    }
}

async fn worker_job<T>(transport: T, consumer: Consumer, ctx: Arc<WorkerContext>)
where
    T: Transport + Sync,
{
    loop {
        match consumer.pull(PULL_TIMEOUT).await {
            Pull::Record(record) => replay_record(&transport, &record, &ctx).await,
            Pull::Idle => trace!("Queue idle, waiting on parser"),
            Pull::Finished => break,
        }
    }
    debug!("Queue drained, worker exiting");
}

async fn replay_record<T>(transport: &T, record: &RequestRecord, ctx: &WorkerContext)
where
    T: Transport + Sync,
{
    if let Some(limiter) = &ctx.limiter {
        limiter.until_ready().await;
    }

    let url = format!("{}{}", ctx.config.target_address(), record.path());

    let start = Instant::now();
    let total = match transport.replay(&url, record).await {
        Ok(()) => ctx.metrics.record_ok(start.elapsed()),
        Err(err) => {
            warn!("{err} < {url}");
            ctx.metrics.record_error()
        }
    };

    if total % ctx.config.print_every() == 0 {
        let limit = ctx
            .config
            .request_limit()
            .map_or_else(|| "?".to_string(), |limit| limit.to_string());
        info!(
            "done {total} / {limit} | {:.0} per sec",
            ctx.metrics.current_rate()
        );
    }
}
