//! Bounded request queue between the log parser and the worker pool.
//!
//! Backed by a bounded MPMC channel: the producer waits while the queue is at capacity, and the
//! queue closes once the producer is dropped (log exhausted or parser failed) or every consumer
//! is dropped (all workers gone).
use async_channel::{Receiver, Sender};
use logreplay_core::RequestRecord;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Request queue is closed")]
pub struct QueueClosed;

/// Create a queue holding at most `capacity` records.
pub fn bounded(capacity: NonZeroUsize) -> (Producer, Consumer) {
    let (tx, rx) = async_channel::bounded(capacity.get());
    let stats = Arc::new(QueueStats::default());
    (
        Producer { tx, stats },
        Consumer { rx },
    )
}

#[derive(Debug, Default)]
struct QueueStats {
    pushed: AtomicU64,
    high_water: AtomicUsize,
}

pub struct Producer {
    tx: Sender<RequestRecord>,
    stats: Arc<QueueStats>,
}

impl Producer {
    /// Enqueue a record, waiting for space while the queue is full.
    pub async fn push(&self, record: RequestRecord) -> Result<(), QueueClosed> {
        self.tx.send(record).await.map_err(|_| QueueClosed)?;
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .high_water
            .fetch_max(self.tx.len(), Ordering::Relaxed);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        // Always `Some` for a bounded channel.
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    pub fn gauge(&self) -> QueueGauge {
        QueueGauge(self.stats.clone())
    }
}

/// Read-only view of the queue's traffic, usable after both ends are gone.
#[derive(Clone, Debug)]
pub struct QueueGauge(Arc<QueueStats>);

impl QueueGauge {
    /// Records accepted into the queue so far.
    pub fn pushed(&self) -> u64 {
        self.0.pushed.load(Ordering::Relaxed)
    }

    /// Largest queue length observed right after an enqueue.
    pub fn high_water(&self) -> usize {
        self.0.high_water.load(Ordering::Relaxed)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Pull {
    Record(RequestRecord),
    /// Nothing arrived within the wait, but the producer is still running.
    Idle,
    /// The producer is gone and the queue is drained.
    Finished,
}

#[derive(Clone)]
pub struct Consumer {
    rx: Receiver<RequestRecord>,
}

impl Consumer {
    /// Take the next record, waiting at most `wait` for one to arrive.
    pub async fn pull(&self, wait: Duration) -> Pull {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Ok(record)) => Pull::Record(record),
            Ok(Err(_)) => Pull::Finished,
            Err(_) if self.rx.is_closed() && self.rx.is_empty() => Pull::Finished,
            Err(_) => Pull::Idle,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
