//! Access-log parsing
//!
//! Turns combined-log-format lines into [`RequestRecord`]s and feeds them to the request queue.
use crate::queue::{Producer, QueueClosed};
use lazy_static::lazy_static;
use logreplay_core::RequestRecord;
use regex::Regex;
use std::num::NonZeroU64;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

lazy_static! {
    /// `IP - - [DATETIME] "GET PATH HTTP/VERSION" STATUS SIZE "REFERRER" "USER_AGENT"`
    static ref LOG_LINE: Regex = Regex::new(
        r#"^([0-9\.]+)\s-\s-\s\[.*?\]\s"GET\s(.*?)\sHTTP.*?"\s[0-9]+\s[0-9]+\s".*?"\s"(.*?)""#
    )
    .expect("access log pattern is valid");
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Failed to read log source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request queue closed; no workers left to consume it")]
    QueueClosed(#[from] QueueClosed),
}

/// Extract `(client ip, path, user agent)` from a single log line.
///
/// Lines that do not match the access-log pattern yield `None`.
pub fn parse_line(line: &str) -> Option<RequestRecord> {
    let caps = LOG_LINE.captures(line)?;
    Some(RequestRecord::new(&caps[1], &caps[2], &caps[3]))
}

/// Producer half of the replay pipeline.
pub struct LogParser<R> {
    source: R,
    producer: Producer,
    limit: Option<NonZeroU64>,
    read_budget: usize,
    queued: u64,
    line: Vec<u8>,
}

impl<R> LogParser<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(
        source: R,
        producer: Producer,
        limit: Option<NonZeroU64>,
        read_budget: usize,
    ) -> Self {
        Self {
            source,
            producer,
            limit,
            read_budget,
            queued: 0,
            line: Vec::new(),
        }
    }

    /// Number of records handed to the queue so far.
    pub fn queued(&self) -> u64 {
        self.queued
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.queued >= limit.get())
    }

    /// Read roughly `read_budget` bytes worth of whole lines and enqueue every record found.
    ///
    /// Returns `Ok(false)` once the source is exhausted or the request limit is reached.
    /// Enqueueing waits while the queue is at capacity.
    pub async fn parse_next_batch(&mut self) -> Result<bool, ParserError> {
        let mut read = 0;
        while read < self.read_budget {
            if self.limit_reached() {
                return Ok(false);
            }

            self.line.clear();
            let n = self.source.read_until(b'\n', &mut self.line).await?;
            if n == 0 {
                return Ok(read > 0);
            }
            read += n;

            // Logs are not guaranteed to be valid UTF-8.
            let line = String::from_utf8_lossy(&self.line);
            match parse_line(&line) {
                Some(record) => {
                    self.producer.push(record).await?;
                    self.queued += 1;
                }
                None => trace!("Skipping unparseable line"),
            }
        }

        Ok(true)
    }

    /// Parse the whole source, returning the number of records queued.
    ///
    /// Dropping the parser on return closes the queue, which is what tells the workers that no
    /// more records are coming.
    #[instrument(name = "parser", skip_all)]
    pub async fn run(mut self) -> Result<u64, ParserError> {
        while self.parse_next_batch().await? {
            trace!("Batch parsed, {} records queued", self.queued);
        }
        debug!("Log source finished after {} records", self.queued);
        Ok(self.queued)
    }
}
