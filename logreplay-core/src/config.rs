use crate::{DEFAULT_TIMEOUT, MIN_PRINT_EVERY, QUEUE_SIZE_MAX, READ_BUDGET_BYTES};
use std::num::{NonZeroU32, NonZeroU64, NonZeroUsize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Target address is required")]
    MissingAddress,

    #[error("Invalid target address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Resolved, immutable settings for a single replay run.
///
/// Constructed once through [`ReplayConfig::builder`] and shared read-only by the parser and
/// every worker.
#[derive(Clone, Debug)]
pub struct ReplayConfig {
    target_address: String,
    timeout: Duration,
    request_limit: Option<NonZeroU64>,
    concurrency: NonZeroUsize,
    queue_capacity: NonZeroUsize,
    read_budget: usize,
    max_rps: Option<NonZeroU32>,
}

impl ReplayConfig {
    pub fn builder(target_address: impl Into<String>) -> ReplayConfigBuilder {
        ReplayConfigBuilder::new(target_address)
    }

    /// Base address every replayed path is appended to, verbatim.
    pub fn target_address(&self) -> &str {
        &self.target_address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum number of records to replay. `None` means the whole log.
    pub fn request_limit(&self) -> Option<NonZeroU64> {
        self.request_limit
    }

    pub fn concurrency(&self) -> NonZeroUsize {
        self.concurrency
    }

    pub fn queue_capacity(&self) -> NonZeroUsize {
        self.queue_capacity
    }

    pub fn read_budget(&self) -> usize {
        self.read_budget
    }

    pub fn max_rps(&self) -> Option<NonZeroU32> {
        self.max_rps
    }

    /// Number of completed requests between two progress lines.
    pub fn print_every(&self) -> u64 {
        let tenth = self.request_limit.map_or(0, |limit| limit.get() / 10);
        tenth.max(MIN_PRINT_EVERY)
    }
}

#[derive(Clone, Debug)]
pub struct ReplayConfigBuilder {
    target_address: String,
    timeout: Duration,
    request_limit: i64,
    concurrency: usize,
    queue_capacity: NonZeroUsize,
    read_budget: usize,
    max_rps: Option<NonZeroU32>,
}

impl ReplayConfigBuilder {
    fn new(target_address: impl Into<String>) -> Self {
        Self {
            target_address: target_address.into(),
            timeout: DEFAULT_TIMEOUT,
            request_limit: -1,
            concurrency: 1,
            queue_capacity: QUEUE_SIZE_MAX,
            read_budget: READ_BUDGET_BYTES,
            max_rps: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Any value `<= 0` replays the whole log.
    pub fn request_limit(mut self, request_limit: i64) -> Self {
        self.request_limit = request_limit;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn queue_capacity(mut self, queue_capacity: NonZeroUsize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn read_budget(mut self, read_budget: usize) -> Self {
        self.read_budget = read_budget.max(1);
        self
    }

    pub fn max_rps(mut self, max_rps: Option<NonZeroU32>) -> Self {
        self.max_rps = max_rps;
        self
    }

    pub fn build(self) -> Result<ReplayConfig, ConfigError> {
        validate_address(&self.target_address)?;

        let concurrency = NonZeroUsize::new(self.concurrency).ok_or(ConfigError::ZeroConcurrency)?;
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let request_limit = u64::try_from(self.request_limit)
            .ok()
            .and_then(NonZeroU64::new);

        Ok(ReplayConfig {
            target_address: self.target_address,
            timeout: self.timeout,
            request_limit,
            concurrency,
            queue_capacity: self.queue_capacity,
            read_budget: self.read_budget,
            max_rps: self.max_rps,
        })
    }
}

fn validate_address(address: &str) -> Result<(), ConfigError> {
    if address.trim().is_empty() {
        return Err(ConfigError::MissingAddress);
    }

    let invalid = |reason: String| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let url = Url::parse(address).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(invalid(format!("unsupported scheme `{scheme}`"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(())
}
