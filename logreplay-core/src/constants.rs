use std::num::NonZeroUsize;
use std::time::Duration;

/// Soft capacity of the request queue between the log parser and the workers.
pub const QUEUE_SIZE_MAX: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(1000) };

/// Approximate number of bytes the parser reads from the log per batch.
pub const READ_BUDGET_BYTES: usize = 1_000_000;

/// How long a worker waits on an empty queue before checking again whether the parser is done.
pub const PULL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Lower bound on the number of completed requests between two progress lines.
pub const MIN_PRINT_EVERY: u64 = 1000;

/// Percentiles reported in addition to the maximum.
pub const REPORT_PERCENTILES: [u8; 9] = [10, 20, 30, 40, 50, 60, 70, 80, 90];
