use crate::REPORT_PERCENTILES;
#[cfg(feature = "serde")]
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("No successful requests; latency statistics are undefined")]
    NoSamples,

    #[error("Run finished in zero time; throughput is undefined")]
    NoElapsedTime,
}

/// Final counters and latency samples of a finished run.
///
/// `latencies` holds one entry per successful request, in no particular order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunMetrics {
    pub total: u64,
    pub ok: u64,
    pub error: u64,
    pub latencies: Vec<Duration>,
}

impl RunMetrics {
    /// Summarize the run. Pure: calling it repeatedly yields the same report.
    pub fn report(&self, elapsed: Duration) -> Result<RunReport, ReportError> {
        if self.latencies.is_empty() {
            return Err(ReportError::NoSamples);
        }
        if elapsed.is_zero() {
            return Err(ReportError::NoElapsedTime);
        }

        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();

        let sum: Duration = sorted.iter().sum();
        let mean_latency_ms = to_ms(sum) / sorted.len() as f64;

        let mut percentiles: Vec<Percentile> = REPORT_PERCENTILES
            .iter()
            .map(|&percent| Percentile {
                percent,
                latency_ms: nearest_rank(&sorted, percent).map_or(0., to_ms),
            })
            .collect();
        // Non-empty, checked above.
        let max = sorted[sorted.len() - 1];
        percentiles.push(Percentile {
            percent: 100,
            latency_ms: to_ms(max),
        });

        Ok(RunReport {
            total: self.total,
            ok: self.ok,
            error: self.error,
            elapsed_secs: elapsed.as_secs_f64(),
            requests_per_second: self.ok as f64 / elapsed.as_secs_f64(),
            mean_latency_ms,
            percentiles,
        })
    }
}

/// Value at index `floor(len * percent / 100)` of an ascending slice, clamped to the last
/// element. `None` for an empty slice.
pub fn nearest_rank(sorted: &[Duration], percent: u8) -> Option<Duration> {
    let idx = sorted.len() * percent as usize / 100;
    sorted.get(idx.min(sorted.len().saturating_sub(1))).copied()
}

fn to_ms(latency: Duration) -> f64 {
    latency.as_nanos() as f64 / 1e6
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Percentile {
    pub percent: u8,
    pub latency_ms: f64,
}

/// Throughput and latency summary of a replay run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RunReport {
    pub total: u64,
    pub ok: u64,
    pub error: u64,
    pub elapsed_secs: f64,
    pub requests_per_second: f64,
    pub mean_latency_ms: f64,
    /// p10 through p90, followed by p100.
    pub percentiles: Vec<Percentile>,
}

impl RunReport {
    pub fn percentile(&self, percent: u8) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|p| p.percent == percent)
            .map(|p| p.latency_ms)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "requests {}", self.total)?;
        writeln!(f, "ok       {}", self.ok)?;
        writeln!(f, "error    {}", self.error)?;
        writeln!(f)?;

        writeln!(f, "Total time: {:.2} sec", self.elapsed_secs)?;
        writeln!(f, "Requests per second: {:.0}", self.requests_per_second)?;
        writeln!(f)?;

        writeln!(f, "Response times:")?;
        writeln!(f, "mean:\t{:.1}ms", self.mean_latency_ms)?;
        for p in &self.percentiles {
            writeln!(f, "{}%\t{:.1}ms", p.percent, p.latency_ms)?;
        }
        Ok(())
    }
}
