//! Repeated-sample driver: warm up, then time `run_once` per sample into an HDR histogram.

use std::fmt;

use hdrhistogram::Histogram;
use serde::{ Deserialize, Serialize };
use tracing::{ debug, info, warn };

use crate::error::{ HandoffError, Result };
use crate::harness::{ Harness, HarnessConfig };

/// Highest trackable sample, one hour in microseconds
const MAX_SAMPLE_MICROS: u64 = 3_600_000_000;
const SIGNIFICANT_DIGITS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub warmup_iterations: usize,
    pub measurement_iterations: usize,
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            warmup_iterations: 3,
            measurement_iterations: 10,
        }
    }
}

impl Driver {
    pub fn new(warmup_iterations: usize, measurement_iterations: usize) -> Result<Self> {
        if measurement_iterations == 0 {
            return Err(HandoffError::config("Need at least one measurement iteration"));
        }
        Ok(Self {
            warmup_iterations,
            measurement_iterations,
        })
    }

    /// Run warm-up and measured samples of `config`, each on a freshly built harness.
    ///
    /// Samples that did not complete are left out of the histogram and counted
    /// in `incomplete_runs`.
    pub fn run(&self, config: &HarnessConfig) -> Result<DriverReport> {
        if self.measurement_iterations == 0 {
            return Err(HandoffError::config("Need at least one measurement iteration"));
        }
        config.validate()?;

        let mut histogram = Histogram::<u64>::new_with_bounds(1, MAX_SAMPLE_MICROS, SIGNIFICANT_DIGITS)
            .map_err(|e| HandoffError::performance(format!("histogram: {}", e)))?;

        for i in 0..self.warmup_iterations {
            let report = Harness::new(config.clone())?.run_once()?;
            debug!(iteration = i, elapsed_us = report.elapsed.as_micros() as u64, "warmup");
        }

        let mut incomplete_runs = 0;
        for i in 0..self.measurement_iterations {
            let report = Harness::new(config.clone())?.run_once()?;
            if !report.is_complete() {
                warn!(iteration = i, state = ?report.state, failed_tasks = report.failed_tasks, "sample discarded");
                incomplete_runs += 1;
                continue;
            }
            let micros = (report.elapsed.as_micros() as u64).max(1);
            histogram.saturating_record(micros);
            debug!(iteration = i, elapsed_us = micros, "sample");
        }

        let report = DriverReport::from_histogram(config.clone(), &histogram, incomplete_runs);
        info!(
            backend = %config.backend,
            samples = report.samples,
            mean_us = report.mean_us,
            p99_us = report.p99_us,
            msgs_per_sec = report.messages_per_sec,
            "measurement done"
        );
        Ok(report)
    }
}

/// Elapsed-time distribution over the measured samples, in microseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverReport {
    pub config: HarnessConfig,
    pub samples: u64,
    pub incomplete_runs: usize,
    pub mean_us: f64,
    pub min_us: u64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p99_us: u64,
    pub p999_us: u64,
    pub max_us: u64,
    /// Message count over mean sample time
    pub messages_per_sec: f64,
}

impl DriverReport {
    fn from_histogram(config: HarnessConfig, histogram: &Histogram<u64>, incomplete_runs: usize) -> Self {
        let samples = histogram.len();
        let mean_us = if samples > 0 { histogram.mean() } else { 0.0 };
        let messages_per_sec = if mean_us > 0.0 {
            (config.message_count as f64) / (mean_us / 1_000_000.0)
        } else {
            0.0
        };

        Self {
            samples,
            incomplete_runs,
            mean_us,
            min_us: if samples > 0 { histogram.min() } else { 0 },
            p50_us: histogram.value_at_quantile(0.5),
            p90_us: histogram.value_at_quantile(0.9),
            p99_us: histogram.value_at_quantile(0.99),
            p999_us: histogram.value_at_quantile(0.999),
            max_us: histogram.max(),
            messages_per_sec,
            config,
        }
    }
}

impl fmt::Display for DriverReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {}P/{}C {:?} {} msgs, {} samples ({} discarded)",
            self.config.backend,
            self.config.producers,
            self.config.consumers,
            self.config.consumer_policy,
            self.config.message_count,
            self.samples,
            self.incomplete_runs
        )?;
        writeln!(
            f,
            "  mean {:.1} us  p50 {} us  p90 {} us  p99 {} us  p99.9 {} us  max {} us",
            self.mean_us,
            self.p50_us,
            self.p90_us,
            self.p99_us,
            self.p999_us,
            self.max_us
        )?;
        write!(f, "  {:.2} M msgs/sec", self.messages_per_sec / 1_000_000.0)
    }
}
