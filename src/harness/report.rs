//! Per-consumer tallies and the per-run report.

use std::time::Duration;

use serde::{ Deserialize, Serialize };
use tracing::trace;

use crate::disruptor::{ RingBufferEntry, RingEventHandler, Sequence };
use crate::harness::{ Backend, ConsumerPolicy, RunState };

/// What one consumer task saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerTally {
    pub consumer: usize,
    pub processed: u64,
    /// Value of the most recently processed message
    pub last_value: i64,
    pub max_value: i64,
    pub value_sum: i64,
    /// Ring backends only: sequence of the first and last processed event
    pub first_sequence: Option<Sequence>,
    pub last_sequence: Option<Sequence>,
    /// Sequences that did not strictly increase (duplicates or reordering)
    pub ordering_violations: u64,
    /// Sequences that skipped ahead of `last + 1`
    pub gaps: u64,
}

impl ConsumerTally {
    pub fn new(consumer: usize) -> Self {
        Self {
            consumer,
            ..Default::default()
        }
    }

    #[inline]
    pub fn record(&mut self, sequence: Option<Sequence>, value: i64) {
        trace!(consumer = self.consumer, ?sequence, value, "consumed");

        if let Some(sequence) = sequence {
            match self.last_sequence {
                Some(last) if sequence <= last => {
                    self.ordering_violations += 1;
                }
                Some(last) if sequence > last + 1 => {
                    self.gaps += 1;
                }
                None => {
                    self.first_sequence = Some(sequence);
                }
                _ => {}
            }
            self.last_sequence = Some(sequence);
        }

        self.processed += 1;
        self.last_value = value;
        self.max_value = self.max_value.max(value);
        self.value_sum = self.value_sum.wrapping_add(value);
    }

    /// Saw a contiguous, strictly increasing run of sequences
    pub fn is_in_order(&self) -> bool {
        self.ordering_violations == 0 && self.gaps == 0
    }
}

impl<T: RingBufferEntry> RingEventHandler<T> for ConsumerTally {
    #[inline]
    fn on_event(&mut self, event: &T, sequence: Sequence, _end_of_batch: bool) {
        self.record(Some(sequence), event.value());
    }
}

/// Outcome of one harness invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub backend: Backend,
    pub consumer_policy: ConsumerPolicy,
    pub message_count: u64,
    pub producers: usize,
    pub consumers: usize,
    pub state: RunState,
    /// From start gate release until every task has been joined
    pub elapsed: Duration,
    /// Messages actually handed to the backend
    pub messages_produced: u64,
    /// Messages processed, summed over all consumers
    pub messages_consumed: u64,
    /// Tasks that panicked or failed for a reason other than teardown
    pub failed_tasks: usize,
    pub tallies: Vec<ConsumerTally>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Complete && self.failed_tasks == 0
    }

    /// Messages the consumers had to process between them for the run to be complete.
    /// Saturates at `u64::MAX` for fan-out runs too large to count.
    pub fn expected_consumed(&self) -> u64 {
        match (self.backend, self.consumer_policy) {
            (Backend::RingBuffer, ConsumerPolicy::FanOut) =>
                self.message_count.saturating_mul(self.consumers as u64),
            _ => self.message_count,
        }
    }

    /// Highest message value any consumer processed
    pub fn max_value(&self) -> Option<i64> {
        self.tallies
            .iter()
            .filter(|t| t.processed > 0)
            .map(|t| t.max_value)
            .max()
    }

    /// Messages per second, counting each message once
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.messages_produced as f64) / secs
        } else {
            0.0
        }
    }
}
