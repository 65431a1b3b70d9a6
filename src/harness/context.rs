//! Shared state handed to every producer and consumer task of one run.

use std::sync::atomic::{ AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering };

use parking_lot::{ Condvar, Mutex };
use serde::{ Deserialize, Serialize };

/// Lifecycle of one harness invocation.
///
/// `Created -> Running -> Draining -> Complete`, with `Cancelled` reachable
/// from any non-terminal state by a forced teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RunState {
    /// Backend and tasks built, tasks parked at the start gate
    Created = 0,
    /// Producers and consumers active
    Running = 1,
    /// Every producer finished, consumers working through the backlog
    Draining = 2,
    /// All tasks joined after a full run
    Complete = 3,
    /// Torn down before completion; counts are unspecified
    Cancelled = 4,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Draining,
            3 => Self::Complete,
            _ => Self::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }
}

/// Counters and flags shared by the tasks of one run.
///
/// Replaces process-wide statics: a fresh context is built per run so nothing
/// leaks between samples.
pub struct TaskContext {
    message_count: u64,
    /// Producer tickets handed out; may overshoot `message_count`
    produce_tickets: AtomicU64,
    /// Consumer tickets for partitioned backends
    consume_tickets: AtomicU64,
    consumed: AtomicU64,
    producers_running: AtomicUsize,
    cancelled: AtomicBool,
    state: AtomicU8,
    gate: Mutex<bool>,
    gate_opened: Condvar,
}

impl TaskContext {
    pub fn new(message_count: u64, producers: usize) -> Self {
        Self {
            message_count,
            produce_tickets: AtomicU64::new(0),
            consume_tickets: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            producers_running: AtomicUsize::new(producers),
            cancelled: AtomicBool::new(false),
            state: AtomicU8::new(RunState::Created as u8),
            gate: Mutex::new(false),
            gate_opened: Condvar::new(),
        }
    }

    #[inline]
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Next message value for a producer, `1..=message_count`; `None` once exhausted
    /// or cancelled.
    #[inline]
    pub fn next_message(&self) -> Option<u64> {
        if self.is_cancelled() {
            return None;
        }
        let value = self.produce_tickets.fetch_add(1, Ordering::Relaxed) + 1;
        (value <= self.message_count).then_some(value)
    }

    /// Reserve one message for a consumer of a partitioned backend.
    #[inline]
    pub fn claim_consumption(&self) -> bool {
        !self.is_cancelled() && self.consume_tickets.fetch_add(1, Ordering::Relaxed) < self.message_count
    }

    pub fn record_consumed(&self, count: u64) {
        self.consumed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    /// Called once by each producer task on exit; the last one moves the run to `Draining`.
    pub fn producer_finished(&self) {
        if self.producers_running.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.transition(RunState::Running, RunState::Draining);
        }
    }

    pub fn producers_running(&self) -> usize {
        self.producers_running.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.open_gate();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move `from -> to`; false if the run is no longer in `from`.
    pub fn transition(&self, from: RunState, to: RunState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Finish the run as `Complete`, unless it was cancelled.
    pub(crate) fn complete(&self) -> RunState {
        let _ =
            self.transition(RunState::Draining, RunState::Complete) ||
            self.transition(RunState::Running, RunState::Complete);
        self.state()
    }

    /// Force `Cancelled` from any non-terminal state.
    pub(crate) fn mark_cancelled(&self) {
        let mut current = self.state.load(Ordering::Acquire);
        while !RunState::from_u8(current).is_terminal() {
            match
                self.state.compare_exchange(
                    current,
                    RunState::Cancelled as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire
                )
            {
                Ok(_) => return,
                Err(actual) => {
                    current = actual;
                }
            }
        }
    }

    // ========================================================================
    // START GATE
    // ========================================================================

    /// Block the calling task until the run starts (or is cancelled).
    pub fn wait_for_start(&self) {
        let mut open = self.gate.lock();
        while !*open {
            self.gate_opened.wait(&mut open);
        }
    }

    /// Release every task parked at the gate and mark the run `Running`.
    pub(crate) fn start(&self) {
        self.transition(RunState::Created, RunState::Running);
        self.open_gate();
    }

    fn open_gate(&self) {
        *self.gate.lock() = true;
        self.gate_opened.notify_all();
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("message_count", &self.message_count)
            .field("consumed", &self.consumed())
            .field("producers_running", &self.producers_running())
            .field("cancelled", &self.is_cancelled())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_tickets() {
        let ctx = TaskContext::new(3, 1);
        assert_eq!(ctx.next_message(), Some(1));
        assert_eq!(ctx.next_message(), Some(2));
        assert_eq!(ctx.next_message(), Some(3));
        assert_eq!(ctx.next_message(), None);
        assert_eq!(ctx.next_message(), None);
    }

    #[test]
    fn test_consumer_tickets() {
        let ctx = TaskContext::new(2, 1);
        assert!(ctx.claim_consumption());
        assert!(ctx.claim_consumption());
        assert!(!ctx.claim_consumption());
    }

    #[test]
    fn test_cancel_stops_tickets() {
        let ctx = TaskContext::new(10, 1);
        ctx.cancel();
        assert_eq!(ctx.next_message(), None);
        assert!(!ctx.claim_consumption());
    }

    #[test]
    fn test_state_machine() {
        let ctx = TaskContext::new(10, 2);
        assert_eq!(ctx.state(), RunState::Created);
        ctx.start();
        assert_eq!(ctx.state(), RunState::Running);

        ctx.producer_finished();
        assert_eq!(ctx.state(), RunState::Running);
        ctx.producer_finished();
        assert_eq!(ctx.state(), RunState::Draining);

        assert_eq!(ctx.complete(), RunState::Complete);
        // Terminal
        ctx.mark_cancelled();
        assert_eq!(ctx.state(), RunState::Complete);
    }

    #[test]
    fn test_cancel_from_created() {
        let ctx = TaskContext::new(10, 1);
        ctx.mark_cancelled();
        assert_eq!(ctx.state(), RunState::Cancelled);
        assert!(!ctx.transition(RunState::Created, RunState::Running));
        assert_eq!(ctx.complete(), RunState::Cancelled);
    }

    #[test]
    fn test_gate_releases_on_cancel() {
        let ctx = std::sync::Arc::new(TaskContext::new(1, 1));
        let c = ctx.clone();
        let handle = std::thread::spawn(move || c.wait_for_start());
        ctx.cancel();
        handle.join().unwrap();
        assert_eq!(ctx.state(), RunState::Created);
    }
}
