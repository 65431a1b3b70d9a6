//! Wait strategies for ring buffer consumers
//!
//! A consumer that has caught up with the cursor has to wait for the next
//! publication. How it waits is a latency / CPU trade-off chosen once per
//! ring buffer and applied to every consumer of that buffer.

use std::sync::atomic::{ AtomicBool, Ordering };
use std::thread;
use std::time::Duration;

use parking_lot::{ Condvar, Mutex };

use crate::constants::{ BLOCKING_WAIT_TIMEOUT_MICROS, DEFAULT_SPIN_TRIES };
use crate::disruptor::{ PaddedSequence, Sequence, WaitStrategyType };
use crate::error::{ HandoffError, Result };

/// Policy a consumer applies while the cursor is behind the sequence it wants.
pub enum WaitStrategy {
    /// Busy spin - lowest latency, highest CPU usage.
    /// Polls the cursor in a tight loop with a CPU pause hint and never gives up
    /// the core, so it only makes sense with a dedicated core per consumer.
    BusySpin,

    /// Yielding - moderate CPU usage and latency.
    /// Spins for `spin_tries` polls, then yields the processor between polls.
    Yielding {
        /// Polls before the first yield
        spin_tries: u32,
    },

    /// Blocking - lowest CPU usage, higher latency.
    /// Parks on a condition variable that every publish signals. The wait is
    /// bounded so an alert raised without a signal is still noticed.
    Blocking {
        mutex: Mutex<()>,
        condition: Condvar,
        timeout: Duration,
    },
}

impl WaitStrategy {
    /// Create a busy spin wait strategy
    pub fn busy_spin() -> Self {
        Self::BusySpin
    }

    /// Create a yielding wait strategy with the default spin budget
    pub fn yielding() -> Self {
        Self::Yielding { spin_tries: DEFAULT_SPIN_TRIES }
    }

    /// Create a blocking wait strategy
    pub fn blocking() -> Self {
        Self::Blocking {
            mutex: Mutex::new(()),
            condition: Condvar::new(),
            timeout: Duration::from_micros(BLOCKING_WAIT_TIMEOUT_MICROS),
        }
    }

    pub fn from_type(kind: WaitStrategyType) -> Self {
        match kind {
            WaitStrategyType::BusySpin => Self::busy_spin(),
            WaitStrategyType::Yielding => Self::yielding(),
            WaitStrategyType::Blocking => Self::blocking(),
        }
    }

    pub fn kind(&self) -> WaitStrategyType {
        match self {
            Self::BusySpin => WaitStrategyType::BusySpin,
            Self::Yielding { .. } => WaitStrategyType::Yielding,
            Self::Blocking { .. } => WaitStrategyType::Blocking,
        }
    }

    /// Wait until `cursor` reaches `sequence`.
    ///
    /// # Returns
    ///
    /// The cursor value observed, which is `>= sequence` and may be higher.
    /// Returns `HandoffError::Halted` if `alerted` is raised while waiting.
    pub fn wait_for(
        &self,
        sequence: Sequence,
        cursor: &PaddedSequence,
        alerted: &AtomicBool
    ) -> Result<Sequence> {
        match self {
            Self::BusySpin => {
                loop {
                    let available = cursor.get();
                    if available >= sequence {
                        return Ok(available);
                    }
                    if alerted.load(Ordering::Acquire) {
                        return Err(HandoffError::Halted);
                    }
                    std::hint::spin_loop();
                }
            }
            Self::Yielding { spin_tries } => {
                let mut counter = *spin_tries;
                loop {
                    let available = cursor.get();
                    if available >= sequence {
                        return Ok(available);
                    }
                    if alerted.load(Ordering::Acquire) {
                        return Err(HandoffError::Halted);
                    }
                    if counter == 0 {
                        thread::yield_now();
                    } else {
                        counter -= 1;
                        std::hint::spin_loop();
                    }
                }
            }
            Self::Blocking { mutex, condition, timeout } => {
                let mut available = cursor.get();
                if available < sequence {
                    let mut guard = mutex.lock();
                    loop {
                        available = cursor.get();
                        if available >= sequence {
                            break;
                        }
                        if alerted.load(Ordering::Acquire) {
                            return Err(HandoffError::Halted);
                        }
                        condition.wait_for(&mut guard, *timeout);
                    }
                }
                Ok(available)
            }
        }
    }

    /// Signal that new data is available (or that waiters should re-check the alert flag)
    #[inline]
    pub fn signal_all_when_blocking(&self) {
        if let Self::Blocking { mutex, condition, .. } = self {
            // Taking the lock orders this notify after any waiter's cursor check.
            let _guard = mutex.lock();
            condition.notify_all();
        }
    }
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::busy_spin()
    }
}

impl std::fmt::Debug for WaitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WaitStrategy::{:?}", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn published_later(strategy: WaitStrategy) {
        let strategy = Arc::new(strategy);
        let cursor = Arc::new(PaddedSequence::default());
        let alerted = Arc::new(AtomicBool::new(false));

        let s = strategy.clone();
        let c = cursor.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            c.set(3);
            s.signal_all_when_blocking();
        });

        let available = strategy.wait_for(2, &cursor, &alerted).unwrap();
        assert_eq!(available, 3);
        handle.join().unwrap();
    }

    #[test]
    fn test_busy_spin_wait_strategy() {
        published_later(WaitStrategy::busy_spin());
    }

    #[test]
    fn test_yielding_wait_strategy() {
        published_later(WaitStrategy::yielding());
    }

    #[test]
    fn test_blocking_wait_strategy() {
        published_later(WaitStrategy::blocking());
    }

    #[test]
    fn test_already_available_returns_immediately() {
        let cursor = PaddedSequence::new(100);
        let alerted = AtomicBool::new(false);
        for kind in [WaitStrategyType::BusySpin, WaitStrategyType::Yielding, WaitStrategyType::Blocking] {
            let strategy = WaitStrategy::from_type(kind);
            assert_eq!(strategy.kind(), kind);
            assert_eq!(strategy.wait_for(50, &cursor, &alerted).unwrap(), 100);
        }
    }

    #[test]
    fn test_shutdown_handling() {
        let cursor = PaddedSequence::default();
        let alerted = AtomicBool::new(true); // Simulate shutdown
        for kind in [WaitStrategyType::BusySpin, WaitStrategyType::Yielding, WaitStrategyType::Blocking] {
            let result = WaitStrategy::from_type(kind).wait_for(0, &cursor, &alerted);
            assert!(matches!(result, Err(HandoffError::Halted)));
        }
    }

    #[test]
    fn test_blocking_wakes_on_alert() {
        let strategy = Arc::new(WaitStrategy::blocking());
        let cursor = Arc::new(PaddedSequence::default());
        let alerted = Arc::new(AtomicBool::new(false));

        let s = strategy.clone();
        let a = alerted.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            a.store(true, Ordering::Release);
            s.signal_all_when_blocking();
        });

        let start = Instant::now();
        let result = strategy.wait_for(0, &cursor, &alerted);
        assert!(matches!(result, Err(HandoffError::Halted)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }
}
