//! Handoff constants
//!
//! Defaults for the ring buffer, the blocking queue and the benchmark harness.

use crate::disruptor::Sequence;

/// Default ring buffer size (must be power of 2)
pub const DEFAULT_RING_BUFFER_SIZE: usize = 2 << 20; // 2M slots

/// Default blocking queue capacity, large enough not to be the bottleneck
pub const DEFAULT_QUEUE_CAPACITY: usize = 2 << 20;

/// Default number of messages handed off per run
pub const DEFAULT_MESSAGE_COUNT: u64 = 1_000_000;

/// Cursor value before anything has been published
pub const INITIAL_CURSOR_VALUE: Sequence = -1;

/// Cache line size used for padding (128 covers adjacent-line prefetch and Apple Silicon)
pub const CACHE_LINE_SIZE: usize = 128;

/// Spins before a yielding wait strategy starts calling `thread::yield_now`
pub const DEFAULT_SPIN_TRIES: u32 = 100;

/// Upper bound on a single condition-variable wait in the blocking strategy
pub const BLOCKING_WAIT_TIMEOUT_MICROS: u64 = 100;

/// Default maximum events handed to a handler per batch
pub const DEFAULT_BATCH_SIZE: usize = 8192;
