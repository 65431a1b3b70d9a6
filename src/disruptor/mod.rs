//! Sequenced ring buffer (LMAX Disruptor pattern).
//!
//! ## Components
//!
//! | Type | Role |
//! |------|------|
//! | `RingBuffer<T>` | Pre-allocated power-of-two slot array |
//! | `Sequencer` | Claims slots, tracks the cursor, gates on the slowest consumer |
//! | `WaitStrategy` | How consumers wait: busy spin, yield or block |
//! | `RingProducer<T>` | Claim / write / publish handle |
//! | `RingConsumer<T>` | Fan-out reader, sees every published event |
//! | `WorkConsumer<T>` | Work-pool reader, each event goes to one worker |
//!
//! ## Protocol
//!
//! 1. Producer claims sequence `s` (blocks while `s - capacity` is unread by any consumer)
//! 2. Producer writes slot `s & mask`
//! 3. Producer publishes `s`; this is the only point where slot ownership moves to consumers
//! 4. Consumers read up to the highest contiguous published sequence, then advance their own
//!    sequence, which releases the slot back to producers
//!
//! ## Safety
//!
//! Slots live in `UnsafeCell`s. A slot is written only by the producer holding its claim and
//! read only after publication and before every consumer has moved past it.

pub mod barrier;
pub mod consumer;
pub mod producer;
pub mod ring_buffer;
pub mod sequence;
pub mod sequencer;
pub mod value_event;
pub mod wait_strategy;
pub mod work_pool;

pub use barrier::SequenceBarrier;
pub use consumer::{ RingConsumer, RingEventHandler };
pub use producer::RingProducer;
pub use ring_buffer::RingBuffer;
pub use sequence::{ minimum_sequence, PaddedSequence };
pub use sequencer::Sequencer;
pub use value_event::ValueEvent;
pub use wait_strategy::WaitStrategy;
pub use work_pool::WorkConsumer;

use serde::{ Deserialize, Serialize };

use crate::constants::DEFAULT_RING_BUFFER_SIZE;
use crate::error::{ HandoffError, Result };

/// Sequence number type for ring buffer positions. Starts at -1 (nothing published).
pub type Sequence = i64;

/// Trait for objects that can be stored in the ring buffer
pub trait RingBufferEntry: Clone + Default + Send + Sync + 'static {
    /// Payload carried by this entry
    fn value(&self) -> i64;

    /// Set the payload of this entry
    fn set_value(&mut self, value: i64);

    /// Reset the entry to its default state
    fn reset(&mut self);
}

/// How producers claim slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProducerType {
    /// One producer thread; claiming is a plain increment
    Single,
    /// Any number of producer threads; claiming is a compare-and-swap loop
    Multi,
}

/// Available wait strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitStrategyType {
    /// Busy spin for lowest latency
    BusySpin,
    /// Spin briefly, then yield the processor between polls
    Yielding,
    /// Park on a condition variable signalled by publication
    Blocking,
}

/// Configuration for ring buffer behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingBufferConfig {
    /// Size of the ring buffer (must be power of 2)
    pub size: usize,
    /// Claiming mode
    pub producer_type: ProducerType,
    /// Wait strategy for consumers
    pub wait_strategy: WaitStrategyType,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_RING_BUFFER_SIZE,
            producer_type: ProducerType::Multi,
            wait_strategy: WaitStrategyType::BusySpin,
        }
    }
}

impl RingBufferConfig {
    /// Create a new configuration with the specified size
    pub fn new(size: usize) -> Result<Self> {
        validate_size(size)?;

        Ok(Self {
            size,
            ..Default::default()
        })
    }

    /// Set the claiming mode
    pub fn with_producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    /// Set the wait strategy
    pub fn with_wait_strategy(mut self, strategy: WaitStrategyType) -> Self {
        self.wait_strategy = strategy;
        self
    }

    /// Re-check invariants (fields are public and may have been edited after `new`)
    pub fn validate(&self) -> Result<()> {
        validate_size(self.size)
    }
}

fn validate_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(HandoffError::config("Ring buffer size must be greater than 0"));
    }
    if !size.is_power_of_two() {
        return Err(crate::config_error!("Ring buffer size must be power of 2, got {}", size));
    }
    Ok(())
}
