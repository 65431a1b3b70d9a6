//! handoff - Producer/consumer handoff benchmark.
//!
//! Compares two ways of moving integer messages from producer threads to
//! consumer threads:
//!
//! - a sequenced ring buffer (LMAX Disruptor pattern) in [`disruptor`]
//! - a bounded blocking FIFO in [`queue`]
//!
//! The [`harness`] runs N producers and M consumers over one backend for a
//! fixed message count; the [`driver`] repeats that run and reports latency
//! percentiles and throughput.
//!
//! ```rust,no_run
//! use handoff::{ Backend, Harness, HarnessConfig };
//!
//! let config = HarnessConfig::new(Backend::RingBuffer)
//!     .with_message_count(1_000_000)
//!     .with_producers(4)
//!     .with_consumers(2);
//! let report = Harness::new(config).unwrap().run_once().unwrap();
//! println!("{} msgs in {:?}", report.messages_consumed, report.elapsed);
//! ```

pub mod constants;
pub mod cpu;
pub mod disruptor;
pub mod driver;
pub mod error;
pub mod harness;
pub mod queue;

pub use disruptor::{
    ProducerType,
    RingBuffer,
    RingBufferConfig,
    RingBufferEntry,
    RingConsumer,
    RingEventHandler,
    RingProducer,
    Sequence,
    ValueEvent,
    WaitStrategyType,
    WorkConsumer,
};
pub use driver::{ Driver, DriverReport };
pub use error::{ HandoffError, Result };
pub use harness::{
    Backend,
    ConsumerPolicy,
    ConsumerTally,
    Harness,
    HarnessConfig,
    RunHandle,
    RunReport,
    RunState,
};
pub use queue::BoundedBlockingQueue;
