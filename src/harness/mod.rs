//! Benchmark harness: N producers and M consumers over one backend.
//!
//! Each invocation builds a fresh backend, a fresh [`TaskContext`] and fresh
//! threads, so no buffered data or lingering thread carries over between
//! samples. Threads park at a start gate until everything is spawned; the
//! clock runs from gate release until the last thread is joined.
//!
//! ```text
//! Created --start--> Running --last producer exits--> Draining --joined--> Complete
//!    |                  |                                 |
//!    +------------------+------ shutdown_now / failure ---+--> Cancelled
//! ```

mod context;
pub mod queue_tasks;
mod report;
pub mod ring_tasks;

pub use context::{ RunState, TaskContext };
pub use report::{ ConsumerTally, RunReport };

use std::fmt;
use std::sync::Arc;
use std::thread::{ self, JoinHandle };
use std::time::Instant;

use serde::{ Deserialize, Serialize };
use tracing::{ debug, info, warn };

use crate::constants::{ DEFAULT_MESSAGE_COUNT, DEFAULT_QUEUE_CAPACITY, DEFAULT_RING_BUFFER_SIZE };
use crate::cpu;
use crate::disruptor::{ ProducerType, RingBuffer, RingBufferConfig, ValueEvent, WaitStrategyType };
use crate::error::{ HandoffError, Result };
use crate::queue::BoundedBlockingQueue;
use ring_tasks::RingReader;

/// Which handoff structure a run measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Sequenced ring buffer
    RingBuffer,
    /// Bounded blocking FIFO
    BlockingQueue,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingBuffer => write!(f, "ring"),
            Self::BlockingQueue => write!(f, "queue"),
        }
    }
}

/// How ring buffer consumers share the stream.
///
/// The blocking queue always partitions: a take removes the element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumerPolicy {
    /// Every consumer sees every message
    #[default]
    FanOut,
    /// Each message is handled by exactly one consumer
    WorkPool,
}

/// Parameters of one benchmark invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub backend: Backend,
    pub message_count: u64,
    pub producers: usize,
    pub consumers: usize,
    /// Ring slots (must be power of 2)
    pub ring_capacity: usize,
    pub queue_capacity: usize,
    pub wait_strategy: WaitStrategyType,
    pub producer_type: ProducerType,
    pub consumer_policy: ConsumerPolicy,
    /// Pin worker threads round robin over the available cores
    pub pin_threads: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new(Backend::RingBuffer)
    }
}

impl HarnessConfig {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            message_count: DEFAULT_MESSAGE_COUNT,
            producers: 1,
            consumers: 1,
            ring_capacity: DEFAULT_RING_BUFFER_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            wait_strategy: WaitStrategyType::BusySpin,
            producer_type: ProducerType::Multi,
            consumer_policy: ConsumerPolicy::FanOut,
            pin_threads: false,
        }
    }

    pub fn with_message_count(mut self, message_count: u64) -> Self {
        self.message_count = message_count;
        self
    }

    pub fn with_producers(mut self, producers: usize) -> Self {
        self.producers = producers;
        self
    }

    pub fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers;
        self
    }

    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_wait_strategy(mut self, strategy: WaitStrategyType) -> Self {
        self.wait_strategy = strategy;
        self
    }

    pub fn with_producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    pub fn with_consumer_policy(mut self, policy: ConsumerPolicy) -> Self {
        self.consumer_policy = policy;
        self
    }

    pub fn with_pin_threads(mut self, pin: bool) -> Self {
        self.pin_threads = pin;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.message_count == 0 {
            return Err(HandoffError::config("Message count must be greater than 0"));
        }
        if self.message_count > (i64::MAX as u64) {
            return Err(crate::config_error!("Message count {} does not fit a sequence", self.message_count));
        }
        if self.producers == 0 {
            return Err(HandoffError::config("Need at least one producer"));
        }
        if self.consumers == 0 {
            return Err(HandoffError::config("Need at least one consumer"));
        }

        match self.backend {
            Backend::RingBuffer => {
                self.ring_config()?;
                if self.producer_type == ProducerType::Single && self.producers > 1 {
                    return Err(
                        crate::config_error!(
                            "Single-producer ring buffer cannot take {} producers",
                            self.producers
                        )
                    );
                }
            }
            Backend::BlockingQueue => {
                if self.queue_capacity == 0 {
                    return Err(HandoffError::config("Queue capacity must be greater than 0"));
                }
            }
        }
        Ok(())
    }

    fn ring_config(&self) -> Result<RingBufferConfig> {
        Ok(
            RingBufferConfig::new(self.ring_capacity)?
                .with_producer_type(self.producer_type)
                .with_wait_strategy(self.wait_strategy)
        )
    }
}

/// Backend of a live run, kept so teardown can halt it
#[derive(Clone)]
enum BackendHandle {
    Ring(Arc<RingBuffer<ValueEvent>>),
    Queue(Arc<BoundedBlockingQueue<i64>>),
}

impl BackendHandle {
    fn halt(&self) {
        match self {
            Self::Ring(ring) => ring.halt(),
            Self::Queue(queue) => queue.close(),
        }
    }
}

/// Builds and runs invocations for one configuration
#[derive(Debug, Clone)]
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run the configured message count to completion.
    pub fn run_once(&self) -> Result<RunReport> {
        Ok(self.start()?.wait())
    }

    /// Build a fresh backend, spawn every task and release them.
    pub fn start(&self) -> Result<RunHandle> {
        let config = &self.config;
        info!(
            backend = %config.backend,
            messages = config.message_count,
            producers = config.producers,
            consumers = config.consumers,
            policy = ?config.consumer_policy,
            "starting run"
        );

        let ctx = Arc::new(TaskContext::new(config.message_count, config.producers));
        let mut handle = match config.backend {
            Backend::RingBuffer => self.spawn_ring(ctx)?,
            Backend::BlockingQueue => self.spawn_queue(ctx)?,
        };

        handle.started = Instant::now();
        handle.ctx.start();
        Ok(handle)
    }

    fn spawn_ring(&self, ctx: Arc<TaskContext>) -> Result<RunHandle> {
        let config = &self.config;
        let ring = RingBuffer::<ValueEvent>::new(config.ring_config()?)?;

        // Register every reader before the first publish so each sees the run from sequence 0
        let readers: Vec<RingReader> = match config.consumer_policy {
            ConsumerPolicy::FanOut =>
                (0..config.consumers).map(|_| RingReader::FanOut(ring.add_consumer())).collect(),
            ConsumerPolicy::WorkPool =>
                ring.add_work_pool(config.consumers)?.into_iter().map(RingReader::Work).collect(),
        };
        let producers = (0..config.producers).map(|_| ring.producer()).collect::<Result<Vec<_>>>()?;

        let mut handle = RunHandle::new(config.clone(), ctx, BackendHandle::Ring(ring));

        for (id, reader) in readers.into_iter().enumerate() {
            let task = handle.spawn_task(format!("handoff-consumer-{}", id), id, move |ctx| {
                reader.run(ctx, id)
            })?;
            handle.consumers.push(task);
        }
        for (id, mut producer) in producers.into_iter().enumerate() {
            let task = handle.spawn_task(
                format!("handoff-producer-{}", id),
                config.consumers + id,
                move |ctx| {
                    let result = ring_tasks::run_producer(ctx, &mut producer, id);
                    ctx.producer_finished();
                    result
                }
            )?;
            handle.producers.push(task);
        }
        Ok(handle)
    }

    fn spawn_queue(&self, ctx: Arc<TaskContext>) -> Result<RunHandle> {
        let config = &self.config;
        let queue = Arc::new(BoundedBlockingQueue::<i64>::new(config.queue_capacity)?);
        let mut handle = RunHandle::new(config.clone(), ctx, BackendHandle::Queue(queue.clone()));

        for id in 0..config.consumers {
            let queue = queue.clone();
            let task = handle.spawn_task(format!("handoff-consumer-{}", id), id, move |ctx| {
                queue_tasks::run_consumer(ctx, &queue, id)
            })?;
            handle.consumers.push(task);
        }
        for id in 0..config.producers {
            let queue = queue.clone();
            let task = handle.spawn_task(
                format!("handoff-producer-{}", id),
                config.consumers + id,
                move |ctx| {
                    let result = queue_tasks::run_producer(ctx, &queue, id);
                    ctx.producer_finished();
                    result
                }
            )?;
            handle.producers.push(task);
        }
        Ok(handle)
    }
}

/// Halts the backend if its task exits by panic or by a non-teardown error,
/// so the remaining tasks stop instead of waiting on it forever.
struct AbortOnFailure<'a> {
    ctx: &'a TaskContext,
    backend: &'a BackendHandle,
    armed: bool,
}

impl Drop for AbortOnFailure<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.ctx.cancel();
            self.backend.halt();
        }
    }
}

/// A started run. Dropping it without `wait` tears it down.
pub struct RunHandle {
    config: HarnessConfig,
    ctx: Arc<TaskContext>,
    backend: BackendHandle,
    producers: Vec<JoinHandle<Result<u64>>>,
    consumers: Vec<JoinHandle<Result<ConsumerTally>>>,
    started: Instant,
}

impl RunHandle {
    fn new(config: HarnessConfig, ctx: Arc<TaskContext>, backend: BackendHandle) -> Self {
        Self {
            config,
            ctx,
            backend,
            producers: Vec::new(),
            consumers: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> RunState {
        self.ctx.state()
    }

    pub fn context(&self) -> &Arc<TaskContext> {
        &self.ctx
    }

    /// Block until every task has finished.
    pub fn wait(mut self) -> RunReport {
        self.finish()
    }

    /// Halt the backend, wake every blocked task and join them all.
    ///
    /// The report is `Cancelled` unless the run had already completed; its
    /// message counts are whatever was reached.
    pub fn shutdown_now(mut self) -> RunReport {
        self.cancel();
        self.finish()
    }

    fn cancel(&self) {
        info!(state = ?self.ctx.state(), "forced shutdown");
        self.ctx.cancel();
        self.ctx.mark_cancelled();
        self.backend.halt();
    }

    fn spawn_task<R, F>(&self, name: String, index: usize, task: F) -> Result<JoinHandle<Result<R>>>
        where R: Send + 'static, F: FnOnce(&TaskContext) -> Result<R> + Send + 'static
    {
        let ctx = self.ctx.clone();
        let backend = self.backend.clone();
        let pin = self.config.pin_threads;

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if pin {
                    cpu::try_pin_current_thread(index);
                }
                ctx.wait_for_start();
                if ctx.is_cancelled() {
                    return Err(HandoffError::Halted);
                }

                let mut guard = AbortOnFailure {
                    ctx: &ctx,
                    backend: &backend,
                    armed: true,
                };
                let result = task(&ctx);
                if !matches!(&result, Err(e) if !e.is_shutdown()) {
                    guard.armed = false;
                }
                result
            })
            .map_err(|e| HandoffError::unexpected(format!("failed to spawn {}: {}", name, e)))
    }

    fn finish(&mut self) -> RunReport {
        let mut failed_tasks = 0;

        let mut messages_produced = 0u64;
        for (id, handle) in std::mem::take(&mut self.producers).into_iter().enumerate() {
            if let Some(published) = joined("producer", id, handle, &mut failed_tasks) {
                messages_produced += published;
            }
        }

        let mut tallies = Vec::with_capacity(self.consumers.len());
        for (id, handle) in std::mem::take(&mut self.consumers).into_iter().enumerate() {
            if let Some(tally) = joined("consumer", id, handle, &mut failed_tasks) {
                tallies.push(tally);
            }
        }

        let elapsed = self.started.elapsed();
        let state = if self.ctx.is_cancelled() {
            self.ctx.mark_cancelled();
            self.ctx.state()
        } else {
            self.ctx.complete()
        };

        let messages_consumed = tallies.iter().map(|t| t.processed).sum();
        info!(
            state = ?state,
            elapsed_us = elapsed.as_micros() as u64,
            produced = messages_produced,
            consumed = messages_consumed,
            failed_tasks,
            "run finished"
        );

        RunReport {
            backend: self.config.backend,
            consumer_policy: self.config.consumer_policy,
            message_count: self.config.message_count,
            producers: self.config.producers,
            consumers: self.config.consumers,
            state,
            elapsed,
            messages_produced,
            messages_consumed,
            failed_tasks,
            tallies,
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if !self.producers.is_empty() || !self.consumers.is_empty() {
            self.cancel();
            self.finish();
        }
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("backend", &self.config.backend)
            .field("producers", &self.producers.len())
            .field("consumers", &self.consumers.len())
            .field("state", &self.state())
            .finish()
    }
}

/// Join one task. Teardown errors are swallowed; panics and other errors count as failures.
fn joined<R>(role: &str, id: usize, handle: JoinHandle<Result<R>>, failed_tasks: &mut usize) -> Option<R> {
    match handle.join() {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) if e.is_shutdown() => {
            debug!(role, id, "task stopped by teardown");
            None
        }
        Ok(Err(e)) => {
            warn!(role, id, error = %e, "task failed");
            *failed_tasks += 1;
            None
        }
        Err(_) => {
            warn!(role, id, "task panicked");
            *failed_tasks += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(backend: Backend) -> HarnessConfig {
        HarnessConfig::new(backend)
            .with_message_count(1_000)
            .with_ring_capacity(64)
            .with_queue_capacity(64)
            .with_wait_strategy(WaitStrategyType::Yielding)
    }

    #[test]
    fn test_config_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.backend, Backend::RingBuffer);
        assert_eq!(config.message_count, 1_000_000);
        assert_eq!(config.ring_capacity, 2 << 20);
        assert_eq!(config.producer_type, ProducerType::Multi);
        assert_eq!(config.consumer_policy, ConsumerPolicy::FanOut);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let base = small(Backend::RingBuffer);
        assert!(base.clone().with_producers(0).validate().is_err());
        assert!(base.clone().with_consumers(0).validate().is_err());
        assert!(base.clone().with_message_count(0).validate().is_err());
        assert!(base.clone().with_ring_capacity(100).validate().is_err());
        assert!(
            base
                .clone()
                .with_producer_type(ProducerType::Single)
                .with_producers(2)
                .validate()
                .is_err()
        );
        // Ring capacity is irrelevant to the queue backend
        assert!(small(Backend::BlockingQueue).with_ring_capacity(100).validate().is_ok());
        assert!(small(Backend::BlockingQueue).with_queue_capacity(0).validate().is_err());
        assert!(Harness::new(base.with_producers(0)).is_err());
    }

    #[test]
    fn test_ring_run_once() {
        let report = Harness::new(small(Backend::RingBuffer)).unwrap().run_once().unwrap();
        assert!(report.is_complete());
        assert_eq!(report.messages_produced, 1_000);
        assert_eq!(report.messages_consumed, 1_000);
        assert_eq!(report.max_value(), Some(1_000));
    }

    #[test]
    fn test_queue_run_once() {
        let report = Harness::new(small(Backend::BlockingQueue).with_producers(2).with_consumers(2))
            .unwrap()
            .run_once()
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.messages_consumed, 1_000);
    }

    #[test]
    fn test_drop_handle_tears_down() {
        let harness = Harness::new(small(Backend::RingBuffer).with_message_count(1 << 40)).unwrap();
        let handle = harness.start().unwrap();
        drop(handle);
    }
}
