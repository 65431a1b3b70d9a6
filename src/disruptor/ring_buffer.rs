//! RingBuffer - pre-allocated slot array coordinated by a `Sequencer`
//!
//! Slots are allocated once at construction and reused for the buffer's
//! lifetime; publishing never allocates. Capacity is a power of two so slot
//! addressing is `sequence & mask`.
//!
//! ## Handles
//!
//! - `producer()` - claim / write / publish. In single-producer mode only one
//!   producer handle may ever be created.
//! - `add_consumer()` - fan-out reader; gates producers on its own sequence.
//! - `add_work_pool(n)` - `n` readers that split the stream between them.

use std::cell::UnsafeCell;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use crate::disruptor::{
    PaddedSequence,
    ProducerType,
    RingBufferConfig,
    RingBufferEntry,
    RingConsumer,
    RingProducer,
    Sequence,
    SequenceBarrier,
    Sequencer,
    WaitStrategyType,
    WorkConsumer,
};
use crate::error::{ HandoffError, Result };

pub struct RingBuffer<T: RingBufferEntry> {
    slots: Box<[UnsafeCell<T>]>,
    mask: usize,
    sequencer: Arc<Sequencer>,
    wait_strategy: WaitStrategyType,
    single_producer_taken: AtomicBool,
}

impl<T: RingBufferEntry> RingBuffer<T> {
    /// Create with heap allocation
    pub fn new(config: RingBufferConfig) -> Result<Arc<Self>> {
        let sequencer = Arc::new(Sequencer::new(&config)?);

        let slots = (0..config.size)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(
            Arc::new(Self {
                slots,
                mask: config.size - 1,
                sequencer,
                wait_strategy: config.wait_strategy,
                single_producer_taken: AtomicBool::new(false),
            })
        )
    }

    /// Multi-producer, busy-spin buffer of `size` slots
    pub fn with_capacity(size: usize) -> Result<Arc<Self>> {
        Self::new(RingBufferConfig::new(size)?)
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn mask(&self) -> usize {
        self.mask
    }

    pub fn producer_type(&self) -> ProducerType {
        self.sequencer.producer_type()
    }

    pub fn wait_strategy(&self) -> WaitStrategyType {
        self.wait_strategy
    }

    pub fn sequencer(&self) -> &Arc<Sequencer> {
        &self.sequencer
    }

    /// Raw sequencer cursor: last published (single) or last claimed (multi)
    pub fn cursor(&self) -> Sequence {
        self.sequencer.cursor()
    }

    /// Highest sequence consumers can currently read
    pub fn published_cursor(&self) -> Sequence {
        let cursor = self.sequencer.cursor();
        // Anything unpublished lies within one lap of the cursor
        let lower = (cursor - (self.size() as Sequence) + 1).max(0);
        SequenceBarrier::new(self.sequencer.clone()).available(lower)
    }

    pub fn remaining_capacity(&self) -> usize {
        self.sequencer.remaining_capacity()
    }

    pub fn minimum_gating_sequence(&self) -> Sequence {
        let cursor = self.sequencer.cursor();
        self.sequencer.minimum_gating_sequence(cursor)
    }

    // ========================================================================
    // HANDLES
    // ========================================================================

    /// Create a producer handle.
    ///
    /// Fails in single-producer mode once a producer already exists.
    pub fn producer(self: &Arc<Self>) -> Result<RingProducer<T>> {
        if
            self.producer_type() == ProducerType::Single &&
            self.single_producer_taken.swap(true, Ordering::AcqRel)
        {
            return Err(HandoffError::config("Single-producer ring buffer already has a producer"));
        }
        Ok(RingProducer::new(self.clone()))
    }

    /// Register a reader that will see every event published from now on.
    pub fn add_consumer(self: &Arc<Self>) -> RingConsumer<T> {
        let sequence = Arc::new(PaddedSequence::new(self.sequencer.cursor()));
        self.sequencer.add_gating_sequence(sequence.clone());
        RingConsumer::new(self.clone(), SequenceBarrier::new(self.sequencer.clone()), sequence)
    }

    /// Register `workers` readers sharing one stream; each event is handled by exactly one.
    pub fn add_work_pool(self: &Arc<Self>, workers: usize) -> Result<Vec<WorkConsumer<T>>> {
        if workers == 0 {
            return Err(HandoffError::config("Work pool needs at least one worker"));
        }

        let start = self.sequencer.cursor();
        let work_sequence = Arc::new(PaddedSequence::new(start));

        Ok(
            (0..workers)
                .map(|_| {
                    let sequence = Arc::new(PaddedSequence::new(start));
                    self.sequencer.add_gating_sequence(sequence.clone());
                    WorkConsumer::new(
                        self.clone(),
                        SequenceBarrier::new(self.sequencer.clone()),
                        sequence,
                        work_sequence.clone()
                    )
                })
                .collect()
        )
    }

    pub(crate) fn remove_gating_sequence(&self, sequence: &Arc<PaddedSequence>) -> bool {
        self.sequencer.remove_gating_sequence(sequence)
    }

    /// Stop the buffer: blocked claims and reads return `Halted`.
    pub fn halt(&self) {
        self.sequencer.halt();
    }

    pub fn is_halted(&self) -> bool {
        self.sequencer.is_halted()
    }

    // ========================================================================
    // SLOT ACCESS
    // ========================================================================

    /// Mutable access to the slot for `sequence`.
    ///
    /// # Safety
    /// Caller must hold the claim for `sequence` and must not have published it yet,
    /// so no other thread can be reading or writing this slot.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slot_mut(&self, sequence: Sequence) -> &mut T {
        let idx = (sequence as usize) & self.mask;
        &mut *self.slots[idx].get()
    }

    /// Shared access to the slot for `sequence`.
    ///
    /// # Safety
    /// `sequence` must be published and the caller's gating sequence must still be
    /// below it, so no producer can have re-claimed the slot.
    #[inline(always)]
    pub(crate) unsafe fn read_slot(&self, sequence: Sequence) -> &T {
        let idx = (sequence as usize) & self.mask;
        &*self.slots[idx].get()
    }
}

unsafe impl<T: RingBufferEntry> Send for RingBuffer<T> {}
unsafe impl<T: RingBufferEntry> Sync for RingBuffer<T> {}

impl<T: RingBufferEntry> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("size", &self.size())
            .field("producer_type", &self.producer_type())
            .field("wait_strategy", &self.wait_strategy)
            .field("cursor", &self.cursor())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::ValueEvent;

    #[test]
    fn test_heap_allocation() {
        let ring = RingBuffer::<ValueEvent>::with_capacity(1024).unwrap();
        assert_eq!(ring.size(), 1024);
        assert_eq!(ring.mask(), 1023);
        assert_eq!(ring.cursor(), -1);
        assert_eq!(ring.remaining_capacity(), 1024);
    }

    #[test]
    fn test_invalid_size() {
        assert!(RingBuffer::<ValueEvent>::with_capacity(1000).is_err());
        assert!(RingBuffer::<ValueEvent>::with_capacity(0).is_err());
    }

    #[test]
    fn test_single_producer_handle_is_unique() {
        let config = RingBufferConfig::new(8).unwrap().with_producer_type(ProducerType::Single);
        let ring = RingBuffer::<ValueEvent>::new(config).unwrap();
        assert!(ring.producer().is_ok());
        assert!(matches!(ring.producer(), Err(HandoffError::InvalidConfig { .. })));
    }

    #[test]
    fn test_multi_producer_handles() {
        let ring = RingBuffer::<ValueEvent>::with_capacity(8).unwrap();
        assert!(ring.producer().is_ok());
        assert!(ring.producer().is_ok());
    }

    #[test]
    fn test_consumer_registration_gates() {
        let ring = RingBuffer::<ValueEvent>::with_capacity(8).unwrap();
        let consumer = ring.add_consumer();
        assert_eq!(ring.sequencer().gating_count(), 1);
        drop(consumer);
        assert_eq!(ring.sequencer().gating_count(), 0);
    }

    #[test]
    fn test_work_pool_registration() {
        let ring = RingBuffer::<ValueEvent>::with_capacity(8).unwrap();
        assert!(ring.add_work_pool(0).is_err());
        let workers = ring.add_work_pool(3).unwrap();
        assert_eq!(workers.len(), 3);
        assert_eq!(ring.sequencer().gating_count(), 3);
    }

    #[test]
    fn test_halt() {
        let ring = RingBuffer::<ValueEvent>::with_capacity(8).unwrap();
        assert!(!ring.is_halted());
        ring.halt();
        assert!(ring.is_halted());
    }
}
