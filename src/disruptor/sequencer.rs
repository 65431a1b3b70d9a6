//! Sequencer: claim coordination, publication and gating.
//!
//! Specializes claiming by producer type:
//!
//! - `Single` - the claim counter is private to the one producer, so claiming is a
//!   plain increment and the cursor is the last published sequence.
//! - `Multi` - the cursor is the highest *claimed* sequence, advanced with a CAS
//!   retry loop. Publication marks an availability buffer (one round flag per slot)
//!   and consumers scan it for the highest contiguous published sequence.
//!
//! In both modes a claim of sequence `s` only succeeds once every registered
//! consumer has processed `s - capacity`, so an unread slot is never overwritten.

use std::sync::atomic::{ AtomicBool, AtomicI32, Ordering };
use std::sync::Arc;

use crossbeam::utils::Backoff;
use parking_lot::RwLock;

use crate::disruptor::{
    minimum_sequence,
    PaddedSequence,
    ProducerType,
    RingBufferConfig,
    Sequence,
    WaitStrategy,
};
use crate::error::{ HandoffError, Result };

pub struct Sequencer {
    buffer_size: usize,
    producer_type: ProducerType,
    /// Single: last published. Multi: last claimed.
    cursor: Arc<PaddedSequence>,
    gating_sequences: RwLock<Vec<Arc<PaddedSequence>>>,
    /// Last observed minimum gating sequence, refreshed only when a claim might wrap.
    /// Shared between producers in multi mode: Acquire/Release, so a producer that
    /// relies on another's cached minimum also sees the consumer reads behind it.
    gating_cache: PaddedSequence,
    /// Single producer claim counter
    next_value: PaddedSequence,
    /// Multi producer round flags, empty in single mode
    available: Box<[AtomicI32]>,
    index_mask: usize,
    index_shift: u32,
    wait_strategy: Arc<WaitStrategy>,
    alerted: Arc<AtomicBool>,
}

impl Sequencer {
    pub fn new(config: &RingBufferConfig) -> Result<Self> {
        config.validate()?;
        let size = config.size;

        let available = match config.producer_type {
            ProducerType::Single => Vec::new().into_boxed_slice(),
            ProducerType::Multi =>
                (0..size)
                    .map(|_| AtomicI32::new(-1))
                    .collect::<Vec<_>>()
                    .into_boxed_slice(),
        };

        Ok(Self {
            buffer_size: size,
            producer_type: config.producer_type,
            cursor: Arc::new(PaddedSequence::default()),
            gating_sequences: RwLock::new(Vec::new()),
            gating_cache: PaddedSequence::default(),
            next_value: PaddedSequence::default(),
            available,
            index_mask: size - 1,
            index_shift: size.trailing_zeros(),
            wait_strategy: Arc::new(WaitStrategy::from_type(config.wait_strategy)),
            alerted: Arc::new(AtomicBool::new(false)),
        })
    }

    #[inline(always)]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[inline(always)]
    pub fn producer_type(&self) -> ProducerType {
        self.producer_type
    }

    /// Raw cursor value (see field docs for its meaning per mode)
    #[inline(always)]
    pub fn cursor(&self) -> Sequence {
        self.cursor.get()
    }

    pub(crate) fn cursor_sequence(&self) -> &PaddedSequence {
        &self.cursor
    }

    pub(crate) fn wait_strategy(&self) -> &WaitStrategy {
        &self.wait_strategy
    }

    pub(crate) fn alert_flag(&self) -> &AtomicBool {
        &self.alerted
    }

    // ========================================================================
    // GATING
    // ========================================================================

    pub fn add_gating_sequence(&self, sequence: Arc<PaddedSequence>) {
        self.gating_sequences.write().push(sequence);
    }

    pub fn remove_gating_sequence(&self, sequence: &Arc<PaddedSequence>) -> bool {
        let mut gating = self.gating_sequences.write();
        if let Some(pos) = gating.iter().position(|s| Arc::ptr_eq(s, sequence)) {
            gating.swap_remove(pos);
            true
        } else {
            false
        }
    }

    pub fn gating_count(&self) -> usize {
        self.gating_sequences.read().len()
    }

    /// Slowest consumer's sequence, or `default` when no consumer is slower
    pub fn minimum_gating_sequence(&self, default: Sequence) -> Sequence {
        minimum_sequence(&self.gating_sequences.read(), default)
    }

    /// Highest sequence a producer has claimed so far
    fn claimed(&self) -> Sequence {
        match self.producer_type {
            ProducerType::Single => self.next_value.get_relaxed(),
            ProducerType::Multi => self.cursor.get(),
        }
    }

    pub fn remaining_capacity(&self) -> usize {
        let produced = self.claimed();
        let consumed = self.minimum_gating_sequence(produced);
        self.buffer_size - ((produced - consumed) as usize)
    }

    fn has_available_capacity(&self, required: usize, claimed: Sequence) -> bool {
        let wrap_point = claimed + (required as Sequence) - (self.buffer_size as Sequence);
        let cached = self.gating_cache.get();

        if wrap_point > cached || cached > claimed {
            let min = self.minimum_gating_sequence(claimed);
            self.gating_cache.set(min);
            if wrap_point > min {
                return false;
            }
        }
        true
    }

    fn wait_for_gating(&self, wrap_point: Sequence, claimed: Sequence) -> Result<Sequence> {
        let backoff = Backoff::new();
        loop {
            let min = self.minimum_gating_sequence(claimed);
            if wrap_point <= min {
                return Ok(min);
            }
            if self.is_halted() {
                return Err(HandoffError::Halted);
            }
            backoff.snooze();
        }
    }

    // ========================================================================
    // CLAIM
    // ========================================================================

    /// Claim `n` slots, waiting for consumers to free them.
    ///
    /// Returns the highest claimed sequence; the claim covers `[hi - n + 1, hi]`.
    pub fn claim(&self, n: usize) -> Result<Sequence> {
        self.check_claim_size(n)?;
        if self.is_halted() {
            return Err(HandoffError::Halted);
        }

        match self.producer_type {
            ProducerType::Single => {
                let current = self.next_value.get_relaxed();
                let next = current + (n as Sequence);
                let wrap_point = next - (self.buffer_size as Sequence);
                let cached = self.gating_cache.get();

                if wrap_point > cached || cached > current {
                    let min = self.wait_for_gating(wrap_point, current)?;
                    self.gating_cache.set(min);
                }

                self.next_value.set_relaxed(next);
                Ok(next)
            }
            ProducerType::Multi => {
                let backoff = Backoff::new();
                loop {
                    let current = self.cursor.get();
                    let next = current + (n as Sequence);
                    let wrap_point = next - (self.buffer_size as Sequence);
                    let cached = self.gating_cache.get();

                    if wrap_point > cached || cached > current {
                        let min = self.minimum_gating_sequence(current);
                        if wrap_point > min {
                            if self.is_halted() {
                                return Err(HandoffError::Halted);
                            }
                            backoff.snooze();
                            continue;
                        }
                        self.gating_cache.set(min);
                    } else if self.cursor.compare_and_set(current, next) {
                        return Ok(next);
                    } else {
                        backoff.spin();
                    }
                }
            }
        }
    }

    /// Claim `n` slots without waiting; `RingBufferFull` if consumers are too far behind.
    pub fn try_claim(&self, n: usize) -> Result<Sequence> {
        self.check_claim_size(n)?;
        if self.is_halted() {
            return Err(HandoffError::Halted);
        }

        match self.producer_type {
            ProducerType::Single => {
                let current = self.next_value.get_relaxed();
                if !self.has_available_capacity(n, current) {
                    return Err(HandoffError::RingBufferFull);
                }
                let next = current + (n as Sequence);
                self.next_value.set_relaxed(next);
                Ok(next)
            }
            ProducerType::Multi => {
                loop {
                    let current = self.cursor.get();
                    if !self.has_available_capacity(n, current) {
                        return Err(HandoffError::RingBufferFull);
                    }
                    let next = current + (n as Sequence);
                    if self.cursor.compare_and_set(current, next) {
                        return Ok(next);
                    }
                }
            }
        }
    }

    fn check_claim_size(&self, n: usize) -> Result<()> {
        if n == 0 || n > self.buffer_size {
            return Err(
                crate::config_error!("Claim size must be in 1..={}, got {}", self.buffer_size, n)
            );
        }
        Ok(())
    }

    // ========================================================================
    // PUBLISH
    // ========================================================================

    pub fn publish(&self, sequence: Sequence) {
        match self.producer_type {
            ProducerType::Single => self.cursor.set(sequence),
            ProducerType::Multi => self.set_available(sequence),
        }
        self.wait_strategy.signal_all_when_blocking();
    }

    pub fn publish_range(&self, low: Sequence, high: Sequence) {
        match self.producer_type {
            ProducerType::Single => self.cursor.set(high),
            ProducerType::Multi => {
                for sequence in low..=high {
                    self.set_available(sequence);
                }
            }
        }
        self.wait_strategy.signal_all_when_blocking();
    }

    #[inline(always)]
    fn availability_index(&self, sequence: Sequence) -> (usize, i32) {
        ((sequence as usize) & self.index_mask, (sequence >> self.index_shift) as i32)
    }

    #[inline(always)]
    fn set_available(&self, sequence: Sequence) {
        let (index, flag) = self.availability_index(sequence);
        self.available[index].store(flag, Ordering::Release);
    }

    pub fn is_available(&self, sequence: Sequence) -> bool {
        match self.producer_type {
            ProducerType::Single => sequence <= self.cursor.get(),
            ProducerType::Multi => {
                let (index, flag) = self.availability_index(sequence);
                self.available[index].load(Ordering::Acquire) == flag
            }
        }
    }

    /// Highest sequence in `[lower, available]` such that everything up to it is published.
    /// Returns `lower - 1` if `lower` itself is not yet published.
    pub fn highest_published_sequence(&self, lower: Sequence, available: Sequence) -> Sequence {
        match self.producer_type {
            ProducerType::Single => available,
            ProducerType::Multi => {
                for sequence in lower..=available {
                    if !self.is_available(sequence) {
                        return sequence - 1;
                    }
                }
                available
            }
        }
    }

    // ========================================================================
    // HALT
    // ========================================================================

    /// Wake every waiter and make pending/future claims and waits fail with `Halted`.
    pub fn halt(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    #[inline(always)]
    pub fn is_halted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }
}
