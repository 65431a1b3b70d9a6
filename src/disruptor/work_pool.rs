//! Work-pool consumers: each published event is handled by exactly one worker.
//!
//! Workers share a work sequence. A worker claims the next event by CAS on it,
//! then waits on the barrier until that event is published. A worker's own
//! gating sequence trails its claim by one, so the slot it is about to read
//! can not be reclaimed by a producer.

use std::sync::Arc;

use crossbeam::utils::Backoff;

use crate::disruptor::{
    PaddedSequence,
    RingBuffer,
    RingBufferEntry,
    RingEventHandler,
    Sequence,
    SequenceBarrier,
};
use crate::error::Result;

pub struct WorkConsumer<T: RingBufferEntry> {
    ring_buffer: Arc<RingBuffer<T>>,
    barrier: SequenceBarrier,
    sequence: Arc<PaddedSequence>,
    work_sequence: Arc<PaddedSequence>,
    /// Claimed from the pool but not yet handled
    claimed: Option<Sequence>,
    cached_available: Sequence,
}

impl<T: RingBufferEntry> WorkConsumer<T> {
    pub(crate) fn new(
        ring_buffer: Arc<RingBuffer<T>>,
        barrier: SequenceBarrier,
        sequence: Arc<PaddedSequence>,
        work_sequence: Arc<PaddedSequence>
    ) -> Self {
        let cached_available = sequence.get();
        Self {
            ring_buffer,
            barrier,
            sequence,
            work_sequence,
            claimed: None,
            cached_available,
        }
    }

    /// This worker's gating sequence
    pub fn sequence(&self) -> Sequence {
        self.sequence.get()
    }

    /// Highest sequence claimed by any worker in the pool
    pub fn work_sequence(&self) -> Sequence {
        self.work_sequence.get()
    }

    /// Wait for this worker's next event and read it.
    pub fn next(&mut self) -> Result<(Sequence, T)> {
        let sequence = self.current_claim();
        self.wait_until(sequence)?;
        // SAFETY: published, and our gating sequence is `sequence - 1`.
        let event = unsafe { self.ring_buffer.read_slot(sequence) }.clone();
        self.claimed = None;
        Ok((sequence, event))
    }

    /// Handle events until the pool has claimed past `last`.
    ///
    /// Returns how many events this worker handled.
    pub fn run_until<H: RingEventHandler<T>>(&mut self, handler: &mut H, last: Sequence) -> Result<u64> {
        let mut handled = 0u64;
        loop {
            let sequence = self.current_claim();
            if sequence > last {
                return Ok(handled);
            }

            self.wait_until(sequence)?;
            // SAFETY: as in `next`
            let event = unsafe { self.ring_buffer.read_slot(sequence) };
            handler.on_event(event, sequence, sequence == self.cached_available);
            self.claimed = None;
            handled += 1;
        }
    }

    fn current_claim(&mut self) -> Sequence {
        if let Some(sequence) = self.claimed {
            return sequence;
        }
        let backoff = Backoff::new();
        let sequence = loop {
            let current = self.work_sequence.get();
            let next = current + 1;
            self.sequence.set(current);
            if self.work_sequence.compare_and_set(current, next) {
                break next;
            }
            backoff.spin();
        };
        self.claimed = Some(sequence);
        sequence
    }

    fn wait_until(&mut self, sequence: Sequence) -> Result<()> {
        if self.cached_available >= sequence {
            return self.barrier.check_alert();
        }
        let backoff = Backoff::new();
        loop {
            let available = self.barrier.wait_for(sequence)?;
            if available >= sequence {
                self.cached_available = available;
                return Ok(());
            }
            backoff.snooze();
        }
    }
}

impl<T: RingBufferEntry> Drop for WorkConsumer<T> {
    fn drop(&mut self) {
        self.ring_buffer.remove_gating_sequence(&self.sequence);
    }
}
