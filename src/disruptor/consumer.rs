//! Consumer API for RingBuffer<T>

use std::sync::Arc;

use crossbeam::utils::Backoff;

use crate::constants::DEFAULT_BATCH_SIZE;
use crate::disruptor::{ PaddedSequence, RingBuffer, RingBufferEntry, Sequence, SequenceBarrier };
use crate::error::Result;

/// Event handler trait for RingConsumer
pub trait RingEventHandler<T: RingBufferEntry> {
    fn on_event(&mut self, event: &T, sequence: Sequence, end_of_batch: bool);
}

impl<T, F> RingEventHandler<T> for F where T: RingBufferEntry, F: FnMut(&T, Sequence, bool) {
    #[inline(always)]
    fn on_event(&mut self, event: &T, sequence: Sequence, end_of_batch: bool) {
        self(event, sequence, end_of_batch)
    }
}

/// Fan-out consumer: sees every event published after it was registered.
///
/// Its sequence gates producers, so a slow consumer stalls the ring once it
/// falls a full lap behind. Dropping the consumer unregisters it.
pub struct RingConsumer<T: RingBufferEntry> {
    ring_buffer: Arc<RingBuffer<T>>,
    barrier: SequenceBarrier,
    sequence: Arc<PaddedSequence>,
    batch_size: usize,
}

impl<T: RingBufferEntry> RingConsumer<T> {
    pub(crate) fn new(
        ring_buffer: Arc<RingBuffer<T>>,
        barrier: SequenceBarrier,
        sequence: Arc<PaddedSequence>
    ) -> Self {
        Self {
            ring_buffer,
            barrier,
            sequence,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Cap on events handed to the handler per `process_events` call
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Last sequence this consumer has finished with
    #[inline]
    pub fn sequence(&self) -> Sequence {
        self.sequence.get()
    }

    pub fn ring_buffer(&self) -> &Arc<RingBuffer<T>> {
        &self.ring_buffer
    }

    /// Read the next event if one is published. Never blocks.
    pub fn try_next(&mut self) -> Result<Option<(Sequence, T)>> {
        self.barrier.check_alert()?;
        let next = self.sequence.get() + 1;
        if self.barrier.available(next) < next {
            return Ok(None);
        }
        Ok(Some((next, self.take(next))))
    }

    /// Wait for the next event and read it.
    pub fn next(&mut self) -> Result<(Sequence, T)> {
        let next = self.sequence.get() + 1;
        self.wait_until(next)?;
        Ok((next, self.take(next)))
    }

    /// Hand every currently published event (up to the batch size) to `handler`.
    /// Returns the number processed; 0 when nothing was available.
    pub fn process_events<H: RingEventHandler<T>>(&mut self, handler: &mut H) -> Result<usize> {
        self.barrier.check_alert()?;
        let next = self.sequence.get() + 1;
        let available = self.barrier.available(next);
        Ok(self.dispatch(handler, next, available, Sequence::MAX))
    }

    /// Block until at least one event is published, then process what is there.
    pub fn wait_and_process<H: RingEventHandler<T>>(&mut self, handler: &mut H) -> Result<usize> {
        self.wait_and_process_up_to(handler, Sequence::MAX)
    }

    /// Process events until `last` has been handled. Events after `last` are
    /// left unread and this consumer's sequence stops at `last`.
    pub fn run_until<H: RingEventHandler<T>>(&mut self, handler: &mut H, last: Sequence) -> Result<()> {
        while self.sequence.get() < last {
            self.wait_and_process_up_to(handler, last)?;
        }
        Ok(())
    }

    fn wait_and_process_up_to<H: RingEventHandler<T>>(&mut self, handler: &mut H, last: Sequence) -> Result<usize> {
        let next = self.sequence.get() + 1;
        let available = self.wait_until(next)?;
        Ok(self.dispatch(handler, next, available, last))
    }

    fn wait_until(&self, sequence: Sequence) -> Result<Sequence> {
        let backoff = Backoff::new();
        loop {
            let available = self.barrier.wait_for(sequence)?;
            if available >= sequence {
                return Ok(available);
            }
            // Claimed by another producer but not published yet
            backoff.snooze();
        }
    }

    #[inline]
    fn take(&self, sequence: Sequence) -> T {
        // SAFETY: `sequence` is published and our gating sequence is still below it.
        let event = unsafe { self.ring_buffer.read_slot(sequence) }.clone();
        self.sequence.set(sequence);
        event
    }

    fn dispatch<H: RingEventHandler<T>>(
        &self,
        handler: &mut H,
        next: Sequence,
        available: Sequence,
        last: Sequence
    ) -> usize {
        let high = available.min(last).min(next + (self.batch_size as Sequence) - 1);
        if high < next {
            return 0;
        }

        for sequence in next..=high {
            // SAFETY: published, and slots are not released until the sequence update below.
            let event = unsafe { self.ring_buffer.read_slot(sequence) };
            handler.on_event(event, sequence, sequence == high);
        }

        self.sequence.set(high);
        (high - next + 1) as usize
    }
}

impl<T: RingBufferEntry> Drop for RingConsumer<T> {
    fn drop(&mut self) {
        self.ring_buffer.remove_gating_sequence(&self.sequence);
    }
}
