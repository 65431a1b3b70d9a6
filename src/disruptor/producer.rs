//! Producer API for RingBuffer<T>

use std::sync::Arc;

use crate::disruptor::{ RingBuffer, RingBufferEntry, Sequence };
use crate::error::{ HandoffError, Result };

/// Producer handle: two-phase claim then publish.
///
/// Holds at most one outstanding claim. Slots are reused, so the `&mut T`
/// handed to writers still carries whatever the previous lap left there.
pub struct RingProducer<T: RingBufferEntry> {
    ring_buffer: Arc<RingBuffer<T>>,
    /// Claimed but unpublished range, inclusive
    pending: Option<(Sequence, Sequence)>,
}

impl<T: RingBufferEntry> RingProducer<T> {
    pub(crate) fn new(ring_buffer: Arc<RingBuffer<T>>) -> Self {
        Self {
            ring_buffer,
            pending: None,
        }
    }

    pub fn ring_buffer(&self) -> &Arc<RingBuffer<T>> {
        &self.ring_buffer
    }

    /// Outstanding claim, if any
    pub fn pending(&self) -> Option<(Sequence, Sequence)> {
        self.pending
    }

    /// Reserve the next slot, waiting until the slowest consumer has freed it.
    #[inline]
    pub fn claim(&mut self) -> Result<Sequence> {
        self.claim_n(1)
    }

    /// Reserve `n` consecutive slots; returns the highest sequence of the claim.
    pub fn claim_n(&mut self, n: usize) -> Result<Sequence> {
        self.check_no_pending()?;
        let high = self.ring_buffer.sequencer().claim(n)?;
        self.pending = Some((high - (n as Sequence) + 1, high));
        Ok(high)
    }

    /// Reserve the next slot without waiting.
    pub fn try_claim(&mut self) -> Result<Sequence> {
        self.try_claim_n(1)
    }

    pub fn try_claim_n(&mut self, n: usize) -> Result<Sequence> {
        self.check_no_pending()?;
        let high = self.ring_buffer.sequencer().try_claim(n)?;
        self.pending = Some((high - (n as Sequence) + 1, high));
        Ok(high)
    }

    /// Store `value` into the claimed slot for `sequence`.
    #[inline]
    pub fn write(&mut self, sequence: Sequence, value: T) -> Result<()> {
        *self.get_mut(sequence)? = value;
        Ok(())
    }

    /// In-place access to the claimed slot for `sequence`.
    #[inline]
    pub fn get_mut(&mut self, sequence: Sequence) -> Result<&mut T> {
        match self.pending {
            Some((low, high)) if low <= sequence && sequence <= high => {
                // SAFETY: the sequence is claimed by this handle and not yet published.
                Ok(unsafe { self.ring_buffer.slot_mut(sequence) })
            }
            _ => Err(HandoffError::InvalidSequence { sequence }),
        }
    }

    /// Make a single-slot claim visible to consumers.
    #[inline]
    pub fn publish(&mut self, sequence: Sequence) -> Result<()> {
        self.publish_range(sequence, sequence)
    }

    /// Make the whole outstanding claim `[low, high]` visible to consumers.
    pub fn publish_range(&mut self, low: Sequence, high: Sequence) -> Result<()> {
        match self.pending {
            Some(claim) if claim == (low, high) => {
                self.ring_buffer.sequencer().publish_range(low, high);
                self.pending = None;
                Ok(())
            }
            _ => Err(HandoffError::InvalidSequence { sequence: low }),
        }
    }

    /// Claim, fill and publish one event.
    #[inline]
    pub fn publish_event<F>(&mut self, writer: F) -> Result<Sequence> where F: FnOnce(&mut T) {
        let sequence = self.claim()?;
        writer(self.get_mut(sequence)?);
        self.publish(sequence)?;
        Ok(sequence)
    }

    /// Non-blocking `publish_event`; `RingBufferFull` if there is no free slot.
    #[inline]
    pub fn try_publish_event<F>(&mut self, writer: F) -> Result<Sequence>
        where F: FnOnce(&mut T)
    {
        let sequence = self.try_claim()?;
        writer(self.get_mut(sequence)?);
        self.publish(sequence)?;
        Ok(sequence)
    }

    /// Claim `count` slots, fill each with `writer(i, slot)` and publish them together.
    pub fn publish_batch<F>(&mut self, count: usize, mut writer: F) -> Result<Sequence>
        where F: FnMut(usize, &mut T)
    {
        let high = self.claim_n(count)?;
        let low = high - (count as Sequence) + 1;
        for (i, sequence) in (low..=high).enumerate() {
            writer(i, self.get_mut(sequence)?);
        }
        self.publish_range(low, high)?;
        Ok(high)
    }

    fn check_no_pending(&self) -> Result<()> {
        match self.pending {
            Some((low, high)) => Err(HandoffError::UnpublishedClaim { low, high }),
            None => Ok(()),
        }
    }
}
