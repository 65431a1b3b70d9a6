//! Consumer-side view of the sequencer.

use std::sync::Arc;

use crate::disruptor::{ Sequence, Sequencer };
use crate::error::{ HandoffError, Result };

/// Tells a consumer how far it may read: the highest contiguous published
/// sequence, waiting with the ring buffer's wait strategy when nothing new is there.
#[derive(Clone)]
pub struct SequenceBarrier {
    sequencer: Arc<Sequencer>,
}

impl SequenceBarrier {
    pub fn new(sequencer: Arc<Sequencer>) -> Self {
        Self { sequencer }
    }

    /// Wait until `sequence` is claimed, then return the highest contiguous published sequence.
    ///
    /// The result can be lower than `sequence` in multi-producer mode when the claim
    /// has not been published yet; callers loop.
    pub fn wait_for(&self, sequence: Sequence) -> Result<Sequence> {
        self.check_alert()?;

        let available = self.sequencer
            .wait_strategy()
            .wait_for(sequence, self.sequencer.cursor_sequence(), self.sequencer.alert_flag())?;

        if available < sequence {
            return Ok(available);
        }
        Ok(self.sequencer.highest_published_sequence(sequence, available))
    }

    /// Non-blocking variant of `wait_for`.
    pub fn available(&self, sequence: Sequence) -> Sequence {
        let cursor = self.sequencer.cursor();
        if cursor < sequence {
            return cursor;
        }
        self.sequencer.highest_published_sequence(sequence, cursor)
    }

    #[inline]
    pub fn check_alert(&self) -> Result<()> {
        if self.sequencer.is_halted() {
            return Err(HandoffError::Halted);
        }
        Ok(())
    }

    pub fn is_alerted(&self) -> bool {
        self.sequencer.is_halted()
    }
}
