use std::sync::atomic::{ AtomicI64, Ordering };
use std::sync::Arc;

use static_assertions::const_assert_eq;

use crate::constants::{ CACHE_LINE_SIZE, INITIAL_CURSOR_VALUE };
use crate::disruptor::Sequence;

/// Cache-line padded sequence to prevent false sharing.
///
/// Used for the published cursor, the claim cache and every consumer's
/// last-processed sequence. Each one is written by a single party and read by
/// many, so keeping them on separate cache lines stops a consumer's progress
/// from invalidating the producer's cursor line and vice versa.
#[repr(align(128))]
pub struct PaddedSequence {
    value: AtomicI64,
    _padding: [u8; 120], // 128 - 8 bytes for AtomicI64
}

const_assert_eq!(std::mem::size_of::<PaddedSequence>(), CACHE_LINE_SIZE);

impl PaddedSequence {
    pub fn new(initial: Sequence) -> Self {
        Self {
            value: AtomicI64::new(initial),
            _padding: [0; 120],
        }
    }

    /// Acquire load; pairs with `set`.
    #[inline(always)]
    pub fn get(&self) -> Sequence {
        self.value.load(Ordering::Acquire)
    }

    /// Release store; everything written before it is visible to a reader that sees the value.
    #[inline(always)]
    pub fn set(&self, value: Sequence) {
        self.value.store(value, Ordering::Release);
    }

    #[inline(always)]
    pub fn compare_and_set(&self, expected: Sequence, new: Sequence) -> bool {
        self.value
            .compare_exchange_weak(expected, new, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    #[inline(always)]
    pub fn get_relaxed(&self) -> Sequence {
        self.value.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn set_relaxed(&self, value: Sequence) {
        self.value.store(value, Ordering::Relaxed);
    }
}

impl Default for PaddedSequence {
    fn default() -> Self {
        Self::new(INITIAL_CURSOR_VALUE)
    }
}

impl std::fmt::Debug for PaddedSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PaddedSequence").field(&self.get()).finish()
    }
}

/// Smallest sequence among `sequences`, or `default` if there are none (or all are larger).
#[inline]
pub fn minimum_sequence(sequences: &[Arc<PaddedSequence>], default: Sequence) -> Sequence {
    sequences.iter().fold(default, |min, s| min.min(s.get()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_sequence_layout() {
        assert_eq!(std::mem::size_of::<PaddedSequence>(), 128);
        assert_eq!(std::mem::align_of::<PaddedSequence>(), 128);
    }

    #[test]
    fn test_default_is_initial_cursor() {
        assert_eq!(PaddedSequence::default().get(), -1);
    }

    #[test]
    fn test_compare_and_set() {
        let seq = PaddedSequence::new(5);
        // weak CAS may fail spuriously, retry like callers do
        while !seq.compare_and_set(5, 6) {}
        assert_eq!(seq.get(), 6);
        assert!(!seq.compare_and_set(5, 7));
        assert_eq!(seq.get(), 6);
    }

    #[test]
    fn test_minimum_sequence() {
        let seqs = vec![
            Arc::new(PaddedSequence::new(10)),
            Arc::new(PaddedSequence::new(3)),
            Arc::new(PaddedSequence::new(7))
        ];
        assert_eq!(minimum_sequence(&seqs, i64::MAX), 3);
        assert_eq!(minimum_sequence(&seqs, 1), 1);
        assert_eq!(minimum_sequence(&[], 42), 42);
    }
}
