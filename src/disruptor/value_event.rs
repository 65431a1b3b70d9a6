//! ValueEvent - the integer payload slot used by the benchmark

use crate::disruptor::RingBufferEntry;

/// One message: a single integer payload.
///
/// Identity is the sequence the event was published at, not the value. The
/// harness writes a run-wide counter here and only uses it to detect the
/// final message.
#[repr(C, align(8))]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct ValueEvent {
    pub value: i64,
}

impl RingBufferEntry for ValueEvent {
    #[inline(always)]
    fn value(&self) -> i64 {
        self.value
    }

    #[inline(always)]
    fn set_value(&mut self, value: i64) {
        self.value = value;
    }

    #[inline(always)]
    fn reset(&mut self) {
        self.value = 0;
    }
}

impl ValueEvent {
    #[inline(always)]
    pub fn new(value: i64) -> Self {
        Self { value }
    }
}
