//! Producer and consumer tasks for the ring buffer backend.

use tracing::debug;

use crate::disruptor::{ RingConsumer, RingProducer, Sequence, ValueEvent, WorkConsumer };
use crate::error::Result;
use crate::harness::{ ConsumerTally, TaskContext };

/// Publish messages until the shared ticket counter runs past the message count.
pub fn run_producer(ctx: &TaskContext, producer: &mut RingProducer<ValueEvent>, id: usize) -> Result<u64> {
    let mut published = 0u64;
    while let Some(value) = ctx.next_message() {
        producer.publish_event(|event| {
            event.value = value as i64;
        })?;
        published += 1;
    }
    debug!(producer = id, published, "ring producer done");
    Ok(published)
}

/// Fan-out reader: handles every one of the run's events, in sequence order.
pub fn run_fan_out_consumer(
    ctx: &TaskContext,
    consumer: &mut RingConsumer<ValueEvent>,
    id: usize
) -> Result<ConsumerTally> {
    let mut tally = ConsumerTally::new(id);
    consumer.run_until(&mut tally, last_sequence(ctx))?;
    ctx.record_consumed(tally.processed);
    debug!(consumer = id, processed = tally.processed, last_value = tally.last_value, "ring consumer done");
    Ok(tally)
}

/// Work-pool reader: handles its share of the run's events.
pub fn run_work_consumer(
    ctx: &TaskContext,
    consumer: &mut WorkConsumer<ValueEvent>,
    id: usize
) -> Result<ConsumerTally> {
    let mut tally = ConsumerTally::new(id);
    consumer.run_until(&mut tally, last_sequence(ctx))?;
    ctx.record_consumed(tally.processed);
    debug!(consumer = id, processed = tally.processed, "work consumer done");
    Ok(tally)
}

/// Consumers are registered before any publish, so the run occupies `0..message_count`.
/// Termination goes by sequence, not value: with several producers the
/// highest value can be published before lower ones.
#[inline]
fn last_sequence(ctx: &TaskContext) -> Sequence {
    (ctx.message_count() as Sequence) - 1
}

pub(crate) enum RingReader {
    FanOut(RingConsumer<ValueEvent>),
    Work(WorkConsumer<ValueEvent>),
}

impl RingReader {
    pub(crate) fn run(mut self, ctx: &TaskContext, id: usize) -> Result<ConsumerTally> {
        match &mut self {
            Self::FanOut(consumer) => run_fan_out_consumer(ctx, consumer, id),
            Self::Work(consumer) => run_work_consumer(ctx, consumer, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{ RingBuffer, RingBufferConfig, WaitStrategyType };

    #[test]
    fn test_single_thread_round_trip() {
        let ring = RingBuffer::<ValueEvent>::new(
            RingBufferConfig::new(16).unwrap().with_wait_strategy(WaitStrategyType::Yielding)
        ).unwrap();
        let ctx = TaskContext::new(10, 1);
        let mut consumer = ring.add_consumer();
        let mut producer = ring.producer().unwrap();

        assert_eq!(run_producer(&ctx, &mut producer, 0).unwrap(), 10);
        let tally = run_fan_out_consumer(&ctx, &mut consumer, 0).unwrap();
        assert_eq!(tally.processed, 10);
        assert_eq!(tally.last_value, 10);
        assert!(tally.is_in_order());
        assert_eq!(ctx.consumed(), 10);
    }
}
