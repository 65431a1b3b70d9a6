//! Producer and consumer tasks for the blocking queue backend.

use tracing::debug;

use crate::error::Result;
use crate::harness::{ ConsumerTally, TaskContext };
use crate::queue::BoundedBlockingQueue;

pub fn run_producer(ctx: &TaskContext, queue: &BoundedBlockingQueue<i64>, id: usize) -> Result<u64> {
    let mut published = 0u64;
    while let Some(value) = ctx.next_message() {
        queue.put(value as i64)?;
        published += 1;
    }
    debug!(producer = id, published, "queue producer done");
    Ok(published)
}

/// A take removes the element, so consumers split the stream. Each consumer
/// reserves a message from the shared ticket counter before taking it; once
/// all tickets are gone every message has an owner and the consumer stops.
pub fn run_consumer(ctx: &TaskContext, queue: &BoundedBlockingQueue<i64>, id: usize) -> Result<ConsumerTally> {
    let mut tally = ConsumerTally::new(id);
    while ctx.claim_consumption() {
        let value = queue.take()?;
        tally.record(None, value);
    }
    ctx.record_consumed(tally.processed);
    debug!(consumer = id, processed = tally.processed, "queue consumer done");
    Ok(tally)
}
