//! Ring buffer protocol tests
//!
//! Claim / publish / read across real threads: ordering, gating, wrap-around
//! protection and stalls.

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex };
use std::thread;
use std::time::Duration;

use handoff::{
    HandoffError,
    ProducerType,
    RingBuffer,
    RingBufferConfig,
    Sequence,
    ValueEvent,
    WaitStrategyType,
};

fn ring(size: usize, producer_type: ProducerType) -> Arc<RingBuffer<ValueEvent>> {
    RingBuffer::new(
        RingBufferConfig::new(size)
            .unwrap()
            .with_producer_type(producer_type)
            .with_wait_strategy(WaitStrategyType::Yielding)
    ).unwrap()
}

/// 1P1C, N=1000: the consumer sees exactly 1..=1000, in order
#[test]
fn test_round_trip_single_producer() {
    let ring = ring(64, ProducerType::Single);
    let mut consumer = ring.add_consumer();
    let mut producer = ring.producer().unwrap();

    let reader = thread::spawn(move || {
        let mut seen = Vec::with_capacity(1000);
        let mut handler = |event: &ValueEvent, _seq: Sequence, _end: bool| seen.push(event.value);
        consumer.run_until(&mut handler, 999).unwrap();
        seen
    });

    for value in 1..=1000 {
        let seq = producer.claim().unwrap();
        producer.write(seq, ValueEvent::new(value)).unwrap();
        producer.publish(seq).unwrap();
    }

    let seen = reader.join().unwrap();
    assert_eq!(seen, (1..=1000).collect::<Vec<i64>>());
}

/// Capacity 1 with two producers: producers serialize behind the consumer, no deadlock
#[test]
fn test_capacity_one_two_producers() {
    const PER_PRODUCER: i64 = 2_000;
    let ring = ring(1, ProducerType::Multi);
    let mut consumer = ring.add_consumer();

    let producers: Vec<_> = (0..2)
        .map(|p| {
            let mut producer = ring.producer().unwrap();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    producer.publish_event(|e| e.value = p * PER_PRODUCER + i).unwrap();
                }
            })
        })
        .collect();

    let mut seen = Vec::new();
    let mut handler = |event: &ValueEvent, _seq: Sequence, _end: bool| seen.push(event.value);
    consumer.run_until(&mut handler, 2 * PER_PRODUCER - 1).unwrap();

    for p in producers {
        p.join().unwrap();
    }

    seen.sort_unstable();
    assert_eq!(seen, (0..2 * PER_PRODUCER).collect::<Vec<_>>());
}

/// Producers write their own sequence into the slot; a lapped (overwritten)
/// unread slot would show up as `value != sequence`.
#[test]
fn test_no_unread_overwrite() {
    const TOTAL: i64 = 50_000;
    let ring = ring(8, ProducerType::Multi);
    let mut consumers: Vec<_> = (0..2).map(|_| ring.add_consumer()).collect();

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let mut producer = ring.producer().unwrap();
            thread::spawn(move || {
                for _ in 0..TOTAL / 4 {
                    let seq = producer.claim().unwrap();
                    producer.get_mut(seq).unwrap().value = seq;
                    producer.publish(seq).unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = consumers
        .drain(..)
        .map(|mut consumer| {
            thread::spawn(move || {
                let mut mismatches = 0u64;
                let mut expected = 0;
                let mut handler = |event: &ValueEvent, seq: Sequence, _end: bool| {
                    if event.value != seq || seq != expected {
                        mismatches += 1;
                    }
                    expected += 1;
                };
                consumer.run_until(&mut handler, TOTAL - 1).unwrap();
                mismatches
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    for r in readers {
        assert_eq!(r.join().unwrap(), 0);
    }
}

/// Every fan-out consumer observes 0..N-1 once each, in order
#[test]
fn test_fan_out_every_consumer_sees_everything() {
    const TOTAL: i64 = 20_000;
    let ring = ring(256, ProducerType::Multi);
    let consumers: Vec<_> = (0..3).map(|_| ring.add_consumer()).collect();

    let readers: Vec<_> = consumers
        .into_iter()
        .map(|mut consumer| {
            thread::spawn(move || {
                let mut sequences = Vec::with_capacity(TOTAL as usize);
                let mut handler = |_e: &ValueEvent, seq: Sequence, _end: bool| sequences.push(seq);
                consumer.run_until(&mut handler, TOTAL - 1).unwrap();
                sequences
            })
        })
        .collect();

    let producers: Vec<_> = (0..2)
        .map(|_| {
            let mut producer = ring.producer().unwrap();
            thread::spawn(move || {
                for i in 0..TOTAL / 2 {
                    producer.publish_event(|e| e.value = i).unwrap();
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    for r in readers {
        assert_eq!(r.join().unwrap(), (0..TOTAL).collect::<Vec<_>>());
    }
}

/// Work-pool workers split the stream: union is 0..N-1 with no duplicates
#[test]
fn test_work_pool_partitions() {
    const TOTAL: i64 = 20_000;
    let ring = ring(128, ProducerType::Multi);
    let workers = ring.add_work_pool(3).unwrap();
    let seen = Arc::new(Mutex::new(Vec::with_capacity(TOTAL as usize)));

    let readers: Vec<_> = workers
        .into_iter()
        .map(|mut worker| {
            let seen = seen.clone();
            thread::spawn(move || {
                let mut local = Vec::new();
                let mut handler = |_e: &ValueEvent, seq: Sequence, _end: bool| local.push(seq);
                let handled = worker.run_until(&mut handler, TOTAL - 1).unwrap();
                assert_eq!(handled as usize, local.len());
                // Each worker's own share is increasing
                assert!(local.windows(2).all(|w| w[0] < w[1]));
                seen.lock().unwrap().extend(local);
            })
        })
        .collect();

    let mut producer = ring.producer().unwrap();
    for i in 0..TOTAL {
        producer.publish_event(|e| e.value = i).unwrap();
    }

    for r in readers {
        r.join().unwrap();
    }
    let mut seen = seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..TOTAL).collect::<Vec<_>>());
}

/// A consumer that never advances stalls producers; it is back-pressure, not an error
#[test]
fn test_stalled_consumer_blocks_producer() {
    let ring = ring(4, ProducerType::Single);
    let mut consumer = ring.add_consumer();
    let mut producer = ring.producer().unwrap();

    for v in 0..4 {
        producer.publish_event(|e| e.value = v).unwrap();
    }
    assert_eq!(ring.remaining_capacity(), 0);
    assert!(matches!(producer.try_claim(), Err(HandoffError::RingBufferFull)));

    let done = Arc::new(AtomicBool::new(false));
    let flag = done.clone();
    let blocked = thread::spawn(move || {
        let result = producer.publish_event(|e| e.value = 4);
        flag.store(true, Ordering::Release);
        result
    });

    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::Acquire), "producer overran a stalled consumer");

    // One slot freed, the blocked claim goes through
    let (seq, event) = consumer.next().unwrap();
    assert_eq!((seq, event.value), (0, 0));
    assert_eq!(blocked.join().unwrap().unwrap(), 4);
}

/// Halting the ring releases a producer stuck behind a stalled consumer
#[test]
fn test_halt_releases_blocked_claim() {
    let ring = ring(2, ProducerType::Multi);
    let _stalled = ring.add_consumer();
    let mut producer = ring.producer().unwrap();
    producer.publish_event(|e| e.value = 1).unwrap();
    producer.publish_event(|e| e.value = 2).unwrap();

    let blocked = thread::spawn(move || producer.claim());
    thread::sleep(Duration::from_millis(20));
    ring.halt();

    assert!(matches!(blocked.join().unwrap(), Err(HandoffError::Halted)));
}

/// Blocking wait strategy: a parked consumer wakes on publish and on halt
#[test]
fn test_blocking_wait_strategy() {
    let ring: Arc<RingBuffer<ValueEvent>> = RingBuffer::new(
        RingBufferConfig::new(16).unwrap().with_wait_strategy(WaitStrategyType::Blocking)
    ).unwrap();
    let mut consumer = ring.add_consumer();
    let mut producer = ring.producer().unwrap();

    let reader = thread::spawn(move || {
        let first = consumer.next().map(|(_, e)| e.value);
        let second = consumer.next();
        (first, second.is_err())
    });

    thread::sleep(Duration::from_millis(20));
    producer.publish_event(|e| e.value = 99).unwrap();
    thread::sleep(Duration::from_millis(20));
    ring.halt();

    let (first, halted) = reader.join().unwrap();
    assert_eq!(first.unwrap(), 99);
    assert!(halted);
}
