//! Ring buffer vs blocking queue with Criterion
//!
//! Each sample is one full harness run on a fresh backend. Only the window
//! between start gate release and the last join is timed.

use std::time::Duration;

use criterion::{ criterion_group, criterion_main, BenchmarkId, Criterion, Throughput };

use handoff::{ Backend, ConsumerPolicy, Harness, HarnessConfig, WaitStrategyType };

const MESSAGES: u64 = 1_000_000;

fn config(backend: Backend, producers: usize, consumers: usize) -> HarnessConfig {
    HarnessConfig::new(backend)
        .with_message_count(MESSAGES)
        .with_producers(producers)
        .with_consumers(consumers)
        // Busy spin needs a core per thread; yield keeps small machines usable
        .with_wait_strategy(WaitStrategyType::Yielding)
}

fn timed_runs(config: &HarnessConfig, iters: u64) -> Duration {
    let mut total = Duration::ZERO;
    for _ in 0..iters {
        let report = Harness::new(config.clone()).unwrap().run_once().unwrap();
        assert!(report.is_complete());
        total += report.elapsed;
    }
    total
}

fn benchmark_handoff(c: &mut Criterion) {
    for (producers, consumers) in [(1, 1), (4, 2)] {
        let mut group = c.benchmark_group(format!("handoff {}P{}C (1M msgs)", producers, consumers));
        group.throughput(Throughput::Elements(MESSAGES));
        group.sample_size(10);

        for backend in [Backend::RingBuffer, Backend::BlockingQueue] {
            let cfg = config(backend, producers, consumers);
            group.bench_with_input(BenchmarkId::new("backend", backend), &cfg, |b, cfg| {
                b.iter_custom(|iters| timed_runs(cfg, iters))
            });
        }

        let pool = config(Backend::RingBuffer, producers, consumers).with_consumer_policy(
            ConsumerPolicy::WorkPool
        );
        group.bench_with_input(BenchmarkId::new("backend", "ring-workpool"), &pool, |b, cfg| {
            b.iter_custom(|iters| timed_runs(cfg, iters))
        });

        group.finish();
    }
}

criterion_group!(benches, benchmark_handoff);
criterion_main!(benches);
