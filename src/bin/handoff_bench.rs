//! handoff-bench - compare the ring buffer and the blocking queue from the command line.
//!
//! Usage: handoff-bench [--backend ring|queue|both] [--messages N] [--producers N]
//!        [--consumers N] [--capacity N] [--wait spin|yield|block]
//!        [--producer-type single|multi] [--policy fanout|workpool]
//!        [--warmup N] [--iterations N] [--pin] [--verbose]

use anyhow::{ anyhow, bail, Context, Result };
use tracing::Level;

use handoff::{
    Backend,
    ConsumerPolicy,
    Driver,
    HarnessConfig,
    ProducerType,
    WaitStrategyType,
};

const USAGE: &str =
    "Usage: handoff-bench [--backend ring|queue|both] [--messages N] [--producers N] \
[--consumers N] [--capacity N] [--wait spin|yield|block] [--producer-type single|multi] \
[--policy fanout|workpool] [--warmup N] [--iterations N] [--pin] [--verbose]";

struct Args {
    backends: Vec<Backend>,
    config: HarnessConfig,
    driver: Driver,
    verbose: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args {
        backends: vec![Backend::RingBuffer, Backend::BlockingQueue],
        config: HarnessConfig::default(),
        driver: Driver::default(),
        verbose: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .map(String::as_str)
                .ok_or_else(|| anyhow!("{} needs a value", flag))
        };
        match flag.as_str() {
            "--backend" => {
                parsed.backends = match value()? {
                    "ring" => vec![Backend::RingBuffer],
                    "queue" => vec![Backend::BlockingQueue],
                    "both" => vec![Backend::RingBuffer, Backend::BlockingQueue],
                    other => bail!("unknown backend '{}'", other),
                };
            }
            "--messages" => {
                parsed.config.message_count = value()?.parse().context("--messages")?;
            }
            "--producers" => {
                parsed.config.producers = value()?.parse().context("--producers")?;
            }
            "--consumers" => {
                parsed.config.consumers = value()?.parse().context("--consumers")?;
            }
            "--capacity" => {
                let capacity: usize = value()?.parse().context("--capacity")?;
                parsed.config.ring_capacity = capacity;
                parsed.config.queue_capacity = capacity;
            }
            "--wait" => {
                parsed.config.wait_strategy = match value()? {
                    "spin" => WaitStrategyType::BusySpin,
                    "yield" => WaitStrategyType::Yielding,
                    "block" => WaitStrategyType::Blocking,
                    other => bail!("unknown wait strategy '{}'", other),
                };
            }
            "--producer-type" => {
                parsed.config.producer_type = match value()? {
                    "single" => ProducerType::Single,
                    "multi" => ProducerType::Multi,
                    other => bail!("unknown producer type '{}'", other),
                };
            }
            "--policy" => {
                parsed.config.consumer_policy = match value()? {
                    "fanout" => ConsumerPolicy::FanOut,
                    "workpool" => ConsumerPolicy::WorkPool,
                    other => bail!("unknown consumer policy '{}'", other),
                };
            }
            "--warmup" => {
                parsed.driver.warmup_iterations = value()?.parse().context("--warmup")?;
            }
            "--iterations" => {
                parsed.driver.measurement_iterations = value()?.parse().context("--iterations")?;
            }
            "--pin" => {
                parsed.config.pin_threads = true;
            }
            "--verbose" | "-v" => {
                parsed.verbose = true;
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("unknown flag '{}'\n{}", other, USAGE),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let args = parse_args(&args)?;

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_thread_names(true)
        .init();

    let driver = Driver::new(args.driver.warmup_iterations, args.driver.measurement_iterations)?;

    for backend in args.backends {
        let config = HarnessConfig {
            backend,
            ..args.config.clone()
        };
        let report = driver.run(&config).with_context(|| format!("{} benchmark", backend))?;
        println!("{}", report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("handoff-bench")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let parsed = parse_args(&args(&[])).unwrap();
        assert_eq!(parsed.backends.len(), 2);
        assert_eq!(parsed.config.message_count, 1_000_000);
        assert!(!parsed.verbose);
    }

    #[test]
    fn test_flags() {
        let parsed = parse_args(
            &args(
                &[
                    "--backend",
                    "ring",
                    "--messages",
                    "5000",
                    "--producers",
                    "4",
                    "--consumers",
                    "2",
                    "--capacity",
                    "1024",
                    "--wait",
                    "yield",
                    "--policy",
                    "workpool",
                    "--iterations",
                    "3",
                    "--pin",
                ]
            )
        ).unwrap();
        assert_eq!(parsed.backends, vec![Backend::RingBuffer]);
        assert_eq!(parsed.config.message_count, 5000);
        assert_eq!(parsed.config.producers, 4);
        assert_eq!(parsed.config.ring_capacity, 1024);
        assert_eq!(parsed.config.wait_strategy, WaitStrategyType::Yielding);
        assert_eq!(parsed.config.consumer_policy, ConsumerPolicy::WorkPool);
        assert_eq!(parsed.driver.measurement_iterations, 3);
        assert!(parsed.config.pin_threads);
    }

    #[test]
    fn test_bad_flags() {
        assert!(parse_args(&args(&["--backend", "tcp"])).is_err());
        assert!(parse_args(&args(&["--messages"])).is_err());
        assert!(parse_args(&args(&["--messages", "lots"])).is_err());
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
    }
}
