//! Simulated backend latency.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Delay settings in milliseconds.
///
/// A non-zero `delay` always wins. Otherwise a random delay in
/// `[random_delay_min, random_delay_max)` is drawn when the range is non-empty
/// and `random_delay_max > 0`; any other combination means no delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    #[serde(default)]
    pub delay: u64,
    #[serde(default)]
    pub random_delay_min: u64,
    #[serde(default)]
    pub random_delay_max: u64,
}

impl DelayConfig {
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            delay: delay_ms,
            ..Self::default()
        }
    }

    pub fn random(min_ms: u64, max_ms: u64) -> Self {
        Self {
            delay: 0,
            random_delay_min: min_ms,
            random_delay_max: max_ms,
        }
    }

    /// True when delays are drawn from the random range.
    pub fn is_random(&self) -> bool {
        self.delay == 0
            && self.random_delay_max > 0
            && self.random_delay_max > self.random_delay_min
    }
}

/// What happened while a call was suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayOutcome {
    pub requested_ms: u64,
    pub elapsed: Duration,
    pub interrupted: bool,
}

/// Computes and applies per-call delays.
///
/// All calls on one simulator draw from a single shared random stream, so under
/// concurrency the order in which calls receive draws is not deterministic even
/// with a fixed seed.
pub struct DelaySimulator {
    config: DelayConfig,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for DelaySimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelaySimulator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DelaySimulator {
    pub fn new(config: DelayConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(config: DelayConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn config(&self) -> &DelayConfig {
        &self.config
    }

    /// Delay for the next call in milliseconds.
    pub fn compute_delay(&self) -> u64 {
        let config = &self.config;
        if config.delay > 0 {
            return config.delay;
        }
        if config.is_random() {
            return self
                .rng
                .lock()
                .gen_range(config.random_delay_min..config.random_delay_max);
        }
        0
    }

    /// Suspend the current call for `delay_ms`.
    ///
    /// Only the calling task is suspended. If `cancel` fires first the wait is
    /// abandoned, the interruption is logged, and the outcome is still returned
    /// so the caller can deliver its already-computed result.
    pub async fn apply_delay(&self, delay_ms: u64, cancel: &CancellationToken) -> DelayOutcome {
        info!("simulate_delay({}ms)", delay_ms);
        let started = Instant::now();
        if delay_ms == 0 {
            return DelayOutcome {
                requested_ms: 0,
                elapsed: started.elapsed(),
                interrupted: false,
            };
        }

        let interrupted = tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => false,
            _ = cancel.cancelled() => true,
        };
        let elapsed = started.elapsed();
        if interrupted {
            error!(
                "simulate_delay interrupted after {}ms of {}ms",
                elapsed.as_millis(),
                delay_ms
            );
        }

        DelayOutcome {
            requested_ms: delay_ms,
            elapsed,
            interrupted,
        }
    }

    /// Compute the next delay and apply it.
    pub async fn simulate(&self, cancel: &CancellationToken) -> DelayOutcome {
        let delay_ms = self.compute_delay();
        self.apply_delay(delay_ms, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use tracing_test::traced_test;

    proptest! {
        #[test]
        fn prop_fixed_delay_wins(delay in 1u64..100_000, min in any::<u64>(), max in any::<u64>()) {
            let simulator = DelaySimulator::new(DelayConfig {
                delay,
                random_delay_min: min,
                random_delay_max: max,
            });
            prop_assert_eq!(simulator.compute_delay(), delay);
        }

        #[test]
        fn prop_empty_range_means_no_delay(max in 0u64..10_000, extra in 0u64..10_000) {
            let simulator = DelaySimulator::new(DelayConfig::random(max + extra, max));
            prop_assert_eq!(simulator.compute_delay(), 0);
        }
    }

    #[test]
    fn test_all_zero_means_no_delay() {
        let simulator = DelaySimulator::new(DelayConfig::default());
        for _ in 0..100 {
            assert_eq!(simulator.compute_delay(), 0);
        }
    }

    #[test]
    fn test_random_draws_stay_in_half_open_range() {
        let simulator = DelaySimulator::new(DelayConfig::random(20, 25));
        let mut seen_min = false;
        for _ in 0..10_000 {
            let delay = simulator.compute_delay();
            assert!((20..25).contains(&delay), "delay {delay} out of range");
            seen_min |= delay == 20;
        }
        assert!(seen_min);
    }

    #[test]
    fn test_min_zero_range() {
        let simulator = DelaySimulator::new(DelayConfig::random(0, 1));
        for _ in 0..1_000 {
            assert_eq!(simulator.compute_delay(), 0);
        }
    }

    #[test]
    fn test_seeded_stream_is_reproducible() {
        let config = DelayConfig::random(0, 1_000);
        let a = DelaySimulator::with_seed(config, 42);
        let b = DelaySimulator::with_seed(config, 42);
        let first: Vec<u64> = (0..32).map(|_| a.compute_delay()).collect();
        let second: Vec<u64> = (0..32).map(|_| b.compute_delay()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_shared_stream_under_concurrency() {
        let simulator = Arc::new(DelaySimulator::new(DelayConfig::random(100, 200)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let simulator = Arc::clone(&simulator);
                std::thread::spawn(move || {
                    (0..1_000)
                        .map(|_| simulator.compute_delay())
                        .all(|d| (100..200).contains(&d))
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_delay_waits() {
        let simulator = DelaySimulator::new(DelayConfig::fixed(50));
        let outcome = simulator.simulate(&CancellationToken::new()).await;
        assert_eq!(outcome.requested_ms, 50);
        assert!(outcome.elapsed >= Duration::from_millis(50));
        assert!(!outcome.interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_returns_immediately() {
        let simulator = DelaySimulator::new(DelayConfig::default());
        let outcome = simulator.simulate(&CancellationToken::new()).await;
        assert_eq!(outcome.requested_ms, 0);
        assert_eq!(outcome.elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_cancelled_delay_is_logged_and_returns() {
        let simulator = DelaySimulator::new(DelayConfig::fixed(5_000));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let outcome = simulator.simulate(&cancel).await;
        assert!(outcome.interrupted);
        assert_eq!(outcome.requested_ms, 5_000);
        assert!(outcome.elapsed < Duration::from_millis(5_000));
        assert!(logs_contain("simulate_delay interrupted"));
    }
}
