//! Request scheduling.
//!
//! Three interchangeable policies drive GET emission against the generated
//! population:
//!
//! - **FixedRate**: every object is an independent periodic process with its
//!   own inter-arrival time; a tick loop fires all due objects and re-arms
//!   them, bounded by the wall-clock test duration.
//! - **Zipf**: a fixed request budget is spread evenly over the duration and
//!   each request picks an object rank from a power-law weighted draw.
//! - **Uniform**: same pacing as Zipf with a uniform object draw.
//!
//! The scheduler owns the wrapping 16-bit request id and the sent-request
//! counter; both are per-run state, not globals. Sends are fire-and-forget:
//! the loop never blocks on I/O completion, only on wall-clock sleeps.

use crate::correlator::Correlator;
use crate::population::Population;
use crate::transport::Channel;
use crate::wire;

use rand::distr::weighted::WeightedIndex;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Object selection policy for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Policy {
    /// Each object fires on its own fixed period (selector 0).
    FixedRate,
    /// Rank-weighted draw, weight proportional to `1/rank^alpha` (selector 1).
    Zipf { alpha: f64 },
    /// Uniform random draw (selector 2).
    Uniform,
}

impl Policy {
    /// Map the CLI distribution selector to a policy. `alpha` is only
    /// meaningful for the Zipfian selector.
    pub fn from_selector(selector: u8, alpha: f64) -> Option<Policy> {
        match selector {
            0 => Some(Policy::FixedRate),
            1 => Some(Policy::Zipf { alpha }),
            2 => Some(Policy::Uniform),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid selection weights: {0}")]
    InvalidWeights(String),
}

/// Zipfian rank weights for the budgeted policies.
///
/// Ranks 1 through `count - 1` get weight proportional to `1/rank^alpha`,
/// normalized to sum to 1. The last object is excluded from the draw; the
/// original normalization carried this off-by-one and downstream analysis
/// depends on it, so it is preserved.
pub fn zipf_weights(count: usize, alpha: f64) -> Vec<f64> {
    debug_assert!(count >= 2);
    let mut weights: Vec<f64> = (1..count).map(|rank| (rank as f64).powf(-alpha)).collect();
    let norm: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= norm;
    }
    weights
}

/// Drives request emission for one run.
pub struct Scheduler {
    channel: Arc<dyn Channel>,
    correlator: Arc<Correlator>,
    duration: Duration,
    budget: u64,
    running: Arc<AtomicBool>,
    rng: Xoshiro256PlusPlus,
    next_id: u16,
    requests_sent: u64,
}

impl Scheduler {
    pub fn new(
        channel: Arc<dyn Channel>,
        correlator: Arc<Correlator>,
        duration: Duration,
        budget: u64,
        running: Arc<AtomicBool>,
        rng: Xoshiro256PlusPlus,
    ) -> Self {
        Self {
            channel,
            correlator,
            duration,
            budget,
            running,
            rng,
            next_id: 0,
            requests_sent: 0,
        }
    }

    /// Start the request id counter at an arbitrary point in the 16-bit space.
    /// Used to exercise wraparound behavior without sending 65536 requests.
    pub fn with_initial_request_id(mut self, id: u16) -> Self {
        self.next_id = id;
        self
    }

    /// Number of GETs successfully handed to the transport so far.
    #[inline]
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    /// Run the selected policy to completion and return the number of
    /// requests sent.
    ///
    /// FixedRate stops at the wall-clock deadline; Zipf and Uniform stop after
    /// exactly the request budget (which may overrun the nominal duration if
    /// per-send processing is slow). All policies also stop early when the
    /// `running` flag is cleared.
    pub fn run(
        &mut self,
        policy: &Policy,
        population: &mut Population,
    ) -> Result<u64, SchedulerError> {
        match policy {
            Policy::FixedRate => self.run_fixed_rate(population),
            Policy::Zipf { alpha } => {
                let weights = zipf_weights(population.len(), *alpha);
                let dist = WeightedIndex::new(&weights)
                    .map_err(|e| SchedulerError::InvalidWeights(e.to_string()))?;
                self.run_paced(population, move |rng| dist.sample(rng));
            }
            Policy::Uniform => {
                let count = population.len();
                self.run_paced(population, move |rng| rng.random_range(0..count - 1));
            }
        }
        Ok(self.requests_sent)
    }

    /// Encode and send one GET, registering it with the correlator.
    ///
    /// The send timestamp is taken before the send call so queueing inside the
    /// transport counts toward the measured round trip. A transmit failure is
    /// logged and the request is neither registered nor counted as sent.
    fn send_get(&mut self, key: &str) {
        let frame = wire::encode_get(self.next_id, key);
        let sent_at = Instant::now();
        match self.channel.send_read(&frame) {
            Ok(()) => {
                self.correlator.register(self.next_id, sent_at);
                self.next_id = self.next_id.wrapping_add(1);
                self.requests_sent += 1;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to send GET request");
            }
        }
    }

    /// Tick loop for the fixed-rate policy.
    ///
    /// Each tick scans the whole population, fires every due object and
    /// re-arms it at `now + irt`. The next tick is scheduled for the
    /// soonest-due object, capped at one second, so near-due objects fire
    /// promptly without busy-spinning.
    fn run_fixed_rate(&mut self, population: &mut Population) {
        let start = Instant::now();
        let deadline = start + self.duration;
        let mut last_remaining = u64::MAX;

        loop {
            let now = Instant::now();
            if now >= deadline || !self.running.load(Ordering::Relaxed) {
                break;
            }

            let mut wake = now + Duration::from_secs(1);
            for obj in population.objects_mut() {
                if obj.next_due <= now {
                    self.send_get(&obj.key);
                    obj.next_due = now + obj.interarrival();
                }
                if obj.next_due < wake {
                    wake = obj.next_due;
                }
            }

            self.log_remaining(deadline, now, &mut last_remaining);

            let wake = wake.min(deadline);
            let after_scan = Instant::now();
            if wake > after_scan {
                std::thread::sleep(wake - after_scan);
            }
        }
    }

    /// Constant-rate loop shared by the budgeted policies.
    ///
    /// After each send the loop compares elapsed time against the ideal
    /// cumulative schedule `(i + 1) / rate` and sleeps the positive remainder,
    /// correcting drift on every iteration regardless of per-request jitter.
    fn run_paced<F>(&mut self, population: &Population, mut select: F)
    where
        F: FnMut(&mut Xoshiro256PlusPlus) -> usize,
    {
        let rate = self.budget as f64 / self.duration.as_secs_f64();
        let interval = 1.0 / rate;
        let start = Instant::now();
        let deadline = start + self.duration;
        let mut last_remaining = u64::MAX;

        for i in 0..self.budget {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }

            let k = select(&mut self.rng);
            let key = &population.objects()[k].key;
            self.send_get(key);

            let now = Instant::now();
            self.log_remaining(deadline, now, &mut last_remaining);

            let due = (i + 1) as f64 * interval;
            let elapsed = start.elapsed().as_secs_f64();
            if due > elapsed {
                std::thread::sleep(Duration::from_secs_f64(due - elapsed));
            }
        }
    }

    /// Surface remaining-time telemetry whenever the whole-second value changes.
    fn log_remaining(&self, deadline: Instant, now: Instant, last: &mut u64) {
        let remaining = deadline.saturating_duration_since(now).as_secs();
        if remaining != *last {
            tracing::info!(remaining_secs = remaining, "measurement in progress");
            *last = remaining;
        }
    }
}
