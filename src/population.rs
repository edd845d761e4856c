//! Synthetic object population.
//!
//! Each object is a key/value-size/inter-arrival tuple. Inter-arrival times are
//! derived from an exponential rate sample (`irt = 1000 / rate` milliseconds),
//! which models a per-object independent Poisson request process: the occasional
//! large rate sample produces a very "hot" object with a tiny inter-arrival time.

use rand::prelude::*;
use rand_distr::Exp;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::{Duration, Instant};

/// Characters used for generated keys and values.
pub const KEY_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz+=";

/// One synthetic cache object.
///
/// Immutable after generation except `next_due`, which the fixed-rate scheduler
/// re-arms each time the object fires.
#[derive(Debug, Clone)]
pub struct SyntheticObject {
    pub key: String,
    pub value_len: usize,
    /// Inter-arrival time in milliseconds.
    pub irt_ms: u64,
    /// Next time the fixed-rate scheduler should fire this object.
    pub next_due: Instant,
}

impl SyntheticObject {
    #[inline]
    pub fn interarrival(&self) -> Duration {
        Duration::from_millis(self.irt_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PopulationError {
    #[error("invalid population configuration: {0}")]
    InvalidConfiguration(String),
}

/// The fixed catalogue of synthetic objects for one run.
///
/// Size is fixed after generation; no object is ever added or removed.
pub struct Population {
    objects: Vec<SyntheticObject>,
}

impl Population {
    /// Generate `count` objects with random keys, uniform value sizes in
    /// `value_size_min..value_size_max` and exponential inter-arrival rates
    /// with the given mean.
    ///
    /// All objects start due immediately (`next_due` = generation time), so the
    /// fixed-rate scheduler fires every object once on its first tick.
    pub fn generate(
        count: usize,
        key_length: usize,
        value_size_min: usize,
        value_size_max: usize,
        mean_rate: f64,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Result<Self, PopulationError> {
        if count == 0 {
            return Err(PopulationError::InvalidConfiguration(
                "object count must be at least 1".into(),
            ));
        }
        if key_length == 0 {
            return Err(PopulationError::InvalidConfiguration(
                "key length must be at least 1".into(),
            ));
        }
        if value_size_min >= value_size_max {
            return Err(PopulationError::InvalidConfiguration(format!(
                "value size range is empty: {value_size_min}..{value_size_max}"
            )));
        }
        if mean_rate <= 0.0 {
            return Err(PopulationError::InvalidConfiguration(format!(
                "mean inter-arrival rate must be positive, got {mean_rate}"
            )));
        }

        let exp = Exp::new(1.0 / mean_rate)
            .map_err(|e| PopulationError::InvalidConfiguration(e.to_string()))?;
        let now = Instant::now();

        let objects = (0..count)
            .map(|_| {
                let rate: f64 = exp.sample(rng);
                // rate can be arbitrarily small; the cast saturates, so a
                // pathological sample just yields an object that never fires.
                let irt_ms = (1000.0 / rate) as u64;
                SyntheticObject {
                    key: random_string(key_length, rng),
                    value_len: rng.random_range(value_size_min..value_size_max),
                    irt_ms,
                    next_due: now,
                }
            })
            .collect();

        Ok(Self { objects })
    }

    /// Sort ascending by inter-arrival time. Used only by the fixed-rate
    /// scheduler so that the soonest-due objects are scanned first; a
    /// performance aid, not a correctness requirement.
    pub fn sort_by_interarrival(&mut self) {
        self.objects.sort_unstable_by_key(|o| o.irt_ms);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[inline]
    pub fn objects(&self) -> &[SyntheticObject] {
        &self.objects
    }

    #[inline]
    pub fn objects_mut(&mut self) -> &mut [SyntheticObject] {
        &mut self.objects
    }
}

/// Generate a random string of `len` characters from [`KEY_CHARS`].
pub fn random_string(len: usize, rng: &mut Xoshiro256PlusPlus) -> String {
    let bytes: Vec<u8> = (0..len)
        .map(|_| KEY_CHARS[rng.random_range(0..KEY_CHARS.len())])
        .collect();
    // KEY_CHARS is pure ASCII.
    String::from_utf8(bytes).expect("key alphabet is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(0x5eed)
    }

    #[test]
    fn generates_exact_count_with_valid_fields() {
        let mut rng = rng();
        let pop = Population::generate(250, 44, 200, 300, 1.0, &mut rng).unwrap();
        assert_eq!(pop.len(), 250);
        for obj in pop.objects() {
            assert_eq!(obj.key.len(), 44);
            assert!(obj.key.bytes().all(|b| KEY_CHARS.contains(&b)));
            assert!((200..300).contains(&obj.value_len));
        }
    }

    #[test]
    fn zero_count_is_invalid() {
        let mut rng = rng();
        assert!(Population::generate(0, 44, 200, 300, 1.0, &mut rng).is_err());
    }

    #[test]
    fn empty_value_range_is_invalid() {
        let mut rng = rng();
        assert!(Population::generate(10, 44, 300, 300, 1.0, &mut rng).is_err());
    }

    #[test]
    fn nonpositive_rate_is_invalid() {
        let mut rng = rng();
        assert!(Population::generate(10, 44, 200, 300, 0.0, &mut rng).is_err());
    }

    #[test]
    fn sort_orders_by_interarrival_ascending() {
        let mut rng = rng();
        let mut pop = Population::generate(100, 8, 10, 20, 1.0, &mut rng).unwrap();
        pop.sort_by_interarrival();
        for pair in pop.objects().windows(2) {
            assert!(pair[0].irt_ms <= pair[1].irt_ms);
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let mut a = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut b = Xoshiro256PlusPlus::seed_from_u64(42);
        let pa = Population::generate(20, 16, 50, 60, 2.0, &mut a).unwrap();
        let pb = Population::generate(20, 16, 50, 60, 2.0, &mut b).unwrap();
        for (x, y) in pa.objects().iter().zip(pb.objects()) {
            assert_eq!(x.key, y.key);
            assert_eq!(x.value_len, y.value_len);
            assert_eq!(x.irt_ms, y.irt_ms);
        }
    }
}
