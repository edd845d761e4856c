//! Aggregation of resolved responses into run statistics.
//!
//! The receiver appends one [`ResponseRecord`] per resolved response; records
//! are append-only and never mutated. After the run the whole sequence is
//! folded into a [`Summary`]: hit/miss rates, loss accounting, temperature-tier
//! buckets, the database/cache cross-tabulation and latency statistics. The
//! mean latency mixes hit and miss round trips, matching the analysis the
//! downstream tooling expects.

use crate::config::Config;
use crate::wire::{LetheInfo, Tier};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One resolved response, appended by the receiver path.
#[derive(Debug, Clone, Copy)]
pub struct ResponseRecord {
    pub request_id: u16,
    /// Arrival time in microseconds relative to the start of the measurement
    /// phase.
    pub timestamp_us: i64,
    /// Round-trip latency in microseconds.
    pub latency_us: u32,
    /// Auxiliary header byte returned by the server.
    pub info: LetheInfo,
    pub is_hit: bool,
}

/// Aggregate statistics for one run, including an echo of the workload
/// parameters so a result line is self-describing.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub generator: &'static str,
    pub timestamp: DateTime<Utc>,

    // Workload echo
    pub num_objects: usize,
    pub duration_secs: u64,
    pub value_size_min: usize,
    pub value_size_max: usize,
    pub exp_dist_mean: f64,
    pub exp_dist_lambda: f64,

    // Loss accounting
    pub requests_sent: u64,
    pub responses_received: u64,
    pub lost_requests: u64,
    pub lost_pct: f64,

    // Hit/miss
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,

    // Temperature tiers (hits only; unknown tiers excluded from the buckets)
    pub hot_responses: u64,
    pub warm1_responses: u64,
    pub warm2_responses: u64,
    pub cold_responses: u64,
    pub unknown_tier_responses: u64,

    // Origin cross-tabulation (hits only)
    pub db_cold_responses: u64,
    pub db_warm_hot_responses: u64,
    pub cache_warm_hot_responses: u64,

    // Latency across all received responses, hit and miss alike
    pub avg_latency_us: f64,
    pub p50_latency_us: u32,
    pub p99_latency_us: u32,
}

/// Fold the record sequence into a [`Summary`].
///
/// Zero responses received is a reportable degenerate case: all rates and the
/// latency statistics come out as zero.
pub fn summarize(config: &Config, requests_sent: u64, records: &[ResponseRecord]) -> Summary {
    let mut hits = 0u64;
    let mut misses = 0u64;
    let mut latency_sum = 0u64;
    let mut hot = 0u64;
    let mut warm1 = 0u64;
    let mut warm2 = 0u64;
    let mut cold = 0u64;
    let mut unknown = 0u64;
    let mut db_cold = 0u64;
    let mut db_warm_hot = 0u64;
    let mut cache_warm_hot = 0u64;

    for record in records {
        if record.is_hit {
            hits += 1;

            match record.info.tier() {
                Some(Tier::Cold) => cold += 1,
                Some(Tier::Warm1) => warm1 += 1,
                Some(Tier::Hot) => hot += 1,
                Some(Tier::Warm2) => warm2 += 1,
                None => {
                    tracing::warn!(hotness = record.info.hotness(), "unknown temperature tier");
                    unknown += 1;
                }
            }

            // A database response for a non-cold object means the cache missed
            // but the persistent store still had it; tracked as an anomaly.
            let is_cold = record.info.hotness() == 0;
            if record.info.from_database() && is_cold {
                db_cold += 1;
            } else if record.info.from_database() {
                db_warm_hot += 1;
            } else {
                cache_warm_hot += 1;
            }
        } else {
            misses += 1;
        }

        latency_sum += u64::from(record.latency_us);
    }

    let responses = hits + misses;
    let lost = requests_sent.saturating_sub(responses);

    let mut latencies: Vec<u32> = records.iter().map(|r| r.latency_us).collect();
    latencies.sort_unstable();

    Summary {
        generator: "cacheblast",
        timestamp: Utc::now(),
        num_objects: config.workload.objects,
        duration_secs: config.general.duration.as_secs(),
        value_size_min: config.workload.value_size_min,
        value_size_max: config.workload.value_size_max,
        exp_dist_mean: config.workload.mean_rate,
        exp_dist_lambda: 1.0 / config.workload.mean_rate,
        requests_sent,
        responses_received: responses,
        lost_requests: lost,
        lost_pct: ratio(lost, requests_sent) * 100.0,
        hits,
        misses,
        hit_rate: ratio(hits, responses),
        miss_rate: ratio(misses, responses),
        hot_responses: hot,
        warm1_responses: warm1,
        warm2_responses: warm2,
        cold_responses: cold,
        unknown_tier_responses: unknown,
        db_cold_responses: db_cold,
        db_warm_hot_responses: db_warm_hot,
        cache_warm_hot_responses: cache_warm_hot,
        avg_latency_us: if responses > 0 {
            latency_sum as f64 / responses as f64
        } else {
            0.0
        },
        p50_latency_us: percentile(&latencies, 50.0),
        p99_latency_us: percentile(&latencies, 99.0),
    }
}

#[inline]
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[u32], p: f64) -> u32 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
