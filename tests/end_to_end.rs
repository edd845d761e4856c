//! End-to-end runs against a simulated in-process cache endpoint.
//!
//! The simulated channel stores preloaded keys and answers every GET after a
//! fixed delay, so full runs exercise preload, scheduling, correlation and
//! aggregation without a real server.

use cacheblast::config::Config;
use cacheblast::runner;
use cacheblast::scheduler::Policy;
use cacheblast::transport::Channel;
use cacheblast::wire::{self, LetheInfo};

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// In-process cache endpoint: remembers SET keys, echoes every GET as a hit
/// (or a miss for unknown keys) after a fixed service delay.
struct SimChannel {
    stored: Mutex<HashSet<String>>,
    inbox: Mutex<VecDeque<(Instant, Vec<u8>)>>,
    available: Condvar,
    delay: Duration,
    info: LetheInfo,
    /// When false, SETs are dropped and every GET misses.
    accept_sets: bool,
}

impl SimChannel {
    fn new(delay: Duration, info: LetheInfo, accept_sets: bool) -> Arc<Self> {
        Arc::new(Self {
            stored: Mutex::new(HashSet::new()),
            inbox: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            delay,
            info,
            accept_sets,
        })
    }

    fn payload_str(frame: &[u8]) -> String {
        String::from_utf8_lossy(&frame[wire::FRAME_HEADER_LEN..]).into_owned()
    }
}

impl Channel for SimChannel {
    fn send_write(&self, frame: &[u8]) -> io::Result<()> {
        if self.accept_sets {
            // "set {key} {flags} {exptime} {len}\r\n..."
            let payload = Self::payload_str(frame);
            if let Some(key) = payload.split_whitespace().nth(1) {
                self.stored.lock().unwrap().insert(key.to_string());
            }
        }
        Ok(())
    }

    fn send_read(&self, frame: &[u8]) -> io::Result<()> {
        let request_id = u16::from_be_bytes([frame[0], frame[1]]);
        let payload = Self::payload_str(frame);
        let key = payload
            .strip_prefix("get ")
            .and_then(|rest| rest.strip_suffix("\r\n"))
            .unwrap_or("");

        let response = if self.stored.lock().unwrap().contains(key) {
            wire::encode_hit_response(request_id, key, b"simulated-value", self.info)
        } else {
            wire::encode_miss_response(request_id)
        };

        self.inbox
            .lock()
            .unwrap()
            .push_back((Instant::now() + self.delay, response));
        self.available.notify_one();
        Ok(())
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inbox = self.inbox.lock().unwrap();
        loop {
            let now = Instant::now();
            if let Some(pos) = inbox.iter().position(|(due, _)| *due <= now) {
                let (_, frame) = inbox.remove(pos).unwrap();
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                return Ok(len);
            }
            let wait = inbox
                .iter()
                .map(|(due, _)| due.saturating_duration_since(now))
                .min()
                .unwrap_or(Duration::from_millis(50))
                .max(Duration::from_millis(1));
            let (guard, _) = self.available.wait_timeout(inbox, wait).unwrap();
            inbox = guard;
        }
    }
}

fn test_config(objects: usize, duration: Duration, budget: u64) -> Config {
    let mut config = Config::default();
    config.workload.objects = objects;
    config.workload.request_budget = budget;
    config.workload.preload_spacing = Duration::ZERO;
    config.general.duration = duration;
    config
}

#[test]
fn fixed_rate_run_measures_all_hits_with_service_delay() {
    // Every GET is answered as a hit with aux 0x02 (hot, cache origin) after 2ms.
    let channel = SimChannel::new(Duration::from_millis(2), LetheInfo(0x02), true);
    let config = test_config(100, Duration::from_secs(2), 0);

    let report = runner::run(
        &config,
        &Policy::FixedRate,
        channel,
        Arc::new(AtomicBool::new(true)),
        Some(0xC0FFEE),
    )
    .unwrap();
    let summary = &report.summary;

    // All 100 objects are due immediately, so at least one request each.
    assert!(summary.requests_sent >= 100, "sent {}", summary.requests_sent);
    assert!(summary.responses_received > 0);
    // Nothing is lost except requests still in flight at the deadline.
    assert!(summary.responses_received + 20 >= summary.requests_sent);
    assert_eq!(
        summary.lost_requests,
        summary.requests_sent - summary.responses_received
    );

    // 100% hit rate, everything hot and cache-origin.
    assert_eq!(summary.misses, 0);
    assert_eq!(summary.hits, summary.responses_received);
    assert!((summary.hit_rate - 1.0).abs() < 1e-9);
    assert_eq!(summary.hot_responses, summary.hits);
    assert_eq!(summary.db_cold_responses, 0);
    assert_eq!(summary.db_warm_hot_responses, 0);
    assert_eq!(summary.cache_warm_hot_responses, summary.hits);

    // Mean round trip tracks the simulated 2ms service delay.
    assert!(
        summary.avg_latency_us >= 1900.0,
        "avg latency {}us",
        summary.avg_latency_us
    );
    assert!(
        summary.avg_latency_us <= 100_000.0,
        "avg latency {}us",
        summary.avg_latency_us
    );
}

#[test]
fn zipf_run_spends_the_exact_budget_and_reports_losses() {
    let channel = SimChannel::new(Duration::from_millis(2), LetheInfo(0x02), true);
    let config = test_config(50, Duration::from_secs(1), 400);

    let report = runner::run(
        &config,
        &Policy::Zipf { alpha: 0.99 },
        channel,
        Arc::new(AtomicBool::new(true)),
        Some(42),
    )
    .unwrap();
    let summary = &report.summary;

    assert_eq!(summary.requests_sent, 400);
    // Only requests still in flight at the end can be missing.
    assert!(summary.responses_received >= 350, "{}", summary.responses_received);
    assert_eq!(
        summary.lost_requests,
        summary.requests_sent - summary.responses_received
    );
    assert_eq!(summary.misses, 0);

    // Record list and CSV agree with the aggregate counts.
    assert_eq!(report.records.len() as u64, summary.responses_received);
    let mut csv = Vec::new();
    cacheblast::report::write_csv(&mut csv, &report.records).unwrap();
    let lines = String::from_utf8(csv).unwrap().lines().count();
    assert_eq!(lines as u64, summary.responses_received + 1);
}

#[test]
fn unstored_keys_come_back_as_misses() {
    // The endpoint drops SETs, so every GET misses.
    let channel = SimChannel::new(Duration::from_millis(1), LetheInfo(0x02), false);
    let config = test_config(10, Duration::from_millis(500), 50);

    let report = runner::run(
        &config,
        &Policy::Uniform,
        channel,
        Arc::new(AtomicBool::new(true)),
        Some(7),
    )
    .unwrap();
    let summary = &report.summary;

    assert_eq!(summary.requests_sent, 50);
    assert_eq!(summary.hits, 0);
    assert_eq!(summary.misses, summary.responses_received);
    assert!(summary.responses_received > 0);
    assert_eq!(summary.hit_rate, 0.0);
    // Miss latencies still feed the aggregate mean.
    assert!(summary.avg_latency_us >= 900.0);
}
