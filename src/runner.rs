//! Run orchestration: population generation, cache preload, the concurrent
//! sender/receiver measurement phase, and the final aggregation.
//!
//! Two long-lived threads exist during measurement: the scheduler (sender) on
//! the calling thread and one receiver. The only shared mutable state between
//! them is the correlator map and the append-only record list, each behind its
//! own lock, never both at once and never across I/O.

use crate::config::{Config, ConfigError};
use crate::correlator::Correlator;
use crate::population::{self, Population, PopulationError};
use crate::scheduler::{Policy, Scheduler, SchedulerError};
use crate::stats::{summarize, ResponseRecord, Summary};
use crate::transport::Channel;
use crate::wire;

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Everything a finished run produces: the aggregate summary and the raw
/// record list for the CSV report.
pub struct RunReport {
    pub summary: Summary,
    pub records: Vec<ResponseRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Population(#[from] PopulationError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Execute one complete run.
///
/// Clearing `running` stops the scheduler early; the interrupted run still
/// produces a report. The receiver thread blocks on the channel with no
/// cooperative shutdown and is reclaimed at process exit; a late response
/// still counts toward the statistics as long as the run is collecting.
pub fn run(
    config: &Config,
    policy: &Policy,
    channel: Arc<dyn Channel>,
    running: Arc<AtomicBool>,
    seed: Option<u64>,
) -> Result<RunReport, RunError> {
    config.validate(policy)?;

    let mut rng = match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_os_rng(),
    };

    let workload = &config.workload;
    let mut population = Population::generate(
        workload.objects,
        workload.key_length,
        workload.value_size_min,
        workload.value_size_max,
        workload.mean_rate,
        &mut rng,
    )?;
    if matches!(policy, Policy::FixedRate) {
        population.sort_by_interarrival();
    }
    tracing::info!(objects = population.len(), "population generated");

    preload(channel.as_ref(), &population, workload.preload_spacing, &mut rng);

    let correlator = Arc::new(Correlator::new());
    let records: Arc<Mutex<Vec<ResponseRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let run_start = Instant::now();

    {
        let channel = Arc::clone(&channel);
        let correlator = Arc::clone(&correlator);
        let records = Arc::clone(&records);
        let key_length = workload.key_length;
        std::thread::Builder::new()
            .name("receiver".into())
            .spawn(move || receive_loop(channel, correlator, records, run_start, key_length))
            .expect("failed to spawn receiver thread");
    }

    let mut scheduler = Scheduler::new(
        channel,
        Arc::clone(&correlator),
        config.general.duration,
        workload.request_budget,
        running,
        rng,
    );
    let requests_sent = scheduler.run(policy, &mut population)?;

    let records = records.lock().expect("record list lock poisoned").clone();
    tracing::info!(
        requests_sent,
        responses = records.len(),
        outstanding = correlator.outstanding(),
        "measurement phase complete"
    );

    let summary = summarize(config, requests_sent, &records);
    Ok(RunReport { summary, records })
}

/// Write every object to the cache with one SET each, spaced by
/// `spacing` to shape the preload burst. Transmit failures are logged and the
/// object is simply not stored; the measurement phase will count it as misses.
fn preload(
    channel: &dyn Channel,
    population: &Population,
    spacing: Duration,
    rng: &mut Xoshiro256PlusPlus,
) {
    let count = population.len();
    let step = (count / 100).max(1);
    for (i, obj) in population.objects().iter().enumerate() {
        let value = population::random_string(obj.value_len, rng);
        let frame = wire::encode_set(&obj.key, value.as_bytes(), 0, 0);
        if let Err(e) = channel.send_write(&frame) {
            tracing::error!(key = %obj.key, error = %e, "failed to send SET request");
        }
        if i % step == 0 {
            tracing::info!(percent = i * 100 / count, "preloading objects");
        }
        std::thread::sleep(spacing);
    }
}

/// Receiver loop: block on the channel, decode, resolve, append.
///
/// Never exits voluntarily. Malformed datagrams and unresolvable responses are
/// skipped; receive errors are logged and the loop continues. No condition here
/// aborts a run: collecting statistics wins over failing fast.
fn receive_loop(
    channel: Arc<dyn Channel>,
    correlator: Arc<Correlator>,
    records: Arc<Mutex<Vec<ResponseRecord>>>,
    run_start: Instant,
    key_length: usize,
) {
    let mut buf = vec![0u8; wire::recv_buffer_len(key_length)];
    loop {
        let len = match channel.recv(&mut buf) {
            Ok(len) => len,
            Err(e) => {
                tracing::warn!(error = %e, "receive failed");
                continue;
            }
        };
        let received_at = Instant::now();

        let response = match wire::decode_response(&buf[..len]) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed datagram");
                continue;
            }
        };

        // Unattributable responses (never registered, already resolved, or a
        // wraparound collision) are dropped; they only ever show up in the
        // aggregate loss count.
        let Some(sent_at) = correlator.resolve(response.request_id) else {
            tracing::trace!(request_id = response.request_id, "unresolvable response");
            continue;
        };

        let record = ResponseRecord {
            request_id: response.request_id,
            timestamp_us: received_at.duration_since(run_start).as_micros() as i64,
            latency_us: received_at.duration_since(sent_at).as_micros() as u32,
            info: response.info,
            is_hit: response.is_hit,
        };
        records.lock().expect("record list lock poisoned").push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct CollectingChannel {
        sets: Mutex<Vec<Vec<u8>>>,
    }

    impl Channel for CollectingChannel {
        fn send_write(&self, frame: &[u8]) -> io::Result<()> {
            self.sets.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        fn send_read(&self, _frame: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn recv(&self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    #[test]
    fn preload_sends_one_set_per_object() {
        let channel = CollectingChannel {
            sets: Mutex::new(Vec::new()),
        };
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let population = Population::generate(25, 8, 10, 20, 1.0, &mut rng).unwrap();

        preload(&channel, &population, Duration::ZERO, &mut rng);

        let sets = channel.sets.lock().unwrap();
        assert_eq!(sets.len(), 25);
        for (frame, obj) in sets.iter().zip(population.objects()) {
            // SET frames always carry request id 0.
            assert_eq!(&frame[0..2], &[0, 0]);
            let payload = String::from_utf8_lossy(&frame[wire::FRAME_HEADER_LEN..]);
            assert!(payload.starts_with(&format!("set {} 0 0 {}\r\n", obj.key, obj.value_len)));
        }
    }
}
