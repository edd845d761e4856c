//! Report emission: per-run CSV, machine-readable summary line and the
//! human-readable results block.

use crate::stats::{ResponseRecord, Summary};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Path for the per-run CSV, namespaced by the run id.
pub fn csv_path(dir: &Path, run_id: u32) -> PathBuf {
    dir.join(format!("cacheblast_results{run_id}.csv"))
}

/// Write every resolved response record as one CSV row.
pub fn write_csv<W: Write>(mut w: W, records: &[ResponseRecord]) -> io::Result<()> {
    writeln!(
        w,
        "timestamp_us,request_id,response_time_us,is_hit,hotness,db_response,cache_id"
    )?;
    for r in records {
        writeln!(
            w,
            "{},{},{},{},{},{},{}",
            r.timestamp_us,
            r.request_id,
            r.latency_us,
            u8::from(r.is_hit),
            r.info.hotness(),
            u8::from(r.info.from_database()),
            r.info.cache_id()
        )?;
    }
    Ok(())
}

/// Write the CSV report to `dir`, returning the path written.
pub fn write_csv_file(dir: &Path, run_id: u32, records: &[ResponseRecord]) -> io::Result<PathBuf> {
    let path = csv_path(dir, run_id);
    let file = BufWriter::new(File::create(&path)?);
    write_csv(file, records)?;
    Ok(path)
}

/// Single-line JSON rendering of the summary for machine consumption.
pub fn json_line(summary: &Summary) -> serde_json::Result<String> {
    serde_json::to_string(summary)
}

/// Print the results block in human-readable form.
pub fn print_summary(summary: &Summary) {
    println!("\n ===== Results =====");
    println!(
        "{} requests were made and {} responses were received. Lost {} requests ({:.2}%)",
        summary.requests_sent,
        summary.responses_received,
        summary.lost_requests,
        summary.lost_pct
    );
    println!(
        "Of received responses: hit-rate {:.2}% ({}) - miss-rate {:.2}% ({})",
        summary.hit_rate * 100.0,
        summary.hits,
        summary.miss_rate * 100.0,
        summary.misses
    );
    println!(
        "Response time: mean {:.0}us, p50 {}us, p99 {}us",
        summary.avg_latency_us, summary.p50_latency_us, summary.p99_latency_us
    );
    println!(
        "HOT: {} - WARM1: {} - WARM2: {} - COLD: {}",
        summary.hot_responses,
        summary.warm1_responses,
        summary.warm2_responses,
        summary.cold_responses
    );
    println!(
        "DB+COLD: {} - DB+WARM/HOT (cache miss): {} - Cache+WARM/HOT: {}\n",
        summary.db_cold_responses,
        summary.db_warm_hot_responses,
        summary.cache_warm_hot_responses
    );
}
