use cacheblast::config::Config;
use cacheblast::scheduler::Policy;
use cacheblast::transport::UdpChannel;
use cacheblast::{report, runner};

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "cacheblast")]
#[command(about = "UDP cache workload generator with latency and hit-rate measurement")]
#[command(version)]
struct Cli {
    /// Target host, e.g. 127.0.0.1
    host: IpAddr,

    /// Access-pattern selector: 0=fixed-rate per object, 1=Zipf popularity, 2=uniform
    distribution: u8,

    /// Number of synthetic objects to generate
    objects: usize,

    /// Total request budget (used by distributions 1 and 2)
    request_budget: u64,

    /// Run identifier, namespaces the CSV report file
    run_id: u32,

    /// Zipf skew in integer hundredths, e.g. 99 for alpha 0.99
    zipf_alpha_hundredths: u32,

    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for reproducible object generation and selection
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for the CSV report
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    // Bad CLI input is a usage error: exit 1 before any network activity.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    init_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let alpha = cli.zipf_alpha_hundredths as f64 / 100.0;
    let policy = Policy::from_selector(cli.distribution, alpha).ok_or_else(|| {
        format!(
            "unknown distribution selector {} (0=fixed-rate, 1=zipf, 2=uniform)",
            cli.distribution
        )
    })?;

    let mut config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };
    config.target.host = cli.host;
    config.workload.objects = cli.objects;
    config.workload.request_budget = cli.request_budget;

    tracing::info!(
        host = %config.target.host,
        policy = ?policy,
        objects = config.workload.objects,
        request_budget = config.workload.request_budget,
        duration_secs = config.general.duration.as_secs(),
        run_id = cli.run_id,
        "starting run"
    );

    let channel = Arc::new(UdpChannel::connect(
        config.target.host,
        config.target.write_port,
        config.target.read_port,
    )?);

    // Ctrl-C stops the scheduler early; the interrupted run still reports.
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let outcome = runner::run(&config, &policy, channel, running, cli.seed)?;

    report::print_summary(&outcome.summary);
    println!("COMPUTER_READABLE: {}", report::json_line(&outcome.summary)?);

    let path = report::write_csv_file(&cli.output_dir, cli.run_id, &outcome.records)?;
    tracing::info!(path = %path.display(), run_id = cli.run_id, "run complete");

    Ok(())
}
