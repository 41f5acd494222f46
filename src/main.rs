//! voq-sched - Binary Entry Point
//!
//! Runs every scheduler against the same Bernoulli uniform traffic and logs
//! throughput, backlog, and the schedule trace root of each run.
//!
//! ```bash
//! # Defaults: 16 ports, load 0.8, 10_000 slots
//! RUST_LOG=info cargo run --release
//!
//! # Custom: ports, load, slots
//! RUST_LOG=debug cargo run --release -- 32 0.95 20000
//! ```

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voq_sched::{Schedule, ScheduleTrace, SchedulerConfig, SchedulerKind, VoqMatrix};

const SEED: u64 = 42;

/// Offered load per input: a probability in [0, 1]
fn parse_load(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("Invalid load: {}", s))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("Load must be between 0.0 and 1.0: {}", s));
    }
    Ok(value)
}

#[derive(Parser, Debug)]
#[command(name = "voq-sched", about = "Uniform traffic run over every scheduler")]
struct Args {
    /// Switch size N
    #[arg(default_value_t = 16)]
    ports: usize,

    /// Bernoulli arrival probability per input per slot
    #[arg(default_value_t = 0.8, value_parser = parse_load)]
    load: f64,

    /// Number of time slots to simulate
    #[arg(default_value_t = 10_000)]
    slots: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Args { ports, load, slots } = Args::parse();
    info!(ports, load, slots, seed = SEED, "starting uniform traffic run");

    let config = SchedulerConfig::new(ports).with_seed(SEED);
    for kind in SchedulerKind::ALL {
        let mut scheduler = match config.build(kind) {
            Ok(scheduler) => scheduler,
            Err(err) => {
                warn!(%kind, error = %err, "skipping scheduler");
                continue;
            }
        };

        let mut traffic = ChaCha8Rng::seed_from_u64(SEED);
        let mut voqs = VoqMatrix::new(ports);
        let mut schedule = Schedule::new(ports);
        let mut trace = ScheduleTrace::new();
        let (mut arrived, mut departed) = (0usize, 0usize);

        for _ in 0..slots {
            voqs.begin_slot();
            for i in 0..ports {
                if traffic.gen_bool(load) {
                    voqs.enqueue(i, traffic.gen_range(0..ports));
                    arrived += 1;
                }
            }
            scheduler.run(&voqs, &mut schedule);
            trace.record(&schedule, &voqs);
            departed += voqs.depart(&schedule);
        }

        info!(
            %kind,
            arrived,
            departed,
            throughput = departed as f64 / (slots * ports).max(1) as f64,
            backlog = voqs.total_backlog(),
            mean_matched = trace.mean_matched_ports().unwrap_or(0.0),
            root = %trace.root_hex(),
            "run complete"
        );
    }
}
