//! `leakprobe` binary: run the protocol against the tracking heap.
//!
//! Prints `SUCCEEDED` on stdout and exits 0 when every checkpoint passes.
//! Otherwise prints the diagnostic on stderr and exits with the
//! [`RunStatus`] code.

use std::process;

use clap::Parser;
use leakprobe::heap::{HeapConfig, HeapProvider};
use leakprobe::harness::ProtocolConfig;
use leakprobe::{run_protocol, RunStatus};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "leakprobe")]
#[command(about = "Drive a fixed allocation lifecycle against a leak-finding heap")]
#[command(version)]
struct Args {
    /// Number of slots in the handle table
    #[arg(long, env = "LEAKPROBE_SLOTS", default_value_t = ProtocolConfig::DEFAULT_SLOT_COUNT)]
    slots: usize,

    /// Upper bound on live heap bytes
    #[arg(long, env = "LEAKPROBE_HEAP_CAPACITY", default_value_t = HeapConfig::DEFAULT_CAPACITY_BYTES)]
    heap_capacity: usize,

    /// Log level for leakprobe crates (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() {
                RunStatus::ConfigError.code()
            } else {
                0
            };
            process::exit(code);
        }
    };

    let level = args
        .log_level
        .parse::<Level>()
        .unwrap_or(Level::INFO)
        .as_str()
        .to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "leakprobe={level},leakprobe_core={level},leakprobe_heap={level},leakprobe_harness={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("leakprobe v{} starting", env!("CARGO_PKG_VERSION"));

    let provider = match HeapProvider::new(HeapConfig::new(args.heap_capacity)) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("invalid heap config: {e}");
            process::exit(RunStatus::from(&e).code());
        }
    };

    let outcome = run_protocol(provider, ProtocolConfig::new(args.slots));
    match outcome.diagnostic() {
        None => println!("SUCCEEDED"),
        Some(diagnostic) => eprintln!("{diagnostic}"),
    }
    process::exit(outcome.status.code());
}
