//! # LiteCNC HAL Binary
//!
//! Runs the read/write cycle of one LiteCNC FPGA board at the configured
//! period.
//!
//! # Usage
//!
//! ```bash
//! # Run against the simulated board
//! litecnc_hal --config config/board.toml --simulate
//!
//! # Run 10000 cycles with verbose logging
//! litecnc_hal -c config/board.toml -s --cycles 10000 -v
//!
//! # JSON logs
//! litecnc_hal -c config/board.toml -s --json
//! ```

use clap::Parser;
use litecnc_common::consts::DEFAULT_CONFIG_PATH;
use litecnc_common::hal::config::BoardConfig;
use litecnc_hal::core::HalCore;
use litecnc_hal::transport_registry::TransportRegistry;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// LiteCNC HAL - real-time cycle for LiteCNC FPGA boards
#[derive(Parser, Debug)]
#[command(name = "litecnc_hal")]
#[command(version)]
#[command(about = "Real-time read/write cycle for LiteCNC FPGA boards")]
#[command(long_about = None)]
struct Args {
    /// Path to the board configuration file (TOML, or JSON by extension)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use the simulated board (exclusive - ignores --transport)
    #[arg(short = 's', long)]
    simulate: bool,

    /// Transport to use
    #[arg(short, long, default_value = "simulation")]
    transport: String,

    /// Stop after this many cycles (default: run until Ctrl-C)
    #[arg(long)]
    cycles: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("HAL startup failed: {}", e);
        eprintln!("litecnc_hal: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // The log level lives in the config file, so load it before tracing is up.
    let config = HalCore::load_config(&args.config)?;
    setup_tracing(&args, &config);

    info!("LiteCNC HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    let transport_name = if args.simulate {
        info!("Simulation mode enabled (exclusive)");
        "simulation"
    } else {
        args.transport.as_str()
    };

    let registry = TransportRegistry::with_builtin();
    let mut hal_core = HalCore::new(config)?;

    let running = hal_core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    hal_core.init(&registry, transport_name)?;

    if let Err(e) = hal_core.run(args.cycles) {
        error!("RT loop error: {}", e);
    }

    hal_core.shutdown();

    let stats = hal_core.stats();
    info!(
        "LiteCNC HAL shutdown complete: {} cycles, avg={}us, max={}us",
        stats.cycle_count,
        stats.avg_cycle_time_us(),
        stats.max_cycle_time_us
    );
    Ok(())
}

/// Setup tracing subscriber from the CLI flags and the configured level.
fn setup_tracing(args: &Args, config: &BoardConfig) {
    let directive = if args.verbose {
        "debug"
    } else {
        config.log_level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
