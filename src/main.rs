use std::num::NonZeroU32;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use boxz_runtime::config::DEFAULT_BAUDRATE;
use boxz_runtime::runtime::{RuntimeOptions, Source};

/// BOXZ motion runtime: reads one command per line and drives a simulated board
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Serial port to read commands from (stdin when omitted)
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    baud: u32,

    /// JSON controller config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Servo interpolation frames per move
    #[arg(long)]
    frames: Option<NonZeroU32>,

    /// Delay after each servo frame, in milliseconds
    #[arg(long)]
    frame_delay_ms: Option<u64>,

    /// Run sweeps in virtual time instead of sleeping
    #[arg(long)]
    no_delay: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug); stdout is reserved for reports
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let source = match args.port {
        Some(port) => Source::Serial {
            port,
            baud: args.baud,
        },
        None => Source::Stdin,
    };
    let options = RuntimeOptions {
        source,
        config_path: args.config,
        frame_count: args.frames,
        frame_delay_ms: args.frame_delay_ms,
        no_delay: args.no_delay,
    };

    if let Err(e) = boxz_runtime::runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
