// Command intake loop
// Lines arrive from stdin or a serial link (e.g. a Bluetooth SPP module), get
// parsed into commands and are executed one at a time by a single worker that
// owns the controller. A sweep blocks the worker until its last frame, so
// commands queue up behind it instead of interrupting it.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

// local imports
use crate::config::{COMMAND_QUEUE_DEPTH, ConfigError, ControllerConfig, SERIAL_TIMEOUT};
use crate::controller::Controller;
use crate::hal::{Clock, SimulatedBoard, ThreadClock, VirtualClock};
use crate::messages::{Command, Report};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to encode report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Where command lines come from
#[derive(Debug, Clone)]
pub enum Source {
    Stdin,
    Serial { port: String, baud: u32 },
}

/// Everything the runtime needs to start
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub source: Source,
    pub config_path: Option<PathBuf>,
    pub frame_count: Option<std::num::NonZeroU32>,
    pub frame_delay_ms: Option<u64>,
    /// Skip real frame delays (virtual clock)
    pub no_delay: bool,
}

impl RuntimeOptions {
    /// Config file (or defaults) with command-line overrides applied
    pub fn resolve_config(&self) -> Result<ControllerConfig, ConfigError> {
        let mut config = match &self.config_path {
            Some(path) => ControllerConfig::load(path)?,
            None => ControllerConfig::default(),
        };
        if let Some(frames) = self.frame_count {
            config.frame_count = frames;
        }
        if let Some(delay) = self.frame_delay_ms {
            config.frame_delay_ms = delay;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parse one input line; `None` for blanks, comments and bad input
pub fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.parse::<Command>() {
        Ok(cmd) => Some(cmd),
        Err(e) => {
            warn!("Failed to parse command '{}': {}", line, e);
            None
        }
    }
}

/// Parse one raw input line; lines that are not valid UTF-8 are logged and skipped
pub fn parse_bytes(bytes: &[u8]) -> Option<Command> {
    match std::str::from_utf8(bytes) {
        Ok(line) => parse_line(line),
        Err(e) => {
            warn!(
                "Skipping line with invalid UTF-8 ({}): {:?}",
                e,
                String::from_utf8_lossy(bytes)
            );
            None
        }
    }
}

/// Execute one command and describe the result
pub fn handle<C: Clock>(
    controller: &mut Controller<SimulatedBoard, C>,
    command: Command,
) -> Report {
    info!("Received command: {:?}", &command);
    let outcome = controller.execute(&command);
    Report {
        command,
        outcome,
        board: controller.sink().state(),
    }
}

pub async fn run(options: RuntimeOptions) -> Result<(), RuntimeError> {
    let config = options.resolve_config()?;
    let (tx, rx) = mpsc::channel::<Command>(COMMAND_QUEUE_DEPTH);

    let board = SimulatedBoard::new(config.servo_home);
    let worker = if options.no_delay {
        info!("Frame delays disabled (virtual clock)");
        let controller = Controller::new(board, VirtualClock::default(), config);
        tokio::task::spawn_blocking(move || work(controller, rx))
    } else {
        let controller = Controller::new(board, ThreadClock, config);
        tokio::task::spawn_blocking(move || work(controller, rx))
    };

    let intake = match &options.source {
        Source::Stdin => {
            info!("Reading commands from stdin");
            read_lines(tokio::io::BufReader::new(tokio::io::stdin()), tx).await
        }
        Source::Serial { port, baud } => read_serial(port, *baud, tx).await,
    };

    // Sender dropped: the worker drains what is queued and exits
    let drained = worker.await;
    intake?;
    drained??;
    info!("Input closed, runtime stopped");
    Ok(())
}

async fn read_lines<R: AsyncBufRead + Unpin>(
    reader: R,
    tx: mpsc::Sender<Command>,
) -> Result<(), RuntimeError> {
    let mut lines = reader.split(b'\n');
    while let Some(line) = lines.next_segment().await? {
        if let Some(cmd) = parse_bytes(&line) {
            if tx.send(cmd).await.is_err() {
                break;
            }
        }
    }
    Ok(())
}

async fn read_serial(
    port: &str,
    baud: u32,
    tx: mpsc::Sender<Command>,
) -> Result<(), RuntimeError> {
    info!("Opening serial port {} at {} baud", port, baud);
    let serial = serialport::new(port, baud).timeout(SERIAL_TIMEOUT).open()?;
    tokio::task::spawn_blocking(move || read_lines_blocking(BufReader::new(serial), tx)).await?
}

fn read_lines_blocking<R: BufRead>(
    mut reader: R,
    tx: mpsc::Sender<Command>,
) -> Result<(), RuntimeError> {
    let mut line = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                // EOF after a timeout may leave an unterminated line behind
                if let Some(cmd) = parse_bytes(&line) {
                    let _ = tx.blocking_send(cmd);
                }
                return Ok(());
            }
            Ok(_) => {
                if let Some(cmd) = parse_bytes(&line) {
                    if tx.blocking_send(cmd).is_err() {
                        return Ok(());
                    }
                }
                line.clear();
            }
            // No input within the port timeout; keep any partial line
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Worker loop: strictly one command at a time
fn work<C: Clock>(
    mut controller: Controller<SimulatedBoard, C>,
    mut rx: mpsc::Receiver<Command>,
) -> Result<(), RuntimeError> {
    while let Some(command) = rx.blocking_recv() {
        let report = handle(&mut controller, command);
        if !report.outcome.is_applied() {
            info!("Command had no effect: {:?}", report.outcome);
        }
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(())
}
