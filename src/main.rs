//! linetap: capture sentinel-delimited measurement records from a serial stream.
//!
//! Each appended record is printed to stdout as one JSON object; diagnostics
//! go to stderr (and the log file when a log directory is configured).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use linetap_lib::error::{SessionError, SettingsError, TransportError};
use linetap_lib::io::{PacingPolicy, ReaderSource, StreamEndReason};
use linetap_lib::logging::{init_file_logging, stop_file_logging};
use linetap_lib::settings::{default_settings_path, load_settings, Settings};
use linetap_lib::tlog;
use linetap_lib::{DecodedSeries, JsonLinesSink, SessionConfig, SessionHandle, SessionSummary};

#[derive(Parser)]
#[command(name = "linetap")]
#[command(about = "Capture sentinel-delimited measurement records from a serial stream")]
struct Args {
    /// Settings file (default: <config dir>/linetap/linetap.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Records to collect before stopping
    #[arg(short = 'n', long, global = true)]
    number: Option<usize>,

    /// Directory for log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read records from a serial port
    Read {
        /// Serial port, e.g. /dev/ttyUSB0 or COM3
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,
    },
    /// Replay a captured byte stream from a file
    Replay {
        file: PathBuf,

        /// Bytes handed to the framer per read
        #[arg(long, default_value = "256")]
        chunk_size: usize,
    },
}

fn load(args: &Args) -> Result<Settings, SettingsError> {
    let path = args.config.clone().or_else(default_settings_path);
    let mut settings = match path {
        Some(path) => load_settings(&path)?,
        None => Settings::default(),
    };

    if let Some(number) = args.number {
        settings.target_count = number;
    }
    if let Some(dir) = &args.log_dir {
        settings.log_dir = Some(dir.clone());
    }
    if let Command::Read { port, baud } = &args.command {
        if let Some(port) = port {
            settings.port = Some(port.clone());
        }
        if let Some(baud) = baud {
            settings.baud_rate = *baud;
        }
    }

    settings.validate()?;
    Ok(settings)
}

type CliSink = JsonLinesSink<std::io::Stdout, DecodedSeries>;

fn start(command: Command, settings: &Settings) -> Result<SessionHandle<CliSink>, SessionError> {
    let sink = JsonLinesSink::new(std::io::stdout(), DecodedSeries::new());
    let config = settings.session_config();

    match command {
        #[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
        Command::Read { .. } => {
            let serial = settings.serial_config().ok_or_else(|| {
                SettingsError::Invalid(
                    "no serial port given (use --port or set `port` in the settings file)".to_string(),
                )
            })?;
            let source = linetap_lib::io::serial::SerialSource::open(&serial)?;
            Ok(SessionHandle::spawn(source, sink, config))
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        Command::Read { .. } => Err(SettingsError::Invalid(
            "serial ports are not supported on this platform".to_string(),
        )
        .into()),
        Command::Replay { file, chunk_size } => {
            let reader = std::fs::File::open(&file).map_err(TransportError::Io)?;
            let source =
                ReaderSource::with_chunk_size(reader, file.display().to_string(), chunk_size);
            // A file never idles, so pacing would only slow the replay down
            let config = SessionConfig {
                pacing: PacingPolicy::Immediate,
                ..config
            };
            Ok(SessionHandle::spawn(source, sink, config))
        }
    }
}

async fn run(args: Args) -> Result<SessionSummary, SessionError> {
    let settings = load(&args)?;

    if let Some(dir) = &settings.log_dir {
        if let Err(e) = init_file_logging(dir) {
            tlog!("[linetap] {}", e);
        }
    }

    let handle = start(args.command, &settings)?;

    let cancel = handle.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tlog!("[linetap] Stop requested");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let report = handle.join().await?;
    Ok(report.summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let result = run(args).await;
    let code = match &result {
        Ok(summary) => {
            match serde_json::to_string(summary) {
                Ok(json) => tlog!("[linetap] Summary: {}", json),
                Err(e) => tlog!("[linetap] Summary unavailable: {}", e),
            }
            if summary.reason == StreamEndReason::Error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tlog!("[linetap] {}", e);
            ExitCode::FAILURE
        }
    };

    stop_file_logging();
    code
}
