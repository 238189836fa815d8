//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gaze-sync - pair mirrored phone video frames with eye-tracker gaze samples
#[derive(Parser, Debug)]
#[command(
    name = "gaze-sync",
    author,
    version,
    about = "Screen-mirror and gaze synchronization pipeline",
    long_about = "Mirrors an Android device over adb, receives gaze samples from an eye tracker,\n\
                  translates both onto the local clock and pairs every video frame with the\n\
                  gaze sample closest in time. Pairs are dispatched to configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "GAZE_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "GAZE_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream, synchronize and dispatch pairs
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),

    /// List devices known to the adb server
    Devices(DevicesArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "GAZE_SYNC_CONFIG")]
    pub config: PathBuf,

    /// Use an in-memory device and synthetic gaze instead of real hardware
    #[arg(long, env = "GAZE_SYNC_MOCK")]
    pub mock: bool,

    /// Frames the mock device sends before closing the stream
    #[arg(long, default_value = "300", requires = "mock")]
    pub mock_frames: usize,

    /// Frame rate of the mock device
    #[arg(long, default_value = "30", requires = "mock")]
    pub mock_fps: u32,

    /// Device serial (overrides the configuration)
    #[arg(short, long, env = "ANDROID_SERIAL")]
    pub serial: Option<String>,

    /// Index into the online device list (overrides the configuration)
    #[arg(short = 'd', long, conflicts_with = "serial")]
    pub device_index: Option<usize>,

    /// Stop after this many pairs (0 = unlimited)
    #[arg(long, default_value = "0", env = "GAZE_SYNC_MAX_PAIRS")]
    pub max_pairs: u64,

    /// Stop after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "GAZE_SYNC_TIMEOUT")]
    pub timeout: u64,

    /// Also write the coded video stream to this Annex-B file
    #[arg(long, env = "GAZE_SYNC_RECORD")]
    pub record: Option<PathBuf>,

    /// Capacity of the channel between the polling loop and the dispatcher
    #[arg(long, default_value = "100", env = "GAZE_SYNC_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "GAZE_SYNC_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without streaming
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long, conflicts_with = "toml")]
    pub json: bool,

    /// Print the effective configuration, defaults filled in, as TOML
    #[arg(long)]
    pub toml: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Arguments for the `devices` command
#[derive(Parser, Debug)]
pub struct DevicesArgs {
    /// adb server host
    #[arg(long, default_value = mirror_client::DEFAULT_ADB_HOST, env = "ADB_SERVER_HOST")]
    pub adb_host: String,

    /// adb server port
    #[arg(long, default_value_t = mirror_client::DEFAULT_ADB_PORT, env = "ADB_SERVER_PORT")]
    pub adb_port: u16,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
