use std::path::PathBuf;
use std::time::Duration;

use camwire_client::sink::{DEFAULT_SAVE_DIR, DEFAULT_SAVE_EVERY};
use camwire_client::transport::ConnectOptions;
use camwire_client::{SessionConfig, DEFAULT_PORT};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Largest accepted `--scale`.
pub const MAX_SCALE: u32 = 16;

fn scale_range() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(1..=i64::from(MAX_SCALE))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Receive grayscale frames from a camera stream")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Camera server port
    #[arg(long, global = true, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Connect timeout in milliseconds (0 waits for the OS)
    #[arg(long, global = true, default_value_t = 10_000)]
    pub connect_timeout_ms: u64,

    /// Fail when no data arrives for this many milliseconds (0 waits forever)
    #[arg(long, global = true)]
    pub read_timeout_ms: Option<u64>,

    /// Drop the connection if a header declares a larger payload
    #[arg(long, global = true)]
    pub max_payload: Option<u32>,

    /// Log verbosity (default: info, or debug for the debug command)
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Print a JSON run summary on stdout when the stream ends
    #[arg(long, global = true)]
    pub stats_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render the live stream in the terminal
    View {
        /// Camera host name or IP address
        host: String,

        /// Nearest-neighbour magnification (one pixel per terminal column at 1)
        #[arg(long, default_value_t = 1, value_parser = scale_range())]
        scale: u32,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Save every Nth frame as PNG
    Save {
        /// Camera host name or IP address
        host: String,

        /// Output directory
        #[arg(long, default_value = DEFAULT_SAVE_DIR)]
        dir: PathBuf,

        /// Save frames whose index is a multiple of this
        #[arg(long, default_value_t = DEFAULT_SAVE_EVERY)]
        every: u64,

        /// Stop after this many frames
        #[arg(long, default_value_t = 100)]
        max_frames: u64,

        /// Nearest-neighbour magnification of saved images
        #[arg(long, default_value_t = 1, value_parser = scale_range())]
        scale: u32,
    },

    /// Log every header field and timestamp gap
    Debug {
        /// Camera host name or IP address
        host: String,

        /// Also render frames in the terminal
        #[arg(long)]
        display: bool,

        /// Nearest-neighbour magnification when displaying
        #[arg(long, default_value_t = 1, value_parser = scale_range())]
        scale: u32,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },
}

impl Args {
    pub fn log_level(&self) -> LogLevel {
        match (self.log_level, &self.command) {
            (Some(level), _) => level,
            (None, Command::Debug { .. }) => LogLevel::Debug,
            (None, _) => LogLevel::Info,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let (host, max_frames) = match &self.command {
            Command::View {
                host, max_frames, ..
            }
            | Command::Debug {
                host, max_frames, ..
            } => (host, *max_frames),
            Command::Save {
                host, max_frames, ..
            } => (host, Some(*max_frames)),
        };

        let mut config = SessionConfig::new(host.clone()).port(self.port);
        config.max_frames = max_frames;
        config.connect = ConnectOptions {
            connect_timeout: (self.connect_timeout_ms > 0)
                .then(|| Duration::from_millis(self.connect_timeout_ms)),
            read_timeout: self
                .read_timeout_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
            ..ConnectOptions::default()
        };
        if let Some(max) = self.max_payload {
            config.max_payload_size = max;
        }
        config
    }
}
