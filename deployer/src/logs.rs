//! Logging configuration
//!
//! Every event goes to two sinks: the terminal and an append-only run log
//! whose file name is stamped with the process start time.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::DeployError;

/// Log level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level
    pub log_level: LogLevel,

    /// Mirror events to the terminal
    pub stdout: bool,

    /// Directory holding run logs
    pub log_dir: PathBuf,

    /// Process start time, used to name the run log
    pub started_at: DateTime<Local>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            stdout: true,
            log_dir: PathBuf::from("logs"),
            started_at: Local::now(),
        }
    }
}

/// Handle on the active run log
///
/// Dropping it flushes pending lines, so keep it alive until the process is
/// about to exit.
pub struct RunLog {
    path: PathBuf,
    _guard: WorkerGuard,
}

impl RunLog {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// File name of the run log for a given start time
pub fn run_log_name(started_at: &DateTime<Local>) -> String {
    format!("medideploy-{}.log", started_at.format("%Y%m%d-%H%M%S"))
}

/// Initialize logging
pub fn init_logging(options: LogOptions) -> Result<RunLog, DeployError> {
    std::fs::create_dir_all(&options.log_dir)?;

    let file_name = run_log_name(&options.started_at);
    let path = options.log_dir.join(&file_name);

    let appender = tracing_appender::rolling::never(&options.log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.to_filter_string()));

    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
    let stdout_layer = options
        .stdout
        .then(|| fmt::layer().with_target(false).without_time());

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| DeployError::ConfigError(e.to_string()))?;

    Ok(RunLog {
        path,
        _guard: guard,
    })
}
