//! Logging setup.
//!
//! Builds a `tracing` subscriber from configuration: one stdout layer plus
//! an optional rolling file layer. File rotation is handled entirely by the
//! appender, so no signal-driven reopening is needed.

use std::{io, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt,
    layer::{Layer, SubscriberExt},
    registry::{LookupSpan, Registry},
    util::SubscriberInitExt,
};

/// Error type used in logging configuration.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Log destination I/O error.
    #[error("log destination I/O error: {0}")]
    Io(#[from] io::Error),
    /// Error while initializing the rolling file writer.
    #[error("error while initializing log file writer: {0}")]
    File(#[from] tracing_appender::rolling::InitError),
    /// Subscriber was already installed.
    #[error("unable to install logging subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Minimum severity level to include in output.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    /// Everything, including per-scrape plumbing.
    Trace,
    /// Pool and collector diagnostics.
    Debug,
    /// Normal operational messages.
    #[default]
    Info,
    /// Problems the exporter recovered from.
    Warn,
    /// Failures.
    Error,
}

impl From<LoggingLevel> for LevelFilter {
    fn from(level: LoggingLevel) -> Self {
        match level {
            LoggingLevel::Trace => LevelFilter::TRACE,
            LoggingLevel::Debug => LevelFilter::DEBUG,
            LoggingLevel::Info => LevelFilter::INFO,
            LoggingLevel::Warn => LevelFilter::WARN,
            LoggingLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Overall format for logging output.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFormat {
    /// Default human-readable single-line format.
    #[default]
    Full,
    /// Shorter single-line format.
    Compact,
    /// Multi-line format for development.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Log file destination.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogFileConfig {
    /// Directory the log files are written into.
    pub directory: PathBuf,
    /// Prefix for log file names.
    #[serde(default = "LogFileConfig::default_prefix")]
    pub file_name_prefix: String,
    /// How often a new log file is started.
    #[serde(default)]
    pub rotation: LogRotation,
    /// Format of the file output; defaults to the stdout format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<LoggingFormat>,
}

impl LogFileConfig {
    /// Default value for [`Self::file_name_prefix`].
    #[must_use]
    #[inline]
    fn default_prefix() -> String {
        "ds389-exporter.log".into()
    }
}

/// Log file rotation schedule.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// One file per day.
    #[default]
    Daily,
    /// One file per hour.
    Hourly,
    /// A single file, never rotated.
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum severity level to include in output.
    #[serde(default)]
    pub level: LoggingLevel,
    /// Format of the stdout output.
    #[serde(default)]
    pub format: LoggingFormat,
    /// Use ANSI escape sequences for output colors.
    #[serde(default)]
    pub color: bool,
    /// Optional log file destination, written in addition to stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<LogFileConfig>,
}

impl LoggingConfig {
    /// Install the global subscriber built from this configuration.
    ///
    /// The returned guards flush buffered log lines on drop and must be
    /// kept alive for the lifetime of the process.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file writer cannot be initialized or a global
    /// subscriber is already installed.
    pub fn init(&self) -> Result<Vec<WorkerGuard>, LoggingError> {
        let mut layers: Vec<Box<dyn Layer<_> + Send + Sync>> = Vec::new();
        let mut guards = Vec::new();

        let (stdout, guard) = tracing_appender::non_blocking(io::stdout());
        guards.push(guard);
        layers.push(fmt_layer(self.format, stdout, self.color));

        if let Some(file_cfg) = &self.file {
            let appender = RollingFileAppender::builder()
                .rotation(file_cfg.rotation.into())
                .filename_prefix(&file_cfg.file_name_prefix)
                .build(&file_cfg.directory)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            layers.push(fmt_layer(file_cfg.format.unwrap_or(self.format), writer, false));
        }

        Registry::default()
            .with(LevelFilter::from(self.level))
            .with(layers)
            .try_init()?;
        Ok(guards)
    }
}

/// Build one fmt layer in the requested output format.
fn fmt_layer<S>(
    format: LoggingFormat,
    writer: NonBlocking,
    color: bool,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let base = fmt::layer().with_writer(writer).with_ansi(color);
    match format {
        LoggingFormat::Full => base.boxed(),
        LoggingFormat::Compact => base.compact().boxed(),
        LoggingFormat::Pretty => base.pretty().boxed(),
        LoggingFormat::Json => base.json().boxed(),
    }
}
