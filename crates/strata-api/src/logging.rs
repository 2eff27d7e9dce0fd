//! Logging configuration for Strata
//!
//! The storage crates only emit `tracing` events: segment completion and
//! cursor opening at `debug`, page and overflow-chain writes at `trace`,
//! rejected page references at `warn`. This module installs a subscriber
//! that routes them to stdout, a daily-rotated file, or both.

use std::path::{Path, PathBuf};

use strata_core::{Error, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default log file name when the configured path has none
const DEFAULT_LOG_FILE: &str = "strata.log";

/// Log output destination
#[derive(Debug, Clone)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a file with rotation
    File(PathBuf),
    /// Output to both stdout and file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// Human-readable multi-line format
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `strata_storage=trace`
    pub level: String,
    /// Output destination
    pub output: LogOutput,
    /// Format style
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Create config with info level and stdout output
    pub fn info() -> Self {
        Self::default()
    }

    /// Create config with debug level
    pub fn debug() -> Self {
        Self::default().with_level("debug")
    }

    /// Create config with warn level
    pub fn warn() -> Self {
        Self::default().with_level("warn")
    }

    /// Trace every page the storage layer writes
    pub fn pages() -> Self {
        Self::default()
            .with_level("info,strata_storage=trace")
            .with_format(LogFormat::Compact)
    }

    /// Set log output to file with rotation
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Set log output to both stdout and file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set log level filter
    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    /// Initialize global logging with this configuration
    ///
    /// `RUST_LOG` overrides the configured level when set. Returns a guard
    /// that must be kept alive while logging to a file; dropping it
    /// flushes and stops the writer thread.
    ///
    /// Fails if the filter does not parse or a global subscriber is
    /// already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use strata::logging::LogConfig;
    ///
    /// // Keep the guard alive for the lifetime of your application
    /// let _guard = LogConfig::info().init()?;
    /// # Ok::<(), strata::Error>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| Error::InvalidOperation(format!("invalid log filter: {}", e)))?;
        let registry = tracing_subscriber::registry().with(env_filter);

        let (result, guard) = match self.output {
            LogOutput::Stdout => {
                let result = match self.format {
                    LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
                    LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                };
                (result, None)
            }
            LogOutput::File(path) => {
                let (writer, guard) = tracing_appender::non_blocking(file_appender(&path));
                let result = match self.format {
                    LogFormat::Pretty => registry
                        .with(fmt::layer().with_writer(writer).with_ansi(false).pretty())
                        .try_init(),
                    LogFormat::Compact => registry
                        .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                        .try_init(),
                };
                (result, Some(guard))
            }
            LogOutput::Both(path) => {
                let (writer, guard) = tracing_appender::non_blocking(file_appender(&path));
                // one format for both sinks keeps the layer types unboxed
                let result = registry
                    .with(fmt::layer().compact())
                    .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                    .try_init();
                (result, Some(guard))
            }
        };

        result.map_err(|e| Error::InvalidOperation(format!("logging already initialized: {}", e)))?;
        Ok(guard)
    }
}

fn file_appender(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    tracing_appender::rolling::daily(
        path.parent().unwrap_or_else(|| Path::new(".")),
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_LOG_FILE),
    )
}
