//! Tracing subscriber setup for host binaries.
//!
//! Installs a human-readable console layer and a daily-rolling JSON file
//! layer under `<config>/logs`.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::{ConfigError, Result};

const LOG_FILE_PREFIX: &str = "skiff.log";

const CONSOLE_FILTER: &str = "skiff_agent=info,skiff_llm=info,skiff_session=info,skiff_config=info,warn";
const CONSOLE_FILTER_VERBOSE: &str =
    "skiff_agent=debug,skiff_llm=debug,skiff_session=debug,skiff_config=debug,info";
const FILE_FILTER: &str =
    "skiff_agent=trace,skiff_llm=trace,skiff_session=trace,skiff_config=trace,info";

/// Options for [`init_logging`].
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Log debug output to the console.
    pub verbose: bool,
    /// Skip the console layer, e.g. while a full-screen UI owns the terminal.
    pub file_only: bool,
    /// Override the log directory. Defaults to `<config>/logs`.
    pub log_dir: Option<PathBuf>,
}

impl LoggingOptions {
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn file_only(mut self, file_only: bool) -> Self {
        self.file_only = file_only;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Console filter directive. `RUST_LOG` wins when set.
    fn console_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if self.verbose {
                CONSOLE_FILTER_VERBOSE
            } else {
                CONSOLE_FILTER
            })
        })
    }

    fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .or_else(crate::discovery::log_dir)
            .unwrap_or_else(|| PathBuf::from("logs"))
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; hold it for the life
/// of the process.
pub fn init_logging(options: &LoggingOptions) -> Result<WorkerGuard> {
    let log_dir = options.resolved_log_dir();
    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new(FILE_FILTER));

    let console_layer = (!options.file_only).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(options.console_filter())
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing::debug!(log_dir = %log_dir.display(), "Logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = LoggingOptions::default()
            .verbose(true)
            .file_only(true)
            .with_log_dir("/tmp/skiff-logs");
        assert!(options.verbose);
        assert!(options.file_only);
        assert_eq!(options.resolved_log_dir(), PathBuf::from("/tmp/skiff-logs"));
    }

    #[test]
    fn test_init_logging_twice_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let options = LoggingOptions::default()
            .file_only(true)
            .with_log_dir(dir.path());

        let first = init_logging(&options);
        assert!(first.is_ok());
        tracing::info!("written to the rolling file");
        assert!(matches!(init_logging(&options), Err(ConfigError::Logging(_))));
    }
}
