//! Configuration system for Skiff.
//!
//! Provides:
//! - TOML configuration (`[llm]`, `[chat]`) loaded from the per-user config
//!   directory, with defaults for anything unset
//! - Config directory discovery (`SKIFF_CONFIG_DIR` or the platform default)
//! - Tracing subscriber setup with console and rolling JSON file output

pub mod discovery;
pub mod error;
pub mod logging;
pub mod types;

pub use discovery::{
    CONFIG_DIR_ENV, ConfigSource, LoadedConfig, config_dir, config_path, load_config,
    load_config_file, load_config_from, log_dir, save_config,
};
pub use error::{ConfigError, Result};
pub use logging::{LoggingOptions, init_logging};
pub use types::*;
