//! Config directory discovery and file loading.
//!
//! The config directory is `SKIFF_CONFIG_DIR` when set, otherwise the
//! platform config dir joined with `skiff` (`~/.config/skiff` on Linux).
//! It holds `config.toml`, the `chat/` session store, and `logs/`.

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, SkiffConfig};

/// Config filename within the config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for directory resolution.
const APP_NAME: &str = "skiff";

/// Environment variable to override the config directory.
pub const CONFIG_DIR_ENV: &str = "SKIFF_CONFIG_DIR";

/// Where the config was looked for.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The loaded configuration, defaults when no file was read.
    pub config: SkiffConfig,
    /// Directory the config was resolved against.
    pub config_dir: PathBuf,
    /// The file that was checked.
    pub source: ConfigSource,
    /// Problems that did not stop loading (e.g., a malformed file).
    pub warnings: Vec<String>,
}

/// Load configuration from the default config directory.
///
/// A missing file yields defaults. A malformed file also yields defaults,
/// with a warning recorded.
pub fn load_config() -> Result<LoadedConfig> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    load_config_from(&dir)
}

/// Load configuration from an explicit config directory.
pub fn load_config_from(config_dir: &Path) -> Result<LoadedConfig> {
    let path = config_dir.join(USER_CONFIG_FILE);
    let mut warnings = Vec::new();

    let (config, loaded) = if path.is_file() {
        match load_config_file(&path) {
            Ok(config) => (config, true),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                warnings.push(format!("Failed to load {}: {}", path.display(), e));
                (SkiffConfig::default(), false)
            }
        }
    } else {
        (SkiffConfig::default(), false)
    };

    tracing::debug!(path = %path.display(), loaded, "Resolved config");

    Ok(LoadedConfig {
        config,
        config_dir: config_dir.to_path_buf(),
        source: ConfigSource { path, loaded },
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<SkiffConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    SkiffConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &SkiffConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Get the config directory for skiff.
///
/// Checks `SKIFF_CONFIG_DIR` first, then falls back to the platform default.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the path of the user config file.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the directory rolling log files are written to.
pub fn log_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("logs"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_path_shape() {
        if let Some(p) = config_path() {
            assert!(p.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[llm]\nmodel = \"claude-haiku-4-5\"\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.model(), "claude-haiku-4-5");
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_from_missing_dir_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config_from(&dir.path().join("absent")).unwrap();
        assert!(!loaded.source.loaded);
        assert_eq!(loaded.config, SkiffConfig::default());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_malformed_config_warns_but_continues() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "not valid toml {{{{").unwrap();

        let loaded = load_config_from(dir.path()).unwrap();
        assert!(!loaded.source.loaded);
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let config = SkiffConfig::from_toml("[chat]\nmax_sessions = 12").unwrap();

        save_config(&config, &path).unwrap();
        let loaded = load_config_from(&dir.path().join("nested")).unwrap();
        assert!(loaded.source.loaded);
        assert_eq!(loaded.config.max_sessions(), 12);
    }
}
