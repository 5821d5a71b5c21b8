//! Retention configuration for the session store.

/// Default maximum number of sessions kept on disk.
pub const DEFAULT_MAX_SESSIONS: usize = 100;

/// Retention configuration, fixed for the lifetime of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Maximum number of sessions to keep before the oldest are pruned.
    pub max_sessions: usize,

    /// Whether sessions are written to disk. When false, sessions live only
    /// for the process lifetime.
    pub persistence_enabled: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            persistence_enabled: true,
        }
    }
}

impl RetentionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retained sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Enable or disable on-disk persistence.
    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persistence_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetentionConfig::default();
        assert_eq!(config.max_sessions, 100);
        assert!(config.persistence_enabled);
    }

    #[test]
    fn test_builder() {
        let config = RetentionConfig::new()
            .with_max_sessions(3)
            .with_persistence(false);
        assert_eq!(config.max_sessions, 3);
        assert!(!config.persistence_enabled);
    }
}
