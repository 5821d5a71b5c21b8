//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [llm]
//! model = "claude-sonnet-4-5"
//! max_tokens = 8192
//! temperature = 0.2
//! thinking_budget = 4096
//! base_url = "https://api.anthropic.com"
//!
//! [chat]
//! max_sessions = 100
//! persistence_enabled = true
//! max_iterations = 10
//! system_prompt = "..."
//! ```

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Default cap on output tokens per turn.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Default number of sessions kept on disk.
pub const DEFAULT_MAX_SESSIONS: usize = 100;

/// Default cap on model turns per user message.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that a partial file loads; accessors fill in
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkiffConfig {
    /// Model client settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    /// Assistant session and loop settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatConfig>,
}

impl SkiffConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: SkiffConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: SkiffConfig) {
        if let Some(top) = other.llm {
            self.llm = Some(match self.llm.take() {
                Some(mut base) => {
                    base.merge(top);
                    base
                }
                None => top,
            });
        }
        if let Some(top) = other.chat {
            self.chat = Some(match self.chat.take() {
                Some(mut base) => {
                    base.merge(top);
                    base
                }
                None => top,
            });
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some(llm) = &self.llm {
            llm.validate()?;
        }
        if let Some(chat) = &self.chat {
            chat.validate()?;
        }
        Ok(())
    }

    pub fn model(&self) -> &str {
        self.llm
            .as_ref()
            .and_then(|l| l.model.as_deref())
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn max_tokens(&self) -> u32 {
        self.llm
            .as_ref()
            .and_then(|l| l.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn temperature(&self) -> Option<f32> {
        self.llm.as_ref().and_then(|l| l.temperature)
    }

    pub fn thinking_budget(&self) -> Option<u32> {
        self.llm.as_ref().and_then(|l| l.thinking_budget)
    }

    pub fn base_url(&self) -> Option<&str> {
        self.llm.as_ref().and_then(|l| l.base_url.as_deref())
    }

    pub fn max_sessions(&self) -> usize {
        self.chat
            .as_ref()
            .and_then(|c| c.max_sessions)
            .unwrap_or(DEFAULT_MAX_SESSIONS)
    }

    pub fn persistence_enabled(&self) -> bool {
        self.chat
            .as_ref()
            .and_then(|c| c.persistence_enabled)
            .unwrap_or(true)
    }

    pub fn max_iterations(&self) -> u32 {
        self.chat
            .as_ref()
            .and_then(|c| c.max_iterations)
            .unwrap_or(DEFAULT_MAX_ITERATIONS)
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.chat.as_ref().and_then(|c| c.system_prompt.as_deref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Section
// ─────────────────────────────────────────────────────────────────────────────

/// `[llm]` section. The API key is never stored here; it comes from
/// `ANTHROPIC_API_KEY`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Extended reasoning budget in tokens; ignored for models without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl LlmConfig {
    fn merge(&mut self, other: LlmConfig) {
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.max_tokens.is_some() {
            self.max_tokens = other.max_tokens;
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.thinking_budget.is_some() {
            self.thinking_budget = other.thinking_budget;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_tokens == Some(0) {
            return Err(invalid("llm.max_tokens", "must be greater than zero"));
        }
        if let Some(t) = self.temperature
            && !(0.0..=1.0).contains(&t)
        {
            return Err(invalid("llm.temperature", "must be between 0.0 and 1.0"));
        }
        if matches!(self.model.as_deref(), Some("")) {
            return Err(invalid("llm.model", "must not be empty"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Section
// ─────────────────────────────────────────────────────────────────────────────

/// `[chat]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_enabled: Option<bool>,
    /// Model turns allowed per user message before the loop stops.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ChatConfig {
    fn merge(&mut self, other: ChatConfig) {
        if other.max_sessions.is_some() {
            self.max_sessions = other.max_sessions;
        }
        if other.persistence_enabled.is_some() {
            self.persistence_enabled = other.persistence_enabled;
        }
        if other.max_iterations.is_some() {
            self.max_iterations = other.max_iterations;
        }
        if other.system_prompt.is_some() {
            self.system_prompt = other.system_prompt;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_iterations == Some(0) {
            return Err(invalid("chat.max_iterations", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
