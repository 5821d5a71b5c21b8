//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Model client error.
    #[error("LLM error: {0}")]
    Llm(#[from] skiff_llm::LlmError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Tool not found in registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid tool parameters.
    #[error("Invalid tool parameters: {0}")]
    InvalidToolParams(String),

    /// A resource, log or documentation collaborator failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// No log destination strategy for a service/type pair.
    #[error(
        "Log tailing is not supported for {service}/{resource_type}. Supported: {}",
        .supported.join(", ")
    )]
    UnsupportedLogSource {
        service: String,
        resource_type: String,
        /// Supported `service/type` keys, sorted.
        supported: Vec<String>,
    },

    /// Session store error.
    #[error("Session error: {0}")]
    Session(#[from] skiff_session::SessionError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The turn was cancelled.
    #[error("Task cancelled")]
    Cancelled,
}

impl AgentError {
    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a collaborator error.
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
