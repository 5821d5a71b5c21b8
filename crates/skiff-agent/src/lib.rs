//! Conversation loop and tools for the Skiff assistant.
//!
//! This crate drives a conversation: it streams model turns through
//! `skiff-llm`, answers tool calls with read-only AWS capabilities, and
//! records every message in a `skiff-session` store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Conversation                                               │
//! │  - Streams one model turn at a time                         │
//! │  - Runs tool calls sequentially, in emission order          │
//! │  - Appends every message to the session store               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┼────────────────┐
//!              ▼               ▼                ▼
//!      ┌───────────────┐ ┌──────────────┐ ┌───────────────┐
//!      │StreamingClient│ │ ToolRegistry │ │ SessionStore  │
//!      │  (skiff-llm)  │ │  5 tools     │ │(skiff-session)│
//!      └───────────────┘ └──────────────┘ └───────────────┘
//!                              │
//!              ┌───────────────┼────────────────┐
//!              ▼               ▼                ▼
//!       ResourceQuery      LogSearch       DocSearch
//!                      (LogResolverRegistry)
//! ```

pub mod collaborators;
pub mod conversation;
pub mod error;
pub mod resolver;
pub mod tool;
pub mod tools;

// Re-export core types
pub use error::{AgentError, Result};

// Re-export conversation types
pub use conversation::{
    Conversation, ConversationConfig, ConversationEvent, ConversationResponse,
    DEFAULT_SYSTEM_PROMPT,
};

// Re-export tool types
pub use tool::{Tool, ToolContext, ToolRegistry, ToolResult};

// Re-export parameter validation types
pub use tool::{
    DocSearchParams, ListResourceTypesParams, ParamExt, ParamResult, ParameterValidationError,
    QueryResourcesParams, ResourceDetailParams, TailLogsParams,
};

// Re-export output sanitization types
pub use tool::{
    DEFAULT_MAX_OUTPUT_SIZE, OutputConfig, OutputSanitizationError, sanitize_output,
    validate_json_output,
};

// Re-export collaborator types
pub use collaborators::{
    Collaborators, DocHit, DocSearch, DocSearchConfig, HttpDocSearch, LogEvent, LogQuery,
    LogSearch, QueryScope, Resource, ResourceQuery, requires_cluster,
};

// Re-export log resolution types
pub use resolver::{
    DetailFieldStrategy, EcsTaskDefinitionStrategy, LogDestinationStrategy, LogResolverRegistry,
    LogTarget, TemplateStrategy, log_group_from_arn,
};

// Re-export built-in tools
pub use tools::{builtin_registry, register_builtin_tools};

pub use tokio_util::sync::CancellationToken;
