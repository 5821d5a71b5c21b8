//! Tool framework for assistant capabilities.
//!
//! This module defines the [`Tool`] trait every capability implements, the
//! [`ToolRegistry`] the conversation loop dispatches through, and the output
//! sanitizer that bounds what a tool can hand back to the model.
//!
//! # Example
//!
//! ```rust,ignore
//! use skiff_agent::{Tool, ToolContext, ToolResult, ToolRegistry};
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Tool for Ping {
//!     fn name(&self) -> &str { "ping" }
//!     fn description(&self) -> &str { "Answers pong" }
//!     fn parameters(&self) -> Value { json!({"type": "object", "properties": {}}) }
//!
//!     async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
//!         Ok(ToolResult::text("pong"))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Ping);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skiff_llm::{ToolDefinition, ToolResultContent, ToolUseContent};
use tokio_util::sync::CancellationToken;

use crate::collaborators::{QueryScope, requires_cluster};
use crate::error::{AgentError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for tool parameter validation failures.
///
/// The message is handed back to the model verbatim, so it names the
/// parameter and what to send instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterValidationError {
    /// A required parameter is missing or empty.
    #[error("{name} parameter is required")]
    MissingRequired {
        /// The parameter name.
        name: &'static str,
    },

    /// A resource type needs a scoping parameter the caller left out.
    #[error("{name} parameter is required for {service}/{resource_type}")]
    ScopeRequired {
        name: &'static str,
        service: String,
        resource_type: String,
    },

    /// A parameter has an invalid type.
    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        /// The parameter name.
        name: &'static str,
        /// The expected type.
        expected: &'static str,
        /// The actual type found.
        actual: String,
    },
}

impl ParameterValidationError {
    /// Create a missing required parameter error.
    pub fn missing(name: &'static str) -> Self {
        Self::MissingRequired { name }
    }

    /// Create an invalid type error.
    pub fn invalid_type(
        name: &'static str,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidType {
            name,
            expected,
            actual: actual.into(),
        }
    }

    /// Get the parameter name associated with this error.
    pub fn parameter_name(&self) -> &str {
        match self {
            Self::MissingRequired { name }
            | Self::ScopeRequired { name, .. }
            | Self::InvalidType { name, .. } => name,
        }
    }
}

impl From<ParameterValidationError> for AgentError {
    fn from(err: ParameterValidationError) -> Self {
        AgentError::InvalidToolParams(err.to_string())
    }
}

/// Result type for parameter validation.
pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

/// Helper trait for extracting and validating parameters from JSON.
pub trait ParamExt {
    /// Get a required, non-blank string parameter.
    fn required_str(&self, name: &'static str) -> ParamResult<&str>;

    /// Get an optional string parameter. Blank strings count as absent.
    fn optional_str(&self, name: &str) -> Option<&str>;

    /// Get an optional integer parameter with default.
    ///
    /// Floats are truncated; anything else falls back to the default.
    fn optional_i64(&self, name: &str, default: i64) -> i64;

    /// Get an optional object parameter.
    fn optional_object(&self, name: &'static str) -> ParamResult<Option<&Map<String, Value>>>;
}

impl ParamExt for Value {
    fn required_str(&self, name: &'static str) -> ParamResult<&str> {
        self.optional_str(name)
            .ok_or_else(|| ParameterValidationError::missing(name))
    }

    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn optional_i64(&self, name: &str, default: i64) -> i64 {
        self.get(name)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(default)
    }

    fn optional_object(&self, name: &'static str) -> ParamResult<Option<&Map<String, Value>>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(ParameterValidationError::invalid_type(
                name,
                "object",
                json_type_name(other),
            )),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn scope_from(params: &Value) -> ParamResult<QueryScope> {
    let region = params.required_str("region")?;
    let mut scope = QueryScope::new(region);
    scope.profile = params.optional_str("profile").map(str::to_string);
    scope.cluster = params.optional_str("cluster").map(str::to_string);
    Ok(scope)
}

fn check_cluster(service: &str, resource_type: &str, scope: &QueryScope) -> ParamResult<()> {
    if requires_cluster(service, resource_type) && scope.cluster.is_none() {
        return Err(ParameterValidationError::ScopeRequired {
            name: "cluster",
            service: service.to_string(),
            resource_type: resource_type.to_string(),
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed Parameter Structs
// ─────────────────────────────────────────────────────────────────────────────

/// Largest page `query_resources` returns.
pub const MAX_QUERY_LIMIT: i64 = 2000;
/// Default page for `query_resources`.
pub const DEFAULT_QUERY_LIMIT: i64 = 100;
/// Longest look-back window for `tail_logs`, one day.
pub const MAX_SINCE_MINUTES: i64 = 1440;
/// Default look-back window for `tail_logs`.
pub const DEFAULT_SINCE_MINUTES: i64 = 60;
/// Most log lines `tail_logs` returns.
pub const MAX_LOG_LIMIT: i64 = 500;
/// Default log line count for `tail_logs`.
pub const DEFAULT_LOG_LIMIT: i64 = 100;
/// Most documentation hits `search_aws_docs` returns.
pub const MAX_DOC_LIMIT: i64 = 10;
/// Default documentation hit count.
pub const DEFAULT_DOC_LIMIT: i64 = 5;

/// Validated parameters for list_resource_types tool.
#[derive(Debug, Clone)]
pub struct ListResourceTypesParams {
    pub service: String,
}

impl TryFrom<Value> for ListResourceTypesParams {
    type Error = ParameterValidationError;

    fn try_from(params: Value) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            service: params.required_str("service")?.to_ascii_lowercase(),
        })
    }
}

/// Validated parameters for query_resources tool.
#[derive(Debug, Clone)]
pub struct QueryResourcesParams {
    pub service: String,
    pub resource_type: String,
    pub scope: QueryScope,
    /// Field or tag key to substring, both lowercased.
    pub filters: BTreeMap<String, String>,
    /// Clamped into `[1, 2000]`.
    pub limit: usize,
    pub offset: usize,
}

impl TryFrom<Value> for QueryResourcesParams {
    type Error = ParameterValidationError;

    fn try_from(params: Value) -> std::result::Result<Self, Self::Error> {
        let service = params.required_str("service")?.to_ascii_lowercase();
        let resource_type = params.required_str("resource_type")?.to_ascii_lowercase();
        let scope = scope_from(&params)?;

        let mut filters = BTreeMap::new();
        if let Some(map) = params.optional_object("filters")? {
            for (key, value) in map {
                let needle = match value {
                    Value::String(s) => s.trim().to_string(),
                    Value::Null => continue,
                    other => other.to_string(),
                };
                if !needle.is_empty() {
                    filters.insert(key.to_lowercase(), needle.to_lowercase());
                }
            }
        }

        let limit = params
            .optional_i64("limit", DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT) as usize;
        let offset = params.optional_i64("offset", 0).max(0) as usize;

        Ok(Self {
            service,
            resource_type,
            scope,
            filters,
            limit,
            offset,
        })
    }
}

/// Validated parameters for get_resource_detail tool.
#[derive(Debug, Clone)]
pub struct ResourceDetailParams {
    pub service: String,
    pub resource_type: String,
    pub id: String,
    pub scope: QueryScope,
}

impl TryFrom<Value> for ResourceDetailParams {
    type Error = ParameterValidationError;

    fn try_from(params: Value) -> std::result::Result<Self, Self::Error> {
        let service = params.required_str("service")?.to_ascii_lowercase();
        let resource_type = params.required_str("resource_type")?.to_ascii_lowercase();
        let id = params.required_str("id")?.to_string();
        let scope = scope_from(&params)?;
        check_cluster(&service, &resource_type, &scope)?;

        Ok(Self {
            service,
            resource_type,
            id,
            scope,
        })
    }
}

/// Validated parameters for tail_logs tool.
#[derive(Debug, Clone)]
pub struct TailLogsParams {
    pub service: String,
    pub resource_type: String,
    pub id: String,
    pub scope: QueryScope,
    /// Log filter pattern, passed through untouched.
    pub filter: Option<String>,
    /// Clamped into `[1, 1440]`.
    pub since_minutes: i64,
    /// Clamped into `[1, 500]`.
    pub limit: usize,
}

impl TryFrom<Value> for TailLogsParams {
    type Error = ParameterValidationError;

    fn try_from(params: Value) -> std::result::Result<Self, Self::Error> {
        let service = params.required_str("service")?.to_ascii_lowercase();
        let resource_type = params.required_str("resource_type")?.to_ascii_lowercase();
        let id = params.required_str("id")?.to_string();
        let scope = scope_from(&params)?;
        check_cluster(&service, &resource_type, &scope)?;

        Ok(Self {
            service,
            resource_type,
            id,
            scope,
            filter: params.optional_str("filter").map(str::to_string),
            since_minutes: params
                .optional_i64("since_minutes", DEFAULT_SINCE_MINUTES)
                .clamp(1, MAX_SINCE_MINUTES),
            limit: params
                .optional_i64("limit", DEFAULT_LOG_LIMIT)
                .clamp(1, MAX_LOG_LIMIT) as usize,
        })
    }
}

/// Validated parameters for search_aws_docs tool.
#[derive(Debug, Clone)]
pub struct DocSearchParams {
    pub query: String,
    /// Clamped into `[1, 10]`.
    pub limit: usize,
}

impl TryFrom<Value> for DocSearchParams {
    type Error = ParameterValidationError;

    fn try_from(params: Value) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            query: params.required_str("query")?.to_string(),
            limit: params
                .optional_i64("limit", DEFAULT_DOC_LIMIT)
                .clamp(1, MAX_DOC_LIMIT) as usize,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum output size in bytes (50KB).
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 50 * 1024;

/// Configuration for sanitizing tool output.
///
/// Controls size limits, truncation behavior, and content sanitization
/// to prevent context overflow and malformed responses.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Maximum size in bytes before truncation.
    pub max_size_bytes: usize,
    /// Message to append when output is truncated.
    pub truncation_message: String,
    /// Whether to strip control characters (except newlines, tabs).
    pub strip_control_chars: bool,
    /// Whether to validate JSON structure for JSON outputs.
    pub validate_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_OUTPUT_SIZE,
            truncation_message: "\n\n[Output truncated - exceeded size limit]".to_string(),
            strip_control_chars: true,
            validate_json: true,
        }
    }
}

impl OutputConfig {
    /// Create a new output config with the given size limit.
    pub fn with_max_size(max_size_bytes: usize) -> Self {
        Self {
            max_size_bytes,
            ..Default::default()
        }
    }

    /// Set a custom truncation message.
    pub fn with_truncation_message(mut self, message: impl Into<String>) -> Self {
        self.truncation_message = message.into();
        self
    }
}

/// Error type for output sanitization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OutputSanitizationError {
    /// Output appears to be binary data.
    #[error(
        "output appears to be binary data (detected {null_bytes} null bytes in first {checked_bytes} bytes)"
    )]
    BinaryContent {
        /// Number of null bytes detected.
        null_bytes: usize,
        /// Number of bytes checked.
        checked_bytes: usize,
    },

    /// JSON output is malformed.
    #[error("JSON output is malformed: {reason}")]
    MalformedJson {
        /// Why the JSON is invalid.
        reason: String,
    },
}

/// Sanitize a string according to the output configuration.
///
/// This function:
/// 1. Detects and rejects binary content
/// 2. Strips control characters other than newlines and tabs if configured
/// 3. Truncates to max size if needed
///
/// Returns the sanitized string and whether it was truncated.
pub fn sanitize_output(
    input: &str,
    config: &OutputConfig,
) -> std::result::Result<(String, bool), OutputSanitizationError> {
    // Binary if more than 1% of the first 8KB are null bytes
    let check_len = std::cmp::min(input.len(), 8 * 1024);
    let null_count = input.as_bytes()[..check_len]
        .iter()
        .filter(|&&b| b == 0)
        .count();
    if null_count > check_len / 100 && null_count > 10 {
        return Err(OutputSanitizationError::BinaryContent {
            null_bytes: null_count,
            checked_bytes: check_len,
        });
    }

    let mut output = input.to_string();

    if config.strip_control_chars {
        output = output
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect();
    }

    if output.len() <= config.max_size_bytes {
        return Ok((output, false));
    }

    // Leave room for the marker and never split a UTF-8 sequence
    let mut truncate_at = config.max_size_bytes;
    let msg_len = config.truncation_message.len();
    if truncate_at > msg_len {
        truncate_at -= msg_len;
    }
    while truncate_at > 0 && !output.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }

    output.truncate(truncate_at);
    output.push_str(&config.truncation_message);
    Ok((output, true))
}

/// Validate that a JSON value is not pathologically nested.
pub fn validate_json_output(value: &Value) -> std::result::Result<(), OutputSanitizationError> {
    fn check_depth(value: &Value, depth: usize, max_depth: usize) -> bool {
        if depth > max_depth {
            return false;
        }
        match value {
            Value::Array(arr) => arr.iter().all(|v| check_depth(v, depth + 1, max_depth)),
            Value::Object(obj) => obj.values().all(|v| check_depth(v, depth + 1, max_depth)),
            _ => true,
        }
    }

    const MAX_JSON_DEPTH: usize = 50;
    if !check_depth(value, 0, MAX_JSON_DEPTH) {
        return Err(OutputSanitizationError::MalformedJson {
            reason: format!("JSON nesting exceeds maximum depth of {}", MAX_JSON_DEPTH),
        });
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for assistant tools.
///
/// Each tool defines its parameters as a JSON Schema and implements async
/// execution. Tools only read remote state.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of this tool.
    fn name(&self) -> &str;

    /// Get a human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for this tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given parameters.
    ///
    /// Validation failures should come back as `ToolResult::error` so the
    /// model can correct itself; `Err` is for failures of the tool itself.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// ID of the session this tool is running in.
    pub session_id: String,
    /// Token to check for cancellation.
    pub cancellation: CancellationToken,
    /// Id of the tool use being answered.
    pub tool_call_id: Option<String>,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Create a context with a cancellation token.
    pub fn with_cancellation(session_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            session_id: session_id.into(),
            cancellation,
            tool_call_id: None,
        }
    }

    /// Associate the context with one tool use.
    pub fn for_call(&self, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..self.clone()
        }
    }

    /// Check if execution has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    /// Successful text output.
    Text {
        /// The text content.
        content: String,
    },
    /// Successful JSON output.
    Json {
        /// The JSON content.
        content: Value,
    },
    /// Tool execution failed.
    Error {
        /// Error message.
        message: String,
    },
}

impl ToolResult {
    /// Create a text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create a JSON result.
    pub fn json(content: Value) -> Self {
        Self::Json { content }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Check if this result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        !self.is_error()
    }

    /// Get the content as a string for model consumption.
    pub fn to_llm_content(&self) -> String {
        match self {
            Self::Text { content } => content.clone(),
            Self::Json { content } => {
                serde_json::to_string_pretty(content).unwrap_or_else(|_| content.to_string())
            }
            Self::Error { message } => format!("Error: {}", message),
        }
    }

    /// Convert into the block answering `tool_use_id`.
    pub fn into_content(self, tool_use_id: &str) -> ToolResultContent {
        let text = self.to_llm_content();
        if self.is_error() {
            ToolResultContent::error(tool_use_id, text)
        } else {
            ToolResultContent::success(tool_use_id, text)
        }
    }

    /// Sanitize this result according to the given configuration.
    ///
    /// Enforces the size limit, strips null bytes and control characters,
    /// rejects binary content and checks JSON depth. A result that fails
    /// sanitization becomes an error result.
    pub fn sanitize(self, config: &OutputConfig) -> Self {
        match self {
            Self::Text { content } => match sanitize_output(&content, config) {
                Ok((sanitized, _)) => Self::Text { content: sanitized },
                Err(e) => Self::error(format!("Output sanitization failed: {}", e)),
            },
            Self::Json { content } => {
                if config.validate_json
                    && let Err(e) = validate_json_output(&content)
                {
                    return Self::error(format!("JSON validation failed: {}", e));
                }

                let json_str = match serde_json::to_string_pretty(&content) {
                    Ok(s) => s,
                    Err(e) => return Self::error(format!("Failed to serialize JSON: {}", e)),
                };

                match sanitize_output(&json_str, config) {
                    // Truncated JSON is no longer JSON
                    Ok((sanitized, true)) => Self::Text { content: sanitized },
                    Ok((sanitized, false)) => match serde_json::from_str(&sanitized) {
                        Ok(v) => Self::Json { content: v },
                        Err(_) => Self::Text { content: sanitized },
                    },
                    Err(e) => Self::error(format!("Output sanitization failed: {}", e)),
                }
            }
            Self::Error { message } => {
                let error_config = OutputConfig {
                    max_size_bytes: 10 * 1024,
                    ..config.clone()
                };
                match sanitize_output(&message, &error_config) {
                    Ok((sanitized, _)) => Self::Error { message: sanitized },
                    Err(_) => Self::error("[Error message contained invalid content]"),
                }
            }
        }
    }

    /// Check if this result was truncated (looks for truncation indicator).
    pub fn was_truncated(&self) -> bool {
        match self {
            Self::Text { content } => content.contains("[Output truncated"),
            Self::Json { .. } => false,
            Self::Error { message } => message.contains("[Output truncated"),
        }
    }
}

impl From<ParameterValidationError> for ToolResult {
    fn from(err: ParameterValidationError) -> Self {
        ToolResult::error(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry for managing available tools.
///
/// Provides lookup by name, the catalog sent to the model, and the dispatch
/// step that turns a tool use into a tool result.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Per-tool output config overrides.
    output_overrides: HashMap<String, OutputConfig>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a per-tool output config override.
    pub fn set_output_config(&mut self, name: impl Into<String>, config: OutputConfig) {
        self.output_overrides.insert(name.into(), config);
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Convert all tools to model tool definitions, sorted by name so the
    /// catalog is stable between turns.
    pub fn to_llm_definitions(&self) -> Vec<ToolDefinition> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition::new(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    /// Execute a tool by name, sanitizing with its output config.
    pub async fn execute(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let output_config = self.output_config_for(name);
        self.execute_with_config(name, params, ctx, &output_config)
            .await
    }

    /// Execute a tool by name with custom output configuration.
    pub async fn execute_with_config(
        &self,
        name: &str,
        params: Value,
        ctx: &ToolContext,
        output_config: &OutputConfig,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        let result = tool.execute(params, ctx).await?;
        Ok(result.sanitize(output_config))
    }

    /// Answer one tool use.
    ///
    /// Never fails: malformed input, unknown tools and tool errors all become
    /// error results so the turn can continue.
    pub async fn dispatch(&self, tool_use: &ToolUseContent, ctx: &ToolContext) -> ToolResultContent {
        if let Some(parse_error) = &tool_use.input_parse_error {
            tracing::warn!(
                tool = %tool_use.name,
                tool_call_id = %tool_use.id,
                error = %parse_error,
                "Tool input could not be parsed"
            );
            return ToolResult::error(format!(
                "Invalid input for {}: {}",
                tool_use.name, parse_error
            ))
            .into_content(&tool_use.id);
        }

        let ctx = ctx.for_call(&tool_use.id);
        let started = std::time::Instant::now();
        let result = match self
            .execute(&tool_use.name, tool_use.input_value(), &ctx)
            .await
        {
            Ok(result) => result,
            Err(AgentError::ToolNotFound(name)) => {
                tracing::warn!(tool = %name, "Model requested an unknown tool");
                ToolResult::error(format!(
                    "Unknown tool: {}. Available tools: {}",
                    name,
                    self.names().join(", ")
                ))
            }
            Err(e) => {
                tracing::warn!(tool = %tool_use.name, error = %e, "Tool execution failed");
                ToolResult::error(e.to_string())
            }
        };

        tracing::debug!(
            tool = %tool_use.name,
            tool_call_id = %tool_use.id,
            success = result.is_success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool call complete"
        );

        result.into_content(&tool_use.id)
    }

    /// Get the output config for a tool by name.
    pub fn output_config_for(&self, name: &str) -> OutputConfig {
        self.output_overrides
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A mock tool for testing.
///
/// Returns a configurable response and tracks calls for verification.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTool {
    name: String,
    response: std::sync::Mutex<Option<ToolResult>>,
    calls: std::sync::Mutex<Vec<Value>>,
}

#[cfg(test)]
impl MockTool {
    /// Create a new mock tool.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: std::sync::Mutex::new(None),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Set the response to return.
    pub fn with_response(self, response: ToolResult) -> Self {
        *self.response.lock().unwrap() = Some(response);
        self
    }

    /// Get the calls that were made to this tool.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "A mock tool for testing"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        self.calls.lock().unwrap().push(params);
        Ok(self
            .response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ToolResult::text("mock response")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
