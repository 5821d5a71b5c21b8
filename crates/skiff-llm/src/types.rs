//! Core conversation types.
//!
//! These types are the provider-neutral message model shared by the streaming
//! client, the tool engine, and the session store. Wire-specific shapes live in
//! the provider modules.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,

    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a user message with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message with content blocks.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: blocks,
        }
    }

    /// Create a user message carrying tool results.
    pub fn tool_results(results: Vec<ToolResultContent>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(ContentBlock::ToolResult).collect(),
        }
    }

    /// Concatenate all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// All tool use blocks in emission order.
    pub fn tool_uses(&self) -> Vec<&ToolUseContent> {
        self.content
            .iter()
            .filter_map(ContentBlock::as_tool_use)
            .collect()
    }
}

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content Blocks
// ─────────────────────────────────────────────────────────────────────────────

/// One typed unit of message content.
///
/// Exactly one variant is ever populated; there is no way to build a block that
/// is both text and a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Tool invocation issued by the assistant.
    ToolUse(ToolUseContent),
    /// Outcome of a tool invocation, sent back by the user side.
    ToolResult(ToolResultContent),
    /// Extended reasoning trace.
    Reasoning {
        /// Full reasoning text.
        text: String,
        /// Opaque provider token authenticating the trace. Must be echoed
        /// verbatim when the block is replayed.
        signature: String,
    },
}

impl ContentBlock {
    /// Create a text content block.
    pub fn text(content: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: content.into(),
        }
    }

    /// Create a reasoning block.
    pub fn reasoning(text: impl Into<String>, signature: impl Into<String>) -> Self {
        ContentBlock::Reasoning {
            text: text.into(),
            signature: signature.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUseContent> {
        match self {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultContent> {
        match self {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    /// Reasoning text and signature, if this is a reasoning block.
    pub fn as_reasoning(&self) -> Option<(&str, &str)> {
        match self {
            ContentBlock::Reasoning { text, signature } => Some((text, signature)),
            _ => None,
        }
    }

    /// Short name of the populated variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::ToolUse(_) => "tool_use",
            ContentBlock::ToolResult(_) => "tool_result",
            ContentBlock::Reasoning { .. } => "reasoning",
        }
    }
}

impl From<ToolUseContent> for ContentBlock {
    fn from(tool_use: ToolUseContent) -> Self {
        ContentBlock::ToolUse(tool_use)
    }
}

impl From<ToolResultContent> for ContentBlock {
    fn from(result: ToolResultContent) -> Self {
        ContentBlock::ToolResult(result)
    }
}

/// A tool invocation issued by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseContent {
    /// Provider-issued id, answered by [`ToolResultContent::tool_use_id`].
    pub id: String,
    /// Name of the tool to run.
    pub name: String,
    /// Parsed input. Empty (never null) when parsing failed.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Why the streamed input could not be parsed, if it could not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_parse_error: Option<String>,
}

impl ToolUseContent {
    /// Create a tool use with parsed input.
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            input_parse_error: None,
        }
    }

    /// Create a tool use whose input failed to parse.
    pub fn with_parse_error(
        id: impl Into<String>,
        name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input: Map::new(),
            input_parse_error: Some(error.into()),
        }
    }

    /// The input as a JSON object value.
    pub fn input_value(&self) -> Value {
        Value::Object(self.input.clone())
    }
}

/// The outcome of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultContent {
    /// Id of the tool use this answers.
    pub tool_use_id: String,
    /// Result text handed back to the model.
    pub content: String,
    /// Whether the tool failed.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultContent {
    /// Create a successful tool result.
    pub fn success(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error tool result.
    pub fn error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: error.into(),
            is_error: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// Definition of a tool available to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool.
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stop Reason
// ─────────────────────────────────────────────────────────────────────────────

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn.
    EndTurn,
    /// Model wants to use a tool.
    ToolUse,
    /// Hit max tokens limit.
    MaxTokens,
}

impl StopReason {
    /// Normalize a provider stop reason. Unknown values map to `EndTurn`.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("end_turn") | None => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some(other) => {
                tracing::warn!(stop_reason = %other, "Unrecognized stop reason, treating as end_turn");
                StopReason::EndTurn
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Converse Request
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum reasoning budget the provider accepts.
pub const MIN_THINKING_BUDGET: u32 = 1024;

/// Model families that accept an extended reasoning budget.
const THINKING_MODEL_FAMILIES: &[&str] = &[
    "claude-3-7-sonnet",
    "claude-sonnet-4",
    "claude-opus-4",
    "claude-haiku-4-5",
];

/// Whether the model identifier belongs to a reasoning-capable family.
///
/// Matches anywhere in the id so vendor/regional prefixes
/// (`us.anthropic.claude-sonnet-4-...`) are accepted.
pub fn supports_extended_thinking(model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    THINKING_MODEL_FAMILIES
        .iter()
        .any(|family| model.contains(family))
}

/// One streaming turn request.
#[derive(Debug, Clone)]
pub struct ConverseRequest {
    /// The model to use.
    pub model: String,

    /// The conversation so far.
    pub messages: Vec<Message>,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// System prompt (optional).
    pub system: Option<String>,

    /// Tools available for the model to use.
    pub tools: Vec<ToolDefinition>,

    /// Temperature for sampling (0.0 to 1.0).
    pub temperature: Option<f32>,

    /// Requested reasoning budget; only honored for supported models.
    pub thinking_budget: Option<u32>,
}

impl ConverseRequest {
    /// Create a new request with the given model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
            system: None,
            tools: Vec::new(),
            temperature: None,
            thinking_budget: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the tool catalog.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Request an extended reasoning budget.
    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    /// The reasoning budget that will actually be sent.
    ///
    /// `None` unless the model supports reasoning and the budget fits between
    /// [`MIN_THINKING_BUDGET`] and `max_tokens`.
    pub fn effective_thinking_budget(&self) -> Option<u32> {
        let budget = self.thinking_budget?;
        if !supports_extended_thinking(&self.model) {
            return None;
        }
        if budget < MIN_THINKING_BUDGET || budget >= self.max_tokens {
            tracing::debug!(
                budget,
                max_tokens = self.max_tokens,
                "Thinking budget out of range, disabling extended reasoning"
            );
            return None;
        }
        Some(budget)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn populated(block: &ContentBlock) -> usize {
        [
            block.as_text().is_some(),
            block.as_tool_use().is_some(),
            block.as_tool_result().is_some(),
            block.as_reasoning().is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    #[test]
    fn test_every_block_has_exactly_one_variant() {
        let blocks = vec![
            ContentBlock::text("hi"),
            ContentBlock::ToolUse(ToolUseContent::new("t1", "query_resources", Map::new())),
            ContentBlock::ToolResult(ToolResultContent::success("t1", "ok")),
            ContentBlock::reasoning("because", "sig"),
        ];
        for block in &blocks {
            assert_eq!(populated(block), 1, "block {:?}", block.kind());
        }
    }

    #[test]
    fn test_content_block_serialization_tags() {
        let json = serde_json::to_value(ContentBlock::text("hello")).unwrap();
        assert_eq!(json, json!({"type": "text", "text": "hello"}));

        let block = ContentBlock::ToolUse(ToolUseContent::new(
            "toolu_1",
            "get_resource_detail",
            json!({"id": "i-1"}).as_object().cloned().unwrap(),
        ));
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["input"]["id"], "i-1");
        assert!(json.get("input_parse_error").is_none());

        let restored: ContentBlock = serde_json::from_value(json).unwrap();
        assert_eq!(restored, block);
    }

    #[test]
    fn test_tool_use_missing_input_defaults_to_empty_map() {
        let block: ContentBlock =
            serde_json::from_value(json!({"type": "tool_use", "id": "a", "name": "b"})).unwrap();
        let tool_use = block.as_tool_use().unwrap();
        assert!(tool_use.input.is_empty());
        assert!(tool_use.input_parse_error.is_none());
    }

    #[test]
    fn test_tool_use_with_parse_error() {
        let tool_use = ToolUseContent::with_parse_error("a", "b", "EOF while parsing");
        assert!(tool_use.input.is_empty());
        assert_eq!(tool_use.input_value(), json!({}));
        assert_eq!(tool_use.input_parse_error.as_deref(), Some("EOF while parsing"));
    }

    #[test]
    fn test_message_helpers() {
        let msg = Message::assistant_blocks(vec![
            ContentBlock::text("Let me "),
            ContentBlock::text("check."),
            ContentBlock::ToolUse(ToolUseContent::new("t1", "tail_logs", Map::new())),
        ]);
        assert_eq!(msg.text(), "Let me check.");
        assert_eq!(msg.tool_uses().len(), 1);
        assert_eq!(msg.tool_uses()[0].name, "tail_logs");

        let results = Message::tool_results(vec![ToolResultContent::error("t1", "boom")]);
        assert_eq!(results.role, Role::User);
        assert!(results.content[0].as_tool_result().unwrap().is_error);
    }

    #[test]
    fn test_stop_reason_normalization() {
        assert_eq!(StopReason::from_wire(Some("end_turn")), StopReason::EndTurn);
        assert_eq!(StopReason::from_wire(Some("tool_use")), StopReason::ToolUse);
        assert_eq!(StopReason::from_wire(Some("max_tokens")), StopReason::MaxTokens);
        assert_eq!(StopReason::from_wire(Some("refusal")), StopReason::EndTurn);
        assert_eq!(StopReason::from_wire(None), StopReason::EndTurn);
    }

    #[test]
    fn test_supports_extended_thinking() {
        assert!(supports_extended_thinking("claude-sonnet-4-20250514"));
        assert!(supports_extended_thinking("claude-3-7-sonnet-20250219"));
        assert!(supports_extended_thinking("us.anthropic.claude-opus-4-1-20250805-v1:0"));
        assert!(!supports_extended_thinking("claude-3-5-haiku-20241022"));
        assert!(!supports_extended_thinking("gpt-4o"));
    }

    #[test]
    fn test_effective_thinking_budget() {
        let request = ConverseRequest::new("claude-sonnet-4-20250514", vec![], 8192)
            .with_thinking_budget(4096);
        assert_eq!(request.effective_thinking_budget(), Some(4096));

        let unsupported =
            ConverseRequest::new("claude-3-5-haiku", vec![], 8192).with_thinking_budget(4096);
        assert_eq!(unsupported.effective_thinking_budget(), None);

        let too_large = ConverseRequest::new("claude-opus-4", vec![], 2048)
            .with_thinking_budget(4096);
        assert_eq!(too_large.effective_thinking_budget(), None);

        let too_small =
            ConverseRequest::new("claude-opus-4", vec![], 8192).with_thinking_budget(100);
        assert_eq!(too_small.effective_thinking_budget(), None);
    }
}
