//! Anthropic API backend implementation.
//!
//! This module provides the `AnthropicBackend` which opens streaming turns
//! against Anthropic's Messages API and parses the SSE body into [`Frame`]s.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BlockDelta, BlockKind, ConverseBackend, Frame, FrameStream, SharedBackend};
use crate::error::{LlmError, RateLimitInfo, Result};
use crate::types::{ContentBlock, ConverseRequest, Message, ToolDefinition};

/// Default API base URL.
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Default API version.
const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// API version header.
    pub api_version: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create config from environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::Config("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Anthropic Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Anthropic API backend.
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a backend from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env()?)
    }

    /// Build the messages endpoint URL.
    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    /// Add authentication and API headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();

        let retry_after_header = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        error_for_status(status.as_u16(), &message, retry_after_header.as_deref())
    }
}

/// Map an HTTP failure status to an error.
fn error_for_status(status: u16, message: &str, retry_after: Option<&str>) -> LlmError {
    match status {
        401 | 403 => LlmError::Auth(format!("Authentication failed: {}", message)),
        429 => LlmError::RateLimit(RateLimitInfo::from_response(message, retry_after)),
        500..=599 => LlmError::Backend(format!("Server error: {}", message)),
        _ => LlmError::Backend(message.to_string()),
    }
}

#[async_trait]
impl ConverseBackend for AnthropicBackend {
    async fn open_turn(&self, request: &ConverseRequest) -> Result<FrameStream> {
        let body = ApiRequest::from_request(request);

        let response = self
            .add_headers(self.client.post(self.messages_url()))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        Ok(parse_sse_stream(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Create a shared Anthropic backend.
pub fn create_shared_backend(config: AnthropicConfig) -> Result<SharedBackend> {
    Ok(Arc::new(AnthropicBackend::new(config)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Body
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ApiThinking>,
    stream: bool,
}

impl<'a> ApiRequest<'a> {
    fn from_request(request: &'a ConverseRequest) -> Self {
        let thinking = request
            .effective_thinking_budget()
            .map(|budget_tokens| ApiThinking {
                kind: "enabled",
                budget_tokens,
            });
        // The API rejects a temperature alongside extended thinking.
        let temperature = if thinking.is_some() {
            None
        } else {
            request.temperature
        };

        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            messages: request.messages.iter().map(ApiMessage::from).collect(),
            system: request.system.as_deref().filter(|s| !s.is_empty()),
            tools: &request.tools,
            temperature,
            thinking,
            stream: true,
        }
    }
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Serialize)]
struct ApiThinking {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: Vec<ApiContent<'a>>,
}

impl<'a> From<&'a Message> for ApiMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.iter().map(ApiContent::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent<'a> {
    Text {
        text: &'a str,
    },
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: &'a serde_json::Map<String, Value>,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a str,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    Thinking {
        thinking: &'a str,
        signature: &'a str,
    },
}

impl<'a> From<&'a ContentBlock> for ApiContent<'a> {
    fn from(block: &'a ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => ApiContent::Text { text },
            ContentBlock::ToolUse(tool_use) => ApiContent::ToolUse {
                id: &tool_use.id,
                name: &tool_use.name,
                input: &tool_use.input,
            },
            ContentBlock::ToolResult(result) => ApiContent::ToolResult {
                tool_use_id: &result.tool_use_id,
                content: &result.content,
                is_error: result.is_error,
            },
            ContentBlock::Reasoning { text, signature } => ApiContent::Thinking {
                thinking: text,
                signature,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Stream Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse SSE events from a byte stream and convert to frames.
///
/// Bytes are buffered until a full line is available, so a multibyte
/// character split across network chunks decodes intact. A payload that
/// cannot be decoded ends the stream with [`LlmError::Decode`].
fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> FrameStream {
    Box::pin(futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: Vec::new(),
            current_event: None,
            done: false,
        },
        |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                while let Some(line_end) = state.buffer.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = state.buffer.drain(..=line_end).collect();
                    let line = match std::str::from_utf8(&raw) {
                        Ok(line) => line.trim().to_string(),
                        Err(e) => {
                            state.done = true;
                            return Some((
                                Err(LlmError::Decode(format!("SSE line is not UTF-8: {}", e))),
                                state,
                            ));
                        }
                    };

                    if line.is_empty() {
                        state.current_event = None;
                        continue;
                    }

                    if let Some((key, value)) = parse_sse_line(&line) {
                        match key {
                            "event" => {
                                state.current_event = Some(value.to_string());
                            }
                            "data" => {
                                let Some(event_type) = &state.current_event else {
                                    continue;
                                };
                                match parse_frame(event_type, value) {
                                    Ok(Some(frame)) => {
                                        if matches!(frame, Frame::MessageStop | Frame::Error { .. })
                                        {
                                            state.done = true;
                                        }
                                        return Some((Ok(frame), state));
                                    }
                                    Ok(None) => {}
                                    Err(e) => {
                                        state.done = true;
                                        return Some((Err(e), state));
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }

                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        state.buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(LlmError::Network(e.to_string())), state));
                    }
                    None => return None,
                }
            }
        },
    ))
}

struct SseState {
    byte_stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    current_event: Option<String>,
    done: bool,
}

fn parse_sse_line(line: &str) -> Option<(&str, &str)> {
    if let Some(value) = line.strip_prefix("event:") {
        Some(("event", value.trim_start()))
    } else if let Some(value) = line.strip_prefix("data:") {
        Some(("data", value.trim_start()))
    } else {
        None
    }
}

/// Decode one SSE payload. `Ok(None)` means the event carries nothing the
/// decoder needs.
fn parse_frame(event_type: &str, data: &str) -> Result<Option<Frame>> {
    let parsed = match event_type {
        "message_start" => serde_json::from_str::<MessageStartEvent>(data).map(|p| {
            Frame::MessageStart {
                id: p.message.id,
                model: p.message.model,
            }
        }),
        "content_block_start" => {
            serde_json::from_str::<ContentBlockStartEvent>(data).map(|p| Frame::BlockStart {
                index: p.index,
                block: match p.content_block {
                    ApiBlockStart::Text => BlockKind::Text,
                    ApiBlockStart::ToolUse { id, name } => BlockKind::ToolUse { id, name },
                    ApiBlockStart::Thinking => BlockKind::Reasoning,
                    ApiBlockStart::RedactedThinking => BlockKind::RedactedReasoning,
                    ApiBlockStart::Unknown => BlockKind::Other(block_type(data)),
                },
            })
        }
        "content_block_delta" => {
            let p = serde_json::from_str::<ContentBlockDeltaEvent>(data)
                .map_err(|e| decode_error(event_type, &e))?;
            let delta = match p.delta {
                ApiDelta::TextDelta { text } => BlockDelta::Text(text),
                ApiDelta::ThinkingDelta { thinking } => BlockDelta::Reasoning(thinking),
                ApiDelta::SignatureDelta { signature } => BlockDelta::Signature(signature),
                ApiDelta::InputJsonDelta { partial_json } => BlockDelta::ToolInput(partial_json),
                ApiDelta::Unknown => {
                    tracing::debug!(index = p.index, "Skipping unmodeled delta type");
                    return Ok(None);
                }
            };
            Ok(Frame::BlockDelta {
                index: p.index,
                delta,
            })
        }
        "content_block_stop" => serde_json::from_str::<ContentBlockStopEvent>(data)
            .map(|p| Frame::BlockStop { index: p.index }),
        "message_delta" => serde_json::from_str::<MessageDeltaEvent>(data).map(|p| {
            Frame::MessageDelta {
                stop_reason: p.delta.stop_reason,
            }
        }),
        "message_stop" => return Ok(Some(Frame::MessageStop)),
        "ping" => return Ok(Some(Frame::Ping)),
        "error" => {
            let message = serde_json::from_str::<ApiError>(data)
                .map(|p| p.error.message)
                .unwrap_or_else(|_| "Unknown streaming error".to_string());
            return Ok(Some(Frame::Error { message }));
        }
        other => {
            tracing::debug!(event = other, "Skipping unknown SSE event");
            return Ok(None);
        }
    };

    parsed
        .map(Some)
        .map_err(|e| decode_error(event_type, &e))
}

fn decode_error(event_type: &str, err: &serde_json::Error) -> LlmError {
    tracing::warn!(event = event_type, error = %err, "Failed to parse SSE payload");
    LlmError::Decode(format!("invalid {} payload: {}", event_type, err))
}

/// Pull the raw `content_block.type` for logging an unmodeled block.
fn block_type(data: &str) -> String {
    serde_json::from_str::<Value>(data)
        .ok()
        .and_then(|v| {
            v.pointer("/content_block/type")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Event Structures
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessageStartEvent {
    message: MessageStartMessage,
}

#[derive(Debug, Deserialize)]
struct MessageStartMessage {
    id: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStartEvent {
    index: usize,
    content_block: ApiBlockStart,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlockStart {
    Text,
    ToolUse {
        id: String,
        name: String,
    },
    Thinking,
    RedactedThinking,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaEvent {
    index: usize,
    delta: ApiDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStopEvent {
    index: usize,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaEvent {
    delta: MessageDelta,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StreamEvent;
    use crate::types::{ToolResultContent, ToolUseContent};
    use serde_json::json;

    fn sse_body(events: &[(&str, Value)]) -> String {
        events
            .iter()
            .map(|(name, data)| format!("event: {}\ndata: {}\n\n", name, data))
            .collect()
    }

    async fn frames_of(chunks: Vec<String>) -> Vec<Frame> {
        let stream = futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))));
        parse_sse_stream(stream)
            .map(|f| f.unwrap())
            .collect()
            .await
    }

    #[test]
    fn test_config_new() {
        let config = AnthropicConfig::new("test-key");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.base_url, DEFAULT_API_BASE);
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn test_config_with_base_url() {
        let config = AnthropicConfig::new("k").with_base_url("https://proxy.local/");
        assert_eq!(config.base_url, "https://proxy.local");
    }

    #[test]
    fn test_messages_url() {
        let backend = AnthropicBackend::new(AnthropicConfig::new("k")).unwrap();
        assert_eq!(backend.messages_url(), "https://api.anthropic.com/v1/messages");
        assert_eq!(backend.name(), "anthropic");
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(
            parse_sse_line("event: message_start"),
            Some(("event", "message_start"))
        );
        assert_eq!(parse_sse_line("data:{\"a\":1}"), Some(("data", "{\"a\":1}")));
        assert_eq!(parse_sse_line(": comment"), None);
    }

    #[test]
    fn test_error_for_status() {
        assert!(matches!(error_for_status(401, "bad key", None), LlmError::Auth(_)));
        let err = error_for_status(429, "slow", Some("7"));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(matches!(
            error_for_status(529, "overloaded", None),
            LlmError::Backend(m) if m.contains("overloaded")
        ));
    }

    #[test]
    fn test_request_body_maps_blocks() {
        let messages = vec![
            Message::user("list my buckets"),
            Message::assistant_blocks(vec![
                ContentBlock::reasoning("need s3", "sig-1"),
                ContentBlock::ToolUse(ToolUseContent::new(
                    "t1",
                    "query_resources",
                    json!({"service": "s3"}).as_object().unwrap().clone(),
                )),
            ]),
            Message::tool_results(vec![ToolResultContent::error("t1", "region parameter is required")]),
        ];
        let request = ConverseRequest::new("claude-sonnet-4-20250514", messages, 4096)
            .with_system("be brief")
            .with_temperature(0.2);

        let body = serde_json::to_value(ApiRequest::from_request(&request)).unwrap();

        assert_eq!(body["stream"], json!(true));
        assert_eq!(body["system"], json!("be brief"));
        assert!(body.get("tools").is_none());
        assert!(body.get("thinking").is_none());
        let assistant = &body["messages"][1]["content"];
        assert_eq!(assistant[0]["type"], "thinking");
        assert_eq!(assistant[0]["signature"], "sig-1");
        assert_eq!(assistant[1]["type"], "tool_use");
        assert_eq!(assistant[1]["input"]["service"], "s3");
        assert!(assistant[1].get("input_parse_error").is_none());
        let result = &body["messages"][2]["content"][0];
        assert_eq!(result["type"], "tool_result");
        assert_eq!(result["is_error"], json!(true));
    }

    #[test]
    fn test_request_body_thinking_omits_temperature() {
        let request = ConverseRequest::new("claude-sonnet-4-5", vec![Message::user("hi")], 8192)
            .with_temperature(0.5)
            .with_thinking_budget(2048);
        let body = serde_json::to_value(ApiRequest::from_request(&request)).unwrap();
        assert_eq!(body["thinking"], json!({"type": "enabled", "budget_tokens": 2048}));
        assert!(body.get("temperature").is_none());
    }

    #[tokio::test]
    async fn test_parse_full_turn() {
        let body = sse_body(&[
            (
                "message_start",
                json!({"type": "message_start", "message": {"id": "msg_1", "model": "claude"}}),
            ),
            (
                "content_block_start",
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
            ),
            (
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "hmm"}}),
            ),
            (
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "signature_delta", "signature": "abc"}}),
            ),
            ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
            (
                "content_block_start",
                json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "tail_logs", "input": {}}}),
            ),
            (
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"id\":"}}),
            ),
            ("content_block_stop", json!({"type": "content_block_stop", "index": 1})),
            ("ping", json!({"type": "ping"})),
            (
                "message_delta",
                json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 9}}),
            ),
            ("message_stop", json!({"type": "message_stop"})),
        ]);

        // Split mid-line to exercise buffering.
        let (a, b) = body.split_at(body.len() / 2);
        let frames = frames_of(vec![a.to_string(), b.to_string()]).await;

        assert_eq!(
            frames[0],
            Frame::MessageStart {
                id: "msg_1".into(),
                model: "claude".into()
            }
        );
        assert_eq!(
            frames[1],
            Frame::BlockStart {
                index: 0,
                block: BlockKind::Reasoning
            }
        );
        assert_eq!(
            frames[3],
            Frame::BlockDelta {
                index: 0,
                delta: BlockDelta::Signature("abc".into())
            }
        );
        assert_eq!(
            frames[5],
            Frame::BlockStart {
                index: 1,
                block: BlockKind::ToolUse {
                    id: "toolu_1".into(),
                    name: "tail_logs".into()
                }
            }
        );
        assert!(frames.contains(&Frame::Ping));
        assert!(frames.contains(&Frame::MessageDelta {
            stop_reason: Some("tool_use".into())
        }));
        assert_eq!(frames.last(), Some(&Frame::MessageStop));
    }

    #[tokio::test]
    async fn test_parse_error_event_ends_stream() {
        let body = sse_body(&[
            (
                "error",
                json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
            ),
            ("message_stop", json!({"type": "message_stop"})),
        ]);
        let frames = frames_of(vec![body]).await;
        assert_eq!(
            frames,
            vec![Frame::Error {
                message: "Overloaded".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_is_terminal_decode_error() {
        let head = sse_body(&[
            (
                "message_start",
                json!({"type": "message_start", "message": {"id": "msg_1", "model": "claude"}}),
            ),
            (
                "content_block_start",
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "query_resources", "input": {}}}),
            ),
            (
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "{\"a\":"}}),
            ),
        ]);
        let garbage = "event: content_block_delta\ndata: {GARBAGE\n\n";
        let tail = sse_body(&[
            (
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "1}"}}),
            ),
            ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
            (
                "message_delta",
                json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}}),
            ),
            ("message_stop", json!({"type": "message_stop"})),
        ]);
        let body = format!("{head}{garbage}{tail}");

        let stream = futures::stream::iter(vec![Ok(Bytes::from(body))]);
        let events = crate::stream::spawn_turn(
            parse_sse_stream(stream),
            tokio_util::sync::CancellationToken::new(),
        )
        .collect_all()
        .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error(LlmError::Decode(_))));
    }

    #[tokio::test]
    async fn test_unknown_delta_type_is_skipped() {
        let body = sse_body(&[(
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "citations_delta", "citation": {}}}),
        )]);
        assert!(frames_of(vec![body]).await.is_empty());
    }

    #[tokio::test]
    async fn test_multibyte_text_split_across_chunks() {
        let body = sse_body(&[(
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "バケット"}}),
        )]);
        let bytes = body.into_bytes();
        let cut = bytes
            .windows(3)
            .position(|w| w == "バ".as_bytes())
            .unwrap()
            + 1;
        let chunks = vec![
            Ok(Bytes::copy_from_slice(&bytes[..cut])),
            Ok(Bytes::copy_from_slice(&bytes[cut..])),
        ];

        let frames: Vec<Frame> = parse_sse_stream(futures::stream::iter(chunks))
            .map(|f| f.unwrap())
            .collect()
            .await;

        assert_eq!(
            frames,
            vec![Frame::BlockDelta {
                index: 0,
                delta: BlockDelta::Text("バケット".into())
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_block_type_is_other() {
        let body = sse_body(&[(
            "content_block_start",
            json!({"type": "content_block_start", "index": 2, "content_block": {"type": "server_tool_use"}}),
        )]);
        let frames = frames_of(vec![body]).await;
        assert_eq!(
            frames,
            vec![Frame::BlockStart {
                index: 2,
                block: BlockKind::Other("server_tool_use".into())
            }]
        );
    }
}
