//! Per-turn decode state machine.
//!
//! [`TurnDecoder`] consumes [`Frame`]s in wire order and produces at most one
//! [`StreamEvent`] per frame:
//!
//! ```text
//! Idle ─▶ InMessage ─┬─ BlockStart ─▶ block open ─ deltas ─▶ BlockStop ─┐
//!                    │◀──────────────────────────────────────────────────┘
//!                    └─ MessageStop ─▶ Complete
//! ```
//!
//! Text and reasoning deltas are emitted as they arrive. Tool input fragments
//! are buffered and parsed once when the block closes.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::backend::{BlockDelta, BlockKind, Frame, StreamEvent};
use crate::error::LlmError;
use crate::types::{StopReason, ToolUseContent};

/// Coarse decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No frame seen yet.
    Idle,
    /// Between message start and message stop.
    InMessage,
    /// `Done` or a terminal error was produced.
    Complete,
}

/// State of one open content block.
#[derive(Debug)]
enum OpenBlock {
    Text,
    ToolUse {
        id: String,
        name: String,
        buffer: String,
    },
    Reasoning {
        text: String,
        signature: String,
    },
    Ignored,
}

/// Decodes one turn's frames into stream events.
#[derive(Debug)]
pub struct TurnDecoder {
    state: TurnState,
    blocks: HashMap<usize, OpenBlock>,
    stop_reason: StopReason,
}

impl Default for TurnDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnDecoder {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
            blocks: HashMap::new(),
            stop_reason: StopReason::EndTurn,
        }
    }

    /// Current coarse state.
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Whether a terminal event has been produced.
    pub fn is_complete(&self) -> bool {
        self.state == TurnState::Complete
    }

    /// Number of blocks currently open.
    pub fn open_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Feed one frame. Returns the event it produces, if any.
    pub fn decode(&mut self, frame: Frame) -> Option<StreamEvent> {
        if self.is_complete() {
            tracing::debug!(?frame, "Ignoring frame after turn completed");
            return None;
        }
        if self.state == TurnState::Idle {
            self.state = TurnState::InMessage;
        }

        match frame {
            Frame::MessageStart { id, model } => {
                tracing::debug!(message_id = %id, model = %model, "Turn started");
                None
            }
            Frame::BlockStart { index, block } => {
                let open = match block {
                    BlockKind::Text => OpenBlock::Text,
                    BlockKind::ToolUse { id, name } => OpenBlock::ToolUse {
                        id,
                        name,
                        buffer: String::new(),
                    },
                    BlockKind::Reasoning => OpenBlock::Reasoning {
                        text: String::new(),
                        signature: String::new(),
                    },
                    BlockKind::RedactedReasoning => {
                        tracing::debug!(
                            index,
                            "Discarding redacted reasoning block; it will not be echoed next turn"
                        );
                        OpenBlock::Ignored
                    }
                    BlockKind::Other(kind) => {
                        tracing::warn!(block_type = %kind, "Unknown content block type in stream");
                        OpenBlock::Ignored
                    }
                };
                self.blocks.insert(index, open);
                None
            }
            Frame::BlockDelta { index, delta } => self.apply_delta(index, delta),
            Frame::BlockStop { index } => match self.blocks.remove(&index) {
                Some(OpenBlock::ToolUse { id, name, buffer }) => {
                    Some(StreamEvent::ToolUse(finish_tool_use(id, name, &buffer)))
                }
                Some(OpenBlock::Reasoning { text, signature }) => {
                    Some(StreamEvent::ThinkingComplete { text, signature })
                }
                Some(OpenBlock::Text) | Some(OpenBlock::Ignored) => None,
                None => {
                    tracing::warn!(index, "Block stop for a block that was never opened");
                    None
                }
            },
            Frame::MessageDelta { stop_reason } => {
                self.stop_reason = StopReason::from_wire(stop_reason.as_deref());
                None
            }
            Frame::MessageStop => {
                self.state = TurnState::Complete;
                if !self.blocks.is_empty() {
                    tracing::warn!(open = self.blocks.len(), "Message stopped with open blocks");
                    self.blocks.clear();
                }
                Some(StreamEvent::Done(self.stop_reason))
            }
            Frame::Ping => None,
            Frame::Error { message } => {
                self.state = TurnState::Complete;
                Some(StreamEvent::Error(LlmError::Backend(message)))
            }
        }
    }

    /// Called when the wire stream ends. Produces an error if the turn never
    /// completed.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.is_complete() {
            return None;
        }
        self.state = TurnState::Complete;
        Some(StreamEvent::Error(LlmError::Decode(
            "stream ended before message_stop".to_string(),
        )))
    }

    fn apply_delta(&mut self, index: usize, delta: BlockDelta) -> Option<StreamEvent> {
        match (self.blocks.get_mut(&index), delta) {
            (Some(OpenBlock::Text), BlockDelta::Text(text)) => Some(StreamEvent::Text(text)),
            (Some(OpenBlock::Reasoning { text, .. }), BlockDelta::Reasoning(delta)) => {
                text.push_str(&delta);
                Some(StreamEvent::Thinking(delta))
            }
            (Some(OpenBlock::Reasoning { signature, .. }), BlockDelta::Signature(fragment)) => {
                signature.push_str(&fragment);
                None
            }
            (Some(OpenBlock::ToolUse { buffer, .. }), BlockDelta::ToolInput(fragment)) => {
                buffer.push_str(&fragment);
                None
            }
            (Some(OpenBlock::Ignored), _) => None,
            (block, delta) => {
                tracing::warn!(
                    index,
                    open = block.is_some(),
                    ?delta,
                    "Delta does not match the open block, dropping"
                );
                None
            }
        }
    }
}

/// Parse buffered tool input. Failure leaves an empty input and records why.
fn finish_tool_use(id: String, name: String, buffer: &str) -> ToolUseContent {
    if buffer.trim().is_empty() {
        return ToolUseContent::new(id, name, Map::new());
    }
    match serde_json::from_str::<Value>(buffer) {
        Ok(Value::Object(input)) => ToolUseContent::new(id, name, input),
        Ok(other) => {
            let kind = match other {
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            };
            ToolUseContent::with_parse_error(
                id,
                name,
                format!("tool input must be a JSON object, got {}", kind),
            )
        }
        Err(e) => {
            tracing::warn!(tool = %name, error = %e, "Failed to parse streamed tool input");
            ToolUseContent::with_parse_error(id, name, e.to_string())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
