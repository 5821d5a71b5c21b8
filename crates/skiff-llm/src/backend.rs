//! Backend trait, wire frames, and stream events.
//!
//! A [`ConverseBackend`] opens one streaming turn and hands back the raw,
//! provider-neutral [`Frame`] sequence. The [`decoder`](crate::decoder) turns
//! frames into [`StreamEvent`]s and the [`stream`](crate::stream) worker
//! delivers them to the caller.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{LlmError, Result};
use crate::types::{ConverseRequest, StopReason, ToolUseContent};

// ─────────────────────────────────────────────────────────────────────────────
// Wire Frames
// ─────────────────────────────────────────────────────────────────────────────

/// A raw frame stream from a backend.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send + 'static>>;

/// One decoded wire frame, in provider order.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Message started.
    MessageStart { id: String, model: String },
    /// Content block opened.
    BlockStart { index: usize, block: BlockKind },
    /// Incremental content for an open block.
    BlockDelta { index: usize, delta: BlockDelta },
    /// Content block closed.
    BlockStop { index: usize },
    /// Final message metadata; carries the raw provider stop reason.
    MessageDelta { stop_reason: Option<String> },
    /// Message complete.
    MessageStop,
    /// Keep-alive.
    Ping,
    /// Provider-reported error inside the stream.
    Error { message: String },
}

/// Kind of a content block announced by [`Frame::BlockStart`].
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Text,
    ToolUse { id: String, name: String },
    Reasoning,
    /// Reasoning the provider redacted; carries no readable text.
    RedactedReasoning,
    /// A block type this client does not model.
    Other(String),
}

/// Delta payload for an open block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockDelta {
    /// Text being streamed.
    Text(String),
    /// Reasoning text being streamed.
    Reasoning(String),
    /// Reasoning signature fragment.
    Signature(String),
    /// Partial JSON for tool input.
    ToolInput(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream Events
// ─────────────────────────────────────────────────────────────────────────────

/// Events delivered to the caller during one turn.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Text delta for progressive display.
    Text(String),
    /// Reasoning delta for progressive display.
    Thinking(String),
    /// A reasoning block closed.
    ThinkingComplete { text: String, signature: String },
    /// A tool use block closed.
    ToolUse(ToolUseContent),
    /// Turn complete.
    Done(StopReason),
    /// Turn failed.
    Error(LlmError),
}

impl StreamEvent {
    /// Returns true if this is an error event.
    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error(_))
    }

    /// Returns true if no events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_) | StreamEvent::Error(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for streaming model providers.
#[async_trait]
pub trait ConverseBackend: Send + Sync {
    /// Open one streaming turn and return its raw frames.
    async fn open_turn(&self, request: &ConverseRequest) -> Result<FrameStream>;

    /// Get the backend name (for logging).
    fn name(&self) -> &str;
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn ConverseBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Mock backend for testing.
///
/// Replays pre-scripted frame sequences, one per turn, and records the
/// requests it received.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct MockBackend {
    turns: std::sync::Mutex<std::collections::VecDeque<Vec<Frame>>>,
    request_log: std::sync::Mutex<Vec<ConverseRequest>>,
}

#[cfg(any(test, feature = "testing"))]
impl MockBackend {
    /// Create a mock backend that replays the given turns in order.
    pub fn new(turns: Vec<Vec<Frame>>) -> Self {
        Self {
            turns: std::sync::Mutex::new(turns.into()),
            request_log: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend with a single text reply.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![mock::text_turn(text)])
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<ConverseRequest> {
        self.request_log.lock().unwrap().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl ConverseBackend for MockBackend {
    async fn open_turn(&self, request: &ConverseRequest) -> Result<FrameStream> {
        self.request_log.lock().unwrap().push(request.clone());

        let frames = self.turns.lock().unwrap().pop_front().ok_or_else(|| {
            LlmError::Backend("MockBackend: no more turns available".to_string())
        })?;

        Ok(Box::pin(futures::stream::iter(frames.into_iter().map(Ok))))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Frame builders for scripted turns.
#[cfg(any(test, feature = "testing"))]
pub mod mock {
    use super::{BlockDelta, BlockKind, Frame};

    /// A complete turn with one text block.
    pub fn text_turn(text: impl Into<String>) -> Vec<Frame> {
        let text: String = text.into();
        let mut frames = vec![message_start()];
        frames.extend(text_block(0, &[text.as_str()]));
        frames.extend(finish("end_turn"));
        frames
    }

    /// A complete turn with one tool use block whose input arrives in fragments.
    pub fn tool_turn(id: &str, name: &str, fragments: &[&str]) -> Vec<Frame> {
        let mut frames = vec![message_start()];
        frames.extend(tool_block(0, id, name, fragments));
        frames.extend(finish("tool_use"));
        frames
    }

    pub fn message_start() -> Frame {
        Frame::MessageStart {
            id: "msg_mock".to_string(),
            model: "mock-model".to_string(),
        }
    }

    /// Start, deltas, and stop for a text block.
    pub fn text_block(index: usize, deltas: &[&str]) -> Vec<Frame> {
        let mut frames = vec![Frame::BlockStart {
            index,
            block: BlockKind::Text,
        }];
        frames.extend(deltas.iter().map(|d| Frame::BlockDelta {
            index,
            delta: BlockDelta::Text(d.to_string()),
        }));
        frames.push(Frame::BlockStop { index });
        frames
    }

    /// Start, input fragments, and stop for a tool use block.
    pub fn tool_block(index: usize, id: &str, name: &str, fragments: &[&str]) -> Vec<Frame> {
        let mut frames = vec![Frame::BlockStart {
            index,
            block: BlockKind::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
            },
        }];
        frames.extend(fragments.iter().map(|f| Frame::BlockDelta {
            index,
            delta: BlockDelta::ToolInput(f.to_string()),
        }));
        frames.push(Frame::BlockStop { index });
        frames
    }

    /// Start, text, signature, and stop for a reasoning block.
    pub fn reasoning_block(index: usize, deltas: &[&str], signature: &str) -> Vec<Frame> {
        let mut frames = vec![Frame::BlockStart {
            index,
            block: BlockKind::Reasoning,
        }];
        frames.extend(deltas.iter().map(|d| Frame::BlockDelta {
            index,
            delta: BlockDelta::Reasoning(d.to_string()),
        }));
        frames.push(Frame::BlockDelta {
            index,
            delta: BlockDelta::Signature(signature.to_string()),
        });
        frames.push(Frame::BlockStop { index });
        frames
    }

    /// Message delta with the stop reason, then message stop.
    pub fn finish(stop_reason: &str) -> Vec<Frame> {
        vec![
            Frame::MessageDelta {
                stop_reason: Some(stop_reason.to_string()),
            },
            Frame::MessageStop,
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_mock_backend_replays_turns_in_order() {
        let backend = MockBackend::new(vec![mock::text_turn("one"), mock::text_turn("two")]);
        let request = ConverseRequest::new("m", vec![Message::user("hi")], 100);

        let first: Vec<_> = backend.open_turn(&request).await.unwrap().collect().await;
        let second: Vec<_> = backend.open_turn(&request).await.unwrap().collect().await;

        assert!(first.iter().any(|f| matches!(
            f,
            Ok(Frame::BlockDelta { delta: BlockDelta::Text(t), .. }) if t == "one"
        )));
        assert!(second.iter().any(|f| matches!(
            f,
            Ok(Frame::BlockDelta { delta: BlockDelta::Text(t), .. }) if t == "two"
        )));
        assert_eq!(backend.request_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_backend_exhausted() {
        let backend = MockBackend::new(vec![]);
        let request = ConverseRequest::new("m", vec![], 100);
        assert!(backend.open_turn(&request).await.is_err());
    }

    #[test]
    fn test_stream_event_is_terminal() {
        assert!(StreamEvent::Done(StopReason::EndTurn).is_terminal());
        assert!(StreamEvent::Error(LlmError::Cancelled).is_terminal());
        assert!(StreamEvent::Error(LlmError::Cancelled).is_error());
        assert!(!StreamEvent::Text("x".into()).is_terminal());
        assert!(!StreamEvent::Thinking("x".into()).is_terminal());
    }
}
