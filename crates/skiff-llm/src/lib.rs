//! Message model and streaming model client for Skiff.
//!
//! This crate holds the conversation data model shared by the rest of the
//! workspace and the client that streams one model turn at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   Frame    ┌─────────────┐  StreamEvent  ┌─────────────┐
//! │ ConverseBackend  │ ─────────▶ │ TurnDecoder │ ────────────▶ │ EventStream │
//! │ (Anthropic, mock)│            │ (worker)    │   mpsc(10)    │  (caller)   │
//! └──────────────────┘            └─────────────┘               └─────────────┘
//! ```
//!
//! [`StreamingClient::converse`] opens the turn on the backend and spawns the
//! decode worker; the caller drains events until `Done` or `Error`.

pub mod anthropic;
pub mod backend;
pub mod decoder;
pub mod error;
pub mod stream;
pub mod types;

pub use anthropic::{AnthropicBackend, AnthropicConfig, create_shared_backend};
pub use backend::{
    BlockDelta, BlockKind, ConverseBackend, Frame, FrameStream, SharedBackend, StreamEvent,
};
#[cfg(any(test, feature = "testing"))]
pub use backend::{MockBackend, mock};
pub use decoder::{TurnDecoder, TurnState};
pub use error::{LlmError, RateLimitInfo, Result};
pub use stream::{
    DEFAULT_EVENT_QUEUE_CAPACITY, EventStream, StreamingClient, spawn_turn,
    spawn_turn_with_capacity,
};
pub use types::{
    ContentBlock, ConverseRequest, MIN_THINKING_BUDGET, Message, Role, StopReason,
    ToolDefinition, ToolResultContent, ToolUseContent, supports_extended_thinking,
};
