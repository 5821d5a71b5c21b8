//! Conversation session store with retention.
//!
//! This crate persists assistant transcripts with:
//! - one JSON document per session under `<config>/chat/sessions/`
//! - a `chat/current.json` pointer so a later process can resume
//! - a retention cap that prunes the oldest sessions
//! - an in-memory mode when persistence is disabled
//!
//! # Example
//!
//! ```rust,ignore
//! use skiff_session::{RetentionConfig, SessionStore};
//!
//! let store = SessionStore::open(RetentionConfig::default(), config_dir);
//! let mut session = store.create(None);
//! store.append(&mut session, Message::user("which lambdas failed today?"));
//! ```

mod config;
mod context;
mod error;
mod persistence;
mod session;
mod store;

pub use config::{DEFAULT_MAX_SESSIONS, RetentionConfig};
pub use context::{Context, ContextMode, ResourceRef};
pub use error::{Result, SessionError};
pub use persistence::{FileBackend, MemoryBackend, SessionBackend};
pub use session::{Session, SessionSummary, generate_session_id, should_prune};
pub use store::SessionStore;
