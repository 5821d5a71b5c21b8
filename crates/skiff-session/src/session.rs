//! Session transcript and helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skiff_llm::{Message, Role};

use crate::context::Context;

/// Maximum length of a session title.
const TITLE_MAX_CHARS: usize = 60;

/// A persisted, append-only conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier, `YYYYMMDD-HHMMSS-xxxxxx`.
    pub id: String,

    /// When the session was created.
    pub started_at: DateTime<Utc>,

    /// When the last message was appended.
    pub updated_at: DateTime<Utc>,

    /// Messages in conversation order.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// What the operator was viewing when the session began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
}

impl Session {
    /// Create an empty session with a fresh id.
    pub fn new(context: Option<Context>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_session_id(now),
            started_at: now,
            updated_at: now,
            messages: Vec::new(),
            context,
        }
    }

    /// Create an empty session with an explicit id.
    pub fn with_id(id: impl Into<String>, context: Option<Context>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            started_at: now,
            updated_at: now,
            messages: Vec::new(),
            context,
        }
    }

    /// Append a message and bump `updated_at`.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// First non-empty user text, shortened for display.
    pub fn title(&self) -> Option<String> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.text())
            .find(|t| !t.trim().is_empty())
            .map(|t| truncate_title(t.trim()))
    }

    /// Summary of this session for listings.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            started_at: self.started_at,
            updated_at: self.updated_at,
            message_count: self.messages.len(),
            title: self.title(),
        }
    }
}

/// Listing entry for a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub title: Option<String>,
}

/// Generate a session id: sortable UTC timestamp plus a short random suffix.
pub fn generate_session_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.format("%Y%m%d-%H%M%S"), &suffix[..6])
}

/// Whether retention should be checked after an append.
///
/// Only the first message of a new session triggers a check; later appends
/// cannot increase the session count.
pub fn should_prune(message_count: usize) -> bool {
    message_count == 1
}

/// Whether an id is safe to use as a file stem.
pub(crate) fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn truncate_title(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= TITLE_MAX_CHARS {
        return first_line.to_string();
    }
    let mut title: String = first_line.chars().take(TITLE_MAX_CHARS - 3).collect();
    title.push_str("...");
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_session_id_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let id = generate_session_id(now);
        assert!(id.starts_with("20260304-050607-"));
        let suffix = id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_valid_id(&id));
    }

    #[test]
    fn test_ids_sort_chronologically() {
        let earlier = generate_session_id(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let later = generate_session_id(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap());
        assert!(earlier < later);
    }

    #[test]
    fn test_should_prune_only_on_first_message() {
        assert!(!should_prune(0));
        assert!(should_prune(1));
        assert!(!should_prune(2));
        assert!(!should_prune(50));
    }

    #[test]
    fn test_push_bumps_updated_at() {
        let mut session = Session::with_id("s1", None);
        let before = session.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        session.push(Message::user("hello"));
        assert!(session.updated_at > before);
        assert_eq!(session.message_count(), 1);
    }

    #[test]
    fn test_title_truncates() {
        let mut session = Session::with_id("s1", None);
        assert_eq!(session.title(), None);
        session.push(Message::assistant("welcome"));
        session.push(Message::user("x".repeat(100)));
        let title = session.title().unwrap();
        assert_eq!(title.chars().count(), 60);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_invalid_ids() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc/passwd"));
        assert!(!is_valid_id("a/b"));
        assert!(is_valid_id("s1"));
    }
}
