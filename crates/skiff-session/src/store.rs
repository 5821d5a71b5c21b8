//! Session store: lifecycle, current-session pointer, and retention.

use std::path::Path;
use std::sync::Arc;

use skiff_llm::Message;

use crate::config::RetentionConfig;
use crate::context::Context;
use crate::error::{Result, SessionError};
use crate::persistence::{FileBackend, MemoryBackend, SessionBackend};
use crate::session::{Session, SessionSummary, should_prune};

/// Creates, appends to, loads and prunes sessions.
///
/// Owned by one process. Save failures during [`append`](Self::append) are
/// logged and never surface to the conversation.
#[derive(Clone)]
pub struct SessionStore {
    config: RetentionConfig,
    backend: Arc<dyn SessionBackend>,
}

impl SessionStore {
    /// Open a store under `config_dir`.
    ///
    /// Sessions go to `<config_dir>/chat/` when persistence is enabled and to
    /// memory otherwise.
    pub fn open(config: RetentionConfig, config_dir: impl AsRef<Path>) -> Self {
        if config.persistence_enabled {
            let backend = FileBackend::new(config_dir.as_ref().join("chat"));
            Self::with_backend(config, Arc::new(backend))
        } else {
            Self::in_memory(config)
        }
    }

    /// Create a store that never touches the filesystem.
    pub fn in_memory(config: RetentionConfig) -> Self {
        Self::with_backend(config, Arc::new(MemoryBackend::new()))
    }

    /// Create a store over a custom backend.
    pub fn with_backend(config: RetentionConfig, backend: Arc<dyn SessionBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Start a new session. Nothing is written until the first append.
    pub fn create(&self, context: Option<Context>) -> Session {
        let session = Session::new(context);
        tracing::debug!(session_id = %session.id, "Created session");
        session
    }

    /// Append a message, persist, and prune if this was the first message.
    pub fn append(&self, session: &mut Session, message: Message) {
        session.push(message);

        if let Err(e) = self.save(session) {
            tracing::warn!(session_id = %session.id, error = %e, "Failed to save session");
            return;
        }

        if should_prune(session.message_count()) {
            match self.prune(&session.id) {
                Ok(pruned) if !pruned.is_empty() => {
                    tracing::debug!(count = pruned.len(), "Pruned old sessions");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to prune sessions"),
            }
        }
    }

    /// Persist a session and make it current.
    pub fn save(&self, session: &Session) -> Result<()> {
        self.backend.save(session)?;
        self.backend.set_current_id(&session.id)
    }

    /// Load a session by id.
    pub fn load(&self, id: &str) -> Result<Session> {
        self.backend
            .load(id)?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Load the session the pointer names, if it still exists.
    pub fn load_current(&self) -> Result<Option<Session>> {
        let Some(id) = self.backend.current_id()? else {
            return Ok(None);
        };
        let session = self.backend.load(&id)?;
        if session.is_none() {
            tracing::debug!(session_id = %id, "Current session pointer is stale");
        }
        Ok(session)
    }

    /// Id of the current session, if any.
    pub fn current_id(&self) -> Result<Option<String>> {
        self.backend.current_id()
    }

    /// Summaries of all stored sessions, most recently updated first.
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries: Vec<_> = self
            .backend
            .list()?
            .iter()
            .map(Session::summary)
            .collect();
        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(summaries)
    }

    /// Delete a session, clearing the pointer if it named it.
    pub fn delete(&self, id: &str) -> Result<()> {
        if !self.backend.delete(id)? {
            return Err(SessionError::NotFound(id.to_string()));
        }
        if self.backend.current_id()?.as_deref() == Some(id) {
            self.backend.clear_current_id()?;
        }
        Ok(())
    }

    /// Delete the oldest sessions beyond `max_sessions`, never `keep`.
    ///
    /// Returns the ids removed.
    pub fn prune(&self, keep: &str) -> Result<Vec<String>> {
        let order = self.backend.retention_order()?;
        let excess = order.len().saturating_sub(self.config.max_sessions);
        if excess == 0 {
            return Ok(Vec::new());
        }

        let mut removed = Vec::with_capacity(excess);
        for id in order.into_iter().filter(|id| id != keep).take(excess) {
            match self.backend.delete(&id) {
                Ok(_) => removed.push(id),
                Err(e) => tracing::warn!(session_id = %id, error = %e, "Failed to prune session"),
            }
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResourceRef;
    use skiff_llm::{ContentBlock, ToolResultContent, ToolUseContent};
    use std::time::Duration;
    use tempfile::TempDir;

    fn file_store(dir: &TempDir, max: usize) -> SessionStore {
        SessionStore::open(RetentionConfig::new().with_max_sessions(max), dir.path())
    }

    fn stored_ids(dir: &TempDir) -> Vec<String> {
        let mut ids: Vec<String> = std::fs::read_dir(dir.path().join("chat/sessions"))
            .unwrap()
            .filter_map(|e| {
                let name = e.unwrap().file_name().to_string_lossy().to_string();
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_retention_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, 3);

        for id in ["s1", "s2", "s3", "s4", "s5"] {
            let mut session = Session::with_id(id, None);
            store.append(&mut session, Message::user(format!("question {id}")));
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(stored_ids(&dir), vec!["s3", "s4", "s5"]);
        assert_eq!(store.current_id().unwrap().as_deref(), Some("s5"));
    }

    #[test]
    fn test_prune_only_on_first_append() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, 100);
        let mut session = Session::with_id("s1", None);
        store.append(&mut session, Message::user("a"));

        let store = file_store(&dir, 0);
        // Second append does not trigger retention even over the cap.
        store.append(&mut session, Message::assistant("b"));
        assert_eq!(stored_ids(&dir), vec!["s1"]);
    }

    #[test]
    fn test_prune_never_removes_kept_session() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, 0);
        let mut session = Session::with_id("only", None);
        store.append(&mut session, Message::user("hi"));
        assert_eq!(stored_ids(&dir), vec!["only"]);
    }

    #[test]
    fn test_round_trip_messages_and_context() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, 10);

        let context = Context::diff(
            ResourceRef::new("ecs", "services", "api"),
            ResourceRef::new("ecs", "services", "worker"),
        )
        .with_cluster("prod")
        .with_toggle("wide", true);
        let mut session = store.create(Some(context.clone()));

        let tool_use = ToolUseContent::new(
            "toolu_1",
            "get_resource_detail",
            serde_json::json!({"service": "ecs"})
                .as_object()
                .unwrap()
                .clone(),
        );
        store.append(&mut session, Message::user("what differs?"));
        store.append(
            &mut session,
            Message::assistant_blocks(vec![
                ContentBlock::reasoning("compare", "sig"),
                ContentBlock::ToolUse(tool_use),
            ]),
        );
        store.append(
            &mut session,
            Message::tool_results(vec![ToolResultContent::success("toolu_1", "{}")]),
        );

        let loaded = store.load(&session.id).unwrap();
        assert_eq!(loaded.messages, session.messages);
        assert_eq!(loaded.context, Some(context));
        assert_eq!(loaded.started_at, session.started_at);
    }

    #[test]
    fn test_load_current() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, 10);
        assert!(store.load_current().unwrap().is_none());

        let mut session = store.create(None);
        store.append(&mut session, Message::user("resume me"));

        let reopened = file_store(&dir, 10);
        let current = reopened.load_current().unwrap().unwrap();
        assert_eq!(current.id, session.id);
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, 10);
        assert!(matches!(store.load("nope"), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_list_newest_first() {
        let store = SessionStore::in_memory(RetentionConfig::default());
        for id in ["a", "b", "c"] {
            let mut session = Session::with_id(id, None);
            store.append(&mut session, Message::user(format!("about {id}")));
            std::thread::sleep(Duration::from_millis(5));
        }

        let list = store.list().unwrap();
        let ids: Vec<_> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(list[0].title.as_deref(), Some("about c"));
        assert_eq!(list[0].message_count, 1);
    }

    #[test]
    fn test_delete_clears_pointer() {
        let store = SessionStore::in_memory(RetentionConfig::default());
        let mut session = Session::with_id("s1", None);
        store.append(&mut session, Message::user("x"));

        store.delete("s1").unwrap();
        assert!(store.current_id().unwrap().is_none());
        assert!(matches!(store.delete("s1"), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_persistence_disabled_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = RetentionConfig::new()
            .with_persistence(false)
            .with_max_sessions(2);
        let store = SessionStore::open(config, dir.path());

        for id in ["s1", "s2", "s3"] {
            let mut session = Session::with_id(id, None);
            store.append(&mut session, Message::user("x"));
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(!dir.path().join("chat").exists());
        let ids: Vec<_> = store.list().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["s3", "s2"]);
        assert_eq!(store.load_current().unwrap().unwrap().id, "s3");
    }

    #[test]
    fn test_append_survives_unwritable_store() {
        let dir = TempDir::new().unwrap();
        // A file where the chat directory should be makes every save fail.
        std::fs::write(dir.path().join("chat"), "not a directory").unwrap();
        let store = file_store(&dir, 10);

        let mut session = Session::with_id("s1", None);
        store.append(&mut session, Message::user("still works"));
        assert_eq!(session.message_count(), 1);
        assert!(store.save(&session).is_err());
    }
}
