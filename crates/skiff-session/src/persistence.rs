//! Storage backends for sessions.
//!
//! The [`SessionBackend`] trait decouples the store from where transcripts
//! live. [`FileBackend`] writes one JSON document per session under
//! `chat/sessions/` plus a `chat/current.json` pointer; [`MemoryBackend`]
//! keeps everything in process for when persistence is disabled.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::session::{Session, is_valid_id};

/// Trait for session storage backends.
pub trait SessionBackend: Send + Sync {
    /// Load a session. Returns `Ok(None)` if it does not exist.
    fn load(&self, id: &str) -> Result<Option<Session>>;

    /// Save a session, replacing any previous version.
    fn save(&self, session: &Session) -> Result<()>;

    /// Delete a session. Returns whether it existed.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Load every stored session. Unreadable entries are skipped.
    fn list(&self) -> Result<Vec<Session>>;

    /// Session ids ordered oldest first, for pruning.
    fn retention_order(&self) -> Result<Vec<String>>;

    /// Read the current-session pointer.
    fn current_id(&self) -> Result<Option<String>>;

    /// Point the current-session pointer at `id`.
    fn set_current_id(&self, id: &str) -> Result<()>;

    /// Remove the current-session pointer.
    fn clear_current_id(&self) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Backend
// ─────────────────────────────────────────────────────────────────────────────

/// In-process storage. Nothing touches the filesystem.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, Session>>,
    current: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(id).cloned())
    }

    fn save(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.write().remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.read().values().cloned().collect())
    }

    fn retention_order(&self) -> Result<Vec<String>> {
        let sessions = self.sessions.read();
        let mut ranked: Vec<_> = sessions
            .values()
            .map(|s| (s.updated_at, s.id.clone()))
            .collect();
        ranked.sort();
        Ok(ranked.into_iter().map(|(_, id)| id).collect())
    }

    fn current_id(&self) -> Result<Option<String>> {
        Ok(self.current.lock().clone())
    }

    fn set_current_id(&self, id: &str) -> Result<()> {
        *self.current.lock() = Some(id.to_string());
        Ok(())
    }

    fn clear_current_id(&self) -> Result<()> {
        *self.current.lock() = None;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Backend
// ─────────────────────────────────────────────────────────────────────────────

const SESSIONS_DIR: &str = "sessions";
const POINTER_FILE: &str = "current.json";
const POINTER_LOCK_FILE: &str = "current.lock";

#[derive(Debug, Serialize, Deserialize)]
struct Pointer {
    id: String,
}

/// One JSON document per session under `<chat>/sessions/`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    chat_dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `chat_dir` (usually `<config>/chat`).
    ///
    /// Directories are created lazily on first write.
    pub fn new(chat_dir: impl Into<PathBuf>) -> Self {
        Self {
            chat_dir: chat_dir.into(),
        }
    }

    pub fn chat_dir(&self) -> &Path {
        &self.chat_dir
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.chat_dir.join(SESSIONS_DIR)
    }

    /// Path of a session document.
    pub fn session_path(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(SessionError::InvalidId(id.to_string()));
        }
        Ok(self.sessions_dir().join(format!("{}.json", id)))
    }

    fn pointer_path(&self) -> PathBuf {
        self.chat_dir.join(POINTER_FILE)
    }

    fn read_session(path: &Path) -> Result<Option<Session>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::io(path, e)),
        }
    }

    /// Session documents in the sessions directory with their mtimes.
    fn session_files(&self) -> Result<Vec<(SystemTime, String, PathBuf)>> {
        let dir = self.sessions_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::io(&dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SessionError::io(&dir, e))?;
            let path = entry.path();
            let Some(stem) = session_stem(&path) else {
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, stem, path));
        }
        Ok(files)
    }
}

/// The id for a `<id>.json` file; `None` for temp files and anything else.
fn session_stem(path: &Path) -> Option<String> {
    if path.extension()? != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    is_valid_id(stem).then(|| stem.to_string())
}

impl SessionBackend for FileBackend {
    fn load(&self, id: &str) -> Result<Option<Session>> {
        Self::read_session(&self.session_path(id)?)
    }

    fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.id)?;
        ensure_private_dir(&self.sessions_dir())?;
        let json = serde_json::to_vec_pretty(session)?;
        write_atomic(&path, &json)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let path = self.session_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::io(&path, e)),
        }
    }

    fn list(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for (_, id, path) in self.session_files()? {
            match Self::read_session(&path) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => tracing::warn!(session_id = %id, error = %e, "Skipping unreadable session"),
            }
        }
        Ok(sessions)
    }

    fn retention_order(&self) -> Result<Vec<String>> {
        let mut files = self.session_files()?;
        files.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        Ok(files.into_iter().map(|(_, id, _)| id).collect())
    }

    fn current_id(&self) -> Result<Option<String>> {
        let path = self.pointer_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::io(&path, e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        let pointer: Pointer = serde_json::from_str(&content)?;
        Ok(Some(pointer.id).filter(|id| is_valid_id(id)))
    }

    fn set_current_id(&self, id: &str) -> Result<()> {
        if !is_valid_id(id) {
            return Err(SessionError::InvalidId(id.to_string()));
        }
        ensure_private_dir(&self.chat_dir)?;
        let _lock = FileLock::acquire(&self.chat_dir.join(POINTER_LOCK_FILE))?;
        let json = serde_json::to_vec(&Pointer { id: id.to_string() })?;
        write_atomic(&self.pointer_path(), &json)
    }

    fn clear_current_id(&self) -> Result<()> {
        if !self.chat_dir.exists() {
            return Ok(());
        }
        let _lock = FileLock::acquire(&self.chat_dir.join(POINTER_LOCK_FILE))?;
        let path = self.pointer_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::io(&path, e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Create `dir` (and parents) readable only by the owner.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| SessionError::io(dir, e))
}

fn open_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Write `bytes` to a sibling temp file, fsync, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
        return Err(SessionError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent"),
        ));
    };
    let tmp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

    let mut tmp = open_private(&tmp_path).map_err(|e| SessionError::io(&tmp_path, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.sync_all())
        .map_err(|e| SessionError::io(&tmp_path, e))?;
    drop(tmp);

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        SessionError::io(path, e)
    })
}

/// Exclusive advisory lock held for the guard's lifetime.
///
/// The lock file is left in place so every writer locks the same inode.
struct FileLock {
    #[allow(dead_code)]
    file: File,
}

impl FileLock {
    fn acquire(lock_path: &Path) -> Result<Self> {
        let file = open_private_append(lock_path).map_err(|e| SessionError::io(lock_path, e))?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| SessionError::Lock(format!("Failed to acquire lock: {}", e)))?;
        }

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use fs2::FileExt;
            let _ = self.file.unlock();
        }
    }
}

fn open_private_append(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
