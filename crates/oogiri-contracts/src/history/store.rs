use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::record::{GenerationRecord, HistoryFile};
use crate::session::sanitize_session_id;

/// Best-effort persistence of a session's history, keyed by browser session id.
///
/// Failures never propagate: a broken or missing entry loads as `None`, and a
/// failed save or clear is dropped after logging.
pub trait HistoryStore: Send + Sync {
    fn load(&self, session_id: &str) -> Option<Vec<GenerationRecord>>;
    fn save(&self, session_id: &str, history: &[GenerationRecord]);
    fn clear(&self, session_id: &str);
}

/// One `<sanitized id>.json` file per session under `root`.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    root: PathBuf,
}

impl FileHistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join("oogiri_history"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, session_id: &str) -> Option<PathBuf> {
        let safe_id = sanitize_session_id(session_id);
        if safe_id.is_empty() {
            return None;
        }
        Some(self.root.join(format!("{safe_id}.json")))
    }

    fn write(&self, path: &Path, history: &[GenerationRecord]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(
            path,
            serde_json::to_string(&HistoryFile::snapshot(history))?,
        )?;
        Ok(())
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self, session_id: &str) -> Option<Vec<GenerationRecord>> {
        let path = self.path_for(session_id)?;
        if !path.exists() {
            return None;
        }
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "history file unreadable");
                return None;
            }
        };
        let history = HistoryFile::parse(&raw);
        if history.is_none() {
            debug!(path = %path.display(), "history file malformed; ignoring");
        }
        history
    }

    fn save(&self, session_id: &str, history: &[GenerationRecord]) {
        let Some(path) = self.path_for(session_id) else {
            debug!("session id sanitizes to nothing; history not saved");
            return;
        };
        if let Err(err) = self.write(&path, history) {
            debug!(path = %path.display(), error = %err, "history save failed");
        }
    }

    fn clear(&self, session_id: &str) {
        let Some(path) = self.path_for(session_id) else {
            return;
        };
        if !path.exists() {
            return;
        }
        if let Err(err) = std::fs::remove_file(&path) {
            debug!(path = %path.display(), error = %err, "history clear failed");
        }
    }
}

/// Process-lifetime store; history survives page reloads but not restarts.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    sessions: Mutex<HashMap<String, Vec<GenerationRecord>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self, session_id: &str) -> Option<Vec<GenerationRecord>> {
        let sessions = self.sessions.lock().ok()?;
        sessions.get(&sanitize_session_id(session_id)).cloned()
    }

    fn save(&self, session_id: &str, history: &[GenerationRecord]) {
        let safe_id = sanitize_session_id(session_id);
        if safe_id.is_empty() {
            return;
        }
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(safe_id, history.to_vec());
        }
    }

    fn clear(&self, session_id: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&sanitize_session_id(session_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FileHistoryStore, HistoryStore, MemoryHistoryStore};
    use crate::history::GenerationRecord;

    fn record(id: &str, prompt: &str, no_text: bool, image: &[u8]) -> GenerationRecord {
        GenerationRecord {
            id: id.to_string(),
            prompt: prompt.to_string(),
            model: "models/gemini-2.5-flash-image-preview".to_string(),
            no_text,
            image: image.to_vec(),
            texts: Vec::new(),
        }
    }

    #[test]
    fn file_store_round_trips_history_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = FileHistoryStore::new(temp.path().join("history"));
        let image: Vec<u8> = (0..=255u8).collect();
        let history = vec![
            record("b", "second", true, &image),
            record("a", "first", false, b"\x00\x01\xff"),
        ];

        store.save("abc123", &history);
        let loaded = store.load("abc123").unwrap_or_default();

        assert_eq!(loaded, history);
        assert!(temp.path().join("history").join("abc123.json").exists());
        Ok(())
    }

    #[test]
    fn file_store_missing_session_is_absent() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = FileHistoryStore::new(temp.path());
        assert!(store.load("never-saved").is_none());
        Ok(())
    }

    #[test]
    fn file_store_sanitizes_session_ids() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = FileHistoryStore::new(temp.path());

        let path = store.path_for("../../etc/pass wd").unwrap_or_default();
        assert_eq!(path, temp.path().join("etcpasswd.json"));
        assert!(store.path_for("../..").is_none());

        store.save("../..", &[record("a", "x", false, b"x")]);
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn file_store_treats_corrupt_file_as_absent() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = FileHistoryStore::new(temp.path());
        std::fs::write(temp.path().join("broken.json"), "{\"history\": ")?;
        assert!(store.load("broken").is_none());
        Ok(())
    }

    #[test]
    fn file_store_clear_removes_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = FileHistoryStore::new(temp.path());
        store.save("s1", &[record("a", "x", false, b"x")]);
        assert!(store.load("s1").is_some());

        store.clear("s1");
        assert!(store.load("s1").is_none());
        store.clear("s1");
        Ok(())
    }

    #[test]
    fn memory_store_round_trips_and_clears() {
        let store = MemoryHistoryStore::new();
        assert!(store.load("s1").is_none());

        store.save("s1", &[record("a", "x", false, b"x")]);
        assert_eq!(store.load("s1").map(|rows| rows.len()), Some(1));
        assert!(store.load("s2").is_none());

        store.clear("s1");
        assert!(store.load("s1").is_none());
    }
}
