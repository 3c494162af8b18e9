//! Conversation persistence.
//!
//! A session is written after every conversation change unless it is in
//! encrypted mode, in which case nothing about it ever reaches storage.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::message::Conversation;
use crate::utils::ids::{generate_id, now_millis};

const KEY_PREFIX: &str = "obsidian-session-";
const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(rename = "messages")]
    pub conversation: Conversation,
    #[serde(rename = "personality")]
    pub personality_id: String,
    #[serde(rename = "isEncrypted")]
    pub encrypted: bool,
    /// Epoch milliseconds of the last write.
    pub last_active: i64,
}

impl Session {
    pub fn new(id: String, personality_id: impl Into<String>, encrypted: bool) -> Self {
        Self {
            id,
            conversation: Conversation::new(),
            personality_id: personality_id.into(),
            encrypted,
            last_active: now_millis(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("session record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid session key: {0}")]
    InvalidKey(String),
}

/// String key/value storage for session records.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError>;

    /// Insert or overwrite.
    fn put(&self, key: &str, value: &str) -> Result<(), SessionStoreError>;

    /// Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), SessionStoreError>;

    fn keys(&self) -> Result<Vec<String>, SessionStoreError>;
}

impl<T: SessionStorage + ?Sized> SessionStorage for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, SessionStoreError> {
        (**self).keys()
    }
}

/// One `<key>.json` file per record inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<platform data dir>/sessions`.
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "obsidian", "obsidian")
            .map(|dirs| dirs.data_dir().join("sessions"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> Result<PathBuf, SessionStoreError> {
        let valid = !key.is_empty()
            && !key.contains("..")
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.{RECORD_EXTENSION}")))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let path = self.record_path(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        let path = self.record_path(key)?;
        fs::create_dir_all(&self.dir)?;

        let mut temp_file = NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(value.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, SessionStoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.records().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.records().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.records().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, SessionStoreError> {
        Ok(self.records().keys().cloned().collect())
    }
}

pub fn record_key(session_id: &str) -> String {
    format!("{KEY_PREFIX}{session_id}")
}

pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
}

impl SessionStore {
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Write the session, overwriting any earlier record. Does nothing in
    /// encrypted mode.
    pub fn save(
        &self,
        session_id: &str,
        conversation: &Conversation,
        personality_id: &str,
        encrypted: bool,
    ) -> Result<(), SessionStoreError> {
        if encrypted {
            debug!(session = session_id, "encrypted session, skipping save");
            return Ok(());
        }

        let record = Session {
            id: session_id.to_string(),
            conversation: conversation.clone(),
            personality_id: personality_id.to_string(),
            encrypted,
            last_active: now_millis(),
        };
        let json = serde_json::to_string(&record)?;
        self.storage.put(&record_key(session_id), &json)
    }

    pub fn load(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError> {
        match self.storage.get(&record_key(session_id))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn clear(&self, session_id: &str) -> Result<(), SessionStoreError> {
        self.storage.remove(&record_key(session_id))
    }

    pub fn new_id(&self) -> String {
        generate_id()
    }

    /// Every readable persisted session, most recently active first.
    /// Unreadable records are skipped.
    pub fn list(&self) -> Result<Vec<Session>, SessionStoreError> {
        let mut sessions = Vec::new();
        for key in self.storage.keys()? {
            let Some(session_id) = key.strip_prefix(KEY_PREFIX) else {
                continue;
            };
            match self.load(session_id) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(err) => warn!(key = %key, error = %err, "skipping unreadable session record"),
            }
        }
        sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use tempfile::tempdir;

    fn conversation(texts: &[&str]) -> Conversation {
        texts.iter().map(|text| Message::user(*text)).collect()
    }

    #[test]
    fn save_then_load_round_trips_the_record() {
        let store = SessionStore::in_memory();
        let conv = conversation(&["hi"]);
        store.save("s1", &conv, "ghost", false).expect("save");

        let loaded = store.load("s1").expect("load").expect("present");
        assert_eq!(loaded.id, "s1");
        assert_eq!(loaded.conversation, conv);
        assert_eq!(loaded.personality_id, "ghost");
        assert!(!loaded.encrypted);
    }

    #[test]
    fn encrypted_saves_never_touch_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store
            .save("s1", &conversation(&["secret"]), "analyst", true)
            .expect("save");
        assert!(storage.keys().expect("keys").is_empty());
        assert!(store.load("s1").expect("load").is_none());
    }

    #[test]
    fn records_use_the_documented_key_and_field_names() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store
            .save("abc", &conversation(&["hi"]), "oracle", false)
            .expect("save");

        let raw = storage
            .get("obsidian-session-abc")
            .expect("get")
            .expect("record present");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["id"], "abc");
        assert_eq!(value["personality"], "oracle");
        assert_eq!(value["isEncrypted"], false);
        assert!(value["lastActive"].is_i64());
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn clear_is_idempotent() {
        let store = SessionStore::in_memory();
        store.save("s1", &conversation(&["x"]), "ghost", false).expect("save");
        store.clear("s1").expect("first clear");
        store.clear("s1").expect("second clear");
        assert!(store.load("s1").expect("load").is_none());
    }

    #[test]
    fn list_orders_by_last_activity() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        for (id, last_active) in [("old", 1_000), ("new", 3_000), ("mid", 2_000)] {
            let session = Session {
                id: id.to_string(),
                conversation: conversation(&["x"]),
                personality_id: "ghost".into(),
                encrypted: false,
                last_active,
            };
            storage
                .put(&record_key(id), &serde_json::to_string(&session).expect("json"))
                .expect("put");
        }
        storage.put("unrelated", "{}").expect("put");
        storage.put(&record_key("broken"), "not json").expect("put");

        let ids: Vec<String> = store
            .list()
            .expect("list")
            .into_iter()
            .map(|session| session.id)
            .collect();
        assert_eq!(ids, ["new", "mid", "old"]);
    }

    #[test]
    fn new_ids_are_unique() {
        let store = SessionStore::in_memory();
        assert_ne!(store.new_id(), store.new_id());
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let dir = tempdir().expect("tempdir");
        let sessions_dir = dir.path().join("sessions");

        SessionStore::new(FileStorage::new(&sessions_dir))
            .save("s1", &conversation(&["hello"]), "analyst", false)
            .expect("save");
        assert!(sessions_dir.join("obsidian-session-s1.json").exists());

        let reopened = SessionStore::new(FileStorage::new(&sessions_dir));
        let loaded = reopened.load("s1").expect("load").expect("present");
        assert_eq!(loaded.conversation.len(), 1);
        assert_eq!(reopened.list().expect("list").len(), 1);

        reopened.clear("s1").expect("clear");
        assert!(!sessions_dir.join("obsidian-session-s1.json").exists());
    }

    #[test]
    fn file_storage_handles_missing_directory_and_rejects_bad_keys() {
        let dir = tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("absent"));
        assert!(storage.keys().expect("keys").is_empty());
        assert!(storage.get("obsidian-session-x").expect("get").is_none());
        storage.remove("obsidian-session-x").expect("remove missing");

        assert!(matches!(
            storage.put("../escape", "{}"),
            Err(SessionStoreError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.get("a/b"),
            Err(SessionStoreError::InvalidKey(_))
        ));
    }
}
