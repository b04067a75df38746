//! Persistence collaborators.
//!
//! [`KeyValueStore`] is the raw string store; [`LocalDocumentStore`] layers the
//! document collection, the autosave slot and the theme preference on top of
//! it under fixed keys.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Theme;
use crate::error::StoreError;
use crate::timer::Timestamp;

pub type DocumentId = String;

pub const DOCUMENTS_KEY: &str = "rte-documents";
pub const AUTOSAVE_KEY: &str = "rte-autosave";
pub const THEME_KEY: &str = "rte-theme";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
    pub word_count: usize,
    pub character_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosavePayload {
    pub content: String,
    pub timestamp: Timestamp,
    pub current_document: Option<DocumentRecord>,
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One file per key under a root directory. Writes go through a temporary
/// file and a rename so a crash never leaves a half-written value.
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }
}

fn io_error(key: &str) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        key: key.to_string(),
        source,
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(key)(err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp).map_err(io_error(key))?;
        file.write_all(value.as_bytes()).map_err(io_error(key))?;
        file.flush().map_err(io_error(key))?;
        fs::rename(tmp, path).map_err(io_error(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(key)(err)),
        }
    }
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.lock().remove(key);
        Ok(())
    }
}

pub trait DocumentStore: Send + Sync {
    /// Stored documents, most recently modified first.
    fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError>;
    fn upsert_document(&self, record: &DocumentRecord) -> Result<(), StoreError>;
    /// Returns whether a document with `id` existed.
    fn remove_document(&self, id: &str) -> Result<bool, StoreError>;
    fn read_autosave(&self) -> Result<Option<AutosavePayload>, StoreError>;
    fn write_autosave(&self, payload: &AutosavePayload) -> Result<(), StoreError>;
    fn clear_autosave(&self) -> Result<(), StoreError>;
    fn read_theme(&self) -> Result<Option<Theme>, StoreError>;
    fn write_theme(&self, theme: Theme) -> Result<(), StoreError>;

    fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self
            .list_documents()?
            .into_iter()
            .find(|record| record.id == id))
    }
}

/// Document persistence over a shared key-value store.
///
/// The collection is rewritten whole on every upsert; with several sessions on
/// one store the last writer wins.
pub struct LocalDocumentStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalDocumentStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    /// Reads and decodes `key`. Undecodable data counts as absent.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.kv.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(%key, ?err, "ignoring malformed stored data");
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let payload = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.kv.set(key, &payload)
    }

    fn write_documents(&self, mut documents: Vec<DocumentRecord>) -> Result<(), StoreError> {
        documents.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        self.write_json(DOCUMENTS_KEY, &documents)
    }
}

impl DocumentStore for LocalDocumentStore {
    fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        Ok(self.read_json(DOCUMENTS_KEY)?.unwrap_or_default())
    }

    fn upsert_document(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let mut documents = self.list_documents()?;
        match documents.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => documents.push(record.clone()),
        }
        self.write_documents(documents)
    }

    fn remove_document(&self, id: &str) -> Result<bool, StoreError> {
        let mut documents = self.list_documents()?;
        let before = documents.len();
        documents.retain(|record| record.id != id);
        if documents.len() == before {
            return Ok(false);
        }
        self.write_documents(documents)?;
        Ok(true)
    }

    fn read_autosave(&self) -> Result<Option<AutosavePayload>, StoreError> {
        self.read_json(AUTOSAVE_KEY)
    }

    fn write_autosave(&self, payload: &AutosavePayload) -> Result<(), StoreError> {
        self.write_json(AUTOSAVE_KEY, payload)
    }

    fn clear_autosave(&self) -> Result<(), StoreError> {
        self.kv.remove(AUTOSAVE_KEY)
    }

    fn read_theme(&self) -> Result<Option<Theme>, StoreError> {
        let Some(raw) = self.kv.get(THEME_KEY)? else {
            return Ok(None);
        };
        match raw.parse() {
            Ok(theme) => Ok(Some(theme)),
            Err(err) => {
                warn!(?err, "ignoring unknown stored theme");
                Ok(None)
            }
        }
    }

    fn write_theme(&self, theme: Theme) -> Result<(), StoreError> {
        self.kv.set(THEME_KEY, theme.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    fn record(id: &str, modified_at: Timestamp) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            title: format!("doc {id}"),
            content: format!("<p>{id}</p>"),
            created_at: 1,
            modified_at,
            word_count: 1,
            character_count: id.len(),
        }
    }

    #[test]
    fn upsert_replaces_by_id_and_sorts_newest_first() {
        let store = LocalDocumentStore::in_memory();
        store.upsert_document(&record("a", 10)).unwrap();
        store.upsert_document(&record("b", 20)).unwrap();
        store.upsert_document(&record("a", 30)).unwrap();

        let documents = store.list_documents().unwrap();
        let ids: Vec<_> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(documents[0].modified_at, 30);
    }

    #[test]
    fn records_serialize_with_camel_case_fields() {
        let json = serde_json::to_value(record("x", 5)).unwrap();
        assert_eq!(json["modifiedAt"], 5);
        assert_eq!(json["createdAt"], 1);
        assert_eq!(json["wordCount"], 1);
        assert_eq!(json["characterCount"], 1);
    }

    #[test]
    fn malformed_collection_reads_as_empty() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(DOCUMENTS_KEY, "{not json").unwrap();
        kv.set(AUTOSAVE_KEY, "[]").unwrap();
        let store = LocalDocumentStore::new(kv);
        assert!(store.list_documents().unwrap().is_empty());
        assert!(store.read_autosave().unwrap().is_none());
    }

    #[test]
    fn remove_document_reports_presence() {
        let store = LocalDocumentStore::in_memory();
        store.upsert_document(&record("a", 1)).unwrap();
        assert!(store.remove_document("a").unwrap());
        assert!(!store.remove_document("a").unwrap());
        assert!(store.get_document("a").unwrap().is_none());
    }

    #[test]
    fn autosave_slot_is_overwritten_and_clearable() {
        let store = LocalDocumentStore::in_memory();
        for (ts, content) in [(1, "first"), (2, "second")] {
            store
                .write_autosave(&AutosavePayload {
                    content: content.to_string(),
                    timestamp: ts,
                    current_document: None,
                })
                .unwrap();
        }
        let payload = store.read_autosave().unwrap().unwrap();
        assert_eq!(payload.content, "second");
        store.clear_autosave().unwrap();
        assert!(store.read_autosave().unwrap().is_none());
    }

    #[test]
    fn theme_round_trips_and_ignores_garbage() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = LocalDocumentStore::new(kv.clone());
        assert_eq!(store.read_theme().unwrap(), None);
        store.write_theme(Theme::Dark).unwrap();
        assert_eq!(kv.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
        assert_eq!(store.read_theme().unwrap(), Some(Theme::Dark));
        kv.set(THEME_KEY, "sepia").unwrap();
        assert_eq!(store.read_theme().unwrap(), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        {
            let kv = Arc::new(FileKeyValueStore::new(dir.path().join("state")).unwrap());
            LocalDocumentStore::new(kv)
                .upsert_document(&record("kept", 7))
                .unwrap();
        }
        let kv = Arc::new(FileKeyValueStore::new(dir.path().join("state")).unwrap());
        let store = LocalDocumentStore::new(kv);
        let restored = store.get_document("kept").unwrap().unwrap();
        assert_eq!(restored.content, "<p>kept</p>");
        assert!(dir.path().join("state").join("rte-documents.json").exists());
    }

    #[test]
    fn file_store_remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let kv = FileKeyValueStore::new(dir.path().to_path_buf()).unwrap();
        kv.set("k", "v").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("v"));
        kv.remove("k").unwrap();
        kv.remove("k").unwrap();
        assert_eq!(kv.get("k").unwrap(), None);
    }
}
