//! Persisted key-value state: published and draft schemas plus stored
//! submissions. Every slot is read and written through [`Storage`].

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::spec::form::FormSchema;

pub const DEFAULT_NAMESPACE: &str = "thardraw";
const PROBE_KEY: &str = "__probe__";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage quota exceeded while writing '{key}'")]
    QuotaExceeded { key: String },
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored value under '{key}' is not valid: {message}")]
    Corrupt { key: String, message: String },
}

/// Raw string store in the shape of browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-process store with an optional byte quota.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes once keys plus values would exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(bytes),
        }
    }

    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries,
            quota: None,
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn into_entries(self) -> BTreeMap<String, String> {
        self.entries
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(existing, value)| existing.len() + value.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota
            && self.used_bytes_without(key) + key.len() + value.len() > quota
        {
            return Err(StoreError::QuotaExceeded { key: key.into() });
        }
        self.entries.insert(key.into(), value.into());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// One file per key under a directory; file names are the percent-encoded key.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", urlencoding::encode(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(encoded) = name.to_str().and_then(|name| name.strip_suffix(".json")) else {
                continue;
            };
            if let Ok(key) = urlencoding::decode(encoded) {
                keys.push(key.into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Result of the capability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Typed slots over a [`KeyValueStore`], all keys prefixed by a namespace.
#[derive(Debug, Clone)]
pub struct Storage<S> {
    backend: S,
    namespace: String,
}

impl<S: KeyValueStore> Storage<S> {
    pub fn new(backend: S) -> Self {
        Self::with_namespace(backend, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(backend: S, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn slot(&self, name: &str) -> String {
        format!("{}:{}", self.namespace, name)
    }

    fn submissions_slot(&self, key: &str) -> String {
        self.slot(&format!("submissions:{}", key))
    }

    fn read_schema(&self, slot: &str) -> Result<Option<FormSchema>, StoreError> {
        let Some(raw) = self.backend.get(slot)? else {
            return Ok(None);
        };
        FormSchema::from_json(&raw)
            .map(Some)
            .map_err(|err| StoreError::Corrupt {
                key: slot.to_string(),
                message: err.to_string(),
            })
    }

    fn write_json(&mut self, slot: &str, value: &impl Serialize) -> Result<(), StoreError> {
        let encoded = serde_json::to_string_pretty(value).map_err(|source| StoreError::Encode {
            key: slot.to_string(),
            source,
        })?;
        self.backend.set(slot, &encoded)
    }

    pub fn load_published_schema(&self) -> Result<Option<FormSchema>, StoreError> {
        self.read_schema(&self.slot("schema:published"))
    }

    pub fn save_published_schema(&mut self, schema: &FormSchema) -> Result<(), StoreError> {
        let slot = self.slot("schema:published");
        self.write_json(&slot, schema)
    }

    pub fn load_draft_schema(&self) -> Result<Option<FormSchema>, StoreError> {
        self.read_schema(&self.slot("schema:draft"))
    }

    pub fn save_draft_schema(&mut self, schema: &FormSchema) -> Result<(), StoreError> {
        let slot = self.slot("schema:draft");
        self.write_json(&slot, schema)
    }

    pub fn discard_draft_schema(&mut self) -> Result<(), StoreError> {
        let slot = self.slot("schema:draft");
        self.backend.remove(&slot)
    }

    /// Stored submission records under `key`, oldest first.
    pub fn submissions(&self, key: &str) -> Result<Vec<Value>, StoreError> {
        let slot = self.submissions_slot(key);
        match self.backend.get(&slot)? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt {
                key: slot,
                message: err.to_string(),
            }),
        }
    }

    /// Appends one record and returns the new list length.
    ///
    /// This is a read, modify, write of the whole list with no locking. Two
    /// writers sharing the backend can interleave and drop a record.
    pub fn append_submission(&mut self, key: &str, record: Value) -> Result<usize, StoreError> {
        let mut records = self.submissions(key)?;
        records.push(record);
        let slot = self.submissions_slot(key);
        self.write_json(&slot, &records)?;
        debug!(slot = %slot, total = records.len(), "stored submission");
        Ok(records.len())
    }

    /// Removes every key in this namespace.
    pub fn clear_all(&mut self) -> Result<usize, StoreError> {
        let prefix = format!("{}:", self.namespace);
        let keys: Vec<String> = self
            .backend
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .collect();
        for key in &keys {
            self.backend.remove(key)?;
        }
        Ok(keys.len())
    }

    /// Writes and removes a throwaway key.
    pub fn probe(&mut self) -> StorageStatus {
        let slot = self.slot(PROBE_KEY);
        let result = self
            .backend
            .set(&slot, "test")
            .and_then(|_| self.backend.remove(&slot));
        match result {
            Ok(()) => StorageStatus {
                available: true,
                error: None,
            },
            Err(err) => StorageStatus {
                available: false,
                error: Some(err.to_string()),
            },
        }
    }
}
