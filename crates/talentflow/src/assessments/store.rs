use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::repository::{RecordKind, RecordStore, StoreError};

/// Process-local store used by tests, the demo and deployments without a data dir.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<HashMap<RecordKind, BTreeMap<String, Value>>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, kind: RecordKind) -> usize {
        let guard = self.records.lock().expect("store mutex poisoned");
        guard.get(&kind).map(BTreeMap::len).unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.get(&kind).and_then(|records| records.get(id)).cloned())
    }

    async fn load_all(&self, kind: RecordKind) -> Result<Vec<Value>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard
            .get(&kind)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save(&self, kind: RecordKind, id: &str, record: Value) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.entry(kind).or_default().insert(id.to_string(), record);
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if let Some(records) = guard.get_mut(&kind) {
            records.remove(id);
        }
        Ok(())
    }
}

/// One pretty-printed JSON document per record at `<root>/<kind>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: RecordKind) -> PathBuf {
        self.root.join(kind.label())
    }

    fn record_path(&self, kind: RecordKind, id: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{}.json", file_stem(id)))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn load(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, StoreError> {
        let path = self.record_path(kind, id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&path, source)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Malformed {
                kind,
                id: id.to_string(),
                source,
            })
    }

    async fn load_all(&self, kind: RecordKind) -> Result<Vec<Value>, StoreError> {
        let dir = self.kind_dir(kind);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(io_error(&dir, source)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| io_error(&dir, source))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| io_error(&path, source))?;
            let value = serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
                kind,
                id: path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or_default()
                    .to_string(),
                source,
            })?;
            records.push(value);
        }
        Ok(records)
    }

    async fn save(&self, kind: RecordKind, id: &str, record: Value) -> Result<(), StoreError> {
        let dir = self.kind_dir(kind);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| io_error(&dir, source))?;

        let bytes = serde_json::to_vec_pretty(&record).map_err(|source| StoreError::Malformed {
            kind,
            id: id.to_string(),
            source,
        })?;

        // Write beside the target and rename so readers never see a torn document.
        let path = self.record_path(kind, id);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|source| io_error(&staging, source))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|source| io_error(&path, source))
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        let path = self.record_path(kind, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&path, source)),
        }
    }
}

/// Map a record id onto a file-safe stem. Bytes outside `[A-Za-z0-9_-]` are written as
/// `%XX`, so distinct ids never share a file.
pub(crate) fn file_stem(id: &str) -> String {
    if id.is_empty() {
        return "%".to_string();
    }
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
