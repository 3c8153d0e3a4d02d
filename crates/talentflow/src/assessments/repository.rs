use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::Assessment;
use super::response::AssessmentResponse;

/// Collections the engine persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Assessment,
    Response,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            RecordKind::Assessment => "assessment",
            RecordKind::Response => "response",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Storage abstraction over plain JSON records keyed by a string id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn load(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, StoreError>;
    async fn load_all(&self, kind: RecordKind) -> Result<Vec<Value>, StoreError>;
    async fn save(&self, kind: RecordKind, id: &str, record: Value) -> Result<(), StoreError>;
    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError>;
}

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} record {id} is malformed: {source}")]
    Malformed {
        kind: RecordKind,
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store i/o failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Types that live in a [`RecordStore`] collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const KIND: RecordKind;

    fn record_id(&self) -> &str;
}

impl Record for Assessment {
    const KIND: RecordKind = RecordKind::Assessment;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Record for AssessmentResponse {
    const KIND: RecordKind = RecordKind::Response;

    fn record_id(&self) -> &str {
        &self.id.0
    }
}

pub async fn fetch<T, S>(store: &S, id: &str) -> Result<Option<T>, StoreError>
where
    T: Record,
    S: RecordStore + ?Sized,
{
    match store.load(T::KIND, id).await? {
        Some(value) => decode(id, value).map(Some),
        None => Ok(None),
    }
}

pub async fn fetch_all<T, S>(store: &S) -> Result<Vec<T>, StoreError>
where
    T: Record,
    S: RecordStore + ?Sized,
{
    store
        .load_all(T::KIND)
        .await?
        .into_iter()
        .map(|value| {
            let id = value
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            decode(&id, value)
        })
        .collect()
}

pub async fn put<T, S>(store: &S, record: &T) -> Result<(), StoreError>
where
    T: Record,
    S: RecordStore + ?Sized,
{
    let id = record.record_id();
    let value = serde_json::to_value(record).map_err(|source| StoreError::Malformed {
        kind: T::KIND,
        id: id.to_string(),
        source,
    })?;
    store.save(T::KIND, id, value).await
}

pub async fn remove<T, S>(store: &S, id: &str) -> Result<(), StoreError>
where
    T: Record,
    S: RecordStore + ?Sized,
{
    store.delete(T::KIND, id).await
}

fn decode<T: Record>(id: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Malformed {
        kind: T::KIND,
        id: id.to_string(),
        source,
    })
}
