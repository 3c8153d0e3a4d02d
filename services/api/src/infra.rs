use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use talentflow::assessments::{
    FileRecordStore, MemoryRecordStore, RecordKind, RecordStore, StoreError,
};
use talentflow::config::AssessmentConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Record store picked at startup from `TALENTFLOW_DATA_DIR`.
#[derive(Debug, Clone)]
pub(crate) enum ConfiguredStore {
    Memory(MemoryRecordStore),
    File(FileRecordStore),
}

impl ConfiguredStore {
    pub(crate) fn from_config(config: &AssessmentConfig) -> Self {
        match &config.data_dir {
            Some(dir) => ConfiguredStore::File(FileRecordStore::new(dir.clone())),
            None => ConfiguredStore::Memory(MemoryRecordStore::new()),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            ConfiguredStore::Memory(_) => "in-memory".to_string(),
            ConfiguredStore::File(store) => format!("files under {}", store.root().display()),
        }
    }

    fn inner(&self) -> &dyn RecordStore {
        match self {
            ConfiguredStore::Memory(store) => store,
            ConfiguredStore::File(store) => store,
        }
    }
}

#[async_trait]
impl RecordStore for ConfiguredStore {
    async fn load(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, StoreError> {
        self.inner().load(kind, id).await
    }

    async fn load_all(&self, kind: RecordKind) -> Result<Vec<Value>, StoreError> {
        self.inner().load_all(kind).await
    }

    async fn save(&self, kind: RecordKind, id: &str, record: Value) -> Result<(), StoreError> {
        self.inner().save(kind, id, record).await
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        self.inner().delete(kind, id).await
    }
}
