use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::assessments::domain::{
    Assessment, AssessmentId, Condition, ConditionOperator, ConditionValue, ConditionalLogic,
    OptionId, Question, QuestionId, QuestionKind, QuestionOption, Section, SectionId,
};
use crate::assessments::repository::{self as records, RecordKind, RecordStore, StoreError};
use crate::assessments::response::AssessmentResponse;
use crate::assessments::session::SessionConfig;
use crate::assessments::store::MemoryRecordStore;
use crate::assessments::{assessment_router, AssessmentService};

pub(super) const QUIZ_ID: &str = "quiz";

pub(super) fn option(id: &str, label: &str, value: &str, order: u32) -> QuestionOption {
    QuestionOption {
        id: OptionId::from(id),
        label: label.to_string(),
        value: value.to_string(),
        order,
    }
}

pub(super) fn question(id: &str, order: u32, kind: QuestionKind) -> Question {
    Question {
        id: QuestionId::from(id),
        title: format!("Question {id}"),
        description: None,
        required: false,
        order,
        conditional_logic: None,
        kind,
    }
}

pub(super) fn required(mut question: Question) -> Question {
    question.required = true;
    question
}

pub(super) fn shown_if(
    mut question: Question,
    target: &str,
    operator: ConditionOperator,
    value: impl Into<ConditionValue>,
) -> Question {
    let condition = Condition {
        question_id: QuestionId::from(target),
        operator,
        value: value.into(),
    };
    match question.conditional_logic.as_mut() {
        Some(logic) => logic.show_if.push(condition),
        None => question.conditional_logic = Some(ConditionalLogic::new(vec![condition])),
    }
    question
}

pub(super) fn short_text(max_length: Option<u32>) -> QuestionKind {
    QuestionKind::ShortText { max_length }
}

pub(super) fn numeric(min_value: Option<f64>, max_value: Option<f64>) -> QuestionKind {
    QuestionKind::NumericRange {
        min_value,
        max_value,
    }
}

pub(super) fn single_choice(values: &[&str]) -> QuestionKind {
    QuestionKind::SingleChoice {
        options: values
            .iter()
            .enumerate()
            .map(|(index, value)| option(&format!("opt-{value}"), value, value, index as u32))
            .collect(),
    }
}

pub(super) fn multi_choice(values: &[&str]) -> QuestionKind {
    match single_choice(values) {
        QuestionKind::SingleChoice { options } => QuestionKind::MultiChoice { options },
        other => other,
    }
}

pub(super) fn assessment_with(id: &str, sections: Vec<Section>) -> Assessment {
    let stamp = Utc
        .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp");
    Assessment {
        id: AssessmentId::from(id),
        title: "Screening".to_string(),
        description: String::new(),
        job_id: Some("job-42".to_string()),
        sections,
        is_published: false,
        created_at: stamp,
        updated_at: stamp,
    }
}

pub(super) fn section(id: &str, order: u32, questions: Vec<Question>) -> Section {
    Section {
        id: SectionId::from(id),
        title: format!("Section {id}"),
        description: None,
        order,
        questions,
    }
}

/// Q1 is a required single choice over A/B; Q2 is a required short text shown only
/// when Q1 is "A".
pub(super) fn quiz() -> Assessment {
    let q1 = required(question("q1", 0, single_choice(&["A", "B"])));
    let q2 = shown_if(
        required(question("q2", 1, short_text(None))),
        "q1",
        ConditionOperator::Equals,
        "A",
    );
    assessment_with(QUIZ_ID, vec![section("s1", 0, vec![q1, q2])])
}

pub(super) fn session_config() -> SessionConfig {
    SessionConfig {
        autosave_debounce: Duration::from_millis(200),
        clock_tick: Duration::from_secs(1),
    }
}

pub(super) async fn seeded_store(assessment: &Assessment) -> Arc<MemoryRecordStore> {
    let store = Arc::new(MemoryRecordStore::new());
    records::put(store.as_ref(), assessment)
        .await
        .expect("seed assessment");
    store
}

pub(super) async fn stored_responses<S: RecordStore>(store: &S) -> Vec<AssessmentResponse> {
    records::fetch_all(store).await.expect("load responses")
}

pub(super) fn service_with(store: Arc<MemoryRecordStore>) -> AssessmentService<MemoryRecordStore> {
    AssessmentService::new(store)
}

pub(super) fn router_with(store: Arc<MemoryRecordStore>) -> axum::Router {
    assessment_router(Arc::new(service_with(store)))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Memory store that counts writes per kind.
#[derive(Default, Clone)]
pub(super) struct CountingStore {
    pub(super) inner: MemoryRecordStore,
    saves: Arc<Mutex<Vec<RecordKind>>>,
}

impl CountingStore {
    pub(super) fn saves(&self, kind: RecordKind) -> usize {
        self.saves
            .lock()
            .expect("counter mutex poisoned")
            .iter()
            .filter(|saved| **saved == kind)
            .count()
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn load(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, StoreError> {
        self.inner.load(kind, id).await
    }

    async fn load_all(&self, kind: RecordKind) -> Result<Vec<Value>, StoreError> {
        self.inner.load_all(kind).await
    }

    async fn save(&self, kind: RecordKind, id: &str, record: Value) -> Result<(), StoreError> {
        self.saves
            .lock()
            .expect("counter mutex poisoned")
            .push(kind);
        self.inner.save(kind, id, record).await
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        self.inner.delete(kind, id).await
    }
}

/// Memory store whose first `failures` response writes fail.
pub(super) struct FlakyStore {
    pub(super) inner: MemoryRecordStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn load(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, StoreError> {
        self.inner.load(kind, id).await
    }

    async fn load_all(&self, kind: RecordKind) -> Result<Vec<Value>, StoreError> {
        self.inner.load_all(kind).await
    }

    async fn save(&self, kind: RecordKind, id: &str, record: Value) -> Result<(), StoreError> {
        if kind == RecordKind::Response
            && self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
        {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.save(kind, id, record).await
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        self.inner.delete(kind, id).await
    }
}

pub(super) struct UnavailableStore;

#[async_trait]
impl RecordStore for UnavailableStore {
    async fn load(&self, _kind: RecordKind, _id: &str) -> Result<Option<Value>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn load_all(&self, _kind: RecordKind) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn save(&self, _kind: RecordKind, _id: &str, _record: Value) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn delete(&self, _kind: RecordKind, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}
