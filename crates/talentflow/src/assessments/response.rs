use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{AssessmentId, QuestionId};

/// Identifier wrapper for captured responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseId(pub String);

impl ResponseId {
    pub fn generate() -> Self {
        Self(format!("response_{}", Uuid::new_v4().simple()))
    }
}

/// Metadata describing an uploaded file. File bytes never enter the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size_bytes: u64,
    pub content_type: String,
}

/// Raw answer value as supplied by the candidate-facing UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
    Options(Vec<String>),
    Files(Vec<FileDescriptor>),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        AnswerValue::Text(value.into())
    }

    pub fn options<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        AnswerValue::Options(values.into_iter().map(Into::into).collect())
    }

    /// Empty strings and empty collections count as unanswered.
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Number(_) => false,
            AnswerValue::Text(text) => text.is_empty(),
            AnswerValue::Options(values) => values.is_empty(),
            AnswerValue::Files(files) => files.is_empty(),
        }
    }

    /// Textual rendering used for length checks.
    pub fn to_display_string(&self) -> String {
        match self {
            AnswerValue::Number(number) => number.to_string(),
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Options(values) => values.join(","),
            AnswerValue::Files(files) => files
                .iter()
                .map(|file| file.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Answer to one question plus its derived projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question_id: QuestionId,
    pub value: AnswerValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_values: Option<Vec<FileDescriptor>>,
}

impl QuestionResponse {
    pub fn new(question_id: QuestionId, value: AnswerValue) -> Self {
        let mut response = Self {
            question_id,
            value,
            text_value: None,
            numeric_value: None,
            option_values: None,
            file_values: None,
        };
        match &response.value {
            AnswerValue::Number(number) => response.numeric_value = Some(*number),
            AnswerValue::Text(text) => response.text_value = Some(text.clone()),
            AnswerValue::Options(values) => response.option_values = Some(values.clone()),
            AnswerValue::Files(files) => response.file_values = Some(files.clone()),
        }
        response
    }
}

/// Insertion-ordered answers keyed by question, at most one entry per question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSheet(Vec<QuestionResponse>);

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: &QuestionId) -> Option<&AnswerValue> {
        self.0
            .iter()
            .find(|response| &response.question_id == question_id)
            .map(|response| &response.value)
    }

    /// Replaces an existing answer in place so insertion order is kept.
    pub fn set(&mut self, question_id: QuestionId, value: AnswerValue) {
        let response = QuestionResponse::new(question_id, value);
        match self
            .0
            .iter_mut()
            .find(|existing| existing.question_id == response.question_id)
        {
            Some(existing) => *existing = response,
            None => self.0.push(response),
        }
    }

    pub fn remove(&mut self, question_id: &QuestionId) -> Option<AnswerValue> {
        let index = self
            .0
            .iter()
            .position(|response| &response.question_id == question_id)?;
        Some(self.0.remove(index).value)
    }

    pub fn is_answered(&self, question_id: &QuestionId) -> bool {
        self.get(question_id)
            .map(|value| !value.is_empty())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionResponse> {
        self.0.iter()
    }
}

impl<I> FromIterator<(I, AnswerValue)> for AnswerSheet
where
    I: Into<QuestionId>,
{
    fn from_iter<T: IntoIterator<Item = (I, AnswerValue)>>(iter: T) -> Self {
        let mut sheet = AnswerSheet::new();
        for (question_id, value) in iter {
            sheet.set(question_id.into(), value);
        }
        sheet
    }
}

/// Who is taking the assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    pub name: String,
    pub email: String,
}

impl CandidateIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            candidate_id: None,
            name: name.into(),
            email: email.into(),
        }
    }

    /// Candidate ids win when both sides carry one; otherwise emails are compared
    /// case-insensitively.
    pub fn same_candidate(&self, other: &CandidateIdentity) -> bool {
        match (&self.candidate_id, &other.candidate_id) {
            (Some(left), Some(right)) => left == right,
            _ => self.email.trim().eq_ignore_ascii_case(other.email.trim()),
        }
    }
}

/// A candidate's in-progress or submitted answers to one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResponse {
    pub id: ResponseId,
    pub assessment_id: AssessmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidateIdentity>,
    #[serde(default)]
    pub responses: AnswerSheet,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub time_spent_seconds: u64,
}

impl AssessmentResponse {
    pub fn start(assessment_id: AssessmentId, candidate: Option<CandidateIdentity>) -> Self {
        Self {
            id: ResponseId::generate(),
            assessment_id,
            candidate,
            responses: AnswerSheet::new(),
            is_complete: false,
            submitted_at: None,
            updated_at: Utc::now(),
            time_spent_seconds: 0,
        }
    }
}
