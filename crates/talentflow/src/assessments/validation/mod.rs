mod rules;

pub use rules::validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Assessment, QuestionId};
use super::logic::visible_questions;
use super::response::AnswerSheet;

/// Why a single answer was rejected. Messages are candidate-facing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("This question is required")]
    Required,
    #[error("Maximum length is {max_length} characters")]
    TooLong { max_length: u32, actual: usize },
    #[error("Please enter a valid number")]
    NotANumber,
    #[error("Minimum value is {min}")]
    BelowMinimum { min: f64 },
    #[error("Maximum value is {max}")]
    AboveMaximum { max: f64 },
    #[error("File size must be less than {max_file_size_mb}MB")]
    FileTooLarge {
        file_name: String,
        max_file_size_mb: f64,
    },
}

/// Outcome of validating every visible question of an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: BTreeMap<QuestionId, ValidationError>,
    pub can_submit: bool,
}

impl ValidationReport {
    pub fn error_for(&self, question_id: &QuestionId) -> Option<&ValidationError> {
        self.errors.get(question_id)
    }

    /// Question id to candidate-facing message.
    pub fn messages(&self) -> BTreeMap<String, String> {
        self.errors
            .iter()
            .map(|(question_id, error)| (question_id.0.clone(), error.to_string()))
            .collect()
    }
}

/// Validate every question currently visible for `answers`, collecting one error per
/// failing question. Hidden questions are never validated.
pub fn validate_all(assessment: &Assessment, answers: &AnswerSheet) -> ValidationReport {
    let errors: BTreeMap<QuestionId, ValidationError> = visible_questions(assessment, answers)
        .into_iter()
        .filter_map(|question| {
            validate(question, answers.get(&question.id)).map(|error| (question.id.clone(), error))
        })
        .collect();

    ValidationReport {
        can_submit: errors.is_empty(),
        errors,
    }
}
