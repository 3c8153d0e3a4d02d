use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for assessments.
    AssessmentId
);
string_id!(
    /// Identifier of a section, unique within its assessment.
    SectionId
);
string_id!(
    /// Identifier of a question, unique within its assessment.
    QuestionId
);
string_id!(OptionId);

/// A questionnaire composed of ordered sections, optionally attached to a job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assessment {
    pub fn section(&self, section_id: &SectionId) -> Option<&Section> {
        self.sections.iter().find(|section| &section.id == section_id)
    }

    /// Every question across all sections, in section then question order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|section| section.questions.iter())
    }

    pub fn question(&self, question_id: &QuestionId) -> Option<&Question> {
        self.questions().find(|question| &question.id == question_id)
    }

    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|section| section.questions.len()).sum()
    }
}

/// Ordered group of questions within an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Section {
    pub fn question(&self, question_id: &QuestionId) -> Option<&Question> {
        self.questions
            .iter()
            .find(|question| &question.id == question_id)
    }
}

/// A single prompt. Type specific settings live on [`QuestionKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<ConditionalLogic>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    pub fn options(&self) -> &[QuestionOption] {
        self.kind.options()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleChoice {
        #[serde(default)]
        options: Vec<QuestionOption>,
    },
    MultiChoice {
        #[serde(default)]
        options: Vec<QuestionOption>,
    },
    ShortText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
    },
    LongText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
    },
    NumericRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_value: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_value: Option<f64>,
    },
    FileUpload {
        /// Advertised extension allow-list; not enforced by validation.
        #[serde(default)]
        file_types: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_file_size_mb: Option<f64>,
    },
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::SingleChoice { .. } => QuestionType::SingleChoice,
            QuestionKind::MultiChoice { .. } => QuestionType::MultiChoice,
            QuestionKind::ShortText { .. } => QuestionType::ShortText,
            QuestionKind::LongText { .. } => QuestionType::LongText,
            QuestionKind::NumericRange { .. } => QuestionType::NumericRange,
            QuestionKind::FileUpload { .. } => QuestionType::FileUpload,
        }
    }

    pub fn options(&self) -> &[QuestionOption] {
        match self {
            QuestionKind::SingleChoice { options } | QuestionKind::MultiChoice { options } => {
                options
            }
            QuestionKind::ShortText { .. }
            | QuestionKind::LongText { .. }
            | QuestionKind::NumericRange { .. }
            | QuestionKind::FileUpload { .. } => &[],
        }
    }

    pub(crate) fn options_mut(&mut self) -> Option<&mut Vec<QuestionOption>> {
        match self {
            QuestionKind::SingleChoice { options } | QuestionKind::MultiChoice { options } => {
                Some(options)
            }
            QuestionKind::ShortText { .. }
            | QuestionKind::LongText { .. }
            | QuestionKind::NumericRange { .. }
            | QuestionKind::FileUpload { .. } => None,
        }
    }
}

/// Discriminant of [`QuestionKind`], used for labels and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    ShortText,
    LongText,
    NumericRange,
    FileUpload,
}

pub const DEFAULT_CHOICE_LABELS: [&str; 3] = ["Option 1", "Option 2", "Option 3"];

impl QuestionType {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single-choice",
            QuestionType::MultiChoice => "multi-choice",
            QuestionType::ShortText => "short-text",
            QuestionType::LongText => "long-text",
            QuestionType::NumericRange => "numeric-range",
            QuestionType::FileUpload => "file-upload",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "Single Choice",
            QuestionType::MultiChoice => "Multiple Choice",
            QuestionType::ShortText => "Short Text",
            QuestionType::LongText => "Long Text",
            QuestionType::NumericRange => "Numeric Range",
            QuestionType::FileUpload => "File Upload",
        }
    }

    pub const fn is_choice(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultiChoice)
    }

    /// Kind with no type settings; choice kinds are seeded with the default option list.
    pub fn default_kind(self) -> QuestionKind {
        match self {
            QuestionType::SingleChoice => QuestionKind::SingleChoice {
                options: default_options(),
            },
            QuestionType::MultiChoice => QuestionKind::MultiChoice {
                options: default_options(),
            },
            QuestionType::ShortText => QuestionKind::ShortText { max_length: None },
            QuestionType::LongText => QuestionKind::LongText { max_length: None },
            QuestionType::NumericRange => QuestionKind::NumericRange {
                min_value: None,
                max_value: None,
            },
            QuestionType::FileUpload => QuestionKind::FileUpload {
                file_types: Vec::new(),
                max_file_size_mb: None,
            },
        }
    }
}

pub(crate) fn default_options() -> Vec<QuestionOption> {
    DEFAULT_CHOICE_LABELS
        .iter()
        .enumerate()
        .map(|(index, label)| QuestionOption {
            id: OptionId::generate(),
            label: (*label).to_string(),
            value: format!("option_{}", index + 1),
            order: index as u32,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub label: String,
    pub value: String,
    pub order: u32,
}

/// AND-combined visibility rules over earlier answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalLogic {
    pub show_if: Vec<Condition>,
}

impl ConditionalLogic {
    pub fn new(show_if: Vec<Condition>) -> Self {
        Self { show_if }
    }

    pub fn targets(&self) -> impl Iterator<Item = &QuestionId> {
        self.show_if.iter().map(|condition| &condition.question_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub question_id: QuestionId,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
}

/// Right-hand side of a condition: either free text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Text(value.to_string())
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Number(value)
    }
}
