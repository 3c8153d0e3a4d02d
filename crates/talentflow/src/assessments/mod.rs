//! Assessment builder, conditional logic, validation and candidate runtime.
//!
//! Schemas are edited through pure mutations in [`builder`] and persisted by
//! [`AssessmentService`]; candidates take them through an [`AssessmentSession`]. Both
//! talk to storage only through the [`RecordStore`] trait.

pub mod builder;
pub mod domain;
pub mod logic;
pub mod repository;
pub mod response;
pub mod router;
pub mod service;
pub mod session;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use builder::{
    AssessmentPatch, NewAssessment, NewOption, NewQuestion, NewSection, OptionPatch,
    QuestionPatch, SchemaError, SchemaMutation, SectionPatch,
};
pub use domain::{
    Assessment, AssessmentId, Condition, ConditionOperator, ConditionValue, ConditionalLogic,
    OptionId, Question, QuestionId, QuestionKind, QuestionOption, QuestionType, Section,
    SectionId,
};
pub use logic::{should_show, visible_questions};
pub use repository::{Record, RecordKind, RecordStore, StoreError};
pub use response::{
    AnswerSheet, AnswerValue, AssessmentResponse, CandidateIdentity, FileDescriptor,
    QuestionResponse, ResponseId,
};
pub use router::assessment_router;
pub use service::{AssessmentService, AssessmentServiceError, SchemaUpdate};
pub use session::{
    format_elapsed, AssessmentSession, Progress, SessionConfig, SessionError, SessionState,
    SubmitOutcome,
};
pub use store::{FileRecordStore, MemoryRecordStore};
pub use validation::{validate, validate_all, ValidationError, ValidationReport};
