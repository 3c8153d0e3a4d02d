use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::builder::{
    self, AssessmentPatch, NewAssessment, NewOption, NewQuestion, NewSection, OptionPatch,
    QuestionPatch, SchemaError, SchemaMutation, SectionPatch,
};
use super::domain::{Assessment, AssessmentId, OptionId, QuestionId, SectionId};
use super::repository::{self as records, RecordStore, StoreError};
use super::response::AssessmentResponse;

/// Result of a schema mutation that was applied and persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaUpdate {
    pub assessment: Assessment,
    /// Content changed while candidates could already see the assessment.
    pub edited_while_published: bool,
}

/// Builder and catalog operations over assessments held in a [`RecordStore`].
pub struct AssessmentService<S> {
    store: Arc<S>,
}

impl<S> Clone for AssessmentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> AssessmentService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    pub async fn create(&self, meta: NewAssessment) -> Result<Assessment, AssessmentServiceError> {
        let assessment = builder::create_assessment(meta, Utc::now())?;
        records::put(self.store.as_ref(), &assessment).await?;
        info!(assessment_id = %assessment.id, title = %assessment.title, "assessment created");
        Ok(assessment)
    }

    pub async fn get(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Option<Assessment>, AssessmentServiceError> {
        Ok(records::fetch(self.store.as_ref(), assessment_id.as_str()).await?)
    }

    /// Every stored assessment, most recently updated first.
    pub async fn list(&self) -> Result<Vec<Assessment>, AssessmentServiceError> {
        let mut assessments: Vec<Assessment> = records::fetch_all(self.store.as_ref()).await?;
        assessments.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
        Ok(assessments)
    }

    /// Remove the assessment and every response recorded against it. Returns `false`
    /// when the assessment did not exist.
    pub async fn delete(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<bool, AssessmentServiceError> {
        if self.get(assessment_id).await?.is_none() {
            return Ok(false);
        }

        let responses = self.responses_for(assessment_id).await?;
        for response in &responses {
            records::remove::<AssessmentResponse, _>(self.store.as_ref(), &response.id.0).await?;
        }
        records::remove::<Assessment, _>(self.store.as_ref(), assessment_id.as_str()).await?;

        info!(
            assessment_id = %assessment_id,
            responses = responses.len(),
            "assessment deleted"
        );
        Ok(true)
    }

    pub async fn duplicate(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Option<Assessment>, AssessmentServiceError> {
        let Some(source) = self.get(assessment_id).await? else {
            return Ok(None);
        };
        let copy = builder::duplicate_assessment(&source, Utc::now());
        records::put(self.store.as_ref(), &copy).await?;
        info!(source_id = %source.id, assessment_id = %copy.id, "assessment duplicated");
        Ok(Some(copy))
    }

    pub async fn responses_for(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Vec<AssessmentResponse>, AssessmentServiceError> {
        let responses: Vec<AssessmentResponse> = records::fetch_all(self.store.as_ref()).await?;
        Ok(responses
            .into_iter()
            .filter(|response| &response.assessment_id == assessment_id)
            .collect())
    }

    /// Load, mutate and persist. `Ok(None)` when the assessment or the addressed
    /// section, question or option is missing; nothing is written in that case.
    pub async fn mutate(
        &self,
        assessment_id: &AssessmentId,
        mutation: SchemaMutation,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        let Some(current) = self.get(assessment_id).await? else {
            return Ok(None);
        };

        let edits_content = mutation.edits_content();
        let Some(next) = builder::apply(&current, mutation, Utc::now())? else {
            return Ok(None);
        };

        let edited_while_published = edits_content && current.is_published;
        if edited_while_published {
            warn!(assessment_id = %assessment_id, "published assessment edited");
        }

        records::put(self.store.as_ref(), &next).await?;
        Ok(Some(SchemaUpdate {
            assessment: next,
            edited_while_published,
        }))
    }

    pub async fn update_details(
        &self,
        assessment_id: &AssessmentId,
        patch: AssessmentPatch,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(assessment_id, SchemaMutation::UpdateDetails(patch))
            .await
    }

    pub async fn publish(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(assessment_id, SchemaMutation::Publish).await
    }

    pub async fn unpublish(
        &self,
        assessment_id: &AssessmentId,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(assessment_id, SchemaMutation::Unpublish).await
    }

    pub async fn add_section(
        &self,
        assessment_id: &AssessmentId,
        section: NewSection,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(assessment_id, SchemaMutation::AddSection(section))
            .await
    }

    pub async fn update_section(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        patch: SectionPatch,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::UpdateSection { section_id, patch },
        )
        .await
    }

    pub async fn delete_section(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(assessment_id, SchemaMutation::DeleteSection { section_id })
            .await
    }

    pub async fn duplicate_section(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(assessment_id, SchemaMutation::DuplicateSection { section_id })
            .await
    }

    pub async fn reorder_sections(
        &self,
        assessment_id: &AssessmentId,
        section_ids: Vec<SectionId>,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(assessment_id, SchemaMutation::ReorderSections { section_ids })
            .await
    }

    pub async fn add_question(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        question: NewQuestion,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::AddQuestion {
                section_id,
                question,
            },
        )
        .await
    }

    pub async fn update_question(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        question_id: QuestionId,
        patch: QuestionPatch,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::UpdateQuestion {
                section_id,
                question_id,
                patch,
            },
        )
        .await
    }

    pub async fn delete_question(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        question_id: QuestionId,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::DeleteQuestion {
                section_id,
                question_id,
            },
        )
        .await
    }

    pub async fn duplicate_question(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        question_id: QuestionId,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::DuplicateQuestion {
                section_id,
                question_id,
            },
        )
        .await
    }

    pub async fn reorder_questions(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        question_ids: Vec<QuestionId>,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::ReorderQuestions {
                section_id,
                question_ids,
            },
        )
        .await
    }

    pub async fn add_option(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        question_id: QuestionId,
        option: NewOption,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::AddOption {
                section_id,
                question_id,
                option,
            },
        )
        .await
    }

    pub async fn update_option(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        question_id: QuestionId,
        option_id: OptionId,
        patch: OptionPatch,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::UpdateOption {
                section_id,
                question_id,
                option_id,
                patch,
            },
        )
        .await
    }

    pub async fn delete_option(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        question_id: QuestionId,
        option_id: OptionId,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::DeleteOption {
                section_id,
                question_id,
                option_id,
            },
        )
        .await
    }

    pub async fn reorder_options(
        &self,
        assessment_id: &AssessmentId,
        section_id: SectionId,
        question_id: QuestionId,
        option_ids: Vec<OptionId>,
    ) -> Result<Option<SchemaUpdate>, AssessmentServiceError> {
        self.mutate(
            assessment_id,
            SchemaMutation::ReorderOptions {
                section_id,
                question_id,
                option_ids,
            },
        )
        .await
    }
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
