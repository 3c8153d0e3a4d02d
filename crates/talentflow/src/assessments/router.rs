use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::builder::{
    AssessmentPatch, NewAssessment, NewOption, NewQuestion, NewSection, OptionPatch,
    QuestionPatch, SectionPatch,
};
use super::domain::{AssessmentId, OptionId, QuestionId, SectionId};
use super::logic::visible_questions;
use super::repository::RecordStore;
use super::response::{AnswerSheet, AnswerValue};
use super::service::{AssessmentService, AssessmentServiceError, SchemaUpdate};
use super::session::{progress, Progress};
use super::validation::{validate_all, ValidationReport};

/// Router builder exposing the assessment builder and catalog over JSON.
pub fn assessment_router<S>(service: Arc<AssessmentService<S>>) -> Router
where
    S: RecordStore + 'static,
{
    const ASSESSMENT: &str = "/api/v1/assessments/:assessment_id";
    const SECTION: &str = "/api/v1/assessments/:assessment_id/sections/:section_id";
    const QUESTION: &str =
        "/api/v1/assessments/:assessment_id/sections/:section_id/questions/:question_id";

    Router::new()
        .route(
            "/api/v1/assessments",
            get(list_handler::<S>).post(create_handler::<S>),
        )
        .route(
            ASSESSMENT,
            get(get_handler::<S>)
                .patch(update_handler::<S>)
                .delete(delete_handler::<S>),
        )
        .route(&format!("{ASSESSMENT}/publish"), post(publish_handler::<S>))
        .route(
            &format!("{ASSESSMENT}/unpublish"),
            post(unpublish_handler::<S>),
        )
        .route(
            &format!("{ASSESSMENT}/duplicate"),
            post(duplicate_handler::<S>),
        )
        .route(&format!("{ASSESSMENT}/evaluate"), post(evaluate_handler::<S>))
        .route(
            &format!("{ASSESSMENT}/responses"),
            get(responses_handler::<S>),
        )
        .route(
            &format!("{ASSESSMENT}/sections"),
            post(add_section_handler::<S>).put(reorder_sections_handler::<S>),
        )
        .route(
            SECTION,
            patch(update_section_handler::<S>).delete(delete_section_handler::<S>),
        )
        .route(
            &format!("{SECTION}/duplicate"),
            post(duplicate_section_handler::<S>),
        )
        .route(
            &format!("{SECTION}/questions"),
            post(add_question_handler::<S>).put(reorder_questions_handler::<S>),
        )
        .route(
            QUESTION,
            patch(update_question_handler::<S>).delete(delete_question_handler::<S>),
        )
        .route(
            &format!("{QUESTION}/duplicate"),
            post(duplicate_question_handler::<S>),
        )
        .route(
            &format!("{QUESTION}/options"),
            post(add_option_handler::<S>).put(reorder_options_handler::<S>),
        )
        .route(
            &format!("{QUESTION}/options/:option_id"),
            patch(update_option_handler::<S>).delete(delete_option_handler::<S>),
        )
        .with_state(service)
}

type SharedService<S> = State<Arc<AssessmentService<S>>>;

/// Ids in their new display order.
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderRequest<T> {
    pub ids: Vec<T>,
}

/// Answers to evaluate against an assessment, keyed by question id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, AnswerValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluateResponse {
    pub visible_question_ids: Vec<QuestionId>,
    pub progress: Progress,
    pub validation: ValidationReport,
    pub messages: BTreeMap<String, String>,
}

pub(crate) async fn list_handler<S>(State(service): SharedService<S>) -> Response
where
    S: RecordStore + 'static,
{
    match service.list().await {
        Ok(assessments) => (StatusCode::OK, axum::Json(assessments)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_handler<S>(
    State(service): SharedService<S>,
    axum::Json(meta): axum::Json<NewAssessment>,
) -> Response
where
    S: RecordStore + 'static,
{
    match service.create(meta).await {
        Ok(assessment) => (StatusCode::CREATED, axum::Json(assessment)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    match service.get(&id).await {
        Ok(Some(assessment)) => (StatusCode::OK, axum::Json(assessment)).into_response(),
        Ok(None) => not_found(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
    axum::Json(patch): axum::Json<AssessmentPatch>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(service.update_details(&id, patch).await)
}

pub(crate) async fn delete_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    match service.delete(&id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn publish_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(service.publish(&id).await)
}

pub(crate) async fn unpublish_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(service.unpublish(&id).await)
}

pub(crate) async fn duplicate_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    match service.duplicate(&id).await {
        Ok(Some(copy)) => (StatusCode::CREATED, axum::Json(copy)).into_response(),
        Ok(None) => not_found(),
        Err(error) => error_response(error),
    }
}

/// Visibility, progress and validation for a posted answer map. Nothing is stored.
pub(crate) async fn evaluate_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
    axum::Json(request): axum::Json<EvaluateRequest>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    let assessment = match service.get(&id).await {
        Ok(Some(assessment)) => assessment,
        Ok(None) => return not_found(),
        Err(error) => return error_response(error),
    };

    let answers: AnswerSheet = request.answers.into_iter().collect();
    let visible_question_ids = visible_questions(&assessment, &answers)
        .into_iter()
        .map(|question| question.id.clone())
        .collect();
    let validation = validate_all(&assessment, &answers);
    let payload = EvaluateResponse {
        visible_question_ids,
        progress: progress(&assessment, &answers),
        messages: validation.messages(),
        validation,
    };
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn responses_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    match service.get(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(),
        Err(error) => return error_response(error),
    }
    match service.responses_for(&id).await {
        Ok(responses) => (StatusCode::OK, axum::Json(responses)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn add_section_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
    axum::Json(section): axum::Json<NewSection>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(service.add_section(&id, section).await)
}

pub(crate) async fn reorder_sections_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
    axum::Json(request): axum::Json<ReorderRequest<SectionId>>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(service.reorder_sections(&id, request.ids).await)
}

pub(crate) async fn update_section_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id)): Path<(String, String)>,
    axum::Json(patch): axum::Json<SectionPatch>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .update_section(&id, SectionId(section_id), patch)
            .await,
    )
}

pub(crate) async fn delete_section_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id)): Path<(String, String)>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(service.delete_section(&id, SectionId(section_id)).await)
}

pub(crate) async fn duplicate_section_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id)): Path<(String, String)>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .duplicate_section(&id, SectionId(section_id))
            .await,
    )
}

pub(crate) async fn add_question_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id)): Path<(String, String)>,
    axum::Json(question): axum::Json<NewQuestion>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .add_question(&id, SectionId(section_id), question)
            .await,
    )
}

pub(crate) async fn reorder_questions_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id)): Path<(String, String)>,
    axum::Json(request): axum::Json<ReorderRequest<QuestionId>>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .reorder_questions(&id, SectionId(section_id), request.ids)
            .await,
    )
}

pub(crate) async fn update_question_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id, question_id)): Path<(String, String, String)>,
    axum::Json(patch): axum::Json<QuestionPatch>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .update_question(&id, SectionId(section_id), QuestionId(question_id), patch)
            .await,
    )
}

pub(crate) async fn delete_question_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id, question_id)): Path<(String, String, String)>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .delete_question(&id, SectionId(section_id), QuestionId(question_id))
            .await,
    )
}

pub(crate) async fn duplicate_question_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id, question_id)): Path<(String, String, String)>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .duplicate_question(&id, SectionId(section_id), QuestionId(question_id))
            .await,
    )
}

pub(crate) async fn add_option_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id, question_id)): Path<(String, String, String)>,
    axum::Json(option): axum::Json<NewOption>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .add_option(&id, SectionId(section_id), QuestionId(question_id), option)
            .await,
    )
}

pub(crate) async fn reorder_options_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id, question_id)): Path<(String, String, String)>,
    axum::Json(request): axum::Json<ReorderRequest<OptionId>>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .reorder_options(
                &id,
                SectionId(section_id),
                QuestionId(question_id),
                request.ids,
            )
            .await,
    )
}

pub(crate) async fn update_option_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id, question_id, option_id)): Path<(
        String,
        String,
        String,
        String,
    )>,
    axum::Json(patch): axum::Json<OptionPatch>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .update_option(
                &id,
                SectionId(section_id),
                QuestionId(question_id),
                OptionId(option_id),
                patch,
            )
            .await,
    )
}

pub(crate) async fn delete_option_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, section_id, question_id, option_id)): Path<(
        String,
        String,
        String,
        String,
    )>,
) -> Response
where
    S: RecordStore + 'static,
{
    let id = AssessmentId(assessment_id);
    mutation_response(
        service
            .delete_option(
                &id,
                SectionId(section_id),
                QuestionId(question_id),
                OptionId(option_id),
            )
            .await,
    )
}

fn mutation_response(result: Result<Option<SchemaUpdate>, AssessmentServiceError>) -> Response {
    match result {
        Ok(Some(update)) => (StatusCode::OK, axum::Json(update)).into_response(),
        Ok(None) => not_found(),
        Err(error) => error_response(error),
    }
}

fn not_found() -> Response {
    let payload = json!({
        "error": "not found",
    });
    (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
}

fn error_response(error: AssessmentServiceError) -> Response {
    let status = match &error {
        AssessmentServiceError::Schema(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssessmentServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
