//! Candidate-facing runtime for taking an assessment.
//!
//! A session loads the assessment, identifies the candidate (resuming an earlier
//! incomplete response when one exists), collects answers with debounced autosave and a
//! running clock, and finally validates and submits. Leaving mid-session flushes the
//! last snapshot so a later session can pick it up again.

mod autosave;
mod clock;

pub use clock::{format_elapsed, SessionClock};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use self::autosave::Autosaver;
use super::domain::{Assessment, AssessmentId, Question, QuestionId};
use super::logic::visible_questions;
use super::repository::{self as records, RecordStore, StoreError};
use super::response::{AnswerSheet, AnswerValue, AssessmentResponse, CandidateIdentity};
use super::validation::{validate_all, ValidationReport};
use crate::config::AssessmentConfig;

/// Timings for the background autosave and clock tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub autosave_debounce: Duration,
    pub clock_tick: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_debounce: Duration::from_millis(800),
            clock_tick: Duration::from_secs(1),
        }
    }
}

impl From<&AssessmentConfig> for SessionConfig {
    fn from(config: &AssessmentConfig) -> Self {
        Self {
            autosave_debounce: config.autosave_debounce(),
            clock_tick: config.clock_tick(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    IdentifyingCandidate,
    InProgress,
    Submitting,
    Submitted,
    NotFound,
}

impl SessionState {
    pub const fn label(self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::IdentifyingCandidate => "identifying_candidate",
            SessionState::InProgress => "in_progress",
            SessionState::Submitting => "submitting",
            SessionState::Submitted => "submitted",
            SessionState::NotFound => "not_found",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is {actual}, expected {expected}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },
    #[error("candidate name is required")]
    MissingName,
    #[error("candidate email is required")]
    MissingEmail,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Answered share of the visible questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
    pub percent: u8,
}

impl Progress {
    fn new(answered: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((answered * 100 + total / 2) / total).min(100) as u8
        };
        Self {
            answered,
            total,
            percent,
        }
    }
}

/// Answered visible questions over visible questions. Falls back to the total
/// question count when nothing is visible.
pub fn progress(assessment: &Assessment, answers: &AnswerSheet) -> Progress {
    let visible = visible_questions(assessment, answers);
    let answered = visible
        .iter()
        .filter(|question| answers.is_answered(&question.id))
        .count();
    let total = if visible.is_empty() {
        assessment.question_count()
    } else {
        visible.len()
    };
    Progress::new(answered, total)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Visible questions failed validation; the session stays in progress.
    Blocked(ValidationReport),
    Submitted(AssessmentResponse),
}

pub struct AssessmentSession<S> {
    store: Arc<S>,
    config: SessionConfig,
    state: SessionState,
    assessment: Option<Assessment>,
    response: Option<AssessmentResponse>,
    clock: Option<SessionClock>,
    autosave: Option<Autosaver>,
}

impl<S> AssessmentSession<S>
where
    S: RecordStore + 'static,
{
    /// Load the assessment and, when `candidate` is known, begin or resume their
    /// response. A missing assessment yields a session in the `NotFound` state.
    pub async fn start(
        store: Arc<S>,
        assessment_id: &AssessmentId,
        candidate: Option<CandidateIdentity>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut session = Self {
            store,
            config,
            state: SessionState::Loading,
            assessment: None,
            response: None,
            clock: None,
            autosave: None,
        };

        let Some(assessment) =
            records::fetch::<Assessment, _>(session.store.as_ref(), assessment_id.as_str()).await?
        else {
            info!(assessment_id = %assessment_id, "assessment not found");
            session.state = SessionState::NotFound;
            return Ok(session);
        };
        session.assessment = Some(assessment);

        match candidate {
            Some(candidate) => session.begin(candidate).await?,
            None => session.state = SessionState::IdentifyingCandidate,
        }
        Ok(session)
    }

    /// Supply the candidate's name and email. Both are required.
    pub async fn identify(
        &mut self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.expect_state(SessionState::IdentifyingCandidate)?;

        let name = name.into().trim().to_string();
        let email = email.into().trim().to_string();
        if name.is_empty() {
            return Err(SessionError::MissingName);
        }
        if email.is_empty() {
            return Err(SessionError::MissingEmail);
        }

        self.begin(CandidateIdentity::new(name, email)).await
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn assessment(&self) -> Option<&Assessment> {
        self.assessment.as_ref()
    }

    pub fn response(&self) -> Option<&AssessmentResponse> {
        self.response.as_ref()
    }

    pub fn answer(&self, question_id: &QuestionId) -> Option<&AnswerValue> {
        self.response.as_ref()?.responses.get(question_id)
    }

    /// Record an answer. Returns `None` when the question is not part of the
    /// assessment, in which case nothing changes.
    pub fn set_answer(
        &mut self,
        question_id: &QuestionId,
        value: AnswerValue,
    ) -> Result<Option<Progress>, SessionError> {
        self.expect_state(SessionState::InProgress)?;
        if !self.has_question(question_id) {
            return Ok(None);
        }
        if let Some(response) = self.response.as_mut() {
            response.responses.set(question_id.clone(), value);
        }
        self.touch();
        Ok(Some(self.progress()))
    }

    pub fn clear_answer(
        &mut self,
        question_id: &QuestionId,
    ) -> Result<Option<Progress>, SessionError> {
        self.expect_state(SessionState::InProgress)?;
        if !self.has_question(question_id) {
            return Ok(None);
        }
        if let Some(response) = self.response.as_mut() {
            response.responses.remove(question_id);
        }
        self.touch();
        Ok(Some(self.progress()))
    }

    /// Questions shown for the current answers, in display order.
    pub fn visible_questions(&self) -> Vec<&Question> {
        match (&self.assessment, &self.response) {
            (Some(assessment), Some(response)) => {
                visible_questions(assessment, &response.responses)
            }
            (Some(assessment), None) => assessment.questions().collect(),
            _ => Vec::new(),
        }
    }

    pub fn progress(&self) -> Progress {
        match (&self.assessment, &self.response) {
            (Some(assessment), Some(response)) => progress(assessment, &response.responses),
            (Some(assessment), None) => progress(assessment, &AnswerSheet::new()),
            _ => Progress::new(0, 0),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        match (&self.assessment, &self.response) {
            (Some(assessment), Some(response)) => validate_all(assessment, &response.responses),
            (Some(assessment), None) => validate_all(assessment, &AnswerSheet::new()),
            _ => ValidationReport {
                errors: Default::default(),
                can_submit: false,
            },
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        match (&self.clock, &self.response) {
            (Some(clock), _) => clock.elapsed_seconds(),
            (None, Some(response)) => response.time_spent_seconds,
            (None, None) => 0,
        }
    }

    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_seconds())
    }

    /// Validate and, when every visible question passes, persist the completed
    /// response. Any pending autosave is discarded first so it cannot overwrite the
    /// submitted record.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, SessionError> {
        self.expect_state(SessionState::InProgress)?;

        let report = self.validate();
        if !report.can_submit {
            info!(errors = report.errors.len(), "submission blocked by validation");
            return Ok(SubmitOutcome::Blocked(report));
        }

        let Some(mut submitted) = self.response.clone() else {
            return Ok(SubmitOutcome::Blocked(report));
        };

        self.state = SessionState::Submitting;
        if let Some(autosave) = self.autosave.take() {
            autosave.cancel().await;
        }
        let elapsed = self.clock.as_mut().map(SessionClock::stop).unwrap_or(0);

        let now = Utc::now();
        submitted.is_complete = true;
        submitted.submitted_at = Some(now);
        submitted.updated_at = now;
        submitted.time_spent_seconds = elapsed;

        if let Err(error) = records::put(self.store.as_ref(), &submitted).await {
            warn!(response_id = %submitted.id.0, error = %error, "submission failed");
            self.resume_runtime(elapsed);
            self.state = SessionState::InProgress;
            // The cancelled autosave may have held unsaved answers.
            self.touch();
            return Err(error.into());
        }

        info!(
            response_id = %submitted.id.0,
            assessment_id = %submitted.assessment_id,
            time_spent_seconds = elapsed,
            "assessment submitted"
        );
        self.response = Some(submitted.clone());
        self.state = SessionState::Submitted;
        Ok(SubmitOutcome::Submitted(submitted))
    }

    /// Stop the session, writing any pending autosave before returning the last
    /// snapshot.
    pub async fn leave(mut self) -> Option<AssessmentResponse> {
        if let Some(autosave) = self.autosave.take() {
            autosave.flush().await;
        }
        if let Some(clock) = self.clock.as_mut() {
            let elapsed = clock.stop();
            if let Some(response) = self.response.as_mut() {
                if !response.is_complete {
                    response.time_spent_seconds = elapsed;
                }
            }
        }
        self.response.take()
    }

    async fn begin(&mut self, candidate: CandidateIdentity) -> Result<(), SessionError> {
        let Some(assessment_id) = self.assessment.as_ref().map(|a| a.id.clone()) else {
            return Err(SessionError::InvalidState {
                expected: SessionState::IdentifyingCandidate,
                actual: self.state,
            });
        };

        let response = match self.latest_incomplete(&assessment_id, &candidate).await? {
            Some(mut existing) => {
                info!(
                    response_id = %existing.id.0,
                    answers = existing.responses.len(),
                    "resuming response"
                );
                existing.candidate = Some(candidate);
                existing
            }
            None => {
                let fresh = AssessmentResponse::start(assessment_id.clone(), Some(candidate));
                info!(
                    response_id = %fresh.id.0,
                    assessment_id = %assessment_id,
                    "response started"
                );
                fresh
            }
        };

        let elapsed = response.time_spent_seconds;
        self.response = Some(response);
        self.resume_runtime(elapsed);
        self.state = SessionState::InProgress;
        Ok(())
    }

    /// Most recently updated incomplete response by the same candidate.
    async fn latest_incomplete(
        &self,
        assessment_id: &AssessmentId,
        candidate: &CandidateIdentity,
    ) -> Result<Option<AssessmentResponse>, StoreError> {
        let responses: Vec<AssessmentResponse> = records::fetch_all(self.store.as_ref()).await?;
        Ok(responses
            .into_iter()
            .filter(|response| &response.assessment_id == assessment_id && !response.is_complete)
            .filter(|response| {
                response
                    .candidate
                    .as_ref()
                    .map(|existing| existing.same_candidate(candidate))
                    .unwrap_or(false)
            })
            .max_by_key(|response| response.updated_at))
    }

    fn resume_runtime(&mut self, base_seconds: u64) {
        let clock = SessionClock::start(base_seconds, self.config.clock_tick);
        self.autosave = Some(Autosaver::spawn(
            Arc::clone(&self.store),
            clock.reading(),
            self.config.autosave_debounce,
        ));
        self.clock = Some(clock);
    }

    fn touch(&mut self) {
        let elapsed = self.elapsed_seconds();
        let Some(response) = self.response.as_mut() else {
            return;
        };
        response.updated_at = Utc::now();
        response.time_spent_seconds = elapsed;
        if let Some(autosave) = &self.autosave {
            autosave.schedule(response.clone());
        }
    }

    fn has_question(&self, question_id: &QuestionId) -> bool {
        self.assessment
            .as_ref()
            .map(|assessment| assessment.question(question_id).is_some())
            .unwrap_or(false)
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}
