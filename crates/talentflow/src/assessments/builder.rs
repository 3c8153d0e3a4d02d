//! Pure schema mutations.
//!
//! Every operation takes the current assessment by reference and hands back a new,
//! internally consistent value. `Ok(None)` means the addressed section, question or
//! option does not exist; the caller's assessment is left untouched in that case.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    default_options, Assessment, AssessmentId, ConditionalLogic, OptionId, Question,
    QuestionId, QuestionKind, QuestionOption, QuestionType, Section, SectionId,
};

const COPY_SUFFIX: &str = " (Copy)";

/// Rejections raised while mutating a schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("assessment title is required")]
    MissingTitle,
    #[error("question {question_id} cannot depend on itself")]
    SelfReference { question_id: QuestionId },
    #[error("question {question_id} depends on unknown question {target}")]
    DanglingReference {
        question_id: QuestionId,
        target: QuestionId,
    },
    #[error("minimum value {min} exceeds maximum value {max}")]
    InvertedRange { min: f64, max: f64 },
    #[error("option value '{value}' is used more than once")]
    DuplicateOptionValue { value: String },
}

/// Metadata supplied when creating an assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAssessment {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `Some(None)` detaches the assessment from its job.
    #[serde(default, with = "double_option")]
    pub job_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSection {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
}

/// Question content for `add_question`. Choice kinds without options get the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub conditional_logic: Option<ConditionalLogic>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl NewQuestion {
    /// Question of `question_type` titled the way the builder names fresh questions.
    pub fn of_type(question_type: QuestionType) -> Self {
        Self {
            title: format!("New {} Question", question_type.display_name()),
            description: None,
            required: false,
            conditional_logic: None,
            kind: question_type.default_kind(),
        }
    }

    pub fn titled(title: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            title: title.into(),
            description: None,
            required: false,
            conditional_logic: None,
            kind,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn shown_if(mut self, logic: ConditionalLogic) -> Self {
        self.conditional_logic = Some(logic);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub required: Option<bool>,
    /// `Some(None)` clears the conditional logic.
    #[serde(default, with = "double_option")]
    pub conditional_logic: Option<Option<ConditionalLogic>>,
    #[serde(default)]
    pub kind: Option<QuestionKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewOption {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionPatch {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// One atomic change to an assessment's nested structure.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaMutation {
    UpdateDetails(AssessmentPatch),
    AddSection(NewSection),
    UpdateSection {
        section_id: SectionId,
        patch: SectionPatch,
    },
    DeleteSection {
        section_id: SectionId,
    },
    DuplicateSection {
        section_id: SectionId,
    },
    ReorderSections {
        section_ids: Vec<SectionId>,
    },
    AddQuestion {
        section_id: SectionId,
        question: NewQuestion,
    },
    UpdateQuestion {
        section_id: SectionId,
        question_id: QuestionId,
        patch: QuestionPatch,
    },
    DeleteQuestion {
        section_id: SectionId,
        question_id: QuestionId,
    },
    DuplicateQuestion {
        section_id: SectionId,
        question_id: QuestionId,
    },
    ReorderQuestions {
        section_id: SectionId,
        question_ids: Vec<QuestionId>,
    },
    AddOption {
        section_id: SectionId,
        question_id: QuestionId,
        option: NewOption,
    },
    UpdateOption {
        section_id: SectionId,
        question_id: QuestionId,
        option_id: OptionId,
        patch: OptionPatch,
    },
    DeleteOption {
        section_id: SectionId,
        question_id: QuestionId,
        option_id: OptionId,
    },
    ReorderOptions {
        section_id: SectionId,
        question_id: QuestionId,
        option_ids: Vec<OptionId>,
    },
    Publish,
    Unpublish,
}

impl SchemaMutation {
    /// Whether the mutation changes questionnaire content (as opposed to its
    /// publication state).
    pub fn edits_content(&self) -> bool {
        !matches!(self, SchemaMutation::Publish | SchemaMutation::Unpublish)
    }
}

pub fn create_assessment(
    meta: NewAssessment,
    now: DateTime<Utc>,
) -> Result<Assessment, SchemaError> {
    let title = meta.title.trim();
    if title.is_empty() {
        return Err(SchemaError::MissingTitle);
    }

    Ok(Assessment {
        id: AssessmentId::generate(),
        title: title.to_string(),
        description: meta.description,
        job_id: meta.job_id,
        sections: Vec::new(),
        is_published: false,
        created_at: now,
        updated_at: now,
    })
}

/// Deep copy with fresh ids throughout. Conditional references inside the copy are
/// remapped onto the copied questions so the duplicate is self-contained.
pub fn duplicate_assessment(source: &Assessment, now: DateTime<Utc>) -> Assessment {
    let mut copy = source.clone();
    copy.id = AssessmentId::generate();
    copy.title = format!("{}{COPY_SUFFIX}", source.title);
    copy.is_published = false;
    copy.created_at = now;
    copy.updated_at = now;

    let mut remapped = Vec::new();
    for section in &mut copy.sections {
        section.id = SectionId::generate();
        for question in &mut section.questions {
            let fresh = QuestionId::generate();
            remapped.push((question.id.clone(), fresh.clone()));
            question.id = fresh;
            refresh_option_ids(&mut question.kind);
        }
    }

    for question in copy.sections.iter_mut().flat_map(|s| s.questions.iter_mut()) {
        if let Some(logic) = &mut question.conditional_logic {
            for condition in &mut logic.show_if {
                if let Some((_, fresh)) = remapped
                    .iter()
                    .find(|(original, _)| *original == condition.question_id)
                {
                    condition.question_id = fresh.clone();
                }
            }
        }
    }

    copy
}

/// Apply `mutation` to `assessment`, stamping `updated_at` with `now`.
pub fn apply(
    assessment: &Assessment,
    mutation: SchemaMutation,
    now: DateTime<Utc>,
) -> Result<Option<Assessment>, SchemaError> {
    let mut next = assessment.clone();

    let applied = match mutation {
        SchemaMutation::UpdateDetails(patch) => update_details(&mut next, patch)?,
        SchemaMutation::AddSection(section) => add_section(&mut next, section),
        SchemaMutation::UpdateSection { section_id, patch } => {
            update_section(&mut next, &section_id, patch)
        }
        SchemaMutation::DeleteSection { section_id } => delete_section(&mut next, &section_id),
        SchemaMutation::DuplicateSection { section_id } => {
            duplicate_section(&mut next, &section_id)
        }
        SchemaMutation::ReorderSections { section_ids } => {
            next.sections = reorder(std::mem::take(&mut next.sections), &section_ids, |s| {
                &s.id
            });
            renumber_sections(&mut next.sections);
            true
        }
        SchemaMutation::AddQuestion {
            section_id,
            question,
        } => add_question(&mut next, &section_id, question)?,
        SchemaMutation::UpdateQuestion {
            section_id,
            question_id,
            patch,
        } => update_question(&mut next, &section_id, &question_id, patch)?,
        SchemaMutation::DeleteQuestion {
            section_id,
            question_id,
        } => delete_question(&mut next, &section_id, &question_id),
        SchemaMutation::DuplicateQuestion {
            section_id,
            question_id,
        } => duplicate_question(&mut next, &section_id, &question_id),
        SchemaMutation::ReorderQuestions {
            section_id,
            question_ids,
        } => match section_mut(&mut next, &section_id) {
            Some(section) => {
                section.questions =
                    reorder(std::mem::take(&mut section.questions), &question_ids, |q| {
                        &q.id
                    });
                renumber_questions(&mut section.questions);
                true
            }
            None => false,
        },
        SchemaMutation::AddOption {
            section_id,
            question_id,
            option,
        } => add_option(&mut next, &section_id, &question_id, option)?,
        SchemaMutation::UpdateOption {
            section_id,
            question_id,
            option_id,
            patch,
        } => update_option(&mut next, &section_id, &question_id, &option_id, patch)?,
        SchemaMutation::DeleteOption {
            section_id,
            question_id,
            option_id,
        } => match options_mut(&mut next, &section_id, &question_id) {
            Some(options) => {
                let before = options.len();
                options.retain(|option| option.id != option_id);
                renumber_options(options);
                options.len() != before
            }
            None => false,
        },
        SchemaMutation::ReorderOptions {
            section_id,
            question_id,
            option_ids,
        } => match options_mut(&mut next, &section_id, &question_id) {
            Some(options) => {
                *options = reorder(std::mem::take(options), &option_ids, |o| &o.id);
                renumber_options(options);
                true
            }
            None => false,
        },
        SchemaMutation::Publish => {
            next.is_published = true;
            true
        }
        SchemaMutation::Unpublish => {
            next.is_published = false;
            true
        }
    };

    if !applied {
        return Ok(None);
    }

    next.updated_at = now;
    Ok(Some(next))
}

fn update_details(
    assessment: &mut Assessment,
    patch: AssessmentPatch,
) -> Result<bool, SchemaError> {
    if let Some(title) = patch.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(SchemaError::MissingTitle);
        }
        assessment.title = title.to_string();
    }
    if let Some(description) = patch.description {
        assessment.description = description;
    }
    if let Some(job_id) = patch.job_id {
        assessment.job_id = job_id;
    }
    Ok(true)
}

fn add_section(assessment: &mut Assessment, section: NewSection) -> bool {
    let order = assessment.sections.len() as u32;
    assessment.sections.push(Section {
        id: SectionId::generate(),
        title: section.title,
        description: section.description,
        order,
        questions: Vec::new(),
    });
    true
}

fn update_section(
    assessment: &mut Assessment,
    section_id: &SectionId,
    patch: SectionPatch,
) -> bool {
    let Some(section) = section_mut(assessment, section_id) else {
        return false;
    };
    if let Some(title) = patch.title {
        section.title = title;
    }
    if let Some(description) = patch.description {
        section.description = description;
    }
    true
}

fn delete_section(assessment: &mut Assessment, section_id: &SectionId) -> bool {
    let Some(index) = assessment.sections.iter().position(|s| &s.id == section_id) else {
        return false;
    };
    let removed = assessment.sections.remove(index);
    renumber_sections(&mut assessment.sections);

    let removed_ids: Vec<QuestionId> = removed.questions.into_iter().map(|q| q.id).collect();
    prune_references(assessment, &removed_ids);
    true
}

/// Appends a deep copy of the section. Conditional references keep pointing at the
/// original questions.
fn duplicate_section(assessment: &mut Assessment, section_id: &SectionId) -> bool {
    let Some(source) = assessment.section(section_id) else {
        return false;
    };

    let mut copy = source.clone();
    copy.id = SectionId::generate();
    copy.title = format!("{}{COPY_SUFFIX}", source.title);
    copy.order = assessment.sections.len() as u32;
    for question in &mut copy.questions {
        question.id = QuestionId::generate();
        refresh_option_ids(&mut question.kind);
    }

    assessment.sections.push(copy);
    true
}

fn add_question(
    assessment: &mut Assessment,
    section_id: &SectionId,
    question: NewQuestion,
) -> Result<bool, SchemaError> {
    if assessment.section(section_id).is_none() {
        return Ok(false);
    }

    let id = QuestionId::generate();
    let kind = seed_options(question.kind);
    check_kind(&kind)?;
    let conditional_logic = normalize_logic(question.conditional_logic);
    if let Some(logic) = &conditional_logic {
        check_references(assessment, &id, logic)?;
    }

    let Some(section) = section_mut(assessment, section_id) else {
        return Ok(false);
    };
    let order = section.questions.len() as u32;
    section.questions.push(Question {
        id,
        title: question.title,
        description: question.description,
        required: question.required,
        order,
        conditional_logic,
        kind,
    });
    Ok(true)
}

fn update_question(
    assessment: &mut Assessment,
    section_id: &SectionId,
    question_id: &QuestionId,
    patch: QuestionPatch,
) -> Result<bool, SchemaError> {
    if let Some(Some(logic)) = &patch.conditional_logic {
        if !logic.show_if.is_empty() {
            check_references(assessment, question_id, logic)?;
        }
    }
    let kind = patch.kind.map(seed_options);
    if let Some(kind) = &kind {
        check_kind(kind)?;
    }

    let Some(question) = question_mut(assessment, section_id, question_id) else {
        return Ok(false);
    };
    if let Some(title) = patch.title {
        question.title = title;
    }
    if let Some(description) = patch.description {
        question.description = description;
    }
    if let Some(required) = patch.required {
        question.required = required;
    }
    if let Some(logic) = patch.conditional_logic {
        question.conditional_logic = normalize_logic(logic);
    }
    if let Some(kind) = kind {
        question.kind = kind;
    }
    Ok(true)
}

fn delete_question(
    assessment: &mut Assessment,
    section_id: &SectionId,
    question_id: &QuestionId,
) -> bool {
    let Some(section) = section_mut(assessment, section_id) else {
        return false;
    };
    let before = section.questions.len();
    section.questions.retain(|question| &question.id != question_id);
    if section.questions.len() == before {
        return false;
    }
    renumber_questions(&mut section.questions);

    prune_references(assessment, std::slice::from_ref(question_id));
    true
}

fn duplicate_question(
    assessment: &mut Assessment,
    section_id: &SectionId,
    question_id: &QuestionId,
) -> bool {
    let Some(section) = section_mut(assessment, section_id) else {
        return false;
    };
    let Some(source) = section.question(question_id) else {
        return false;
    };

    let mut copy = source.clone();
    copy.id = QuestionId::generate();
    copy.title = format!("{}{COPY_SUFFIX}", source.title);
    copy.order = section.questions.len() as u32;
    refresh_option_ids(&mut copy.kind);

    section.questions.push(copy);
    true
}

fn add_option(
    assessment: &mut Assessment,
    section_id: &SectionId,
    question_id: &QuestionId,
    option: NewOption,
) -> Result<bool, SchemaError> {
    let Some(options) = options_mut(assessment, section_id, question_id) else {
        return Ok(false);
    };

    // Default numbering skips values left behind by deleted options.
    let position = (options.len() + 1..)
        .find(|n| {
            let candidate = format!("option_{n}");
            !options.iter().any(|existing| existing.value == candidate)
        })
        .unwrap_or(options.len() + 1);
    let value = option.value.unwrap_or_else(|| format!("option_{position}"));
    if options.iter().any(|existing| existing.value == value) {
        return Err(SchemaError::DuplicateOptionValue { value });
    }

    options.push(QuestionOption {
        id: OptionId::generate(),
        label: option.label.unwrap_or_else(|| format!("Option {position}")),
        value,
        order: options.len() as u32,
    });
    Ok(true)
}

fn update_option(
    assessment: &mut Assessment,
    section_id: &SectionId,
    question_id: &QuestionId,
    option_id: &OptionId,
    patch: OptionPatch,
) -> Result<bool, SchemaError> {
    let Some(options) = options_mut(assessment, section_id, question_id) else {
        return Ok(false);
    };

    if let Some(value) = &patch.value {
        if options
            .iter()
            .any(|existing| &existing.id != option_id && &existing.value == value)
        {
            return Err(SchemaError::DuplicateOptionValue {
                value: value.clone(),
            });
        }
    }

    let Some(option) = options.iter_mut().find(|option| &option.id == option_id) else {
        return Ok(false);
    };
    if let Some(label) = patch.label {
        option.label = label;
    }
    if let Some(value) = patch.value {
        option.value = value;
    }
    Ok(true)
}

fn section_mut<'a>(
    assessment: &'a mut Assessment,
    section_id: &SectionId,
) -> Option<&'a mut Section> {
    assessment
        .sections
        .iter_mut()
        .find(|section| &section.id == section_id)
}

fn question_mut<'a>(
    assessment: &'a mut Assessment,
    section_id: &SectionId,
    question_id: &QuestionId,
) -> Option<&'a mut Question> {
    section_mut(assessment, section_id)?
        .questions
        .iter_mut()
        .find(|question| &question.id == question_id)
}

fn options_mut<'a>(
    assessment: &'a mut Assessment,
    section_id: &SectionId,
    question_id: &QuestionId,
) -> Option<&'a mut Vec<QuestionOption>> {
    question_mut(assessment, section_id, question_id)?
        .kind
        .options_mut()
}

/// Put the items named in `ids` first, in that order. Unknown ids are skipped and
/// items missing from `ids` keep their relative order after the named ones.
fn reorder<T, K, F>(items: Vec<T>, ids: &[K], key: F) -> Vec<T>
where
    K: PartialEq,
    F: Fn(&T) -> &K,
{
    let mut remaining: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());

    for id in ids {
        if let Some(slot) = remaining
            .iter_mut()
            .find(|slot| slot.as_ref().map(|item| key(item) == id).unwrap_or(false))
        {
            if let Some(item) = slot.take() {
                ordered.push(item);
            }
        }
    }
    ordered.extend(remaining.into_iter().flatten());
    ordered
}

fn renumber_sections(sections: &mut [Section]) {
    for (index, section) in sections.iter_mut().enumerate() {
        section.order = index as u32;
    }
}

fn renumber_questions(questions: &mut [Question]) {
    for (index, question) in questions.iter_mut().enumerate() {
        question.order = index as u32;
    }
}

fn renumber_options(options: &mut [QuestionOption]) {
    for (index, option) in options.iter_mut().enumerate() {
        option.order = index as u32;
    }
}

fn refresh_option_ids(kind: &mut QuestionKind) {
    if let Some(options) = kind.options_mut() {
        for option in options {
            option.id = OptionId::generate();
        }
    }
}

fn seed_options(kind: QuestionKind) -> QuestionKind {
    match kind {
        QuestionKind::SingleChoice { options } if options.is_empty() => {
            QuestionKind::SingleChoice {
                options: default_options(),
            }
        }
        QuestionKind::MultiChoice { options } if options.is_empty() => {
            QuestionKind::MultiChoice {
                options: default_options(),
            }
        }
        other => other,
    }
}

fn check_kind(kind: &QuestionKind) -> Result<(), SchemaError> {
    match kind {
        QuestionKind::NumericRange {
            min_value: Some(min),
            max_value: Some(max),
        } if min > max => Err(SchemaError::InvertedRange {
            min: *min,
            max: *max,
        }),
        QuestionKind::SingleChoice { options } | QuestionKind::MultiChoice { options } => {
            let mut seen = HashSet::new();
            for option in options {
                if !seen.insert(option.value.as_str()) {
                    return Err(SchemaError::DuplicateOptionValue {
                        value: option.value.clone(),
                    });
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn normalize_logic(logic: Option<ConditionalLogic>) -> Option<ConditionalLogic> {
    logic.filter(|logic| !logic.show_if.is_empty())
}

fn check_references(
    assessment: &Assessment,
    question_id: &QuestionId,
    logic: &ConditionalLogic,
) -> Result<(), SchemaError> {
    for target in logic.targets() {
        if target == question_id {
            return Err(SchemaError::SelfReference {
                question_id: question_id.clone(),
            });
        }
        if assessment.question(target).is_none() {
            return Err(SchemaError::DanglingReference {
                question_id: question_id.clone(),
                target: target.clone(),
            });
        }
    }
    Ok(())
}

/// Drop conditions that target removed questions; logic left empty is cleared.
fn prune_references(assessment: &mut Assessment, removed: &[QuestionId]) {
    if removed.is_empty() {
        return;
    }
    for question in assessment
        .sections
        .iter_mut()
        .flat_map(|section| section.questions.iter_mut())
    {
        if let Some(logic) = &mut question.conditional_logic {
            logic
                .show_if
                .retain(|condition| !removed.contains(&condition.question_id));
            if logic.show_if.is_empty() {
                question.conditional_logic = None;
            }
        }
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<T, S>(
        value: &Option<Option<T>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    /// A present field (even `null`) deserializes to `Some(..)`; an absent one relies on
    /// `#[serde(default)]` to become `None`.
    pub(super) fn deserialize<'de, T, D>(
        deserializer: D,
    ) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
