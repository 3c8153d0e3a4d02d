use super::common::*;
use chrono::Utc;
use serde_json::json;

use crate::assessments::builder::{
    apply, create_assessment, duplicate_assessment, AssessmentPatch, NewAssessment, NewOption,
    NewQuestion, NewSection, OptionPatch, QuestionPatch, SchemaError, SchemaMutation,
    SectionPatch,
};
use crate::assessments::domain::{
    Assessment, Condition, ConditionOperator, ConditionValue, ConditionalLogic, OptionId,
    QuestionId, QuestionKind, QuestionType, SectionId,
};

fn applied(assessment: &Assessment, mutation: SchemaMutation) -> Assessment {
    apply(assessment, mutation, Utc::now())
        .expect("mutation accepted")
        .expect("target exists")
}

fn orders(assessment: &Assessment) -> Vec<(u32, Vec<u32>)> {
    assessment
        .sections
        .iter()
        .map(|section| {
            (
                section.order,
                section.questions.iter().map(|q| q.order).collect(),
            )
        })
        .collect()
}

#[test]
fn create_requires_a_title() {
    let error = create_assessment(
        NewAssessment {
            title: "   ".to_string(),
            ..NewAssessment::default()
        },
        Utc::now(),
    )
    .expect_err("blank title rejected");
    assert_eq!(error, SchemaError::MissingTitle);

    let created = create_assessment(
        NewAssessment {
            title: " Backend screening ".to_string(),
            description: "Round one".to_string(),
            job_id: Some("job-7".to_string()),
        },
        Utc::now(),
    )
    .expect("created");
    assert_eq!(created.title, "Backend screening");
    assert!(created.sections.is_empty());
    assert!(!created.is_published);
    assert_eq!(created.created_at, created.updated_at);
}

#[test]
fn added_sections_and_questions_take_the_next_order() {
    let base = assessment_with("a1", Vec::new());
    let with_section = applied(
        &base,
        SchemaMutation::AddSection(NewSection {
            title: "Basics".to_string(),
            description: None,
        }),
    );
    let with_two = applied(
        &with_section,
        SchemaMutation::AddSection(NewSection {
            title: "Depth".to_string(),
            description: Some("Harder questions".to_string()),
        }),
    );
    assert_eq!(orders(&with_two), vec![(0, vec![]), (1, vec![])]);
    assert!(base.sections.is_empty(), "input is never mutated");

    let section_id = with_two.sections[1].id.clone();
    let with_question = applied(
        &with_two,
        SchemaMutation::AddQuestion {
            section_id: section_id.clone(),
            question: NewQuestion::of_type(QuestionType::MultiChoice),
        },
    );
    let with_questions = applied(
        &with_question,
        SchemaMutation::AddQuestion {
            section_id,
            question: NewQuestion::titled("Years", numeric(Some(0.0), None)).required(),
        },
    );

    assert_eq!(orders(&with_questions), vec![(0, vec![]), (1, vec![0, 1])]);
    let seeded = &with_questions.sections[1].questions[0];
    assert_eq!(seeded.title, "New Multiple Choice Question");
    let values: Vec<_> = seeded.options().iter().map(|o| o.value.as_str()).collect();
    assert_eq!(values, vec!["option_1", "option_2", "option_3"]);
    assert!(with_questions.sections[1].questions[1].required);
}

#[test]
fn choice_questions_without_options_are_seeded() {
    let base = quiz();
    let next = applied(
        &base,
        SchemaMutation::AddQuestion {
            section_id: SectionId::from("s1"),
            question: NewQuestion::titled("Pick one", QuestionKind::SingleChoice { options: vec![] }),
        },
    );
    let added = next.sections[0].questions.last().expect("appended");
    let labels: Vec<_> = added.options().iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["Option 1", "Option 2", "Option 3"]);
}

#[test]
fn deleting_a_section_renumbers_and_prunes_conditions() {
    let base = assessment_with(
        "a1",
        vec![
            section("s1", 0, vec![question("q1", 0, short_text(None))]),
            section(
                "s2",
                1,
                vec![shown_if(
                    question("q2", 0, short_text(None)),
                    "q1",
                    ConditionOperator::Contains,
                    "rust",
                )],
            ),
            section("s3", 2, vec![]),
        ],
    );

    let next = applied(
        &base,
        SchemaMutation::DeleteSection {
            section_id: SectionId::from("s1"),
        },
    );
    let ids: Vec<_> = next.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s3"]);
    assert_eq!(orders(&next), vec![(0, vec![0]), (1, vec![])]);
    assert!(next.sections[0].questions[0].conditional_logic.is_none());
}

#[test]
fn deleting_a_question_keeps_orders_dense() {
    let base = assessment_with(
        "a1",
        vec![section(
            "s1",
            0,
            vec![
                question("q1", 0, short_text(None)),
                question("q2", 1, short_text(None)),
                shown_if(
                    question("q3", 2, short_text(None)),
                    "q2",
                    ConditionOperator::Equals,
                    "yes",
                ),
            ],
        )],
    );

    let next = applied(
        &base,
        SchemaMutation::DeleteQuestion {
            section_id: SectionId::from("s1"),
            question_id: QuestionId::from("q2"),
        },
    );
    assert_eq!(orders(&next), vec![(0, vec![0, 1])]);
    assert!(next.question(&QuestionId::from("q3")).is_some());
    assert!(next
        .question(&QuestionId::from("q3"))
        .and_then(|q| q.conditional_logic.as_ref())
        .is_none());
}

#[test]
fn reorder_applies_the_permutation_and_keeps_unlisted_items() {
    let base = assessment_with(
        "a1",
        vec![section(
            "s1",
            0,
            vec![
                question("q1", 0, short_text(None)),
                question("q2", 1, short_text(None)),
                question("q3", 2, short_text(None)),
            ],
        )],
    );

    let next = applied(
        &base,
        SchemaMutation::ReorderQuestions {
            section_id: SectionId::from("s1"),
            question_ids: vec![QuestionId::from("q3"), QuestionId::from("missing")],
        },
    );
    let ids: Vec<_> = next.sections[0]
        .questions
        .iter()
        .map(|q| (q.id.as_str(), q.order))
        .collect();
    assert_eq!(ids, vec![("q3", 0), ("q1", 1), ("q2", 2)]);
}

#[test]
fn missing_targets_are_no_ops() {
    let base = quiz();
    let result = apply(
        &base,
        SchemaMutation::UpdateQuestion {
            section_id: SectionId::from("s1"),
            question_id: QuestionId::from("nope"),
            patch: QuestionPatch {
                title: Some("Renamed".to_string()),
                ..QuestionPatch::default()
            },
        },
        Utc::now(),
    )
    .expect("no schema error");
    assert!(result.is_none());

    let result = apply(
        &base,
        SchemaMutation::DeleteSection {
            section_id: SectionId::from("ghost"),
        },
        Utc::now(),
    )
    .expect("no schema error");
    assert!(result.is_none());
}

fn logic_on(target: &str) -> ConditionalLogic {
    ConditionalLogic::new(vec![Condition {
        question_id: QuestionId::from(target),
        operator: ConditionOperator::Equals,
        value: ConditionValue::from("x"),
    }])
}

#[test]
fn conditional_references_are_checked_on_write() {
    let base = quiz();
    let self_reference = apply(
        &base,
        SchemaMutation::UpdateQuestion {
            section_id: SectionId::from("s1"),
            question_id: QuestionId::from("q2"),
            patch: QuestionPatch {
                conditional_logic: Some(Some(logic_on("q2"))),
                ..QuestionPatch::default()
            },
        },
        Utc::now(),
    );
    assert!(matches!(
        self_reference,
        Err(SchemaError::SelfReference { .. })
    ));

    let dangling = apply(
        &base,
        SchemaMutation::AddQuestion {
            section_id: SectionId::from("s1"),
            question: NewQuestion::titled("Follow-up", short_text(None)).shown_if(logic_on("q9")),
        },
        Utc::now(),
    );
    assert!(matches!(
        dangling,
        Err(SchemaError::DanglingReference { ref target, .. }) if target.as_str() == "q9"
    ));

    let empty = applied(
        &base,
        SchemaMutation::UpdateQuestion {
            section_id: SectionId::from("s1"),
            question_id: QuestionId::from("q2"),
            patch: QuestionPatch {
                conditional_logic: Some(Some(ConditionalLogic::new(Vec::new()))),
                ..QuestionPatch::default()
            },
        },
    );
    assert!(empty
        .question(&QuestionId::from("q2"))
        .and_then(|q| q.conditional_logic.as_ref())
        .is_none());
}

#[test]
fn clearing_conditional_logic_removes_it() {
    let base = quiz();
    let next = applied(
        &base,
        SchemaMutation::UpdateQuestion {
            section_id: SectionId::from("s1"),
            question_id: QuestionId::from("q2"),
            patch: QuestionPatch {
                conditional_logic: Some(None),
                required: Some(false),
                ..QuestionPatch::default()
            },
        },
    );
    let q2 = next.question(&QuestionId::from("q2")).expect("still there");
    assert!(q2.conditional_logic.is_none());
    assert!(!q2.required);
    assert!(base
        .question(&QuestionId::from("q2"))
        .and_then(|q| q.conditional_logic.as_ref())
        .is_some());
}

#[test]
fn question_patch_distinguishes_null_from_absent() {
    let cleared: QuestionPatch =
        serde_json::from_value(json!({ "conditional_logic": null })).expect("patch");
    assert_eq!(cleared.conditional_logic, Some(None));

    let untouched: QuestionPatch = serde_json::from_value(json!({ "title": "New" })).expect("patch");
    assert_eq!(untouched.conditional_logic, None);
    assert_eq!(untouched.title.as_deref(), Some("New"));
}

#[test]
fn duplicating_a_section_deep_copies_with_fresh_ids() {
    let base = quiz();
    let next = applied(
        &base,
        SchemaMutation::DuplicateSection {
            section_id: SectionId::from("s1"),
        },
    );

    assert_eq!(next.sections.len(), 2);
    let copy = &next.sections[1];
    assert_eq!(copy.title, "Section s1 (Copy)");
    assert_eq!(copy.order, 1);
    assert_ne!(copy.id, base.sections[0].id);
    assert_ne!(copy.questions[0].id, base.sections[0].questions[0].id);
    assert_ne!(
        copy.questions[0].options()[0].id,
        base.sections[0].questions[0].options()[0].id
    );
    let copied_target = copy.questions[1]
        .conditional_logic
        .as_ref()
        .and_then(|logic| logic.targets().next())
        .expect("logic copied");
    assert_eq!(copied_target.as_str(), "q1");
    assert_eq!(base.sections.len(), 1);
}

#[test]
fn duplicating_a_question_appends_a_copy() {
    let base = quiz();
    let next = applied(
        &base,
        SchemaMutation::DuplicateQuestion {
            section_id: SectionId::from("s1"),
            question_id: QuestionId::from("q1"),
        },
    );
    let questions = &next.sections[0].questions;
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[2].title, "Question q1 (Copy)");
    assert_eq!(questions[2].order, 2);
    assert_eq!(questions[2].options().len(), 2);
}

#[test]
fn option_edits_keep_orders_dense_and_values_unique() {
    let base = quiz();
    let section_id = SectionId::from("s1");
    let question_id = QuestionId::from("q1");

    let added = applied(
        &base,
        SchemaMutation::AddOption {
            section_id: section_id.clone(),
            question_id: question_id.clone(),
            option: NewOption::default(),
        },
    );
    let options = added.question(&question_id).expect("q1").options();
    assert_eq!(options.len(), 3);
    assert_eq!(options[2].label, "Option 3");
    assert_eq!(options[2].value, "option_3");
    assert_eq!(options[2].order, 2);

    let duplicate = apply(
        &added,
        SchemaMutation::UpdateOption {
            section_id: section_id.clone(),
            question_id: question_id.clone(),
            option_id: options[2].id.clone(),
            patch: OptionPatch {
                value: Some("A".to_string()),
                ..OptionPatch::default()
            },
        },
        Utc::now(),
    );
    assert_eq!(
        duplicate,
        Err(SchemaError::DuplicateOptionValue {
            value: "A".to_string()
        })
    );

    let reordered = applied(
        &added,
        SchemaMutation::ReorderOptions {
            section_id: section_id.clone(),
            question_id: question_id.clone(),
            option_ids: vec![options[2].id.clone(), OptionId::from("opt-A")],
        },
    );
    let values: Vec<_> = reordered
        .question(&question_id)
        .expect("q1")
        .options()
        .iter()
        .map(|o| (o.value.as_str(), o.order))
        .collect();
    assert_eq!(values, vec![("option_3", 0), ("A", 1), ("B", 2)]);

    let trimmed = applied(
        &reordered,
        SchemaMutation::DeleteOption {
            section_id,
            question_id: question_id.clone(),
            option_id: OptionId::from("opt-A"),
        },
    );
    let values: Vec<_> = trimmed
        .question(&question_id)
        .expect("q1")
        .options()
        .iter()
        .map(|o| (o.value.as_str(), o.order))
        .collect();
    assert_eq!(values, vec![("option_3", 0), ("B", 1)]);
}

#[test]
fn default_option_values_skip_ones_still_in_use() {
    let base = quiz();
    let section_id = SectionId::from("s1");
    let with_question = applied(
        &base,
        SchemaMutation::AddQuestion {
            section_id: section_id.clone(),
            question: NewQuestion::of_type(QuestionType::SingleChoice),
        },
    );
    let question = with_question.sections[0].questions.last().expect("appended");
    let question_id = question.id.clone();
    let second = question.options()[1].id.clone();

    let trimmed = applied(
        &with_question,
        SchemaMutation::DeleteOption {
            section_id: section_id.clone(),
            question_id: question_id.clone(),
            option_id: second,
        },
    );
    let refilled = applied(
        &trimmed,
        SchemaMutation::AddOption {
            section_id,
            question_id: question_id.clone(),
            option: NewOption::default(),
        },
    );

    let options: Vec<_> = refilled
        .question(&question_id)
        .expect("question kept")
        .options()
        .iter()
        .map(|o| (o.label.as_str(), o.value.as_str(), o.order))
        .collect();
    assert_eq!(
        options,
        vec![
            ("Option 1", "option_1", 0),
            ("Option 3", "option_3", 1),
            ("Option 4", "option_4", 2),
        ]
    );
}

#[test]
fn option_mutations_on_text_questions_are_no_ops() {
    let base = quiz();
    let result = apply(
        &base,
        SchemaMutation::AddOption {
            section_id: SectionId::from("s1"),
            question_id: QuestionId::from("q2"),
            option: NewOption::default(),
        },
        Utc::now(),
    )
    .expect("no schema error");
    assert!(result.is_none());
}

#[test]
fn inverted_numeric_ranges_are_rejected() {
    let base = quiz();
    let result = apply(
        &base,
        SchemaMutation::AddQuestion {
            section_id: SectionId::from("s1"),
            question: NewQuestion::titled("Rating", numeric(Some(5.0), Some(1.0))),
        },
        Utc::now(),
    );
    assert_eq!(result, Err(SchemaError::InvertedRange { min: 5.0, max: 1.0 }));
}

#[test]
fn details_patch_and_publication_flip() {
    let base = assessment_with("a1", Vec::new());
    let renamed = applied(
        &base,
        SchemaMutation::UpdateDetails(AssessmentPatch {
            title: Some("Platform screening".to_string()),
            job_id: Some(None),
            ..AssessmentPatch::default()
        }),
    );
    assert_eq!(renamed.title, "Platform screening");
    assert!(renamed.job_id.is_none());
    assert!(renamed.updated_at > base.updated_at);

    let published = applied(&renamed, SchemaMutation::Publish);
    assert!(published.is_published, "empty assessments can be published");
    let unpublished = applied(&published, SchemaMutation::Unpublish);
    assert!(!unpublished.is_published);

    let section = applied(
        &base,
        SchemaMutation::AddSection(NewSection {
            title: "Intro".to_string(),
            description: Some("Welcome".to_string()),
        }),
    );
    let section_id = section.sections[0].id.clone();
    let cleared = applied(
        &section,
        SchemaMutation::UpdateSection {
            section_id,
            patch: SectionPatch {
                description: Some(None),
                ..SectionPatch::default()
            },
        },
    );
    assert!(cleared.sections[0].description.is_none());
    assert_eq!(cleared.sections[0].title, "Intro");
}

#[test]
fn duplicated_assessments_are_self_contained_drafts() {
    let mut base = quiz();
    base.is_published = true;
    let copy = duplicate_assessment(&base, Utc::now());

    assert_ne!(copy.id, base.id);
    assert_eq!(copy.title, "Screening (Copy)");
    assert!(!copy.is_published);
    let first = copy.sections[0].questions[0].id.clone();
    assert_ne!(first.as_str(), "q1");
    let target = copy.sections[0].questions[1]
        .conditional_logic
        .as_ref()
        .and_then(|logic| logic.targets().next())
        .expect("logic kept");
    assert_eq!(target, &first);
}
