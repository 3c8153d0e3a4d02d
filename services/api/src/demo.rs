use crate::infra::ConfiguredStore;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use talentflow::assessments::{
    AnswerValue, Assessment, AssessmentService, AssessmentSession, CandidateIdentity, Condition,
    ConditionOperator, ConditionValue, ConditionalLogic, NewAssessment, NewQuestion, NewSection,
    OptionId, QuestionKind, QuestionOption, SessionConfig, SubmitOutcome,
};
use talentflow::config::AssessmentConfig;
use talentflow::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Letter the demo candidate picks for the first question (A reveals a follow-up).
    #[arg(long, default_value = "A")]
    pub(crate) choice: String,
    /// Persist the demo assessment and response as JSON files under this directory.
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { choice, data_dir } = args;

    let store = Arc::new(ConfiguredStore::from_config(&AssessmentConfig {
        data_dir,
        ..AssessmentConfig::default()
    }));
    println!("TalentFlow assessment demo (storage: {})", store.describe());

    let service = AssessmentService::new(store.clone());
    let Some(quiz) = build_quiz(&service).await? else {
        println!("  Quiz could not be assembled");
        return Ok(());
    };
    render_schema(&quiz);

    let candidate = CandidateIdentity::new("Demo Candidate", "candidate@example.com");
    let mut session =
        AssessmentSession::start(store, &quiz.id, Some(candidate), SessionConfig::default())
            .await?;
    println!("\nCandidate session ({})", session.state());

    let Some(first) = session.visible_questions().first().map(|q| q.id.clone()) else {
        println!("  Nothing to answer");
        return Ok(());
    };
    if let Some(progress) = session.set_answer(&first, AnswerValue::text(choice.clone()))? {
        println!(
            "- Answered {first} with {choice:?} -> {}/{} visible questions answered ({}%)",
            progress.answered, progress.total, progress.percent
        );
    }
    let visible: Vec<String> = session
        .visible_questions()
        .iter()
        .map(|question| question.title.clone())
        .collect();
    println!("- Visible now: {}", visible.join(" | "));

    match session.submit().await? {
        SubmitOutcome::Submitted(response) => {
            render_submission(&response.id.0, session.elapsed_display());
            return Ok(());
        }
        SubmitOutcome::Blocked(report) => {
            println!("- Submission blocked:");
            for (question_id, message) in report.messages() {
                println!("    - {question_id}: {message}");
            }
        }
    }

    let pending: Vec<_> = session.validate().errors.into_keys().collect();
    for question_id in pending {
        session.set_answer(&question_id, AnswerValue::text("It sorts first"))?;
        println!("- Answered {question_id}");
    }

    match session.submit().await? {
        SubmitOutcome::Submitted(response) => {
            render_submission(&response.id.0, session.elapsed_display());
            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("  Stored response:\n{}", json),
                Err(err) => println!("  Stored response unavailable: {}", err),
            }
        }
        SubmitOutcome::Blocked(report) => {
            println!("- Still blocked on {} question(s)", report.errors.len());
        }
    }

    Ok(())
}

async fn build_quiz(
    service: &AssessmentService<ConfiguredStore>,
) -> Result<Option<Assessment>, AppError> {
    let quiz = service
        .create(NewAssessment {
            title: "Letter preference quiz".to_string(),
            description: "Two questions, one of them conditional".to_string(),
            job_id: Some("demo-job".to_string()),
        })
        .await?;

    let Some(update) = service
        .add_section(
            &quiz.id,
            NewSection {
                title: "Preferences".to_string(),
                description: None,
            },
        )
        .await?
    else {
        return Ok(None);
    };
    let section_id = update.assessment.sections[0].id.clone();

    let letters = ["A", "B"]
        .iter()
        .zip(0u32..)
        .map(|(letter, order)| QuestionOption {
            id: OptionId::generate(),
            label: format!("Letter {letter}"),
            value: letter.to_string(),
            order,
        })
        .collect();
    let Some(update) = service
        .add_question(
            &quiz.id,
            section_id.clone(),
            NewQuestion::titled(
                "Which letter do you prefer?",
                QuestionKind::SingleChoice { options: letters },
            )
            .required(),
        )
        .await?
    else {
        return Ok(None);
    };
    let first = update.assessment.sections[0].questions[0].id.clone();

    let follow_up = NewQuestion::titled(
        "Why A?",
        QuestionKind::ShortText {
            max_length: Some(120),
        },
    )
    .required()
    .shown_if(ConditionalLogic::new(vec![Condition {
        question_id: first,
        operator: ConditionOperator::Equals,
        value: ConditionValue::from("A"),
    }]));
    if service
        .add_question(&quiz.id, section_id, follow_up)
        .await?
        .is_none()
    {
        return Ok(None);
    }

    Ok(service
        .publish(&quiz.id)
        .await?
        .map(|update| update.assessment))
}

fn render_schema(assessment: &Assessment) {
    println!(
        "\nAssessment {} \"{}\" ({} questions, published: {})",
        assessment.id.0,
        assessment.title,
        assessment.question_count(),
        assessment.is_published
    );
    for section in &assessment.sections {
        println!("- Section {}: {}", section.order + 1, section.title);
        for question in &section.questions {
            let visibility = if question.conditional_logic.is_some() {
                " (conditional)"
            } else {
                ""
            };
            let required = if question.required { " *" } else { "" };
            println!(
                "    {}. [{}] {}{}{}",
                question.order + 1,
                question.question_type().display_name(),
                question.title,
                required,
                visibility
            );
        }
    }
}

fn render_submission(response_id: &str, elapsed: String) {
    println!("- Submitted response {response_id} after {elapsed}");
}
