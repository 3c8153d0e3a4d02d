//! Conditional visibility evaluation.
//!
//! Everything here is a pure function of the question, the answers collected so far, and
//! the questions of the assessment. The runtime re-runs it for every question on every
//! answer change, so nothing is cached between calls.

use super::domain::{Assessment, Condition, ConditionOperator, ConditionValue, Question};
use super::response::{AnswerSheet, AnswerValue};

/// Decide whether `question` is shown given the answers so far.
///
/// Conditions are AND-combined. A condition that targets the question itself, or a
/// question missing from `all_questions`, is ignored rather than evaluated.
pub fn should_show(
    question: &Question,
    answers: &AnswerSheet,
    all_questions: &[&Question],
) -> bool {
    let Some(logic) = &question.conditional_logic else {
        return true;
    };

    logic
        .show_if
        .iter()
        .filter(|condition| is_resolvable(question, condition, all_questions))
        .all(|condition| condition_holds(condition, answers.get(&condition.question_id)))
}

/// Questions of `assessment` that are visible for `answers`, in display order.
pub fn visible_questions<'a>(
    assessment: &'a Assessment,
    answers: &AnswerSheet,
) -> Vec<&'a Question> {
    let all: Vec<&Question> = assessment.questions().collect();
    all.iter()
        .copied()
        .filter(|question| should_show(question, answers, &all))
        .collect()
}

fn is_resolvable(
    question: &Question,
    condition: &Condition,
    all_questions: &[&Question],
) -> bool {
    condition.question_id != question.id
        && all_questions
            .iter()
            .any(|candidate| candidate.id == condition.question_id)
}

fn condition_holds(condition: &Condition, answer: Option<&AnswerValue>) -> bool {
    match condition.operator {
        ConditionOperator::Equals => equals(answer, &condition.value),
        ConditionOperator::NotEquals => !equals(answer, &condition.value),
        ConditionOperator::Contains => match (answer, &condition.value) {
            (Some(AnswerValue::Text(text)), ConditionValue::Text(needle)) => {
                text.to_lowercase().contains(&needle.to_lowercase())
            }
            (Some(AnswerValue::Text(text)), ConditionValue::Number(number)) => {
                text.to_lowercase().contains(&number.to_string())
            }
            _ => false,
        },
        ConditionOperator::GreaterThan => {
            compare(answer, &condition.value, |left, right| left > right)
        }
        ConditionOperator::LessThan => {
            compare(answer, &condition.value, |left, right| left < right)
        }
    }
}

/// Membership for collections, strict equality otherwise. Text never equals a number.
fn equals(answer: Option<&AnswerValue>, expected: &ConditionValue) -> bool {
    match (answer, expected) {
        (Some(AnswerValue::Options(values)), ConditionValue::Text(expected)) => {
            values.iter().any(|value| value == expected)
        }
        (Some(AnswerValue::Text(text)), ConditionValue::Text(expected)) => text == expected,
        (Some(AnswerValue::Number(number)), ConditionValue::Number(expected)) => {
            number == expected
        }
        _ => false,
    }
}

fn compare(
    answer: Option<&AnswerValue>,
    expected: &ConditionValue,
    op: fn(f64, f64) -> bool,
) -> bool {
    match (answer.and_then(coerce_answer), coerce_condition(expected)) {
        (Some(left), Some(right)) => op(left, right),
        _ => false,
    }
}

/// Numeric reading of an answer. Blank text and collections do not coerce.
pub(crate) fn coerce_answer(answer: &AnswerValue) -> Option<f64> {
    match answer {
        AnswerValue::Number(number) => Some(*number).filter(|n| n.is_finite()),
        AnswerValue::Text(text) => parse_number(text),
        AnswerValue::Options(_) | AnswerValue::Files(_) => None,
    }
}

fn coerce_condition(value: &ConditionValue) -> Option<f64> {
    match value {
        ConditionValue::Number(number) => Some(*number).filter(|n| n.is_finite()),
        ConditionValue::Text(text) => parse_number(text),
    }
}

pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}
