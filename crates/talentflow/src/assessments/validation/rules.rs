use super::super::domain::{Question, QuestionKind};
use super::super::logic::coerce_answer;
use super::super::response::AnswerValue;
use super::ValidationError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Validate one answer against its question.
///
/// Blank answers to optional questions pass without type checks. The file-type
/// allow-list is advisory and never produces an error.
pub fn validate(question: &Question, value: Option<&AnswerValue>) -> Option<ValidationError> {
    let value = match value {
        Some(value) if !value.is_empty() => value,
        _ if question.required => return Some(ValidationError::Required),
        _ => return None,
    };

    match &question.kind {
        QuestionKind::SingleChoice { .. } | QuestionKind::MultiChoice { .. } => None,
        QuestionKind::ShortText { max_length } | QuestionKind::LongText { max_length } => {
            check_length(value, *max_length)
        }
        QuestionKind::NumericRange {
            min_value,
            max_value,
        } => check_range(value, *min_value, *max_value),
        QuestionKind::FileUpload {
            max_file_size_mb, ..
        } => check_file_sizes(value, *max_file_size_mb),
    }
}

fn check_length(value: &AnswerValue, max_length: Option<u32>) -> Option<ValidationError> {
    let max_length = max_length.filter(|max| *max > 0)?;
    let actual = value.to_display_string().chars().count();
    (actual > max_length as usize).then_some(ValidationError::TooLong { max_length, actual })
}

fn check_range(
    value: &AnswerValue,
    min_value: Option<f64>,
    max_value: Option<f64>,
) -> Option<ValidationError> {
    let Some(number) = coerce_answer(value) else {
        return Some(ValidationError::NotANumber);
    };

    if let Some(min) = min_value {
        if number < min {
            return Some(ValidationError::BelowMinimum { min });
        }
    }
    if let Some(max) = max_value {
        if number > max {
            return Some(ValidationError::AboveMaximum { max });
        }
    }
    None
}

fn check_file_sizes(value: &AnswerValue, max_file_size_mb: Option<f64>) -> Option<ValidationError> {
    let max_file_size_mb = max_file_size_mb.filter(|max| *max > 0.0)?;
    let AnswerValue::Files(files) = value else {
        return None;
    };

    let limit = max_file_size_mb * BYTES_PER_MB;
    files
        .iter()
        .find(|file| file.size_bytes as f64 > limit)
        .map(|file| ValidationError::FileTooLarge {
            file_name: file.name.clone(),
            max_file_size_mb,
        })
}
