//! Answer normalisation and auto-grading.
//!
//! Scoring is per question and order independent: a single-choice answer
//! matching the question's answer key earns `AUTO_GRADE_POINTS`, everything
//! else starts at zero and waits for an instructor.

use std::collections::BTreeSet;

use crate::{
    config::AUTO_GRADE_POINTS,
    error::AppError,
    models::{
        attempt::{Answer, AnswerValue, RawAnswer},
        question::{AnswerType, Question},
    },
    utils::html::clean_html,
};

/// Turns a wire answer into the typed value for `question`.
///
/// Rejects shapes that do not fit the question type and choices that are not
/// among the question's options. Blank answers are accepted.
pub fn resolve_answer(question: &Question, raw: RawAnswer) -> Result<AnswerValue, AppError> {
    match (question.answer_type, raw) {
        (AnswerType::Text, RawAnswer::One(text)) => Ok(AnswerValue::Text(clean_html(&text))),
        (AnswerType::SingleChoice, RawAnswer::One(choice)) => {
            if !choice.is_empty() && !question.has_option(&choice) {
                return Err(AppError::Validation(format!(
                    "'{}' is not an option of question {}",
                    choice, question.id
                )));
            }
            Ok(AnswerValue::SingleChoice(choice))
        }
        (AnswerType::MultipleChoice, RawAnswer::Many(choices)) => {
            let mut picked = BTreeSet::new();
            for choice in choices {
                if !question.has_option(&choice) {
                    return Err(AppError::Validation(format!(
                        "'{}' is not an option of question {}",
                        choice, question.id
                    )));
                }
                picked.insert(choice);
            }
            Ok(AnswerValue::MultipleChoice(picked))
        }
        (expected, _) => Err(AppError::Validation(format!(
            "Answer to question {} does not match its type '{}'",
            question.id, expected
        ))),
    }
}

/// Auto-grade one answer.
pub fn auto_score(question: &Question, value: &AnswerValue) -> f64 {
    match (question.answer_key(), value) {
        (Some(key), AnswerValue::SingleChoice(choice)) if choice == key => AUTO_GRADE_POINTS,
        _ => 0.0,
    }
}

pub fn total_score(answers: &[Answer]) -> f64 {
    answers.iter().map(|a| a.score).sum()
}
