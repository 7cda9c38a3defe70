//! Attempt state machine: `started -> submitted -> graded`.
//!
//! Functions here mutate an in-memory `Attempt` only; persisting the result
//! (and enforcing the submit latch against concurrent writers) is the
//! repository's job.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    engine::grading::{auto_score, resolve_answer, total_score},
    error::AppError,
    models::{
        attempt::{Answer, Attempt, AttemptKey, AttemptStatus, ScoreItem, SubmittedAnswer},
        question::TestDefinition,
    },
};

/// A fresh attempt for `key`. The id is assigned by storage.
pub fn new_attempt(key: AttemptKey, now: DateTime<Utc>) -> Attempt {
    Attempt {
        id: 0,
        test_id: key.test_id,
        course_id: key.course_id,
        student_id: key.student_id,
        start_time: now,
        submit_time: None,
        answers: Vec::new(),
        total_score: 0.0,
        status: AttemptStatus::Started,
    }
}

/// Snapshot and score submitted answers against the test definition.
///
/// Partial answer sets are accepted. Unknown or repeated question ids are not.
pub fn build_answers(
    test: &TestDefinition,
    submitted: Vec<SubmittedAnswer>,
) -> Result<Vec<Answer>, AppError> {
    let mut seen = HashSet::with_capacity(submitted.len());
    let mut answers = Vec::with_capacity(submitted.len());

    for item in submitted {
        let question = test.question(item.question_id).ok_or_else(|| {
            AppError::Validation(format!(
                "Question {} is not part of test {}",
                item.question_id, test.id
            ))
        })?;

        if !seen.insert(item.question_id) {
            return Err(AppError::Validation(format!(
                "Question {} answered more than once",
                item.question_id
            )));
        }

        let value = resolve_answer(question, item.answer)?;
        let score = auto_score(question, &value);

        answers.push(Answer {
            id: Uuid::new_v4(),
            question_id: question.id,
            question_text: question.text.clone(),
            answer: value,
            score,
        });
    }

    Ok(answers)
}

/// `started -> submitted`.
///
/// A second submit is a `Conflict`: retries must not silently re-score a
/// finished attempt. Grade overrides go through [`grade`].
pub fn submit(attempt: &mut Attempt, answers: Vec<Answer>, now: DateTime<Utc>) -> Result<(), AppError> {
    if attempt.status != AttemptStatus::Started {
        return Err(AppError::Conflict(format!(
            "Attempt {} is already {}",
            attempt.id, attempt.status
        )));
    }

    attempt.total_score = total_score(&answers);
    attempt.answers = answers;
    attempt.submit_time = Some(now);
    attempt.status = AttemptStatus::Submitted;
    Ok(())
}

/// `submitted | graded -> graded`, overwriting the named answers' scores.
///
/// Every answer id is checked before anything changes.
pub fn grade(attempt: &mut Attempt, scores: &[ScoreItem]) -> Result<(), AppError> {
    if attempt.status == AttemptStatus::Started {
        return Err(AppError::Conflict(format!(
            "Attempt {} has not been submitted yet",
            attempt.id
        )));
    }

    if let Some(missing) = scores.iter().find(|s| attempt.answer(s.answer_id).is_none()) {
        return Err(AppError::NotFound(format!(
            "Answer {} not found in submission {}",
            missing.answer_id, attempt.id
        )));
    }

    for item in scores {
        if let Some(answer) = attempt.answers.iter_mut().find(|a| a.id == item.answer_id) {
            answer.score = item.score;
        }
    }

    attempt.total_score = total_score(&attempt.answers);
    attempt.status = AttemptStatus::Graded;
    Ok(())
}
