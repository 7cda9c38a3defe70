// src/models/attempt.rs

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::AnswerType;

/// Lifecycle of a test attempt. Absence of a record is the implicit `NONE` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Started,
    Submitted,
    Graded,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Started => "started",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Graded => "graded",
        }
    }

    /// True once the attempt has left `started`; such attempts only open in review mode.
    pub fn is_finished(&self) -> bool {
        !matches!(self, AttemptStatus::Started)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(AttemptStatus::Started),
            "submitted" => Ok(AttemptStatus::Submitted),
            "graded" => Ok(AttemptStatus::Graded),
            other => Err(format!("unknown attempt status '{}'", other)),
        }
    }
}

/// A student's answer, tagged by the answer type of the question it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AnswerValue {
    Text(String),
    SingleChoice(String),
    MultipleChoice(BTreeSet<String>),
}

impl AnswerValue {
    /// The "no answer" value for a question type.
    pub fn blank(answer_type: AnswerType) -> Self {
        match answer_type {
            AnswerType::Text => AnswerValue::Text(String::new()),
            AnswerType::SingleChoice => AnswerValue::SingleChoice(String::new()),
            AnswerType::MultipleChoice => AnswerValue::MultipleChoice(BTreeSet::new()),
        }
    }

    pub fn answer_type(&self) -> AnswerType {
        match self {
            AnswerValue::Text(_) => AnswerType::Text,
            AnswerValue::SingleChoice(_) => AnswerType::SingleChoice,
            AnswerValue::MultipleChoice(_) => AnswerType::MultipleChoice,
        }
    }

    /// Empty string or empty selection.
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Text(s) | AnswerValue::SingleChoice(s) => s.trim().is_empty(),
            AnswerValue::MultipleChoice(set) => set.is_empty(),
        }
    }
}

/// One answered question inside an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: Uuid,
    pub question_id: i64,
    /// Question text at the time of submission.
    pub question_text: String,
    pub answer: AnswerValue,
    pub score: f64,
}

/// Natural key of an attempt: one per student, test and course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptKey {
    pub student_id: i64,
    pub test_id: i64,
    pub course_id: i64,
}

/// Represents the 'test_attempts' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    pub test_id: i64,
    pub course_id: i64,
    pub student_id: i64,
    pub start_time: DateTime<Utc>,
    pub submit_time: Option<DateTime<Utc>>,
    pub answers: Vec<Answer>,
    pub total_score: f64,
    pub status: AttemptStatus,
}

impl Attempt {
    pub fn key(&self) -> AttemptKey {
        AttemptKey {
            student_id: self.student_id,
            test_id: self.test_id,
            course_id: self.course_id,
        }
    }

    /// When the time budget runs out, measured from the original start.
    pub fn deadline(&self, duration_secs: u64) -> DateTime<Utc> {
        let secs = i64::try_from(duration_secs).unwrap_or(i64::MAX / 1_000);
        self.start_time + Duration::seconds(secs)
    }

    /// Seconds left at `now`. Resuming never restores time already spent.
    pub fn remaining_secs(&self, duration_secs: u64, now: DateTime<Utc>) -> u64 {
        let left = (self.deadline(duration_secs) - now).num_seconds();
        u64::try_from(left).unwrap_or(0)
    }

    pub fn answer(&self, id: Uuid) -> Option<&Answer> {
        self.answers.iter().find(|a| a.id == id)
    }
}

/// DTO for starting (or resuming) an attempt.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptRequest {
    #[validate(range(min = 1, message = "courseId is required"))]
    pub course_id: i64,
    #[validate(range(min = 1, message = "testId is required"))]
    pub test_id: i64,
}

/// Answer payload as it arrives on the wire: one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAnswer {
    One(String),
    Many(Vec<String>),
}

impl From<AnswerValue> for RawAnswer {
    fn from(value: AnswerValue) -> Self {
        match value {
            AnswerValue::Text(s) | AnswerValue::SingleChoice(s) => RawAnswer::One(s),
            AnswerValue::MultipleChoice(set) => RawAnswer::Many(set.into_iter().collect()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: RawAnswer,
}

/// DTO for submitting an attempt.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptRequest {
    #[validate(range(min = 1, message = "testId is required"))]
    pub test_id: i64,
    #[validate(range(min = 1, message = "courseId is required"))]
    pub course_id: i64,
    #[validate(length(max = 500, message = "Too many answers"))]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreItem {
    pub answer_id: Uuid,
    pub score: f64,
}

/// DTO for an instructor (re-)grading a submission.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GradeRequest {
    #[validate(length(min = 1, message = "At least one score is required"), custom(function = validate_scores))]
    pub scores: Vec<ScoreItem>,
}

fn validate_scores(scores: &[ScoreItem]) -> Result<(), validator::ValidationError> {
    for item in scores {
        if !item.score.is_finite() || item.score < 0.0 {
            return Err(validator::ValidationError::new("score_must_be_non_negative"));
        }
    }
    Ok(())
}
