// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// How a question expects to be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnswerType {
    Text,
    SingleChoice,
    MultipleChoice,
}

impl AnswerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::Text => "text",
            AnswerType::SingleChoice => "singleChoice",
            AnswerType::MultipleChoice => "multipleChoice",
        }
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(AnswerType::Text),
            "singleChoice" => Ok(AnswerType::SingleChoice),
            "multipleChoice" => Ok(AnswerType::MultipleChoice),
            other => Err(format!("unknown answer type '{}'", other)),
        }
    }
}

/// A question inside a test, as defined by the course author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,

    pub text: String,

    pub answer_type: AnswerType,

    /// Ordered option list. Empty for text questions.
    #[serde(default)]
    pub options: Vec<String>,

    /// Expected answer. Questions without one are left for manual grading.
    pub correct_answer: Option<String>,
}

impl Question {
    /// The answer key usable by the auto-grader.
    ///
    /// Only single-choice questions whose key is non-empty and names one of
    /// the options qualify; anything else is graded by hand.
    pub fn answer_key(&self) -> Option<&str> {
        if self.answer_type != AnswerType::SingleChoice {
            return None;
        }
        let key = self.correct_answer.as_deref()?;
        if key.is_empty() || !self.options.iter().any(|opt| opt == key) {
            return None;
        }
        Some(key)
    }

    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|opt| opt == value)
    }
}

/// A timed test: a course unit flagged `isTest` carrying questions.
///
/// Treated as immutable for the lifetime of any attempt against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub duration_minutes: u32,
    pub instructions: Option<String>,
    pub questions: Vec<Question>,
}

impl TestDefinition {
    pub fn question(&self, id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Full time budget of the test in seconds.
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}

/// DTO for sending a question to students (excludes the answer key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub answer_type: AnswerType,
    pub options: Vec<String>,
}

/// DTO for sending a test to students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTestDefinition {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub duration_minutes: u32,
    pub instructions: Option<String>,
    pub questions: Vec<PublicQuestion>,
}

impl PublicTestDefinition {
    pub fn question(&self, id: i64) -> Option<&PublicQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}

impl From<TestDefinition> for PublicTestDefinition {
    fn from(test: TestDefinition) -> Self {
        Self {
            id: test.id,
            course_id: test.course_id,
            title: test.title,
            duration_minutes: test.duration_minutes,
            instructions: test.instructions,
            questions: test
                .questions
                .into_iter()
                .map(|q| PublicQuestion {
                    id: q.id,
                    text: q.text,
                    answer_type: q.answer_type,
                    options: q.options,
                })
                .collect(),
        }
    }
}

/// Course shape as seen by this engine: who owns it and which units it has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOutline {
    pub id: i64,
    pub creator_id: i64,
    /// Every lecture and test in the course, in authoring order.
    pub unit_ids: Vec<i64>,
}

impl CourseOutline {
    pub fn contains(&self, unit_id: i64) -> bool {
        self.unit_ids.contains(&unit_id)
    }
}
