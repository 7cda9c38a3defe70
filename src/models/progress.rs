// src/models/progress.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Viewed flag for one lecture or test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureProgress {
    pub lecture_id: i64,
    pub viewed: bool,
}

/// Represents the 'course_progress' table in the database.
/// One record per student and course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub student_id: i64,
    pub course_id: i64,
    /// Derived from `lecture_progress`; see `engine::progress`.
    pub completed: bool,
    pub lecture_progress: Vec<LectureProgress>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CourseProgress {
    pub fn empty(student_id: i64, course_id: i64) -> Self {
        Self {
            student_id,
            course_id,
            completed: false,
            lecture_progress: Vec::new(),
            updated_at: None,
        }
    }

    pub fn is_viewed(&self, lecture_id: i64) -> bool {
        self.lecture_progress
            .iter()
            .any(|p| p.lecture_id == lecture_id && p.viewed)
    }
}

/// DTO returned by `GET /api/progress/{courseId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressView {
    pub course_id: i64,
    pub completed: bool,
    pub total_units: usize,
    pub progress: Vec<LectureProgress>,
}
