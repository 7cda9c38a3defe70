use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    AttemptRepository, CheatingReportRepository, CourseCatalog, ProgressRepository, StorageError,
};
use crate::models::{
    attempt::{Attempt, AttemptKey, AttemptStatus},
    cheating::CheatingReport,
    progress::CourseProgress,
    question::{CourseOutline, TestDefinition},
};

#[derive(Default)]
struct State {
    courses: HashMap<i64, CourseOutline>,
    tests: HashMap<i64, TestDefinition>,
    attempts: BTreeMap<i64, Attempt>,
    attempt_ids: HashMap<AttemptKey, i64>,
    next_attempt_id: i64,
    progress: HashMap<(i64, i64), CourseProgress>,
    reports: Vec<CheatingReport>,
}

/// Simple in-memory repository implementation for testing and local runs.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Register a course owned by `creator_id` with the given lecture ids.
    pub fn add_course(&self, course_id: i64, creator_id: i64, lecture_ids: &[i64]) {
        if let Ok(mut state) = self.lock() {
            state.courses.insert(
                course_id,
                CourseOutline {
                    id: course_id,
                    creator_id,
                    unit_ids: lecture_ids.to_vec(),
                },
            );
        }
    }

    /// Register a test and append it to its course's units.
    pub fn add_test(&self, test: TestDefinition) {
        if let Ok(mut state) = self.lock() {
            if let Some(course) = state.courses.get_mut(&test.course_id) {
                if !course.contains(test.id) {
                    course.unit_ids.push(test.id);
                }
            }
            state.tests.insert(test.id, test);
        }
    }

    /// Remove a unit from a course, as the authoring side might.
    pub fn remove_unit(&self, course_id: i64, unit_id: i64) {
        if let Ok(mut state) = self.lock() {
            if let Some(course) = state.courses.get_mut(&course_id) {
                course.unit_ids.retain(|id| *id != unit_id);
            }
        }
    }
}

#[async_trait]
impl CourseCatalog for InMemoryRepository {
    async fn test_definition(&self, test_id: i64) -> Result<TestDefinition, StorageError> {
        let state = self.lock()?;
        state.tests.get(&test_id).cloned().ok_or(StorageError::NotFound)
    }

    async fn course_outline(&self, course_id: i64) -> Result<CourseOutline, StorageError> {
        let state = self.lock()?;
        state
            .courses
            .get(&course_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn start_attempt(&self, attempt: &Attempt) -> Result<Attempt, StorageError> {
        let mut state = self.lock()?;
        let key = attempt.key();

        if let Some(id) = state.attempt_ids.get(&key).copied() {
            return state.attempts.get(&id).cloned().ok_or(StorageError::NotFound);
        }

        state.next_attempt_id += 1;
        let id = state.next_attempt_id;
        let stored = Attempt {
            id,
            ..attempt.clone()
        };
        state.attempt_ids.insert(key, id);
        state.attempts.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_attempt(&self, key: AttemptKey) -> Result<Option<Attempt>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .attempt_ids
            .get(&key)
            .and_then(|id| state.attempts.get(id))
            .cloned())
    }

    async fn get_attempt(&self, id: i64) -> Result<Attempt, StorageError> {
        let state = self.lock()?;
        state.attempts.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn save_submission(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let stored = state
            .attempts
            .get_mut(&attempt.id)
            .ok_or(StorageError::NotFound)?;

        if stored.status != AttemptStatus::Started {
            return Err(StorageError::Conflict(format!(
                "attempt {} is already {}",
                attempt.id, stored.status
            )));
        }

        stored.answers = attempt.answers.clone();
        stored.total_score = attempt.total_score;
        stored.submit_time = attempt.submit_time;
        stored.status = AttemptStatus::Submitted;
        Ok(())
    }

    async fn save_grade(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let stored = state
            .attempts
            .get_mut(&attempt.id)
            .ok_or(StorageError::NotFound)?;

        if stored.status == AttemptStatus::Started {
            return Err(StorageError::Conflict(format!(
                "attempt {} has not been submitted",
                attempt.id
            )));
        }

        stored.answers = attempt.answers.clone();
        stored.total_score = attempt.total_score;
        stored.status = AttemptStatus::Graded;
        Ok(())
    }

    async fn list_for_test(&self, test_id: i64) -> Result<Vec<Attempt>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .attempts
            .values()
            .filter(|a| a.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn list_for_student(&self, student_id: i64) -> Result<Vec<Attempt>, StorageError> {
        let state = self.lock()?;
        let mut attempts: Vec<Attempt> = state
            .attempts
            .values()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        // `Some` sorts after `None`; reverse gives newest submissions first.
        attempts.sort_by(|a, b| (b.submit_time, b.id).cmp(&(a.submit_time, a.id)));
        Ok(attempts)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let state = self.lock()?;
        Ok(state.progress.get(&(student_id, course_id)).cloned())
    }

    async fn update_progress(
        &self,
        student_id: i64,
        course_id: i64,
        create_if_missing: bool,
        update: &(dyn for<'p> Fn(&'p mut CourseProgress) + Send + Sync),
    ) -> Result<CourseProgress, StorageError> {
        // The lock is held for the whole read-modify-write.
        let mut state = self.lock()?;
        let key = (student_id, course_id);
        if !state.progress.contains_key(&key) {
            if !create_if_missing {
                return Err(StorageError::NotFound);
            }
            state
                .progress
                .insert(key, CourseProgress::empty(student_id, course_id));
        }

        let record = state.progress.get_mut(&key).ok_or(StorageError::NotFound)?;
        update(record);
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }
}

#[async_trait]
impl CheatingReportRepository for InMemoryRepository {
    async fn insert_report(
        &self,
        student_email: &str,
        test_id: i64,
        warnings: i32,
        at: DateTime<Utc>,
    ) -> Result<CheatingReport, StorageError> {
        let mut state = self.lock()?;
        let report = CheatingReport {
            id: i64::try_from(state.reports.len()).unwrap_or(i64::MAX - 1) + 1,
            student_email: student_email.to_string(),
            test_id,
            warnings,
            timestamp: at,
        };
        state.reports.push(report.clone());
        Ok(report)
    }

    async fn list_reports(&self) -> Result<Vec<CheatingReport>, StorageError> {
        let state = self.lock()?;
        let mut reports = state.reports.clone();
        reports.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        Ok(reports)
    }
}
