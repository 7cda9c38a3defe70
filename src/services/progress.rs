use crate::{
    engine::progress::{self, ProgressTransition},
    error::AppError,
    models::{
        progress::{CourseProgress, CourseProgressView},
        question::CourseOutline,
    },
    repository::{Repositories, StorageError},
};

/// Progress aggregator: apply a transition and re-derive, atomically per record.
#[derive(Clone)]
pub struct ProgressService {
    repos: Repositories,
}

impl ProgressService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    async fn outline(&self, course_id: i64) -> Result<CourseOutline, AppError> {
        self.repos
            .catalog
            .course_outline(course_id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => AppError::NotFound("Course not found".to_string()),
                other => other.into(),
            })
    }

    /// Current progress for a student. `completed` is derived against the
    /// course as it is now, so lectures added later reopen the course.
    pub async fn course_progress(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> Result<CourseProgressView, AppError> {
        let outline = self.outline(course_id).await?;
        let record = self
            .repos
            .progress
            .load_progress(student_id, course_id)
            .await?
            .unwrap_or_else(|| CourseProgress::empty(student_id, course_id));

        Ok(CourseProgressView {
            course_id,
            completed: progress::is_complete(&record, &outline),
            total_units: outline.unit_ids.len(),
            progress: record.lecture_progress,
        })
    }

    /// Mark one lecture or test as viewed, creating the record if needed.
    pub async fn mark_viewed(
        &self,
        student_id: i64,
        course_id: i64,
        unit_id: i64,
    ) -> Result<CourseProgress, AppError> {
        self.transition(student_id, course_id, ProgressTransition::Viewed(unit_id), true)
            .await
    }

    /// Manual override: un-tick one unit. Requires an existing record.
    pub async fn mark_unviewed(
        &self,
        student_id: i64,
        course_id: i64,
        unit_id: i64,
    ) -> Result<CourseProgress, AppError> {
        self.transition(student_id, course_id, ProgressTransition::Unviewed(unit_id), false)
            .await
    }

    /// Manual override: tick every unit of the course.
    pub async fn mark_course_completed(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> Result<CourseProgress, AppError> {
        self.transition(student_id, course_id, ProgressTransition::CourseCompleted, true)
            .await
    }

    /// Manual override: clear every unit. Requires an existing record.
    pub async fn mark_course_incomplete(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> Result<CourseProgress, AppError> {
        self.transition(student_id, course_id, ProgressTransition::CourseReset, false)
            .await
    }

    async fn transition(
        &self,
        student_id: i64,
        course_id: i64,
        transition: ProgressTransition,
        create_if_missing: bool,
    ) -> Result<CourseProgress, AppError> {
        // Always fetch the outline fresh: the author may have changed the course.
        let outline = self.outline(course_id).await?;

        if let ProgressTransition::Viewed(id) | ProgressTransition::Unviewed(id) = transition {
            if !outline.contains(id) {
                return Err(AppError::NotFound(format!(
                    "Lecture {} not found in course {}",
                    id, course_id
                )));
            }
        }

        let apply = |record: &mut CourseProgress| progress::apply(record, transition, &outline);
        let saved = self
            .repos
            .progress
            .update_progress(student_id, course_id, create_if_missing, &apply)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => {
                    AppError::NotFound("Course progress not found".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(
            student_id,
            course_id,
            %transition,
            completed = saved.completed,
            "Course progress updated"
        );

        Ok(saved)
    }
}
