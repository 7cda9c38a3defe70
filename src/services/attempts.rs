use validator::Validate;

use crate::{
    engine::attempt as machine,
    error::AppError,
    models::{
        attempt::{Attempt, AttemptKey, GradeRequest, StartAttemptRequest, SubmitAttemptRequest},
        question::{CourseOutline, PublicTestDefinition, TestDefinition},
        user::CurrentUser,
    },
    repository::{Repositories, StorageError},
    services::progress::ProgressService,
    utils::clock::Clock,
};

/// Attempt lifecycle: start, submit, read, grade.
#[derive(Clone)]
pub struct AttemptService {
    repos: Repositories,
    progress: ProgressService,
    clock: Clock,
}

fn not_found(what: &'static str) -> impl Fn(StorageError) -> AppError {
    move |e| match e {
        StorageError::NotFound => AppError::NotFound(format!("{} not found", what)),
        other => other.into(),
    }
}

impl AttemptService {
    pub fn new(repos: Repositories, progress: ProgressService, clock: Clock) -> Self {
        Self {
            repos,
            progress,
            clock,
        }
    }

    async fn test(&self, test_id: i64) -> Result<TestDefinition, AppError> {
        self.repos
            .catalog
            .test_definition(test_id)
            .await
            .map_err(not_found("Test"))
    }

    async fn outline(&self, course_id: i64) -> Result<CourseOutline, AppError> {
        self.repos
            .catalog
            .course_outline(course_id)
            .await
            .map_err(not_found("Course"))
    }

    /// Loads the test and checks it belongs to the course.
    async fn test_in_course(&self, test_id: i64, course_id: i64) -> Result<TestDefinition, AppError> {
        let test = self.test(test_id).await?;
        let outline = self.outline(course_id).await?;
        if !outline.contains(test.id) {
            return Err(AppError::NotFound(format!(
                "Test {} not found in course {}",
                test_id, course_id
            )));
        }
        Ok(test)
    }

    /// Test as shown to students, without answer keys.
    pub async fn public_test(&self, test_id: i64) -> Result<PublicTestDefinition, AppError> {
        Ok(self.test(test_id).await?.into())
    }

    /// Start an attempt, or return the existing one untouched.
    ///
    /// Starting twice never resets `start_time`, so re-entering a test
    /// resumes the original clock (or opens review once submitted).
    pub async fn start_attempt(
        &self,
        user: &CurrentUser,
        req: StartAttemptRequest,
    ) -> Result<Attempt, AppError> {
        req.validate()?;
        self.test_in_course(req.test_id, req.course_id).await?;

        let key = AttemptKey {
            student_id: user.id,
            test_id: req.test_id,
            course_id: req.course_id,
        };
        let attempt = self
            .repos
            .attempts
            .start_attempt(&machine::new_attempt(key, self.clock.now()))
            .await?;

        tracing::info!(
            attempt_id = attempt.id,
            student_id = user.id,
            test_id = req.test_id,
            status = %attempt.status,
            "Attempt opened"
        );
        Ok(attempt)
    }

    /// Submit answers: `started -> submitted`, then mark the test viewed.
    ///
    /// A missing attempt is created on the fly. A finished attempt is a
    /// `Conflict`, whichever trigger (button, timer, monitor) asked.
    pub async fn submit_attempt(
        &self,
        user: &CurrentUser,
        req: SubmitAttemptRequest,
    ) -> Result<Attempt, AppError> {
        req.validate()?;
        let test = self.test_in_course(req.test_id, req.course_id).await?;
        let now = self.clock.now();

        let key = AttemptKey {
            student_id: user.id,
            test_id: req.test_id,
            course_id: req.course_id,
        };
        let mut attempt = match self.repos.attempts.find_attempt(key).await? {
            Some(existing) => existing,
            None => {
                tracing::info!(student_id = user.id, test_id = req.test_id, "Submitting without a prior start");
                self.repos
                    .attempts
                    .start_attempt(&machine::new_attempt(key, now))
                    .await?
            }
        };

        let answers = machine::build_answers(&test, req.answers)?;
        machine::submit(&mut attempt, answers, now)?;
        self.repos.attempts.save_submission(&attempt).await?;

        tracing::info!(
            attempt_id = attempt.id,
            student_id = user.id,
            test_id = test.id,
            total_score = attempt.total_score,
            answers = attempt.answers.len(),
            "Attempt submitted"
        );

        // The submission is already durable; a progress failure must not undo it.
        if let Err(e) = self
            .progress
            .mark_viewed(user.id, req.course_id, test.id)
            .await
        {
            tracing::error!(
                attempt_id = attempt.id,
                "Failed to update course progress after submission: {}",
                e
            );
        }

        Ok(attempt)
    }

    /// A student's attempt at a test. Visible to that student and to instructors.
    pub async fn student_attempt(
        &self,
        user: &CurrentUser,
        test_id: i64,
        student_id: i64,
    ) -> Result<Attempt, AppError> {
        if user.id != student_id && !user.is_instructor() {
            return Err(AppError::Forbidden(
                "You don't have permission to access this submission".to_string(),
            ));
        }

        let test = self.test(test_id).await?;
        let key = AttemptKey {
            student_id,
            test_id,
            course_id: test.course_id,
        };
        self.repos
            .attempts
            .find_attempt(key)
            .await?
            .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))
    }

    pub async fn my_attempts(&self, user: &CurrentUser) -> Result<Vec<Attempt>, AppError> {
        Ok(self.repos.attempts.list_for_student(user.id).await?)
    }

    /// All attempts at a test, for the instructor who owns its course.
    pub async fn test_submissions(
        &self,
        user: &CurrentUser,
        test_id: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        let test = self.test(test_id).await?;
        let outline = self.outline(test.course_id).await?;
        if outline.creator_id != user.id {
            return Err(AppError::Forbidden(
                "You don't have permission to access these submissions".to_string(),
            ));
        }
        Ok(self.repos.attempts.list_for_test(test_id).await?)
    }

    /// Instructor (re-)grade. Order of checks: submission, ownership, answer ids.
    pub async fn grade_submission(
        &self,
        user: &CurrentUser,
        submission_id: i64,
        req: GradeRequest,
    ) -> Result<Attempt, AppError> {
        req.validate()?;

        let mut attempt = self
            .repos
            .attempts
            .get_attempt(submission_id)
            .await
            .map_err(not_found("Submission"))?;

        let outline = self.outline(attempt.course_id).await?;
        if outline.creator_id != user.id {
            return Err(AppError::Forbidden(
                "You don't have permission to grade this submission".to_string(),
            ));
        }

        machine::grade(&mut attempt, &req.scores)?;
        self.repos.attempts.save_grade(&attempt).await?;

        tracing::info!(
            attempt_id = attempt.id,
            grader_id = user.id,
            total_score = attempt.total_score,
            "Attempt graded"
        );
        Ok(attempt)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        models::{
            attempt::{AttemptStatus, RawAnswer, SubmittedAnswer},
            question::{AnswerType, Question},
            user::Role,
        },
        repository::{AttemptRepository, InMemoryRepository},
        utils::clock::fixed_clock,
    };

    /// Pauses after every lookup so two submits both see the attempt as `started`.
    struct SlowLookups {
        inner: InMemoryRepository,
    }

    #[async_trait]
    impl AttemptRepository for SlowLookups {
        async fn start_attempt(&self, attempt: &Attempt) -> Result<Attempt, StorageError> {
            self.inner.start_attempt(attempt).await
        }

        async fn find_attempt(&self, key: AttemptKey) -> Result<Option<Attempt>, StorageError> {
            let found = self.inner.find_attempt(key).await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            found
        }

        async fn get_attempt(&self, id: i64) -> Result<Attempt, StorageError> {
            self.inner.get_attempt(id).await
        }

        async fn save_submission(&self, attempt: &Attempt) -> Result<(), StorageError> {
            self.inner.save_submission(attempt).await
        }

        async fn save_grade(&self, attempt: &Attempt) -> Result<(), StorageError> {
            self.inner.save_grade(attempt).await
        }

        async fn list_for_test(&self, test_id: i64) -> Result<Vec<Attempt>, StorageError> {
            self.inner.list_for_test(test_id).await
        }

        async fn list_for_student(&self, student_id: i64) -> Result<Vec<Attempt>, StorageError> {
            self.inner.list_for_student(student_id).await
        }
    }

    fn student() -> CurrentUser {
        CurrentUser {
            id: 7,
            email: "student@example.com".to_string(),
            role: Role::Student,
        }
    }

    fn setup() -> (InMemoryRepository, AttemptService) {
        let repo = InMemoryRepository::new();
        repo.add_course(1, 50, &[11]);
        repo.add_test(TestDefinition {
            id: 10,
            course_id: 1,
            title: "Quiz".to_string(),
            duration_minutes: 5,
            instructions: None,
            questions: vec![Question {
                id: 100,
                text: "2 + 2 = ?".to_string(),
                answer_type: AnswerType::SingleChoice,
                options: vec!["3".to_string(), "4".to_string()],
                correct_answer: Some("4".to_string()),
            }],
        });

        let mut repos = Repositories::in_memory(repo.clone());
        repos.attempts = Arc::new(SlowLookups {
            inner: repo.clone(),
        });
        let service = AttemptService::new(
            repos.clone(),
            ProgressService::new(repos),
            fixed_clock(),
        );
        (repo, service)
    }

    fn submission(choice: &str) -> SubmitAttemptRequest {
        SubmitAttemptRequest {
            test_id: 10,
            course_id: 1,
            answers: vec![SubmittedAnswer {
                question_id: 100,
                answer: RawAnswer::One(choice.to_string()),
            }],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_racing_submits_are_latched_by_storage() {
        let (repo, service) = setup();
        let user = student();
        let started = service
            .start_attempt(&user, StartAttemptRequest { course_id: 1, test_id: 10 })
            .await
            .unwrap();

        let (right, wrong) = tokio::join!(
            service.submit_attempt(&user, submission("4")),
            service.submit_attempt(&user, submission("3")),
        );

        let (winner, loser) = match (right, wrong) {
            (Ok(w), Err(e)) | (Err(e), Ok(w)) => (w, e),
            (a, b) => panic!("expected one success and one conflict, got {:?} / {:?}", a, b),
        };
        assert!(matches!(loser, AppError::Conflict(_)));

        let stored = repo.get_attempt(started.id).await.unwrap();
        assert_eq!(stored.status, AttemptStatus::Submitted);
        assert_eq!(stored.total_score, winner.total_score);
        assert_eq!(stored.answers, winner.answers);
    }
}
