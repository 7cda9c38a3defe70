use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use super::{
    AttemptRepository, CheatingReportRepository, CourseCatalog, ProgressRepository, StorageError,
};
use crate::models::{
    attempt::{Answer, Attempt, AttemptKey, AttemptStatus},
    cheating::CheatingReport,
    progress::{CourseProgress, LectureProgress},
    question::{CourseOutline, Question, TestDefinition},
};

const ATTEMPT_COLUMNS: &str = "id, test_id, course_id, student_id, start_time, submit_time, \
     answers, total_score, status";

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Helper struct for reading the 'lectures' table.
#[derive(FromRow)]
struct LectureRow {
    id: i64,
    course_id: i64,
    title: String,
    is_test: bool,
    duration_minutes: Option<i32>,
    instructions: Option<String>,
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    text: String,
    answer_type: String,
    options: Json<Vec<String>>,
    correct_answer: Option<String>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StorageError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            text: row.text,
            answer_type: row.answer_type.parse().map_err(StorageError::Serialization)?,
            options: row.options.0,
            correct_answer: row.correct_answer,
        })
    }
}

#[derive(FromRow)]
struct CourseRow {
    id: i64,
    creator_id: i64,
}

#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    test_id: i64,
    course_id: i64,
    student_id: i64,
    start_time: DateTime<Utc>,
    submit_time: Option<DateTime<Utc>>,
    answers: Json<Vec<Answer>>,
    total_score: f64,
    status: String,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = StorageError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(Attempt {
            id: row.id,
            test_id: row.test_id,
            course_id: row.course_id,
            student_id: row.student_id,
            start_time: row.start_time,
            submit_time: row.submit_time,
            answers: row.answers.0,
            total_score: row.total_score,
            status: row.status.parse().map_err(StorageError::Serialization)?,
        })
    }
}

#[derive(FromRow)]
struct ProgressRow {
    student_id: i64,
    course_id: i64,
    completed: bool,
    lecture_progress: Json<Vec<LectureProgress>>,
    updated_at: DateTime<Utc>,
}

impl From<ProgressRow> for CourseProgress {
    fn from(row: ProgressRow) -> Self {
        CourseProgress {
            student_id: row.student_id,
            course_id: row.course_id,
            completed: row.completed,
            lecture_progress: row.lecture_progress.0,
            updated_at: Some(row.updated_at),
        }
    }
}

fn into_attempts(rows: Vec<AttemptRow>) -> Result<Vec<Attempt>, StorageError> {
    rows.into_iter().map(Attempt::try_from).collect()
}

#[async_trait]
impl CourseCatalog for PgRepository {
    async fn test_definition(&self, test_id: i64) -> Result<TestDefinition, StorageError> {
        let lecture = sqlx::query_as::<_, LectureRow>(
            r#"
            SELECT id, course_id, title, is_test, duration_minutes, instructions
            FROM lectures
            WHERE id = $1
            "#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?
        .filter(|l| l.is_test)
        .ok_or(StorageError::NotFound)?;

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, text, answer_type, options, correct_answer
            FROM questions
            WHERE lecture_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Question::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(TestDefinition {
            id: lecture.id,
            course_id: lecture.course_id,
            title: lecture.title,
            duration_minutes: lecture
                .duration_minutes
                .and_then(|m| u32::try_from(m).ok())
                .unwrap_or(0),
            instructions: lecture.instructions,
            questions,
        })
    }

    async fn course_outline(&self, course_id: i64) -> Result<CourseOutline, StorageError> {
        let course = sqlx::query_as::<_, CourseRow>("SELECT id, creator_id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound)?;

        let unit_ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM lectures WHERE course_id = $1 ORDER BY position, id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(CourseOutline {
            id: course.id,
            creator_id: course.creator_id,
            unit_ids,
        })
    }
}

#[async_trait]
impl AttemptRepository for PgRepository {
    async fn start_attempt(&self, attempt: &Attempt) -> Result<Attempt, StorageError> {
        // Insert-if-absent keeps concurrent starts from creating duplicates.
        sqlx::query(
            r#"
            INSERT INTO test_attempts (test_id, course_id, student_id, start_time, status)
            VALUES ($1, $2, $3, $4, 'started')
            ON CONFLICT (student_id, test_id, course_id) DO NOTHING
            "#,
        )
        .bind(attempt.test_id)
        .bind(attempt.course_id)
        .bind(attempt.student_id)
        .bind(attempt.start_time)
        .execute(&self.pool)
        .await?;

        self.find_attempt(attempt.key())
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn find_attempt(&self, key: AttemptKey) -> Result<Option<Attempt>, StorageError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM test_attempts WHERE student_id = $1 AND test_id = $2 AND course_id = $3",
            ATTEMPT_COLUMNS
        ))
        .bind(key.student_id)
        .bind(key.test_id)
        .bind(key.course_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn get_attempt(&self, id: i64) -> Result<Attempt, StorageError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM test_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Attempt::try_from(row)
    }

    async fn save_submission(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE test_attempts
            SET answers = $2, total_score = $3, submit_time = $4,
                status = 'submitted', updated_at = NOW()
            WHERE id = $1 AND status = 'started'
            "#,
        )
        .bind(attempt.id)
        .bind(Json(attempt.answers.clone()))
        .bind(attempt.total_score)
        .bind(attempt.submit_time)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_attempt(attempt.id).await?;
            return Err(StorageError::Conflict(format!(
                "attempt {} is already {}",
                attempt.id, current.status
            )));
        }
        Ok(())
    }

    async fn save_grade(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE test_attempts
            SET answers = $2, total_score = $3, status = 'graded', updated_at = NOW()
            WHERE id = $1 AND status IN ('submitted', 'graded')
            "#,
        )
        .bind(attempt.id)
        .bind(Json(attempt.answers.clone()))
        .bind(attempt.total_score)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_attempt(attempt.id).await?;
            if current.status == AttemptStatus::Started {
                return Err(StorageError::Conflict(format!(
                    "attempt {} has not been submitted",
                    attempt.id
                )));
            }
        }
        Ok(())
    }

    async fn list_for_test(&self, test_id: i64) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM test_attempts WHERE test_id = $1 ORDER BY id",
            ATTEMPT_COLUMNS
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        into_attempts(rows)
    }

    async fn list_for_student(&self, student_id: i64) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM test_attempts WHERE student_id = $1 \
             ORDER BY submit_time DESC NULLS LAST, id DESC",
            ATTEMPT_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        into_attempts(rows)
    }
}

#[async_trait]
impl ProgressRepository for PgRepository {
    async fn load_progress(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT student_id, course_id, completed, lecture_progress, updated_at
            FROM course_progress
            WHERE student_id = $1 AND course_id = $2
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CourseProgress::from))
    }

    async fn update_progress(
        &self,
        student_id: i64,
        course_id: i64,
        create_if_missing: bool,
        update: &(dyn for<'p> Fn(&'p mut CourseProgress) + Send + Sync),
    ) -> Result<CourseProgress, StorageError> {
        let mut tx = self.pool.begin().await?;

        if create_if_missing {
            sqlx::query(
                r#"
                INSERT INTO course_progress (student_id, course_id)
                VALUES ($1, $2)
                ON CONFLICT (student_id, course_id) DO NOTHING
                "#,
            )
            .bind(student_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
        }

        // Row lock: a concurrent update for the same key waits here until we commit.
        let mut progress = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT student_id, course_id, completed, lecture_progress, updated_at
            FROM course_progress
            WHERE student_id = $1 AND course_id = $2
            FOR UPDATE
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(CourseProgress::from)
        .ok_or(StorageError::NotFound)?;

        update(&mut progress);

        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            UPDATE course_progress
            SET completed = $3, lecture_progress = $4, updated_at = NOW()
            WHERE student_id = $1 AND course_id = $2
            RETURNING student_id, course_id, completed, lecture_progress, updated_at
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .bind(progress.completed)
        .bind(Json(progress.lecture_progress))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CourseProgress::from(row))
    }
}

#[async_trait]
impl CheatingReportRepository for PgRepository {
    async fn insert_report(
        &self,
        student_email: &str,
        test_id: i64,
        warnings: i32,
        at: DateTime<Utc>,
    ) -> Result<CheatingReport, StorageError> {
        let report = sqlx::query_as::<_, CheatingReport>(
            r#"
            INSERT INTO cheating_attempts (student_email, test_id, warnings, reported_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, student_email, test_id, warnings, reported_at
            "#,
        )
        .bind(student_email)
        .bind(test_id)
        .bind(warnings)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(report)
    }

    async fn list_reports(&self) -> Result<Vec<CheatingReport>, StorageError> {
        let reports = sqlx::query_as::<_, CheatingReport>(
            r#"
            SELECT id, student_email, test_id, warnings, reported_at
            FROM cheating_attempts
            ORDER BY reported_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(reports)
    }
}
