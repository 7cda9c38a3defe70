//! Storage contracts for the engine.
//!
//! Services only talk to these traits. `memory` backs tests and local
//! development, `postgres` backs the server.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    attempt::{Attempt, AttemptKey},
    cheating::CheatingReport,
    progress::CourseProgress,
    question::{CourseOutline, TestDefinition},
};

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::Serialization(err.to_string())
            }
            other => StorageError::Connection(other.to_string()),
        }
    }
}

/// Read-only view of the authoring collaborator's catalog.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Fetch a test (a lecture flagged as test) with its questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the unit is missing or is not a test.
    async fn test_definition(&self, test_id: i64) -> Result<TestDefinition, StorageError>;

    /// Fetch the course owner and its current list of units.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course is missing.
    async fn course_outline(&self, course_id: i64) -> Result<CourseOutline, StorageError>;
}

/// Repository contract for test attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Insert `attempt` unless one already exists for its key; return the stored record.
    async fn start_attempt(&self, attempt: &Attempt) -> Result<Attempt, StorageError>;

    async fn find_attempt(&self, key: AttemptKey) -> Result<Option<Attempt>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no attempt has this id.
    async fn get_attempt(&self, id: i64) -> Result<Attempt, StorageError>;

    /// Persist a submission. This is the single-use latch: it only succeeds
    /// while the stored attempt is still `started`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the attempt already left `started`.
    async fn save_submission(&self, attempt: &Attempt) -> Result<(), StorageError>;

    /// Persist new scores on a submitted or graded attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the stored attempt is still `started`.
    async fn save_grade(&self, attempt: &Attempt) -> Result<(), StorageError>;

    async fn list_for_test(&self, test_id: i64) -> Result<Vec<Attempt>, StorageError>;

    /// Newest submission first; unsubmitted attempts last.
    async fn list_for_student(&self, student_id: i64) -> Result<Vec<Attempt>, StorageError>;
}

/// Repository contract for course progress records.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn load_progress(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> Result<Option<CourseProgress>, StorageError>;

    /// Read, change and write one record as a single step, so concurrent
    /// updates to the same (student, course) never overwrite each other.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record is missing and
    /// `create_if_missing` is false.
    async fn update_progress(
        &self,
        student_id: i64,
        course_id: i64,
        create_if_missing: bool,
        update: &(dyn for<'p> Fn(&'p mut CourseProgress) + Send + Sync),
    ) -> Result<CourseProgress, StorageError>;
}

#[async_trait]
pub trait CheatingReportRepository: Send + Sync {
    async fn insert_report(
        &self,
        student_email: &str,
        test_id: i64,
        warnings: i32,
        at: DateTime<Utc>,
    ) -> Result<CheatingReport, StorageError>;

    /// Newest first.
    async fn list_reports(&self) -> Result<Vec<CheatingReport>, StorageError>;
}

/// Bundle of storage handles shared by services.
#[derive(Clone)]
pub struct Repositories {
    pub catalog: Arc<dyn CourseCatalog>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub reports: Arc<dyn CheatingReportRepository>,
}

impl Repositories {
    pub fn in_memory(repo: InMemoryRepository) -> Self {
        Self {
            catalog: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            reports: Arc::new(repo),
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let repo = PgRepository::new(pool);
        Self {
            catalog: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            reports: Arc::new(repo),
        }
    }
}
