// src/handlers/attempts.rs

use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, GradeRequest, StartAttemptRequest, SubmitAttemptRequest},
        question::PublicTestDefinition,
        response::ApiResponse,
        user::CurrentUser,
    },
    services::AttemptService,
};

/// Starts (or resumes) the caller's attempt at a test.
///
/// Idempotent: a second call returns the stored attempt with its original
/// `startTime`, which the client uses to compute the remaining time.
pub async fn start_test(
    State(service): State<AttemptService>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<StartAttemptRequest>, JsonRejection>,
) -> Result<ApiResponse<Attempt>, AppError> {
    let Json(req) = payload?;
    let attempt = service.start_attempt(&user, req).await?;
    Ok(ApiResponse::ok(attempt, "Test started successfully"))
}

/// Submits the caller's answers. Auto-grades single-choice questions.
pub async fn submit_test(
    State(service): State<AttemptService>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<SubmitAttemptRequest>, JsonRejection>,
) -> Result<ApiResponse<Attempt>, AppError> {
    let Json(req) = payload?;
    let attempt = service.submit_attempt(&user, req).await?;
    Ok(ApiResponse::ok(attempt, "Test submitted successfully"))
}

pub async fn my_submissions(
    State(service): State<AttemptService>,
    Extension(user): Extension<CurrentUser>,
) -> Result<ApiResponse<Vec<Attempt>>, AppError> {
    let attempts = service.my_attempts(&user).await?;
    Ok(ApiResponse::ok(attempts, "Submissions retrieved successfully"))
}

pub async fn student_submission(
    State(service): State<AttemptService>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<ApiResponse<Attempt>, AppError> {
    let Path((test_id, student_id)) = path?;
    let attempt = service.student_attempt(&user, test_id, student_id).await?;
    Ok(ApiResponse::ok(attempt, "Submission retrieved successfully"))
}

/// Test definition for the test page. Answer keys are never included.
pub async fn test_definition(
    State(service): State<AttemptService>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<ApiResponse<PublicTestDefinition>, AppError> {
    let Path(test_id) = path?;
    let test = service.public_test(test_id).await?;
    Ok(ApiResponse::ok(test, "Test retrieved successfully"))
}

// Instructor-only routes below (guarded by `instructor_middleware`).

pub async fn test_submissions(
    State(service): State<AttemptService>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<ApiResponse<Vec<Attempt>>, AppError> {
    let Path(test_id) = path?;
    let attempts = service.test_submissions(&user, test_id).await?;
    Ok(ApiResponse::ok(attempts, "Submissions retrieved successfully"))
}

pub async fn grade_submission(
    State(service): State<AttemptService>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<GradeRequest>, JsonRejection>,
) -> Result<ApiResponse<Attempt>, AppError> {
    let Path(submission_id) = path?;
    let Json(req) = payload?;
    let attempt = service.grade_submission(&user, submission_id, req).await?;
    Ok(ApiResponse::ok(attempt, "Submission graded successfully"))
}
