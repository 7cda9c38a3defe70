// src/handlers/progress.rs

use axum::{
    Extension,
    extract::{Path, State, rejection::PathRejection},
};

use crate::{
    error::AppError,
    models::{
        progress::{CourseProgress, CourseProgressView},
        response::ApiResponse,
        user::CurrentUser,
    },
    services::ProgressService,
};

pub async fn get_progress(
    State(service): State<ProgressService>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<ApiResponse<CourseProgressView>, AppError> {
    let Path(course_id) = path?;
    let view = service.course_progress(user.id, course_id).await?;
    Ok(ApiResponse::ok(view, "Progress retrieved successfully"))
}

pub async fn mark_lecture_viewed(
    State(service): State<ProgressService>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<ApiResponse<CourseProgress>, AppError> {
    let Path((course_id, lecture_id)) = path?;
    let progress = service.mark_viewed(user.id, course_id, lecture_id).await?;
    Ok(ApiResponse::ok(progress, "Lecture marked as viewed"))
}

/// Manual "done" tick; same effect as viewing the lecture.
pub async fn mark_lecture_completed(
    State(service): State<ProgressService>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<ApiResponse<CourseProgress>, AppError> {
    let Path((course_id, lecture_id)) = path?;
    let progress = service.mark_viewed(user.id, course_id, lecture_id).await?;
    Ok(ApiResponse::ok(progress, "Lecture marked as completed"))
}

pub async fn mark_lecture_incomplete(
    State(service): State<ProgressService>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<ApiResponse<CourseProgress>, AppError> {
    let Path((course_id, lecture_id)) = path?;
    let progress = service.mark_unviewed(user.id, course_id, lecture_id).await?;
    Ok(ApiResponse::ok(progress, "Lecture marked as incomplete"))
}

pub async fn mark_course_completed(
    State(service): State<ProgressService>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<ApiResponse<CourseProgress>, AppError> {
    let Path(course_id) = path?;
    let progress = service.mark_course_completed(user.id, course_id).await?;
    Ok(ApiResponse::ok(progress, "Course marked as completed"))
}

pub async fn mark_course_incomplete(
    State(service): State<ProgressService>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<ApiResponse<CourseProgress>, AppError> {
    let Path(course_id) = path?;
    let progress = service.mark_course_incomplete(user.id, course_id).await?;
    Ok(ApiResponse::ok(progress, "Course marked as incomplete"))
}
