use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};

use crate::{
    error::AppError,
    models::{
        cheating::{CheatingReport, CreateCheatingReportRequest},
        response::ApiResponse,
        user::CurrentUser,
    },
    services::ReportService,
};

/// Records a terminated session. Sent by the client's integrity monitor;
/// `studentEmail` must be the caller's own.
pub async fn report_cheating(
    State(service): State<ReportService>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateCheatingReportRequest>, JsonRejection>,
) -> Result<ApiResponse<CheatingReport>, AppError> {
    let Json(req) = payload?;
    let report = service.report(&user, req).await?;
    Ok(ApiResponse::ok(report, "Cheating attempt recorded"))
}

pub async fn list_reports(
    State(service): State<ReportService>,
) -> Result<ApiResponse<Vec<CheatingReport>>, AppError> {
    let reports = service.list().await?;
    Ok(ApiResponse::ok(reports, "Cheating reports retrieved successfully"))
}
