use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'cheating_attempts' table.
/// Written once per terminated session, when the warning budget is exhausted.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheatingReport {
    pub id: i64,
    pub student_email: String,
    pub test_id: i64,
    pub warnings: i32,
    #[sqlx(rename = "reported_at")]
    pub timestamp: DateTime<Utc>,
}

/// DTO for reporting an integrity violation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheatingReportRequest {
    #[validate(email(message = "studentEmail must be a valid email"))]
    pub student_email: String,
    #[validate(range(min = 1, message = "testId is required"))]
    pub test_id: i64,
}
