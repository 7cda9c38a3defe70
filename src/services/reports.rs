use validator::Validate;

use crate::{
    config::INITIAL_WARNINGS,
    error::AppError,
    models::{
        cheating::{CheatingReport, CreateCheatingReportRequest},
        user::CurrentUser,
    },
    repository::Repositories,
    utils::clock::Clock,
};

/// Stores integrity reports sent by terminated test sessions.
#[derive(Clone)]
pub struct ReportService {
    repos: Repositories,
    clock: Clock,
}

impl ReportService {
    pub fn new(repos: Repositories, clock: Clock) -> Self {
        Self { repos, clock }
    }

    /// Stores a report filed by `user` about their own attempt.
    pub async fn report(
        &self,
        user: &CurrentUser,
        req: CreateCheatingReportRequest,
    ) -> Result<CheatingReport, AppError> {
        req.validate()?;
        if !req.student_email.eq_ignore_ascii_case(&user.email) {
            return Err(AppError::Forbidden(
                "Reports can only be filed for your own attempts".to_string(),
            ));
        }

        let warnings = i32::try_from(INITIAL_WARNINGS).unwrap_or(i32::MAX);
        let report = self
            .repos
            .reports
            .insert_report(&req.student_email, req.test_id, warnings, self.clock.now())
            .await?;

        tracing::warn!(
            report_id = report.id,
            student_email = %report.student_email,
            test_id = report.test_id,
            "Cheating attempt reported"
        );
        Ok(report)
    }

    pub async fn list(&self) -> Result<Vec<CheatingReport>, AppError> {
        Ok(self.repos.reports.list_reports().await?)
    }
}
