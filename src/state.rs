use crate::config::Config;
use crate::services::{AppServices, AttemptService, ProgressService, ReportService};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    pub config: Config,
}

impl FromRef<AppState> for AttemptService {
    fn from_ref(state: &AppState) -> Self {
        state.services.attempts.clone()
    }
}

impl FromRef<AppState> for ProgressService {
    fn from_ref(state: &AppState) -> Self {
        state.services.progress.clone()
    }
}

impl FromRef<AppState> for ReportService {
    fn from_ref(state: &AppState) -> Self {
        state.services.reports.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
