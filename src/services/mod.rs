// src/services/mod.rs

pub mod attempts;
pub mod progress;
pub mod reports;

use crate::{repository::Repositories, utils::clock::Clock};

pub use attempts::AttemptService;
pub use progress::ProgressService;
pub use reports::ReportService;

/// Every service the HTTP layer (and the in-process client gateway) needs.
#[derive(Clone)]
pub struct AppServices {
    pub attempts: AttemptService,
    pub progress: ProgressService,
    pub reports: ReportService,
}

impl AppServices {
    pub fn new(repos: Repositories, clock: Clock) -> Self {
        let progress = ProgressService::new(repos.clone());
        Self {
            attempts: AttemptService::new(repos.clone(), progress.clone(), clock.clone()),
            progress,
            reports: ReportService::new(repos, clock),
        }
    }
}
