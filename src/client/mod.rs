//! Client-resident side of a test: countdown, integrity monitor, review mode,
//! and the event loop that drives them against a [`gateway::TestGateway`].

pub mod driver;
pub mod gateway;
pub mod monitor;
pub mod session;
pub mod timer;

use thiserror::Error;

use crate::error::AppError;

pub use driver::{ClientEvent, run_session};
pub use gateway::{HttpGateway, LocalGateway, TestGateway};
pub use monitor::{IntegrityMonitor, MonitorVerdict, Violation};
pub use session::{SessionEvent, SessionMode, SubmitOutcome, SubmitTrigger, TestSession};
pub use timer::{Countdown, TimerTick};

/// Errors surfaced to the code driving a test session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The server answered with a `{ success: false }` envelope.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("session is read-only")]
    ReadOnly,

    #[error("session already terminated")]
    Terminated,

    #[error(transparent)]
    Engine(#[from] AppError),
}

impl ClientError {
    /// HTTP-equivalent status, when the failure came from the server side.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Engine(e) => Some(e.status_code().as_u16()),
            _ => None,
        }
    }
}
