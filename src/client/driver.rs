use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval_at},
};

use super::{
    monitor::Violation,
    session::{SessionEvent, SessionMode, SubmitOutcome, SubmitTrigger, TestSession},
};
use crate::config::TIMER_TICK;

/// Input from the page while a test is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Violation(Violation),
    Text { question_id: i64, text: String },
    Select { question_id: i64, option: String },
    /// Submit button.
    Submit,
    /// "Submit anyway" in the confirmation dialog.
    ConfirmSubmit,
    /// The student left the page; nothing is persisted.
    Leave,
}

fn emit(outbox: &mpsc::UnboundedSender<SessionEvent>, events: Vec<SessionEvent>) {
    for event in events {
        if outbox.send(event).is_err() {
            tracing::debug!("Session event dropped: no listener");
        }
    }
}

fn submit_events(result: Result<SubmitOutcome, super::ClientError>) -> Vec<SessionEvent> {
    match result {
        Ok(SubmitOutcome::NeedsConfirmation { unanswered }) => {
            vec![SessionEvent::ConfirmationRequired { unanswered }]
        }
        Ok(SubmitOutcome::Submitted(attempt)) => vec![SessionEvent::Submitted {
            trigger: SubmitTrigger::Manual,
            total_score: attempt.total_score,
        }],
        Err(e) => {
            tracing::warn!("Submission failed: {}", e);
            vec![SessionEvent::SubmitFailed {
                message: e.to_string(),
            }]
        }
    }
}

/// Drives one test page: a one-second countdown plus page events, until
/// the attempt is submitted by any path or the page is left.
///
/// Review sessions return immediately; there is nothing to drive.
pub async fn run_session(
    mut session: TestSession,
    mut inbox: mpsc::Receiver<ClientEvent>,
    outbox: mpsc::UnboundedSender<SessionEvent>,
) -> TestSession {
    if session.mode() == SessionMode::Review {
        return session;
    }

    let mut ticker = interval_at(Instant::now() + TIMER_TICK, TIMER_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !session.is_finished() {
        tokio::select! {
            _ = ticker.tick() => {
                let events = session.tick().await;
                emit(&outbox, events);
            }
            message = inbox.recv() => {
                let Some(message) = message else {
                    tracing::info!(attempt_id = session.attempt().id, "Test page closed before submission");
                    break;
                };
                match message {
                    ClientEvent::Violation(violation) => {
                        let events = session.on_violation(violation).await;
                        emit(&outbox, events);
                    }
                    ClientEvent::Text { question_id, text } => {
                        if let Err(e) = session.set_text(question_id, text) {
                            tracing::warn!(question_id, "Answer rejected: {}", e);
                        }
                    }
                    ClientEvent::Select { question_id, option } => {
                        if let Err(e) = session.select(question_id, &option) {
                            tracing::warn!(question_id, "Answer rejected: {}", e);
                        }
                    }
                    ClientEvent::Submit => {
                        let result = session.request_submit().await;
                        emit(&outbox, submit_events(result));
                    }
                    ClientEvent::ConfirmSubmit => {
                        let result = session.confirm_submit().await;
                        emit(&outbox, submit_events(result));
                    }
                    ClientEvent::Leave => {
                        tracing::info!(attempt_id = session.attempt().id, "Test page left before submission");
                        break;
                    }
                }
            }
        }
    }

    session
}
