use std::{collections::HashMap, sync::Arc};

use tokio::time::timeout;

use super::{
    ClientError,
    gateway::TestGateway,
    monitor::{IntegrityMonitor, MonitorVerdict, Violation},
    timer::{Countdown, TimerTick},
};
use crate::{
    config::REPORT_TIMEOUT,
    error::AppError,
    models::{
        attempt::{Attempt, AnswerValue, SubmitAttemptRequest, SubmittedAnswer},
        cheating::CreateCheatingReportRequest,
        question::{AnswerType, PublicQuestion, PublicTestDefinition},
    },
    utils::clock::Clock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Taking the test: timer and integrity monitor are running.
    Active,
    /// Read-only view of a finished attempt.
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    TimerExpired,
    IntegrityTerminated,
}

/// Things the UI layer reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TimeLeft(u64),
    Warning { remaining: u32 },
    /// The warning budget ran out.
    Terminated,
    Submitted { trigger: SubmitTrigger, total_score: f64 },
    /// Blank questions remain; the student has to confirm.
    ConfirmationRequired { unanswered: Vec<i64> },
    SubmitFailed { message: String },
    NavigateAway,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Some questions are blank; call `confirm_submit` to go ahead anyway.
    NeedsConfirmation { unanswered: Vec<i64> },
    Submitted(Attempt),
}

/// One row of the review screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewItem {
    pub question_id: i64,
    pub question_text: String,
    pub options: Vec<String>,
    pub answer: AnswerValue,
    pub score: f64,
}

/// One student's page session on one test.
///
/// Holds the draft answers, the countdown and the warning budget. Every
/// submit path (button, timer, monitor) goes through a single latch, so at
/// most one submission leaves the session.
pub struct TestSession {
    gateway: Arc<dyn TestGateway>,
    student_email: String,
    test: PublicTestDefinition,
    attempt: Attempt,
    mode: SessionMode,
    answers: HashMap<i64, AnswerValue>,
    timer: Countdown,
    monitor: IntegrityMonitor,
    finished: bool,
}

impl TestSession {
    /// Opens the test page: start (or resume) the attempt, then pick the mode.
    ///
    /// A finished attempt always opens in review. A running one resumes with
    /// whatever is left of the window measured from its original start.
    pub async fn open(
        gateway: Arc<dyn TestGateway>,
        student_email: impl Into<String>,
        course_id: i64,
        test_id: i64,
        clock: &Clock,
    ) -> Result<Self, ClientError> {
        let test = gateway.test_definition(test_id).await?;
        let attempt = gateway.start_attempt(course_id, test_id).await?;

        let mut answers: HashMap<i64, AnswerValue> = test
            .questions
            .iter()
            .map(|q| (q.id, AnswerValue::blank(q.answer_type)))
            .collect();

        let (mode, timer, monitor) = if attempt.status.is_finished() {
            for answer in &attempt.answers {
                answers.insert(answer.question_id, answer.answer.clone());
            }
            (SessionMode::Review, Countdown::stopped(), IntegrityMonitor::disarmed())
        } else {
            let left = attempt.remaining_secs(test.duration_secs(), clock.now());
            (SessionMode::Active, Countdown::new(left), IntegrityMonitor::default())
        };

        tracing::info!(
            attempt_id = attempt.id,
            test_id,
            mode = ?mode,
            remaining_secs = timer.remaining(),
            "Test session opened"
        );

        Ok(Self {
            gateway,
            student_email: student_email.into(),
            finished: mode == SessionMode::Review,
            test,
            attempt,
            mode,
            answers,
            timer,
            monitor,
        })
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    pub fn test(&self) -> &PublicTestDefinition {
        &self.test
    }

    pub fn remaining_secs(&self) -> u64 {
        self.timer.remaining()
    }

    pub fn warnings_left(&self) -> u32 {
        self.monitor.remaining()
    }

    /// True once any submit path has fired (or the session opened in review).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn answer(&self, question_id: i64) -> Option<&AnswerValue> {
        self.answers.get(&question_id)
    }

    fn ensure_editable(&self) -> Result<(), ClientError> {
        if self.mode == SessionMode::Review {
            return Err(ClientError::ReadOnly);
        }
        if self.finished {
            return Err(ClientError::Terminated);
        }
        Ok(())
    }

    fn question(&self, question_id: i64) -> Result<&PublicQuestion, ClientError> {
        self.test.question(question_id).ok_or_else(|| {
            AppError::Validation(format!("Question {} is not part of this test", question_id))
                .into()
        })
    }

    fn choice<'a>(question: &'a PublicQuestion, option: &str) -> Result<&'a str, ClientError> {
        question
            .options
            .iter()
            .find(|o| o.as_str() == option)
            .map(String::as_str)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "'{}' is not an option of question {}",
                    option, question.id
                ))
                .into()
            })
    }

    pub fn set_text(&mut self, question_id: i64, text: impl Into<String>) -> Result<(), ClientError> {
        self.ensure_editable()?;
        let answer_type = self.question(question_id)?.answer_type;
        match answer_type {
            AnswerType::Text => {
                self.answers
                    .insert(question_id, AnswerValue::Text(text.into()));
                Ok(())
            }
            other => Err(AppError::Validation(format!(
                "Question {} expects a {} answer",
                question_id, other
            ))
            .into()),
        }
    }

    /// Picks an option. Replaces the selection for single choice, toggles it for multiple choice.
    pub fn select(&mut self, question_id: i64, option: &str) -> Result<(), ClientError> {
        self.ensure_editable()?;
        let question = self.question(question_id)?;
        let answer_type = question.answer_type;
        let option = Self::choice(question, option)?.to_string();

        match answer_type {
            AnswerType::SingleChoice => {
                self.answers
                    .insert(question_id, AnswerValue::SingleChoice(option));
            }
            AnswerType::MultipleChoice => {
                let slot = self
                    .answers
                    .entry(question_id)
                    .or_insert_with(|| AnswerValue::blank(AnswerType::MultipleChoice));
                if let AnswerValue::MultipleChoice(set) = slot {
                    if !set.remove(&option) {
                        set.insert(option);
                    }
                }
            }
            AnswerType::Text => {
                return Err(AppError::Validation(format!(
                    "Question {} expects a text answer",
                    question_id
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Questions still blank, in test order.
    pub fn unanswered(&self) -> Vec<i64> {
        self.test
            .questions
            .iter()
            .filter(|q| self.answers.get(&q.id).is_none_or(AnswerValue::is_empty))
            .map(|q| q.id)
            .collect()
    }

    /// The submit button. Asks for confirmation while questions are blank.
    pub async fn request_submit(&mut self) -> Result<SubmitOutcome, ClientError> {
        self.ensure_editable()?;
        let unanswered = self.unanswered();
        if !unanswered.is_empty() {
            return Ok(SubmitOutcome::NeedsConfirmation { unanswered });
        }
        self.confirm_submit().await
    }

    /// Submit as-is, blank questions included.
    pub async fn confirm_submit(&mut self) -> Result<SubmitOutcome, ClientError> {
        self.ensure_editable()?;
        let attempt = self.submit(SubmitTrigger::Manual).await?;
        Ok(SubmitOutcome::Submitted(attempt))
    }

    /// One second of countdown. Expiry submits whatever is held, once.
    pub async fn tick(&mut self) -> Vec<SessionEvent> {
        if self.mode == SessionMode::Review || self.finished {
            return Vec::new();
        }

        match self.timer.tick() {
            TimerTick::Remaining(left) => vec![SessionEvent::TimeLeft(left)],
            TimerTick::Expired => {
                let mut events = vec![SessionEvent::TimeLeft(0)];
                events.extend(self.force_submit(SubmitTrigger::TimerExpired).await);
                events
            }
            TimerTick::Stopped => Vec::new(),
        }
    }

    /// Visibility loss or copy attempt while the test is open.
    pub async fn on_violation(&mut self, violation: Violation) -> Vec<SessionEvent> {
        if self.mode == SessionMode::Review || self.finished {
            return Vec::new();
        }

        match self.monitor.record(violation) {
            MonitorVerdict::Warning { remaining } => vec![SessionEvent::Warning { remaining }],
            MonitorVerdict::Terminated => {
                let mut events = vec![SessionEvent::Terminated];
                events.extend(self.force_submit(SubmitTrigger::IntegrityTerminated).await);
                self.send_report().await;
                events
            }
            MonitorVerdict::Ignored => Vec::new(),
        }
    }

    /// Review rows: each question with the stored answer and its score.
    pub fn review(&self) -> Option<Vec<ReviewItem>> {
        if self.mode != SessionMode::Review {
            return None;
        }

        let items = self
            .test
            .questions
            .iter()
            .map(|q| {
                let stored = self.attempt.answers.iter().find(|a| a.question_id == q.id);
                ReviewItem {
                    question_id: q.id,
                    question_text: stored
                        .map(|a| a.question_text.clone())
                        .unwrap_or_else(|| q.text.clone()),
                    options: q.options.clone(),
                    answer: stored
                        .map(|a| a.answer.clone())
                        .unwrap_or_else(|| AnswerValue::blank(q.answer_type)),
                    score: stored.map_or(0.0, |a| a.score),
                }
            })
            .collect();
        Some(items)
    }

    fn submission(&self) -> SubmitAttemptRequest {
        SubmitAttemptRequest {
            test_id: self.test.id,
            course_id: self.attempt.course_id,
            answers: self
                .test
                .questions
                .iter()
                .map(|q| SubmittedAnswer {
                    question_id: q.id,
                    answer: self
                        .answers
                        .get(&q.id)
                        .cloned()
                        .unwrap_or_else(|| AnswerValue::blank(q.answer_type))
                        .into(),
                })
                .collect(),
        }
    }

    async fn submit(&mut self, trigger: SubmitTrigger) -> Result<Attempt, ClientError> {
        if self.finished {
            return Err(ClientError::Terminated);
        }
        self.finished = true;

        match self.gateway.submit_attempt(self.submission()).await {
            Ok(attempt) => {
                self.enter_review(attempt.clone());

                tracing::info!(
                    attempt_id = attempt.id,
                    trigger = ?trigger,
                    total_score = attempt.total_score,
                    "Test submitted"
                );
                Ok(attempt)
            }
            Err(e) if trigger == SubmitTrigger::Manual && e.status() == Some(409) => {
                // Submitted elsewhere (another tab): show what the server kept.
                match self
                    .gateway
                    .start_attempt(self.attempt.course_id, self.test.id)
                    .await
                {
                    Ok(stored) if stored.status.is_finished() => {
                        tracing::info!(
                            attempt_id = stored.id,
                            status = %stored.status,
                            "Attempt already submitted, switching to review"
                        );
                        self.enter_review(stored);
                    }
                    Ok(_) => self.finished = false,
                    Err(reload) => {
                        tracing::warn!(
                            attempt_id = self.attempt.id,
                            "Failed to reload attempt after conflict: {}",
                            reload
                        );
                        self.finished = false;
                    }
                }
                Err(e)
            }
            Err(e) if trigger == SubmitTrigger::Manual => {
                // The student can retry; the clock keeps running.
                self.finished = false;
                Err(e)
            }
            Err(e) => {
                self.timer.cancel();
                self.monitor.disarm();
                Err(e)
            }
        }
    }

    fn enter_review(&mut self, attempt: Attempt) {
        self.timer.cancel();
        self.monitor.disarm();
        self.mode = SessionMode::Review;
        self.finished = true;
        for answer in &attempt.answers {
            self.answers.insert(answer.question_id, answer.answer.clone());
        }
        self.attempt = attempt;
    }

    /// Sends the cheating report with a deadline. Failure is only logged.
    async fn send_report(&self) {
        let report = CreateCheatingReportRequest {
            student_email: self.student_email.clone(),
            test_id: self.test.id,
        };
        let sent = match timeout(REPORT_TIMEOUT, self.gateway.report_violation(report)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::UpstreamFailure(format!(
                "cheating report not accepted within {}s",
                REPORT_TIMEOUT.as_secs()
            ))
            .into()),
        };

        if let Err(e) = sent {
            tracing::warn!(
                attempt_id = self.attempt.id,
                "Failed to report cheating attempt: {}",
                e
            );
        }
    }

    async fn force_submit(&mut self, trigger: SubmitTrigger) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match self.submit(trigger).await {
            Ok(attempt) => events.push(SessionEvent::Submitted {
                trigger,
                total_score: attempt.total_score,
            }),
            Err(e) => tracing::error!(
                attempt_id = self.attempt.id,
                trigger = ?trigger,
                "Forced submission failed: {}",
                e
            ),
        }
        events.push(SessionEvent::NavigateAway);
        events
    }
}
