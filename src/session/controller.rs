use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::time::seconds_between;
use crate::schemas::exam::{ExamDefinition, OptionLabel, Question};
use crate::schemas::score::{ScoreOutcome, SubmissionJob};
use crate::session::clock::{ClockUpdate, SessionClock};
use crate::session::ledger::AnswerLedger;
use crate::session::proctoring::{
    EnvironmentSignal, ProctorWarning, ProctoringMonitor, ViolationLog,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Submitting,
    Completed,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is not accepting answers")]
    SessionLocked,
    #[error("invalid session transition from {state:?}")]
    InvalidTransition { state: SessionState },
}

/// Outcome of a manual submit request.
#[derive(Debug, PartialEq)]
pub enum SubmitDecision {
    /// Unanswered questions remain; the caller must show a confirmation
    /// dialog and come back with `confirm_submit` or `cancel_submit`.
    ConfirmationRequired { unanswered: usize, marked_for_review: usize },
    /// The submission gate was acquired; score this job.
    Proceed(SubmissionJob),
    /// Wrong state or the gate is already taken; nothing to do.
    Rejected,
}

/// The per-attempt state machine: owns the question pointer, wires the clock,
/// ledger, and proctoring monitor together, and guards the submission
/// protocol. One controller per attempt; `Completed` and `Failed` are
/// terminal.
pub struct SessionController {
    session_id: String,
    exam: ExamDefinition,
    state: SessionState,
    current: usize,
    ledger: AnswerLedger,
    clock: SessionClock,
    monitor: ProctoringMonitor,
    pending_confirmation: bool,
    submit_gate: bool,
    job: Option<SubmissionJob>,
    submitted_at: Option<OffsetDateTime>,
    outcome: Option<ScoreOutcome>,
    elapsed_seconds: Option<u64>,
    failure_retryable: bool,
}

impl SessionController {
    pub fn new(exam: ExamDefinition, monitor: ProctoringMonitor) -> Self {
        assert!(!exam.questions.is_empty(), "exam has no questions");
        let ledger = AnswerLedger::new(&exam);
        let clock = SessionClock::new(exam.duration_seconds());
        Self {
            session_id: Uuid::new_v4().to_string(),
            exam,
            state: SessionState::NotStarted,
            current: 0,
            ledger,
            clock,
            monitor,
            pending_confirmation: false,
            submit_gate: false,
            job: None,
            submitted_at: None,
            outcome: None,
            elapsed_seconds: None,
            failure_retryable: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn exam(&self) -> &ExamDefinition {
        &self.exam
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &Question {
        &self.exam.questions[self.current]
    }

    pub fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    pub fn violations(&self) -> &ViolationLog {
        self.monitor.log()
    }

    pub fn score(&self) -> Option<&ScoreOutcome> {
        self.outcome.as_ref()
    }

    pub fn elapsed_seconds(&self) -> Option<u64> {
        self.elapsed_seconds
    }

    pub fn is_failure_retryable(&self) -> bool {
        self.failure_retryable
    }

    pub fn has_pending_confirmation(&self) -> bool {
        self.pending_confirmation
    }

    pub fn remaining_seconds(&self, now: OffsetDateTime) -> u64 {
        self.clock.remaining_at(now)
    }

    /// `NotStarted → InProgress`: start the countdown, begin proctoring
    /// enforcement (fullscreen requested best-effort), visit the first
    /// question.
    pub fn begin(&mut self, now: OffsetDateTime) -> Result<(), SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(SessionError::InvalidTransition { state: self.state });
        }

        self.clock.start(now);
        self.monitor.begin_enforcement();
        let first_id = self.exam.questions[0].id.clone();
        self.ledger.record_visit(&first_id);
        self.state = SessionState::InProgress;

        tracing::info!(
            session_id = %self.session_id,
            exam_id = %self.exam.id,
            question_count = self.exam.question_count(),
            duration_seconds = self.clock.duration_seconds(),
            "Assessment session started"
        );

        Ok(())
    }

    /// Navigation is bounds-clamped: past either end it is a no-op, never an
    /// error. Only meaningful while `InProgress`.
    pub fn go_to(&mut self, index: usize) {
        if self.state != SessionState::InProgress || index >= self.exam.questions.len() {
            return;
        }
        self.current = index;
        let id = self.exam.questions[index].id.clone();
        self.ledger.record_visit(&id);
    }

    pub fn next(&mut self) {
        self.go_to(self.current + 1);
    }

    pub fn previous(&mut self) {
        if let Some(target) = self.current.checked_sub(1) {
            self.go_to(target);
        }
    }

    pub fn select_option(
        &mut self,
        question_id: &str,
        label: OptionLabel,
    ) -> Result<(), SessionError> {
        self.ensure_accepting_input()?;
        self.ledger.select(question_id, label);
        Ok(())
    }

    pub fn clear_answer(&mut self, question_id: &str) -> Result<(), SessionError> {
        self.ensure_accepting_input()?;
        self.ledger.clear(question_id);
        Ok(())
    }

    pub fn toggle_marked(&mut self, question_id: &str) -> Result<bool, SessionError> {
        self.ensure_accepting_input()?;
        Ok(self.ledger.toggle_marked(question_id))
    }

    fn ensure_accepting_input(&self) -> Result<(), SessionError> {
        if self.state != SessionState::InProgress {
            return Err(SessionError::SessionLocked);
        }
        Ok(())
    }

    pub fn observe_environment(
        &mut self,
        signal: EnvironmentSignal,
        now: OffsetDateTime,
    ) -> ProctorWarning {
        self.monitor.observe(signal, now)
    }

    pub fn on_tick(&mut self, now: OffsetDateTime) -> ClockUpdate {
        let update = self.clock.observe(now);
        if update.expired_now {
            metrics::counter!("session_expired_total").increment(1);
            tracing::info!(session_id = %self.session_id, "Session time expired");
        }
        update
    }

    /// Manual submit. With unanswered questions remaining this only raises a
    /// confirmation request; the gate is not yet taken and the clock keeps
    /// running.
    pub fn request_submit(&mut self, now: OffsetDateTime) -> SubmitDecision {
        if self.state != SessionState::InProgress || self.submit_gate {
            return SubmitDecision::Rejected;
        }

        if !self.ledger.is_complete() {
            self.pending_confirmation = true;
            return SubmitDecision::ConfirmationRequired {
                unanswered: self.ledger.unanswered_count(),
                marked_for_review: self.ledger.marked_unanswered_count(),
            };
        }

        SubmitDecision::Proceed(self.enter_submitting(now))
    }

    pub fn confirm_submit(&mut self, now: OffsetDateTime) -> Option<SubmissionJob> {
        if !self.pending_confirmation || self.state != SessionState::InProgress || self.submit_gate
        {
            return None;
        }
        self.pending_confirmation = false;
        Some(self.enter_submitting(now))
    }

    pub fn cancel_submit(&mut self) {
        self.pending_confirmation = false;
    }

    /// Expiry path: submits whatever is in the ledger, bypassing (and
    /// clearing) any pending confirmation. Returns `None` when the gate is
    /// already taken, so a manual submit racing the expiry in the same turn
    /// yields exactly one job.
    pub fn force_submit(&mut self, now: OffsetDateTime) -> Option<SubmissionJob> {
        if self.state != SessionState::InProgress || self.submit_gate {
            return None;
        }
        self.pending_confirmation = false;
        Some(self.enter_submitting(now))
    }

    fn enter_submitting(&mut self, now: OffsetDateTime) -> SubmissionJob {
        self.submit_gate = true;
        self.clock.stop(now);
        self.monitor.set_enforcing(false);
        self.submitted_at = Some(now);
        self.state = SessionState::Submitting;

        let job = SubmissionJob {
            session_id: self.session_id.clone(),
            exam_id: self.exam.id.clone(),
            answers: self.ledger.snapshot(),
        };

        tracing::info!(
            session_id = %self.session_id,
            answer_count = job.answers.len(),
            attempted_count = self.ledger.attempted_count(),
            "Submitting assessment session"
        );

        self.job = Some(job.clone());
        job
    }

    /// `Submitting → Completed` on the authoritative score. Returns the
    /// elapsed seconds: wall clock at submit minus wall clock at start, or the
    /// consumed countdown when the start timestamp is unavailable.
    pub fn complete(
        &mut self,
        outcome: ScoreOutcome,
        now: OffsetDateTime,
    ) -> Result<u64, SessionError> {
        if self.state != SessionState::Submitting {
            return Err(SessionError::InvalidTransition { state: self.state });
        }

        let elapsed = match (self.clock.started_at(), self.submitted_at) {
            (Some(started), Some(submitted)) => seconds_between(started, submitted),
            _ => self.exam.duration_seconds().saturating_sub(self.clock.remaining_at(now)),
        };
        self.elapsed_seconds = Some(elapsed);

        let status = if outcome.recorded { "success" } else { "unsaved" };
        metrics::counter!("session_submissions_total", "status" => status).increment(1);
        tracing::info!(
            session_id = %self.session_id,
            score_percent = outcome.result.score_percent,
            recorded = outcome.recorded,
            elapsed_seconds = elapsed,
            "Assessment session completed"
        );

        self.outcome = Some(outcome);
        self.state = SessionState::Completed;
        Ok(elapsed)
    }

    /// `Submitting → Failed`. The ledger keeps its answers; a retry re-sends
    /// the snapshot frozen at the first attempt.
    pub fn fail(&mut self, retryable: bool) -> Result<(), SessionError> {
        if self.state != SessionState::Submitting {
            return Err(SessionError::InvalidTransition { state: self.state });
        }
        self.failure_retryable = retryable;
        metrics::counter!("session_submissions_total", "status" => "failed").increment(1);
        tracing::warn!(session_id = %self.session_id, retryable, "Assessment submission failed");
        self.state = SessionState::Failed;
        Ok(())
    }

    /// `Failed → Submitting` with the identical frozen job.
    pub fn retry(&mut self) -> Option<SubmissionJob> {
        if self.state != SessionState::Failed {
            return None;
        }
        self.state = SessionState::Submitting;
        tracing::info!(session_id = %self.session_id, "Retrying assessment submission");
        self.job.clone()
    }
}
