use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::core::state::SessionServices;
use crate::core::time::{format_offset, now_utc};
use crate::schemas::exam::OptionLabel;
use crate::schemas::record::SessionRecord;
use crate::schemas::score::{ScoreOutcome, SubmissionJob};
use crate::services::catalog::CatalogError;
use crate::services::recorder;
use crate::session::controller::{SessionController, SessionState, SubmitDecision};
use crate::session::proctoring::{EnvironmentSignal, ProctorWarning, ProctoringMonitor};

/// UI-originated actions for a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Next,
    Previous,
    GoTo(usize),
    SelectOption { question_id: String, option: OptionLabel },
    ClearAnswer { question_id: String },
    ToggleMarked { question_id: String },
    Submit,
    ConfirmSubmit,
    CancelSubmit,
    RetrySubmit,
}

/// Everything the UI needs to render the session, in the order it happened.
#[derive(Debug)]
pub enum SessionEvent {
    Started { session_id: String, remaining_seconds: u64, prior_attempt: bool },
    Tick { remaining_seconds: u64 },
    TimeExpired,
    ConfirmationRequested { unanswered: usize, marked_for_review: usize },
    ProctorWarning(ProctorWarning),
    Submitting,
    Completed { outcome: ScoreOutcome, elapsed_seconds: u64 },
    SubmitFailed { message: String, retryable: bool },
}

/// Owner of one running session task. Dropping the handle (or calling
/// `abandon`) tears the event loop down together with its timer and signal
/// subscriptions; an abandoned session records nothing.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    signals: mpsc::Sender<EnvironmentSignal>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn commands(&self) -> mpsc::Sender<SessionCommand> {
        self.commands.clone()
    }

    pub fn signals(&self) -> mpsc::Sender<EnvironmentSignal> {
        self.signals.clone()
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Waits for the session to finish on its own (completion or abandonment
    /// from elsewhere).
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "Session task join failed");
        }
    }

    /// Abandons the session: no partial result is recorded.
    pub async fn abandon(self) {
        let _ = self.shutdown.send(true);
        self.join().await;
    }
}

/// Fetches the exam and spawns the session event loop. Missing exams or empty
/// question sets fail here, before any state machine exists. The
/// prior-attempt check is advisory: a failed check logs and the session
/// starts anyway.
pub async fn start_session(
    services: SessionServices,
    student_id: &str,
    exam_id: &str,
) -> Result<SessionHandle, CatalogError> {
    let exam = services.catalog().fetch_exam(exam_id).await?;
    if exam.questions.is_empty() {
        return Err(CatalogError::NoQuestions);
    }

    let prior_attempt = match services.catalog().has_prior_attempt(student_id, exam_id).await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(exam_id, error = %err, "Prior-attempt check failed; starting without warning");
            false
        }
    };

    let monitor = ProctoringMonitor::new(services.environment(), services.settings().proctoring());
    let controller = SessionController::new(exam, monitor);

    let (commands_tx, commands_rx) = mpsc::channel(32);
    let (signals_tx, signals_rx) = mpsc::channel(32);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = EventLoop {
        controller,
        services,
        student_id: student_id.to_string(),
        prior_attempt,
        events: events_tx,
    };
    let task = tokio::spawn(worker.run(commands_rx, signals_rx, shutdown_rx));

    Ok(SessionHandle {
        commands: commands_tx,
        signals: signals_tx,
        events: events_rx,
        shutdown: shutdown_tx,
        task,
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

struct EventLoop {
    controller: SessionController,
    services: SessionServices,
    student_id: String,
    prior_attempt: bool,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut signals: mpsc::Receiver<EnvironmentSignal>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let now = now_utc();
        if let Err(err) = self.controller.begin(now) {
            tracing::error!(error = %err, "Failed to start session");
            return;
        }
        self.emit(SessionEvent::Started {
            session_id: self.controller.session_id().to_string(),
            remaining_seconds: self.controller.remaining_seconds(now),
            prior_attempt: self.prior_attempt,
        });

        let mut tick = interval(Duration::from_secs(1));
        tick.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!(session_id = %self.controller.session_id(), "Session abandoned");
                    break;
                }
                Some(command) = commands.recv() => {
                    if self.handle_command(command).await == Flow::Finished {
                        break;
                    }
                }
                Some(signal) = signals.recv() => {
                    let warning = self.controller.observe_environment(signal, now_utc());
                    self.emit(SessionEvent::ProctorWarning(warning));
                }
                _ = tick.tick() => {
                    if self.handle_tick().await == Flow::Finished {
                        break;
                    }
                }
            }
        }
    }

    async fn handle_tick(&mut self) -> Flow {
        let update = self.controller.on_tick(now_utc());
        if update.expired_now {
            self.emit(SessionEvent::TimeExpired);
            if let Some(job) = self.controller.force_submit(now_utc()) {
                return self.submit(job).await;
            }
        } else if self.controller.state() == SessionState::InProgress {
            self.emit(SessionEvent::Tick { remaining_seconds: update.remaining_seconds });
        }
        Flow::Continue
    }

    async fn handle_command(&mut self, command: SessionCommand) -> Flow {
        match command {
            SessionCommand::Next => self.controller.next(),
            SessionCommand::Previous => self.controller.previous(),
            SessionCommand::GoTo(index) => self.controller.go_to(index),
            SessionCommand::SelectOption { question_id, option } => {
                if let Err(err) = self.controller.select_option(&question_id, option) {
                    tracing::debug!(question_id, error = %err, "Answer input ignored");
                }
            }
            SessionCommand::ClearAnswer { question_id } => {
                if let Err(err) = self.controller.clear_answer(&question_id) {
                    tracing::debug!(question_id, error = %err, "Clear ignored");
                }
            }
            SessionCommand::ToggleMarked { question_id } => {
                if let Err(err) = self.controller.toggle_marked(&question_id) {
                    tracing::debug!(question_id, error = %err, "Mark toggle ignored");
                }
            }
            SessionCommand::Submit => match self.controller.request_submit(now_utc()) {
                SubmitDecision::ConfirmationRequired { unanswered, marked_for_review } => {
                    self.emit(SessionEvent::ConfirmationRequested { unanswered, marked_for_review });
                }
                SubmitDecision::Proceed(job) => return self.submit(job).await,
                SubmitDecision::Rejected => {}
            },
            SessionCommand::ConfirmSubmit => {
                if let Some(job) = self.controller.confirm_submit(now_utc()) {
                    return self.submit(job).await;
                }
            }
            SessionCommand::CancelSubmit => self.controller.cancel_submit(),
            SessionCommand::RetrySubmit => {
                if let Some(job) = self.controller.retry() {
                    return self.submit(job).await;
                }
            }
        }
        Flow::Continue
    }

    /// The one awaited boundary call. While it is outstanding the loop is not
    /// selecting, so no second submission can start underneath it.
    async fn submit(&mut self, job: SubmissionJob) -> Flow {
        self.emit(SessionEvent::Submitting);

        match self.services.scoring().submit(&job).await {
            Ok(outcome) => {
                let now = now_utc();
                let recorded = outcome.recorded;
                let elapsed = match self.controller.complete(outcome.clone(), now) {
                    Ok(elapsed) => elapsed,
                    Err(err) => {
                        tracing::error!(error = %err, "Completion rejected");
                        return Flow::Continue;
                    }
                };

                if recorded {
                    let record = self.build_record(&outcome, elapsed);
                    recorder::record_in_background(self.services.recorder(), record);
                } else {
                    tracing::warn!(
                        session_id = %self.controller.session_id(),
                        "Score shown locally only; the attempt was not saved"
                    );
                }

                self.emit(SessionEvent::Completed { outcome, elapsed_seconds: elapsed });
                Flow::Finished
            }
            Err(err) => {
                let retryable = err.is_retryable();
                if let Err(transition) = self.controller.fail(retryable) {
                    tracing::error!(error = %transition, "Failure transition rejected");
                }
                self.emit(SessionEvent::SubmitFailed { message: err.to_string(), retryable });
                Flow::Continue
            }
        }
    }

    fn build_record(&self, outcome: &ScoreOutcome, elapsed: u64) -> SessionRecord {
        SessionRecord {
            session_id: self.controller.session_id().to_string(),
            exam_id: self.controller.exam().id.clone(),
            student_id: self.student_id.clone(),
            score_percent: outcome.result.score_percent,
            obtained_marks: outcome.result.obtained_marks,
            total_marks: outcome.result.total_marks,
            time_taken_seconds: elapsed,
            question_count: self.controller.exam().question_count(),
            attempted_count: self.controller.ledger().attempted_count(),
            violation_count: self.controller.violations().len(),
            finished_at: format_offset(now_utc()),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Session event dropped; receiver gone");
        }
    }
}
