use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::config::{ProctoringSettings, Settings};
use crate::core::state::SessionServices;
use crate::schemas::exam::{ExamDefinition, OptionLabel, Question, QuestionOption};
use crate::schemas::record::SessionRecord;
use crate::schemas::score::{ScoreOutcome, ScoreResult, SubmissionJob};
use crate::services::catalog::{CatalogError, ExamCatalog};
use crate::services::recorder::ResultRecorder;
use crate::services::scoring::{ScoringError, ScoringGateway};
use crate::session::proctoring::EnvironmentControl;

pub(crate) fn set_test_env() {
    dotenvy::dotenv().ok();

    std::env::set_var("EXAMROOM_ENV", "test");
    std::env::set_var("CATALOG_BASE_URL", "http://localhost:8000/api/v1");
    std::env::set_var("SCORING_BASE_URL", "http://localhost:8000/api/v1");
    std::env::set_var("RECORDER_BASE_URL", "http://localhost:8000/api/v1");
}

pub(crate) fn test_settings() -> Settings {
    set_test_env();
    Settings::load().expect("settings")
}

pub(crate) fn proctoring_settings() -> ProctoringSettings {
    ProctoringSettings { reassert_fullscreen: true, suppress_shortcuts: true }
}

pub(crate) fn question(id: &str, marks: f64, multi_correct: bool) -> Question {
    Question {
        id: id.to_string(),
        prompt: format!("Question {id}"),
        options: vec![
            QuestionOption { label: OptionLabel::A, text: "first".to_string() },
            QuestionOption { label: OptionLabel::B, text: "second".to_string() },
            QuestionOption { label: OptionLabel::C, text: "third".to_string() },
            QuestionOption { label: OptionLabel::D, text: "fourth".to_string() },
        ],
        marks,
        negative_marks: 1.0,
        multi_correct,
        image_url: None,
    }
}

/// Exam with `single` single-correct questions (`q1..`) followed by `multi`
/// multi-correct questions (`m1..`), ten minutes long.
pub(crate) fn exam_mixed(single: usize, multi: usize) -> ExamDefinition {
    let mut questions: Vec<Question> =
        (1..=single).map(|n| question(&format!("q{n}"), 4.0, false)).collect();
    questions.extend((1..=multi).map(|n| question(&format!("m{n}"), 4.0, true)));

    ExamDefinition {
        id: "exam-fixture".to_string(),
        title: "Fixture Mock".to_string(),
        duration_minutes: 10,
        premium: false,
        questions,
    }
}

pub(crate) fn sample_outcome(recorded: bool) -> ScoreOutcome {
    ScoreOutcome {
        recorded,
        result: ScoreResult {
            score_percent: 60.0,
            obtained_marks: 12.0,
            total_marks: 20.0,
            questions: Vec::new(),
        },
    }
}

pub(crate) struct MockEnvironmentControl {
    pub(crate) fullscreen_requests: AtomicUsize,
    deny: AtomicBool,
}

impl MockEnvironmentControl {
    pub(crate) fn allowing() -> Self {
        Self { fullscreen_requests: AtomicUsize::new(0), deny: AtomicBool::new(false) }
    }

    pub(crate) fn denying() -> Self {
        Self { fullscreen_requests: AtomicUsize::new(0), deny: AtomicBool::new(true) }
    }
}

impl EnvironmentControl for MockEnvironmentControl {
    fn request_fullscreen(&self) -> bool {
        self.fullscreen_requests.fetch_add(1, Ordering::SeqCst);
        !self.deny.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockCatalog {
    exam: ExamDefinition,
    prior_attempt: bool,
}

impl MockCatalog {
    pub(crate) fn new(exam: ExamDefinition, prior_attempt: bool) -> Self {
        Self { exam, prior_attempt }
    }
}

#[async_trait]
impl ExamCatalog for MockCatalog {
    async fn fetch_exam(&self, exam_id: &str) -> Result<ExamDefinition, CatalogError> {
        if exam_id != self.exam.id {
            return Err(CatalogError::ExamNotFound);
        }
        Ok(self.exam.clone())
    }

    async fn has_prior_attempt(
        &self,
        _student_id: &str,
        _exam_id: &str,
    ) -> Result<bool, CatalogError> {
        Ok(self.prior_attempt)
    }
}

/// Pops programmed responses in order; once the queue is empty every call
/// succeeds with `sample_outcome(true)`. Counts calls and keeps the jobs it
/// saw so tests can assert the exactly-once property and snapshot identity.
pub(crate) struct MockScoringGateway {
    responses: Mutex<VecDeque<Result<ScoreOutcome, ScoringError>>>,
    calls: AtomicUsize,
    jobs: Mutex<Vec<SubmissionJob>>,
}

impl MockScoringGateway {
    pub(crate) fn succeeding() -> Self {
        Self::with_responses(Vec::new())
    }

    pub(crate) fn with_responses(responses: Vec<Result<ScoreOutcome, ScoringError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn jobs(&self) -> Vec<SubmissionJob> {
        self.jobs.lock().expect("jobs lock").clone()
    }
}

#[async_trait]
impl ScoringGateway for MockScoringGateway {
    async fn submit(&self, job: &SubmissionJob) -> Result<ScoreOutcome, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().expect("jobs lock").push(job.clone());
        let next = self.responses.lock().expect("responses lock").pop_front();
        next.unwrap_or_else(|| Ok(sample_outcome(true)))
    }
}

pub(crate) struct MockRecorder {
    records: Mutex<Vec<SessionRecord>>,
    fail: bool,
}

impl MockRecorder {
    pub(crate) fn succeeding() -> Self {
        Self { records: Mutex::new(Vec::new()), fail: false }
    }

    pub(crate) fn failing() -> Self {
        Self { records: Mutex::new(Vec::new()), fail: true }
    }

    pub(crate) fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().expect("records lock").clone()
    }
}

#[async_trait]
impl ResultRecorder for MockRecorder {
    async fn record(&self, record: &SessionRecord) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("recorder sink offline");
        }
        self.records.lock().expect("records lock").push(record.clone());
        Ok(())
    }
}

pub(crate) fn services_with(
    exam: ExamDefinition,
    scoring: Arc<dyn ScoringGateway>,
    recorder: Arc<dyn ResultRecorder>,
    environment: Arc<dyn EnvironmentControl>,
) -> SessionServices {
    SessionServices::new(
        test_settings(),
        Arc::new(MockCatalog::new(exam, false)),
        scoring,
        recorder,
        environment,
    )
}
