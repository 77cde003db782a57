use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use validator::Validate;

use crate::core::config::Settings;
use crate::schemas::exam::ExamDefinition;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("exam not found")]
    ExamNotFound,
    #[error("exam has no questions")]
    NoQuestions,
    #[error("invalid exam definition: {0}")]
    InvalidDefinition(String),
    #[error("catalog request failed: {0}")]
    Transport(String),
    #[error("malformed catalog response: {0}")]
    InvalidResponse(String),
}

/// Source of exam metadata and the ordered question set (without correct
/// answers), plus the advisory prior-attempt check.
#[async_trait]
pub trait ExamCatalog: Send + Sync {
    async fn fetch_exam(&self, exam_id: &str) -> Result<ExamDefinition, CatalogError>;

    /// Whether this student has already completed this exam. Advisory only:
    /// the authoritative one-attempt enforcement lives in the scoring
    /// endpoint.
    async fn has_prior_attempt(
        &self,
        student_id: &str,
        exam_id: &str,
    ) -> Result<bool, CatalogError>;
}

/// Structural checks on a fetched definition: field constraints, at least one
/// question, unique question ids, unique option labels per question.
pub fn validate_exam(exam: &ExamDefinition) -> Result<(), CatalogError> {
    if exam.questions.is_empty() {
        return Err(CatalogError::NoQuestions);
    }
    exam.validate().map_err(|err| CatalogError::InvalidDefinition(err.to_string()))?;

    let mut question_ids = HashSet::new();
    for question in &exam.questions {
        question.validate().map_err(|err| CatalogError::InvalidDefinition(err.to_string()))?;
        if !question_ids.insert(question.id.as_str()) {
            return Err(CatalogError::InvalidDefinition(format!(
                "duplicate question id {}",
                question.id
            )));
        }

        let mut labels = HashSet::new();
        for option in &question.options {
            option.validate().map_err(|err| CatalogError::InvalidDefinition(err.to_string()))?;
            if !labels.insert(option.label) {
                return Err(CatalogError::InvalidDefinition(format!(
                    "duplicate option label {} in question {}",
                    option.label, question.id
                )));
            }
        }
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct PriorAttemptResponse {
    attempted: bool,
}

#[derive(Debug, Clone)]
pub struct HttpExamCatalog {
    client: Client,
    base_url: String,
}

impl HttpExamCatalog {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.catalog().timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.catalog().base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ExamCatalog for HttpExamCatalog {
    async fn fetch_exam(&self, exam_id: &str) -> Result<ExamDefinition, CatalogError> {
        let url = format!("{}/exams/{exam_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| CatalogError::Transport(err.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(CatalogError::ExamNotFound),
            status => {
                return Err(CatalogError::Transport(format!("catalog returned {status}")));
            }
        }

        let exam: ExamDefinition = response
            .json()
            .await
            .map_err(|err| CatalogError::InvalidResponse(err.to_string()))?;
        validate_exam(&exam)?;

        tracing::info!(
            exam_id = %exam.id,
            question_count = exam.question_count(),
            duration_minutes = exam.duration_minutes,
            "Exam definition fetched"
        );

        Ok(exam)
    }

    async fn has_prior_attempt(
        &self,
        student_id: &str,
        exam_id: &str,
    ) -> Result<bool, CatalogError> {
        let url = format!("{}/exams/{exam_id}/attempts/{student_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| CatalogError::Transport(err.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let parsed: PriorAttemptResponse = response
                    .json()
                    .await
                    .map_err(|err| CatalogError::InvalidResponse(err.to_string()))?;
                Ok(parsed.attempted)
            }
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(CatalogError::Transport(format!("catalog returned {status}"))),
        }
    }
}
