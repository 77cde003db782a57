use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::core::config::Settings;
use crate::schemas::score::{ScoreOutcome, ScoreRequest, ScoreResponse, SubmissionJob};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring request failed: {0}")]
    Transport(String),
    #[error("scoring request rejected: {0}")]
    Validation(String),
    #[error("exam already attempted")]
    AlreadyAttempted,
    #[error("malformed scoring response: {0}")]
    InvalidResponse(String),
}

impl ScoringError {
    /// Only transport-level failures (network, timeout) are worth a
    /// user-initiated retry; the rest are contract or policy rejections a
    /// resend cannot fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScoringError::Transport(_))
    }
}

/// The single authority on correctness. The client never holds correct
/// answers while an exam is open; this call both scores and reveals them.
#[async_trait]
pub trait ScoringGateway: Send + Sync {
    /// Sends a frozen answer set and returns the authoritative score. The
    /// endpoint is expected to be idempotent per (student, exam): the caller
    /// may legitimately resend the same job after a failed attempt whose
    /// server-side effect is unknown.
    async fn submit(&self, job: &SubmissionJob) -> Result<ScoreOutcome, ScoringError>;
}

#[derive(Debug, Clone)]
pub struct HttpScoringGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpScoringGateway {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.scoring().timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.scoring().base_url.trim_end_matches('/').to_string(),
            api_key: settings.scoring().api_key.clone(),
        })
    }
}

#[async_trait]
impl ScoringGateway for HttpScoringGateway {
    // One send per call: retries are user-initiated, never automatic, to keep
    // duplicate-submission ambiguity out of the client.
    async fn submit(&self, job: &SubmissionJob) -> Result<ScoreOutcome, ScoringError> {
        let timer = Instant::now();
        let url = format!("{}/exams/{}/score", self.base_url, job.exam_id);
        let payload = ScoreRequest {
            exam_id: &job.exam_id,
            session_id: &job.session_id,
            answers: &job.answers,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ScoringError::Transport(err.to_string()))?;

        let status = response.status();
        let body =
            response.text().await.map_err(|err| ScoringError::Transport(err.to_string()))?;

        let outcome = match status {
            StatusCode::OK => serde_json::from_str::<ScoreResponse>(&body)
                .map_err(|err| ScoringError::InvalidResponse(err.to_string()))?
                .into_outcome(),
            // One-attempt policy: a conflict that still carries a scored body
            // means "scored but not persisted".
            StatusCode::CONFLICT => match serde_json::from_str::<ScoreResponse>(&body) {
                Ok(parsed) => {
                    let mut outcome = parsed.into_outcome();
                    outcome.recorded = false;
                    outcome
                }
                Err(_) => return Err(ScoringError::AlreadyAttempted),
            },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                return Err(ScoringError::Validation(body));
            }
            status => {
                return Err(ScoringError::Transport(format!("scoring endpoint returned {status}")));
            }
        };

        tracing::info!(
            exam_id = %job.exam_id,
            session_id = %job.session_id,
            duration_seconds = timer.elapsed().as_secs_f64(),
            recorded = outcome.recorded,
            "Score received"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(ScoringError::Transport("connection reset".to_string()).is_retryable());
        assert!(!ScoringError::Validation("bad payload".to_string()).is_retryable());
        assert!(!ScoringError::AlreadyAttempted.is_retryable());
        assert!(!ScoringError::InvalidResponse("missing field".to_string()).is_retryable());
    }
}
