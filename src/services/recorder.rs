use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tokio::task::JoinHandle;

use crate::core::config::Settings;
use crate::schemas::record::SessionRecord;

/// Sink for finished sessions (persistence, leaderboard placement). A failure
/// here must never block or revert showing the result to the user.
#[async_trait]
pub trait ResultRecorder: Send + Sync {
    async fn record(&self, record: &SessionRecord) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct HttpResultRecorder {
    client: Client,
    base_url: String,
}

impl HttpResultRecorder {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.recorder().timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.recorder().base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ResultRecorder for HttpResultRecorder {
    async fn record(&self, record: &SessionRecord) -> anyhow::Result<()> {
        let url = format!("{}/results", self.base_url);
        self.client
            .post(&url)
            .json(record)
            .send()
            .await
            .context("Failed to send session record")?
            .error_for_status()
            .context("Recorder sink rejected session record")?;
        Ok(())
    }
}

/// Fire-and-forget persistence: spawned off the session loop so the
/// user-visible completion never waits on it. Failures are logged and
/// swallowed.
pub fn record_in_background(
    recorder: Arc<dyn ResultRecorder>,
    record: SessionRecord,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = recorder.record(&record).await {
            tracing::error!(
                session_id = %record.session_id,
                exam_id = %record.exam_id,
                error = %err,
                "Failed to record session result"
            );
            return;
        }
        metrics::counter!("session_results_recorded_total").increment(1);
        tracing::info!(
            session_id = %record.session_id,
            score_percent = record.score_percent,
            "Session result recorded"
        );
    })
}
