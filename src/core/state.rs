use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::catalog::{ExamCatalog, HttpExamCatalog};
use crate::services::recorder::{HttpResultRecorder, ResultRecorder};
use crate::services::scoring::{HttpScoringGateway, ScoringGateway};
use crate::session::proctoring::EnvironmentControl;

/// Shared dependency bundle handed to every session runtime. Cloning is cheap;
/// all fields live behind one `Arc`.
#[derive(Clone)]
pub struct SessionServices {
    inner: Arc<InnerServices>,
}

struct InnerServices {
    settings: Settings,
    catalog: Arc<dyn ExamCatalog>,
    scoring: Arc<dyn ScoringGateway>,
    recorder: Arc<dyn ResultRecorder>,
    environment: Arc<dyn EnvironmentControl>,
}

impl SessionServices {
    pub fn new(
        settings: Settings,
        catalog: Arc<dyn ExamCatalog>,
        scoring: Arc<dyn ScoringGateway>,
        recorder: Arc<dyn ResultRecorder>,
        environment: Arc<dyn EnvironmentControl>,
    ) -> Self {
        Self { inner: Arc::new(InnerServices { settings, catalog, scoring, recorder, environment }) }
    }

    /// Wires the HTTP-backed boundary clients from `Settings`. The environment
    /// control handle always comes from the embedding UI shell.
    pub fn from_settings(
        settings: Settings,
        environment: Arc<dyn EnvironmentControl>,
    ) -> anyhow::Result<Self> {
        let catalog = Arc::new(HttpExamCatalog::from_settings(&settings)?);
        let scoring = Arc::new(HttpScoringGateway::from_settings(&settings)?);
        let recorder = Arc::new(HttpResultRecorder::from_settings(&settings)?);
        Ok(Self::new(settings, catalog, scoring, recorder, environment))
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn catalog(&self) -> &dyn ExamCatalog {
        self.inner.catalog.as_ref()
    }

    pub fn scoring(&self) -> &dyn ScoringGateway {
        self.inner.scoring.as_ref()
    }

    pub fn recorder(&self) -> Arc<dyn ResultRecorder> {
        self.inner.recorder.clone()
    }

    pub fn environment(&self) -> Arc<dyn EnvironmentControl> {
        self.inner.environment.clone()
    }
}
