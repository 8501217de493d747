use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::submission_lifecycle::ExamEngine;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    engine: ExamEngine,
}

impl AppState {
    pub(crate) fn new(settings: Settings, engine: ExamEngine) -> Self {
        Self { inner: Arc::new(InnerState { settings, engine }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn engine(&self) -> &ExamEngine {
        &self.inner.engine
    }
}
