use std::sync::Arc;

use crate::core::config::Settings;
use crate::repositories::store::QuizStore;
use crate::services::quiz_generation::RetryPolicy;
use crate::services::session_registry::SessionRegistry;
use crate::services::text_generation::TextGenerator;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn QuizStore>,
    generator: Arc<dyn TextGenerator>,
    sessions: SessionRegistry,
    retry: RetryPolicy,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: Arc<dyn QuizStore>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let retry = RetryPolicy {
            max_attempts: settings.ai().max_attempts,
            delay: settings.ai().retry_delay(),
        };
        Self {
            inner: Arc::new(InnerState {
                settings,
                store,
                generator,
                sessions: SessionRegistry::default(),
                retry,
            }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn QuizStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn generator(&self) -> &dyn TextGenerator {
        self.inner.generator.as_ref()
    }

    pub(crate) fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }
}
