use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use crate::services::quiz_session::QuizSession;

pub(crate) type SessionHandle = Arc<AsyncMutex<QuizSession>>;

/// Live quiz sessions keyed by student identifier. Each student gets an
/// independent session behind its own async lock, so one student's requests
/// are applied one at a time and never touch another student's state.
///
/// Only sessions with an attempt in flight stay registered: callers
/// [`release`](Self::release) the entry after each request.
#[derive(Clone, Default)]
pub(crate) struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    /// The registered session, without creating one.
    pub(crate) fn get(&self, student_id: &str) -> Option<SessionHandle> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).get(student_id).cloned()
    }

    /// The registered session, creating an empty one when missing.
    pub(crate) fn session(&self, student_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.entry(student_id.to_string()).or_default().clone()
    }

    /// Unregisters a settled session. The entry is kept while another request
    /// holds a handle to it, since that request may still start an attempt
    /// on it.
    pub(crate) fn release(&self, student_id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = sessions.get(student_id) else {
            return;
        };
        if Arc::strong_count(handle) > 1 {
            return;
        }

        let settled = handle.try_lock().is_ok_and(|session| session.is_settled());
        if settled {
            sessions.remove(student_id);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::quiz_session::Page;
    use crate::test_support::{sample_config, sample_question_set};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    async fn start(registry: &SessionRegistry, student_id: &str) {
        let config = sample_config("Química", "Enlaces", 3);
        let handle = registry.session(student_id);
        let mut session = handle.lock().await;
        let set = sample_question_set(3);
        session.start(&config, Some(&set), &mut StdRng::seed_from_u64(3)).unwrap();
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_student() {
        let registry = SessionRegistry::default();
        start(&registry, "ana").await;

        assert!(registry.get("luis").is_none());
        assert_eq!(registry.session("luis").lock().await.page(), Page::Start);
        assert_eq!(registry.get("ana").unwrap().lock().await.page(), Page::InProgress);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn release_keeps_sessions_in_flight() {
        let registry = SessionRegistry::default();
        start(&registry, "ana").await;
        registry.session("luis");

        registry.release("ana");
        registry.release("luis");
        assert!(registry.get("ana").is_some());
        assert!(registry.get("luis").is_none());

        registry.get("ana").unwrap().lock().await.restart();
        registry.release("ana");
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn release_skips_sessions_held_elsewhere() {
        let registry = SessionRegistry::default();
        let held = registry.session("eva");

        registry.release("eva");
        assert_eq!(registry.len(), 1);

        drop(held);
        registry.release("eva");
        assert_eq!(registry.len(), 0);
    }
}
