//! The process-wide session manager.

use chrono::{Duration, Utc};
use frontgate_core::SessionId;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SessionStoreError;
use crate::session::Session;
use crate::store::SessionStore;

/// Loads and persists sessions on top of a [`SessionStore`].
///
/// Cloning is cheap; every clone shares the same backend.
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl std::fmt::Debug for Sessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sessions")
            .field("backend", &self.store.backend())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Sessions {
    /// Creates a manager whose records expire `ttl` after their last save.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Name of the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Lifetime granted to a session on each save.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the session for `id`, or a fresh one.
    ///
    /// Never fails: a missing, expired, or unreadable record yields a fresh
    /// session, and backend errors are logged.
    pub async fn get(&self, id: Option<SessionId>) -> Session {
        let Some(id) = id else {
            return Session::fresh();
        };

        match self.store.load(id).await {
            Ok(Some(record)) => Session::from_record(record),
            Ok(None) => {
                debug!(session_id = %id, "session not found, starting fresh");
                Session::fresh()
            }
            Err(e) => {
                warn!(
                    session_id = %id,
                    backend = self.store.backend(),
                    error = %e,
                    "failed to load session, starting fresh"
                );
                Session::fresh()
            }
        }
    }

    /// Re-reads the stored state of a session, bypassing any request copy.
    pub async fn reload(&self, id: SessionId) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.store.load(id).await?.map(Session::from_record))
    }

    /// Persists a session and clears its dirty flag.
    ///
    /// A destroyed session is removed from the backend instead.
    pub async fn save(&self, session: &mut Session) -> Result<(), SessionStoreError> {
        if session.is_destroyed() {
            self.store.delete(session.id()).await?;
        } else {
            let record = session.to_record(Utc::now() + self.ttl);
            self.store.save(&record).await?;
        }
        session.mark_persisted();
        Ok(())
    }

    /// Re-keys a session, deleting the record stored under its old ID.
    ///
    /// Called when the session's privilege changes so an ID handed out
    /// before login cannot be replayed afterwards.
    pub async fn regenerate(&self, session: &mut Session) -> Result<(), SessionStoreError> {
        let was_new = session.is_new();
        let previous = session.regenerate();
        if !was_new {
            self.store.delete(previous).await?;
        }
        debug!(previous = %previous, session_id = %session.id(), "session regenerated");
        Ok(())
    }

    /// Removes every expired record from the backend.
    pub async fn purge_expired(&self) -> Result<u64, SessionStoreError> {
        self.store.delete_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySessionStore;
    use crate::record::SessionRecord;
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl SessionStore for FailingStore {
        fn backend(&self) -> &'static str {
            "failing"
        }

        async fn load(&self, _id: SessionId) -> Result<Option<SessionRecord>, SessionStoreError> {
            Err(SessionStoreError::Backend {
                details: "unreachable".to_string(),
            })
        }

        async fn save(&self, _record: &SessionRecord) -> Result<(), SessionStoreError> {
            Err(SessionStoreError::Backend {
                details: "unreachable".to_string(),
            })
        }

        async fn delete(&self, _id: SessionId) -> Result<(), SessionStoreError> {
            Err(SessionStoreError::Backend {
                details: "unreachable".to_string(),
            })
        }

        async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
            Ok(0)
        }
    }

    fn memory() -> (Arc<MemorySessionStore>, Sessions) {
        let store = Arc::new(MemorySessionStore::new());
        let sessions = Sessions::new(store.clone(), Duration::minutes(30));
        (store, sessions)
    }

    #[tokio::test]
    async fn unreadable_backend_yields_fresh_session() {
        let sessions = Sessions::new(Arc::new(FailingStore), Duration::minutes(30));
        let session = sessions.get(Some(SessionId::new())).await;
        assert!(session.is_new());
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn unknown_id_yields_fresh_session_with_new_id() {
        let (_, sessions) = memory();
        let stale = SessionId::new();
        let session = sessions.get(Some(stale)).await;
        assert!(session.is_new());
        assert_ne!(session.id(), stale);
    }

    #[tokio::test]
    async fn save_persists_and_clears_dirty() {
        let (store, sessions) = memory();
        let mut session = sessions.get(None).await;
        session.put("email", "alice@example.com");

        sessions.save(&mut session).await.expect("save");
        assert!(!session.is_dirty());
        assert!(!session.is_new());
        assert_eq!(store.len().await, 1);

        let loaded = sessions.get(Some(session.id())).await;
        assert_eq!(loaded.get_str("email"), Some("alice@example.com"));
        assert!(!loaded.is_dirty());
    }

    #[tokio::test]
    async fn save_sets_expiry_from_ttl() {
        let (store, sessions) = memory();
        let mut session = sessions.get(None).await;
        session.put("k", "v");
        sessions.save(&mut session).await.expect("save");

        let record = store.records().await.pop().expect("one record");
        let remaining = record.expires_at - Utc::now();
        assert!(remaining > Duration::minutes(29));
        assert!(remaining <= Duration::minutes(30));
    }

    #[tokio::test]
    async fn destroyed_session_is_removed() {
        let (store, sessions) = memory();
        let mut session = sessions.get(None).await;
        session.put("k", "v");
        sessions.save(&mut session).await.expect("save");

        session.destroy();
        sessions.save(&mut session).await.expect("delete");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn failed_save_keeps_session_dirty() {
        let sessions = Sessions::new(Arc::new(FailingStore), Duration::minutes(30));
        let mut session = sessions.get(None).await;
        session.put("k", "v");

        assert!(sessions.save(&mut session).await.is_err());
        assert!(session.is_dirty());
    }

    #[tokio::test]
    async fn regenerate_moves_values_to_a_new_id() {
        let (store, sessions) = memory();
        let mut session = sessions.get(None).await;
        session.put("requested", "/app/ui");
        sessions.save(&mut session).await.expect("save");
        let old = session.id();

        sessions.regenerate(&mut session).await.expect("regenerate");
        assert_ne!(session.id(), old);
        assert!(session.is_dirty());
        assert_eq!(session.get_str("requested"), Some("/app/ui"));
        assert!(store.is_empty().await);

        sessions.save(&mut session).await.expect("save");
        assert!(sessions.reload(old).await.expect("reload").is_none());
        let moved = sessions.get(Some(session.id())).await;
        assert_eq!(moved.get_str("requested"), Some("/app/ui"));
    }

    #[tokio::test]
    async fn regenerating_an_unsaved_session_skips_the_backend() {
        let sessions = Sessions::new(Arc::new(FailingStore), Duration::minutes(30));
        let mut session = sessions.get(None).await;
        let old = session.id();

        sessions.regenerate(&mut session).await.expect("no backend call");
        assert_ne!(session.id(), old);
    }

    #[tokio::test]
    async fn reload_sees_writes_from_other_copies() {
        let (_, sessions) = memory();
        let mut first = sessions.get(None).await;
        first.put("access_token", "a");
        sessions.save(&mut first).await.expect("save");

        let mut second = sessions.get(Some(first.id())).await;
        second.put("access_token", "b");
        sessions.save(&mut second).await.expect("save");

        let reloaded = sessions.reload(first.id()).await.expect("reload").expect("present");
        assert_eq!(reloaded.get_str("access_token"), Some("b"));
    }
}
