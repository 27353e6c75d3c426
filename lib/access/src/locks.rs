//! Per-session refresh serialization.

use frontgate_core::SessionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed locks, one per session ID.
///
/// Refresh tokens are often single-use, so two requests from the same
/// browser must never run the refresh grant at the same time. Entries are
/// dropped once no request holds or waits on them.
#[derive(Debug, Default)]
pub struct RefreshLocks {
    entries: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl RefreshLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`'s refresh.
    pub async fn acquire(&self, id: SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut entries = self.entries.lock().await;
            entries.retain(|_, lock| Arc::strong_count(lock) > 1);
            entries.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of sessions with a live lock entry.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if no session holds or waits on a lock.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_session_is_serialized() {
        let locks = Arc::new(RefreshLocks::new());
        let id = SessionId::new();

        let guard = locks.acquire(id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender acquires after release")
            .expect("task");
    }

    #[tokio::test]
    async fn different_sessions_do_not_block() {
        let locks = RefreshLocks::new();
        let _first = locks.acquire(SessionId::new()).await;
        tokio::time::timeout(Duration::from_secs(1), locks.acquire(SessionId::new()))
            .await
            .expect("independent session is not blocked");
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = RefreshLocks::new();
        drop(locks.acquire(SessionId::new()).await);
        drop(locks.acquire(SessionId::new()).await);
        let _held = locks.acquire(SessionId::new()).await;
        assert_eq!(locks.len().await, 1);
    }
}
