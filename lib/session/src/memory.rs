//! Process-local session store.

use async_trait::async_trait;
use frontgate_core::SessionId;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::SessionStoreError;
use crate::record::SessionRecord;
use crate::store::SessionStore;

/// Volatile session store backed by a map.
///
/// Sessions live for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of every stored record.
    pub async fn records(&self) -> Vec<SessionRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, id: SessionId) -> Result<Option<SessionRecord>, SessionStoreError> {
        let records = self.records.read().await;
        Ok(records
            .get(&id)
            .filter(|record| !record.is_expired())
            .cloned())
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), SessionStoreError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), SessionStoreError> {
        self.records.write().await.remove(&id);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired());
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn record(expires_in: Duration) -> SessionRecord {
        let mut values = BTreeMap::new();
        values.insert("access_token".to_string(), Value::from("tok"));
        SessionRecord {
            id: SessionId::new(),
            values,
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemorySessionStore::new();
        let record = record(Duration::minutes(5));

        store.save(&record).await.expect("save");
        let loaded = store.load(record.id).await.expect("load");
        assert_eq!(loaded, Some(record));
    }

    #[tokio::test]
    async fn expired_records_load_as_absent() {
        let store = MemorySessionStore::new();
        let record = record(Duration::seconds(-1));

        store.save(&record).await.expect("save");
        assert_eq!(store.load(record.id).await.expect("load"), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemorySessionStore::new();
        let record = record(Duration::minutes(5));
        store.save(&record).await.expect("save");

        store.delete(record.id).await.expect("first delete");
        store.delete(record.id).await.expect("second delete");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_expired_only_removes_expired() {
        let store = MemorySessionStore::new();
        let live = record(Duration::minutes(5));
        store.save(&live).await.expect("save live");
        store
            .save(&record(Duration::seconds(-5)))
            .await
            .expect("save expired");

        assert_eq!(store.delete_expired().await.expect("sweep"), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.load(live.id).await.expect("load").is_some());
    }
}
