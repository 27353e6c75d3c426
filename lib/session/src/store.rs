//! The session backend contract.

use async_trait::async_trait;
use frontgate_core::SessionId;

use crate::error::SessionStoreError;
use crate::record::SessionRecord;

/// A backend that persists session records keyed by session ID.
///
/// Implementations must treat expired records as absent on load. Access is
/// always keyed by ID, so concurrent requests for different sessions never
/// interfere with each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    /// Loads a record, returning `None` if it is absent or expired.
    async fn load(&self, id: SessionId) -> Result<Option<SessionRecord>, SessionStoreError>;

    /// Inserts or replaces a record.
    async fn save(&self, record: &SessionRecord) -> Result<(), SessionStoreError>;

    /// Removes a record. Removing an absent record is not an error.
    async fn delete(&self, id: SessionId) -> Result<(), SessionStoreError>;

    /// Removes every expired record, returning how many were removed.
    async fn delete_expired(&self) -> Result<u64, SessionStoreError>;
}
