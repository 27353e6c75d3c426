//! The persisted shape of a session.

use chrono::{DateTime, Utc};
use frontgate_core::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A session as stored by a backend.
///
/// Values are kept as JSON so every stored type has a well-defined equality,
/// which the dirty tracking in [`Session`](crate::Session) relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The session identifier.
    pub id: SessionId,
    /// Named session values.
    pub values: BTreeMap<String, Value>,
    /// When the backend should consider the record gone.
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Returns true if the record has passed its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
