//! Error types for session backends.

use std::fmt;

/// Errors raised by a [`SessionStore`](crate::SessionStore) backend.
///
/// These never reach the browser: reads degrade to a fresh session and
/// writes are logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// The backend could not be reached or rejected the operation.
    Backend { details: String },
    /// A stored record could not be decoded.
    Corrupt { session_id: String, reason: String },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { details } => write!(f, "session backend error: {details}"),
            Self::Corrupt { session_id, reason } => {
                write!(f, "session '{session_id}' is corrupt: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionStoreError {}

impl From<sqlx::Error> for SessionStoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Backend {
            details: e.to_string(),
        }
    }
}
