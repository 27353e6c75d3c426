//! Error types for repository operations.

use std::fmt;

/// Errors from repository operations.
///
/// `NotFound` and `AlreadyExists` are domain outcomes the HTTP layer maps to
/// 404 and 409. The rest are infrastructure failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No record with this name exists.
    NotFound { name: String },
    /// A record with this name already exists.
    AlreadyExists { name: String },
    /// The backend is unreachable.
    NotConnected { details: String },
    /// The backend rejected the operation.
    Backend { details: String },
}

impl RepositoryError {
    /// Returns true for outcomes caused by the request rather than the backend.
    #[must_use]
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::AlreadyExists { .. })
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "example '{name}' not found"),
            Self::AlreadyExists { name } => write!(f, "example '{name}' already exists"),
            Self::NotConnected { details } => write!(f, "repository not connected: {details}"),
            Self::Backend { details } => write!(f, "repository error: {details}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::NotConnected {
                    details: e.to_string(),
                }
            }
            other => Self::Backend {
                details: other.to_string(),
            },
        }
    }
}
