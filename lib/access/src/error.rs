//! Error types for the access crate.
//!
//! - `AuthenticationError`: failures talking to the provider or verifying
//!   what it returned. The HTTP layer turns all of these into a redirect to
//!   login.
//! - `ConfigurationError`: invalid relying-party settings, fatal at boot.

use std::fmt;

/// Errors from authentication operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The state returned by the provider does not match the one issued.
    StateMismatch,
    /// No pending login state accompanied the callback.
    MissingAuthState,
    /// The authorization code could not be exchanged for tokens.
    CodeExchange { reason: String },
    /// A token returned by the provider failed validation.
    InvalidToken { reason: String },
    /// A required claim is missing from the ID token.
    MissingClaim { claim: String },
    /// The introspection request failed.
    Introspection { reason: String },
    /// The refresh-token grant failed.
    Refresh { reason: String },
    /// The provider could not be reached or answered with an error.
    ProviderError { provider: String, reason: String },
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateMismatch => write!(f, "authorization state mismatch"),
            Self::MissingAuthState => write!(f, "no pending authorization state"),
            Self::CodeExchange { reason } => write!(f, "code exchange failed: {reason}"),
            Self::InvalidToken { reason } => write!(f, "invalid token: {reason}"),
            Self::MissingClaim { claim } => write!(f, "missing required claim: {claim}"),
            Self::Introspection { reason } => write!(f, "introspection failed: {reason}"),
            Self::Refresh { reason } => write!(f, "token refresh failed: {reason}"),
            Self::ProviderError { provider, reason } => {
                write!(f, "OIDC provider '{provider}' error: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors in relying-party configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A required setting is absent or empty.
    MissingField { field: &'static str },
    /// A setting is present but unusable.
    InvalidValue { field: &'static str, reason: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "missing required setting: {field}"),
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid value for {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_exchange_display() {
        let err = AuthenticationError::CodeExchange {
            reason: "invalid_grant".to_string(),
        };
        assert!(err.to_string().contains("code exchange"));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[test]
    fn provider_error_display() {
        let err = AuthenticationError::ProviderError {
            provider: "keycloak".to_string(),
            reason: "connection timeout".to_string(),
        };
        assert!(err.to_string().contains("keycloak"));
        assert!(err.to_string().contains("connection timeout"));
    }

    #[test]
    fn configuration_error_display() {
        let missing = ConfigurationError::MissingField { field: "issuer_url" };
        assert!(missing.to_string().contains("issuer_url"));

        let invalid = ConfigurationError::InvalidValue {
            field: "scopes",
            reason: "must include openid".to_string(),
        };
        assert!(invalid.to_string().contains("scopes"));
        assert!(invalid.to_string().contains("openid"));
    }
}
