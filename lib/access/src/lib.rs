//! Authentication for frontgate.
//!
//! This crate provides:
//! - `OidcConfig`: the relying-party configuration
//! - `IdentityProvider`: the contract the gateway needs from an OIDC provider
//! - `TokenSet`, `UserProfile`, `Introspection`: what the provider hands back,
//!   and how it is written into a session
//! - `inspect_and_renew`: the per-request token check, serialized per session
//!   by `RefreshLocks`
//!
//! # Example
//!
//! ```
//! use frontgate_access::{OidcConfig, TokenSet};
//! use frontgate_session::Session;
//!
//! let config = OidcConfig::new(
//!     "https://auth.example.com/realms/main".to_string(),
//!     "frontgate".to_string(),
//!     "secret".to_string(),
//! );
//! assert!(config.validate().is_ok());
//!
//! let mut session = Session::fresh();
//! TokenSet::new("access".to_string())
//!     .with_refresh_token(Some("refresh".to_string()))
//!     .write_to(&mut session);
//! assert!(session.is_dirty());
//! assert_eq!(TokenSet::from_session(&session).map(|t| t.access_token), Some("access".to_string()));
//! ```

pub mod error;
pub mod locks;
pub mod oidc;
pub mod provider;
pub mod renew;
pub mod tokens;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{AuthenticationError, ConfigurationError};
pub use locks::RefreshLocks;
pub use oidc::OidcConfig;
pub use provider::{AuthState, Authenticated, IdentityProvider, LoginRedirect};
pub use renew::{TokenState, clear_tokens, inspect_and_renew};
pub use tokens::{Introspection, TokenSet, UserProfile, keys};
