//! The contract the gateway needs from an OIDC provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthenticationError;
use crate::tokens::{Introspection, TokenSet, UserProfile};

/// Pending login state, carried from login to callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    /// Anti-forgery token sent as the `state` parameter.
    pub csrf_token: String,
    /// PKCE code verifier for the token request.
    pub pkce_verifier: String,
    /// Nonce the ID token must echo.
    pub nonce: String,
    /// Where to send the browser once authenticated.
    pub requested_url: String,
}

impl AuthState {
    /// Checks the `state` parameter returned by the provider.
    pub fn verify(&self, returned_state: &str) -> Result<(), AuthenticationError> {
        let expected = self.csrf_token.as_bytes();
        let actual = returned_state.as_bytes();
        let differs = expected.len() != actual.len()
            || expected
                .iter()
                .zip(actual)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                != 0;
        if differs || expected.is_empty() {
            return Err(AuthenticationError::StateMismatch);
        }
        Ok(())
    }
}

/// Where to send the browser to start a login, and the state to keep.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub authorization_url: String,
    pub state: AuthState,
}

/// Result of a successful code exchange.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub tokens: TokenSet,
    pub profile: UserProfile,
}

/// An OIDC provider as seen by the relying party.
///
/// One instance is built at boot and shared read-only by every request.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The issuer this provider was discovered from.
    fn issuer_url(&self) -> &str;

    /// Builds the authorization URL for a new login.
    fn authorization_url(&self, requested_url: &str) -> LoginRedirect;

    /// Exchanges an authorization code for tokens and the user's profile.
    async fn exchange_code(
        &self,
        code: &str,
        state: &AuthState,
    ) -> Result<Authenticated, AuthenticationError>;

    /// Asks the provider whether an access token is still active.
    async fn introspect(&self, access_token: &str) -> Result<Introspection, AuthenticationError>;

    /// Runs a refresh-token grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthenticationError>;

    /// The end-session URL, if the provider advertises one.
    ///
    /// `session_state` is the value the provider sent with the login
    /// callback.
    fn end_session_url(
        &self,
        id_token_hint: Option<&str>,
        session_state: Option<&str>,
        post_logout_redirect: &str,
    ) -> Option<String>;
}
