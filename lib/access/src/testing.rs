//! A scripted in-process provider for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! downstream test suites.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::AuthenticationError;
use crate::provider::{AuthState, Authenticated, IdentityProvider, LoginRedirect};
use crate::tokens::{Introspection, TokenSet, UserProfile};

/// Provider double that mints sequential tokens and tracks which are active.
#[derive(Debug)]
pub struct ScriptedProvider {
    issuer: String,
    end_session_endpoint: Option<String>,
    profile: UserProfile,
    minted: AtomicUsize,
    active: Mutex<HashSet<String>>,
    refresh_delay: Mutex<Duration>,
    refresh_failing: AtomicBool,
    introspection_failing: AtomicBool,
    refresh_calls: AtomicUsize,
    introspect_calls: AtomicUsize,
}

impl ScriptedProvider {
    /// The only authorization code [`IdentityProvider::exchange_code`] accepts.
    pub const VALID_CODE: &'static str = "valid-code";

    #[must_use]
    pub fn new(issuer: &str) -> Self {
        let mut profile = UserProfile::new("user-1".to_string());
        profile.email = Some("alice@example.com".to_string());
        profile.given_name = Some("Alice".to_string());
        profile.family_name = Some("Liddell".to_string());
        profile.name = Some("Alice Liddell".to_string());
        profile.preferred_username = Some("alice".to_string());

        Self {
            issuer: issuer.trim_end_matches('/').to_string(),
            end_session_endpoint: None,
            profile,
            minted: AtomicUsize::new(0),
            active: Mutex::new(HashSet::new()),
            refresh_delay: Mutex::new(Duration::ZERO),
            refresh_failing: AtomicBool::new(false),
            introspection_failing: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            introspect_calls: AtomicUsize::new(0),
        }
    }

    /// Advertises an end-session endpoint.
    #[must_use]
    pub fn with_end_session_endpoint(mut self, endpoint: &str) -> Self {
        self.end_session_endpoint = Some(endpoint.to_string());
        self
    }

    /// Marks an access token inactive.
    pub fn expire(&self, access_token: &str) {
        self.active_tokens().remove(access_token);
    }

    pub fn set_refresh_failing(&self, failing: bool) {
        self.refresh_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_introspection_failing(&self, failing: bool) {
        self.introspection_failing.store(failing, Ordering::SeqCst);
    }

    /// Delays every refresh grant, to widen race windows.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn introspect_calls(&self) -> usize {
        self.introspect_calls.load(Ordering::SeqCst)
    }

    fn active_tokens(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mint(&self) -> TokenSet {
        let n = self.minted.fetch_add(1, Ordering::SeqCst) + 1;
        let tokens = TokenSet::new(format!("access-{n}"))
            .with_refresh_token(Some(format!("refresh-{n}")))
            .with_id_token(Some(format!("id-{n}")))
            .with_session_state(Some(format!("state-{n}")));
        self.active_tokens().insert(tokens.access_token.clone());
        tokens
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    fn issuer_url(&self) -> &str {
        &self.issuer
    }

    fn authorization_url(&self, requested_url: &str) -> LoginRedirect {
        let n = self.minted.load(Ordering::SeqCst);
        let csrf_token = format!("csrf-{n}");
        LoginRedirect {
            authorization_url: format!("{}/authorize?state={csrf_token}", self.issuer),
            state: AuthState {
                csrf_token,
                pkce_verifier: format!("verifier-{n}"),
                nonce: format!("nonce-{n}"),
                requested_url: requested_url.to_string(),
            },
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        _state: &AuthState,
    ) -> Result<Authenticated, AuthenticationError> {
        if code != Self::VALID_CODE {
            return Err(AuthenticationError::CodeExchange {
                reason: "invalid_grant".to_string(),
            });
        }
        Ok(Authenticated {
            tokens: self.mint(),
            profile: self.profile.clone(),
        })
    }

    async fn introspect(&self, access_token: &str) -> Result<Introspection, AuthenticationError> {
        self.introspect_calls.fetch_add(1, Ordering::SeqCst);
        if self.introspection_failing.load(Ordering::SeqCst) {
            return Err(AuthenticationError::Introspection {
                reason: "connection refused".to_string(),
            });
        }
        Ok(Introspection {
            active: self.active_tokens().contains(access_token),
            expires_at: None,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthenticationError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.refresh_failing.load(Ordering::SeqCst) || !refresh_token.starts_with("refresh-") {
            return Err(AuthenticationError::Refresh {
                reason: "invalid_grant".to_string(),
            });
        }
        Ok(self.mint())
    }

    fn end_session_url(
        &self,
        id_token_hint: Option<&str>,
        session_state: Option<&str>,
        post_logout_redirect: &str,
    ) -> Option<String> {
        let endpoint = self.end_session_endpoint.as_ref()?;
        let mut url = format!("{endpoint}?post_logout_redirect_uri={post_logout_redirect}");
        if let Some(hint) = id_token_hint {
            url.push_str("&id_token_hint=");
            url.push_str(hint);
        }
        if let Some(state) = session_state {
            url.push_str("&session_state=");
            url.push_str(state);
        }
        Some(url)
    }
}
