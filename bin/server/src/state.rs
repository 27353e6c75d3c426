//! Process-wide singletons shared by every request.

use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use frontgate_access::{IdentityProvider, RefreshLocks};
use frontgate_health::HealthAggregator;
use frontgate_repository::ExampleRepository;
use frontgate_session::Sessions;
use std::sync::Arc;

use crate::config::{SameSiteSetting, ServeConfig, SessionConfig};
use crate::metrics::RequestMetrics;

/// Name of the short-lived cookie carrying pending login state.
pub const AUTH_STATE_COOKIE: &str = "auth_state";

/// Cookie attributes derived from configuration.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub path: String,
    pub max_age: Option<time::Duration>,
    pub http_only: bool,
    pub domain: Option<String>,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl CookieSettings {
    #[must_use]
    pub fn from_config(session: &SessionConfig, serve: &ServeConfig) -> Self {
        Self {
            name: session.name.clone(),
            path: serve.context_root.clone(),
            max_age: (session.max_age_seconds > 0)
                .then(|| time::Duration::seconds(session.max_age_seconds)),
            http_only: session.http_only,
            domain: session.domain.clone(),
            secure: session.secure,
            same_site: match session.same_site {
                SameSiteSetting::Strict => Some(SameSite::Strict),
                SameSiteSetting::Lax => Some(SameSite::Lax),
                SameSiteSetting::None => Some(SameSite::None),
                SameSiteSetting::Default => None,
            },
        }
    }

    /// The session cookie carrying `value`.
    #[must_use]
    pub fn session_cookie(&self, value: String) -> Cookie<'static> {
        self.apply(Cookie::new(self.name.clone(), value), self.max_age)
    }

    /// A cookie that clears the session cookie.
    #[must_use]
    pub fn session_removal(&self) -> Cookie<'static> {
        self.scoped(self.name.clone())
    }

    /// The login-state cookie carrying `value`, valid for ten minutes.
    #[must_use]
    pub fn auth_state_cookie(&self, value: String) -> Cookie<'static> {
        self.apply(
            Cookie::new(AUTH_STATE_COOKIE, value),
            Some(time::Duration::minutes(10)),
        )
    }

    /// A cookie that clears the login-state cookie.
    #[must_use]
    pub fn auth_state_removal(&self) -> Cookie<'static> {
        self.scoped(AUTH_STATE_COOKIE.to_string())
    }

    fn scoped(&self, name: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(name, "");
        cookie.set_path(self.path.clone());
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }

    fn apply(
        &self,
        mut cookie: Cookie<'static>,
        max_age: Option<time::Duration>,
    ) -> Cookie<'static> {
        cookie.set_path(self.path.clone());
        cookie.set_http_only(self.http_only);
        cookie.set_secure(self.secure);
        if let Some(max_age) = max_age {
            cookie.set_max_age(max_age);
        }
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        if let Some(same_site) = self.same_site {
            cookie.set_same_site(same_site);
        }
        cookie
    }
}

/// Shared application state.
///
/// Built once at boot. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub serve: Arc<ServeConfig>,
    pub cookies: Arc<CookieSettings>,
    pub key: Key,
    pub sessions: Sessions,
    /// `None` when OIDC is disabled.
    pub provider: Option<Arc<dyn IdentityProvider>>,
    pub refresh_locks: Arc<RefreshLocks>,
    pub repository: Arc<dyn ExampleRepository>,
    pub health: HealthAggregator,
    pub metrics: Arc<RequestMetrics>,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}
