//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables
//! (`SERVE__PORT`, `SESSION__NAME`, `OIDC__ISSUER_URL`, `DATABASE_URL`, ...).
//!
//! See [`OidcConfig`](frontgate_access::OidcConfig) for OIDC authentication
//! configuration.

use frontgate_access::{ConfigurationError, OidcConfig};
use serde::Deserialize;
use std::time::Duration;

/// Minimum session key length accepted by the cookie encryption key.
pub const MIN_SESSION_KEY_BYTES: usize = 64;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listener and URL layout.
    pub serve: ServeConfig,

    /// Session cookie and backend configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// OIDC authentication configuration.
    #[serde(default)]
    pub oidc: OidcConfig,

    /// Example repository configuration.
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Health probe configuration.
    #[serde(default)]
    pub health: HealthConfig,

    /// PostgreSQL connection URL, required by any postgres backend.
    #[serde(default)]
    pub database_url: Option<String>,
}

/// Listener and URL layout.
#[derive(Debug, Clone, Deserialize)]
pub struct ServeConfig {
    /// Scheme used in externally visible URLs.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Host used in externally visible URLs.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listening port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the listener binds to.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Prefix of every functional route, e.g. `/app`.
    pub context_root: String,

    /// Prefix of health and metrics routes.
    #[serde(default = "default_non_functional_root")]
    pub non_functional_root: String,

    /// Directory served under `{context_root}/ui/`.
    #[serde(default = "default_static_path")]
    pub static_path: String,
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_non_functional_root() -> String {
    "/g".to_string()
}

fn default_static_path() -> String {
    "static".to_string()
}

impl ServeConfig {
    /// Creates a layout with defaults for everything but the context root.
    #[must_use]
    pub fn new(context_root: &str) -> Self {
        Self {
            protocol: default_protocol(),
            host: default_host(),
            port: default_port(),
            bind_host: default_bind_host(),
            context_root: context_root.to_string(),
            non_functional_root: default_non_functional_root(),
            static_path: default_static_path(),
        }
    }

    /// `{protocol}://{host}:{port}`
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// The OIDC redirect URI, `{base_url}{context_root}/auth/callback`.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}{}/auth/callback", self.base_url(), self.context_root)
    }

    /// Path of a functional route.
    #[must_use]
    pub fn path(&self, suffix: &str) -> String {
        format!("{}{}", self.context_root, suffix)
    }

    /// `{bind_host}:{port}`
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie encryption key, at least 64 bytes. Generated at boot when
    /// absent, which invalidates every cookie on restart.
    #[serde(default)]
    pub key: Option<String>,

    /// Session cookie name.
    #[serde(default = "default_cookie_name")]
    pub name: String,

    /// Cookie Max-Age in seconds; 0 makes it a browser-session cookie.
    #[serde(default)]
    pub max_age_seconds: i64,

    #[serde(default = "default_true")]
    pub http_only: bool,

    #[serde(default)]
    pub domain: Option<String>,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    #[serde(default = "default_true")]
    pub secure: bool,

    #[serde(default)]
    pub same_site: SameSiteSetting,

    /// Where session records live.
    #[serde(default)]
    pub backend: Backend,

    /// Lifetime of a session record after its last save, in minutes.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,

    /// Interval between expired-session sweeps, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

fn default_cookie_name() -> String {
    "frontgate.sid".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ttl_minutes() -> i64 {
    60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: None,
            name: default_cookie_name(),
            max_age_seconds: 0,
            http_only: true,
            domain: None,
            secure: true,
            same_site: SameSiteSetting::default(),
            backend: Backend::default(),
            ttl_minutes: default_ttl_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_minutes)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

/// The cookie SameSite attribute. `Default` omits the attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SameSiteSetting {
    #[serde(alias = "strict", alias = "STRICT")]
    Strict,
    #[default]
    #[serde(alias = "lax", alias = "LAX")]
    Lax,
    #[serde(alias = "none", alias = "NONE")]
    None,
    #[serde(alias = "default", alias = "DEFAULT")]
    Default,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Postgres,
}

/// Example repository configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default)]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            max_connections: default_max_connections(),
            min_connections: 0,
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Timeout applied to each probe, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl HealthConfig {
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or malformed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Checks every setting that would otherwise fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_root("serve.context_root", &self.serve.context_root)?;
        validate_root("serve.non_functional_root", &self.serve.non_functional_root)?;
        if self.serve.context_root == self.serve.non_functional_root {
            return Err(ConfigurationError::InvalidValue {
                field: "serve.non_functional_root",
                reason: "must differ from the context root".to_string(),
            });
        }

        if self
            .session
            .key
            .as_ref()
            .is_some_and(|key| key.len() < MIN_SESSION_KEY_BYTES)
        {
            return Err(ConfigurationError::InvalidValue {
                field: "session.key",
                reason: format!("must be at least {MIN_SESSION_KEY_BYTES} bytes"),
            });
        }
        if self.session.name.trim().is_empty() {
            return Err(ConfigurationError::MissingField {
                field: "session.name",
            });
        }
        if self.session.ttl_minutes <= 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "session.ttl_minutes",
                reason: "must be positive".to_string(),
            });
        }
        if self.session.cleanup_interval_seconds == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "session.cleanup_interval_seconds",
                reason: "must be positive".to_string(),
            });
        }

        let needs_database = self.session.backend == Backend::Postgres
            || self.repository.backend == Backend::Postgres;
        let has_database = self
            .database_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        if needs_database && !has_database {
            return Err(ConfigurationError::MissingField {
                field: "database_url",
            });
        }

        if self.health.probe_timeout_ms == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "health.probe_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }

        self.oidc.validate()
    }
}

fn validate_root(field: &'static str, root: &str) -> Result<(), ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidValue {
        field,
        reason: reason.to_string(),
    };
    if root.is_empty() {
        return Err(ConfigurationError::MissingField { field });
    }
    if !root.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if root.len() == 1 || root.ends_with('/') {
        return Err(invalid("must not be '/' or end with '/'"));
    }
    if root.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ServerConfig {
        ServerConfig {
            serve: ServeConfig::new("/app"),
            session: SessionConfig::default(),
            oidc: OidcConfig::disabled(),
            repository: RepositoryConfig::default(),
            health: HealthConfig::default(),
            database_url: None,
        }
    }

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.name, "frontgate.sid");
        assert_eq!(config.ttl_minutes, 60);
        assert_eq!(config.cleanup_interval_seconds, 300);
        assert_eq!(config.same_site, SameSiteSetting::Lax);
        assert_eq!(config.backend, Backend::Memory);
        assert!(config.http_only);
    }

    #[test]
    fn urls_follow_serve_layout() {
        let serve = ServeConfig::new("/app");
        assert_eq!(serve.base_url(), "http://localhost:8080");
        assert_eq!(
            serve.redirect_uri(),
            "http://localhost:8080/app/auth/callback"
        );
        assert_eq!(serve.path("/ui"), "/app/ui");
        assert_eq!(serve.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn context_root_must_be_rooted() {
        for root in ["", "app", "/", "/app/", "/my app"] {
            let mut config = valid();
            config.serve.context_root = root.to_string();
            assert!(config.validate().is_err(), "{root:?} should be rejected");
        }
    }

    #[test]
    fn roots_must_differ() {
        let mut config = valid();
        config.serve.non_functional_root = "/app".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_session_key_is_rejected() {
        let mut config = valid();
        config.session.key = Some("too-short".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue {
                field: "session.key",
                ..
            })
        ));

        config.session.key = Some("k".repeat(MIN_SESSION_KEY_BYTES));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let mut config = valid();
        config.repository.backend = Backend::Postgres;
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::MissingField {
                field: "database_url"
            })
        );

        config.database_url = Some("postgres://localhost/frontgate".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn enabled_oidc_is_validated() {
        let mut config = valid();
        config.oidc = OidcConfig::new(String::new(), "client".to_string(), "secret".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn same_site_accepts_any_case() {
        let parsed: SameSiteSetting = serde_json::from_str("\"strict\"").expect("lowercase");
        assert_eq!(parsed, SameSiteSetting::Strict);
        let parsed: SameSiteSetting = serde_json::from_str("\"None\"").expect("pascal");
        assert_eq!(parsed, SameSiteSetting::None);
    }
}
