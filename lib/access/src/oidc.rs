//! OIDC (OpenID Connect) relying-party configuration.
//!
//! The redirect URI is not part of this configuration: it is derived from the
//! serving address at boot.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Configuration for the OIDC identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
/// When `disabled` is set no provider client is built and every
/// authentication check passes through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Turns federation off entirely.
    #[serde(default)]
    disabled: bool,
    /// The OIDC issuer URL (e.g., "https://auth.example.com/realms/main").
    /// Used for OIDC discovery.
    #[serde(default)]
    issuer_url: String,
    /// The OAuth2 client ID registered with the provider.
    #[serde(default)]
    client_id: String,
    /// The OAuth2 client secret.
    #[serde(default)]
    client_secret: String,
    /// OAuth2 scopes to request as a comma-separated string.
    /// Default: "openid,email,profile"
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Timeout applied to every back-channel call to the provider.
    #[serde(default = "default_http_timeout_seconds")]
    http_timeout_seconds: u64,
}

fn default_scopes() -> String {
    "openid,email,profile".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    10
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            issuer_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scopes: default_scopes(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

impl OidcConfig {
    /// Creates a new OIDC configuration with defaults for optional fields.
    #[must_use]
    pub fn new(issuer_url: String, client_id: String, client_secret: String) -> Self {
        Self {
            issuer_url,
            client_id,
            client_secret,
            ..Self::default()
        }
    }

    /// Creates a configuration that turns authentication off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Returns true if federation is turned off.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the OIDC issuer URL.
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 scopes to request, in configured order without
    /// duplicates or blanks.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        let mut scopes: Vec<&str> = Vec::new();
        for scope in self.scopes.split(',').map(str::trim) {
            if !scope.is_empty() && !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        scopes
    }

    /// Returns the raw scopes string.
    #[must_use]
    pub fn scopes_raw(&self) -> &str {
        &self.scopes
    }

    /// Returns the back-channel timeout.
    #[must_use]
    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_seconds)
    }

    /// Checks the configuration is usable.
    ///
    /// A disabled configuration is always valid.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.disabled {
            return Ok(());
        }
        if self.issuer_url.trim().is_empty() {
            return Err(ConfigurationError::MissingField { field: "issuer_url" });
        }
        if !(self.issuer_url.starts_with("http://") || self.issuer_url.starts_with("https://")) {
            return Err(ConfigurationError::InvalidValue {
                field: "issuer_url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigurationError::MissingField { field: "client_id" });
        }
        if !self.scopes().contains(&"openid") {
            return Err(ConfigurationError::InvalidValue {
                field: "scopes",
                reason: "must include openid".to_string(),
            });
        }
        if self.http_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "http_timeout_seconds",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keycloak() -> OidcConfig {
        OidcConfig::new(
            "https://auth.example.com/realms/main".to_string(),
            "frontgate".to_string(),
            "client-secret".to_string(),
        )
    }

    #[test]
    fn new_config_has_defaults() {
        let config = keycloak();

        assert!(!config.is_disabled());
        assert_eq!(config.issuer_url(), "https://auth.example.com/realms/main");
        assert_eq!(config.client_id(), "frontgate");
        assert_eq!(config.client_secret(), "client-secret");
        assert_eq!(config.scopes(), vec!["openid", "email", "profile"]);
        assert_eq!(config.http_timeout(), std::time::Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn scopes_are_trimmed_and_deduplicated() {
        let json = r#"{
            "issuer_url": "https://auth.example.com",
            "client_id": "my-client",
            "scopes": "openid, email,,openid , profile"
        }"#;

        let config: OidcConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.scopes(), vec!["openid", "email", "profile"]);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let json = r#"{
            "issuer_url": "https://auth.example.com",
            "client_id": "my-client",
            "client_secret": "secret"
        }"#;

        let config: OidcConfig = serde_json::from_str(json).expect("deserialize");
        assert!(!config.is_disabled());
        assert_eq!(config.scopes_raw(), "openid,email,profile");
    }

    #[test]
    fn disabled_config_is_valid_without_provider_details() {
        let config: OidcConfig = serde_json::from_str(r#"{"disabled": true}"#).expect("deserialize");
        assert!(config.is_disabled());
        assert!(config.validate().is_ok());
        assert!(OidcConfig::disabled().validate().is_ok());
    }

    #[test]
    fn validate_requires_issuer_and_client() {
        let missing_issuer = OidcConfig::new(String::new(), "c".to_string(), "s".to_string());
        assert_eq!(
            missing_issuer.validate(),
            Err(ConfigurationError::MissingField { field: "issuer_url" })
        );

        let missing_client = OidcConfig::new(
            "https://auth.example.com".to_string(),
            " ".to_string(),
            "s".to_string(),
        );
        assert_eq!(
            missing_client.validate(),
            Err(ConfigurationError::MissingField { field: "client_id" })
        );
    }

    #[test]
    fn validate_rejects_non_http_issuer() {
        let config = OidcConfig::new("auth.example.com".to_string(), "c".to_string(), "s".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { field: "issuer_url", .. })
        ));
    }

    #[test]
    fn validate_requires_openid_scope() {
        let config = OidcConfig {
            scopes: "email,profile".to_string(),
            ..keycloak()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { field: "scopes", .. })
        ));
    }
}
