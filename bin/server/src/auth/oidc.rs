//! OIDC relying party backed by the openidconnect crate.
//!
//! Discovery runs once at boot. Introspection and end-session endpoints are
//! not part of the core discovery metadata the crate models, so they are read
//! from the same discovery document separately.

use async_trait::async_trait;
use chrono::DateTime;
use frontgate_access::{
    AuthState, Authenticated, AuthenticationError, IdentityProvider, Introspection,
    LoginRedirect, OidcConfig, TokenSet, UserProfile,
};
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreIdToken, CoreIdTokenClaims, CoreProviderMetadata,
    CoreUserInfoClaims,
};
use openidconnect::{
    AccessToken, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointMaybeSet,
    EndpointNotSet, EndpointSet, IssuerUrl, Nonce, OAuth2TokenResponse, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse,
};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

type DiscoveredClient = CoreClient<
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

/// The endpoints read from the discovery document beyond the core metadata.
#[derive(Debug, Default, Deserialize)]
struct ExtraMetadata {
    introspection_endpoint: Option<String>,
    end_session_endpoint: Option<String>,
}

/// OIDC client for authenticating users.
pub struct OidcClient {
    client: DiscoveredClient,
    http: reqwest::Client,
    issuer_url: String,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    introspection_endpoint: Option<String>,
    end_session_endpoint: Option<String>,
}

impl OidcClient {
    /// Discovers the provider and builds a client redirecting to `redirect_uri`.
    pub async fn discover(config: &OidcConfig, redirect_uri: String) -> Result<Self, OidcError> {
        let issuer_url = IssuerUrl::new(config.issuer_url().to_string())
            .map_err(|e| OidcError::Configuration(format!("invalid issuer URL: {e}")))?;
        let redirect_url = RedirectUrl::new(redirect_uri)
            .map_err(|e| OidcError::Configuration(format!("invalid redirect URI: {e}")))?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| OidcError::Configuration(format!("failed to create HTTP client: {e}")))?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http)
            .await
            .map_err(|e| OidcError::Discovery(format!("failed to discover provider: {e}")))?;

        let extra = fetch_extra_metadata(&http, config.issuer_url()).await;
        if extra.introspection_endpoint.is_none() {
            warn!(issuer = %config.issuer_url(), "provider advertises no introspection endpoint");
        }

        let client = CoreClient::from_provider_metadata(
            provider_metadata,
            ClientId::new(config.client_id().to_string()),
            Some(ClientSecret::new(config.client_secret().to_string())),
        )
        .set_redirect_uri(redirect_url);

        Ok(Self {
            client,
            http,
            issuer_url: config.issuer_url().to_string(),
            client_id: config.client_id().to_string(),
            client_secret: config.client_secret().to_string(),
            scopes: config.scopes().into_iter().map(str::to_string).collect(),
            introspection_endpoint: extra.introspection_endpoint,
            end_session_endpoint: extra.end_session_endpoint,
        })
    }

    async fn user_info(&self, access_token: &AccessToken) -> Result<Option<CoreUserInfoClaims>, AuthenticationError> {
        let Ok(request) = self.client.user_info(access_token.clone(), None) else {
            return Ok(None);
        };
        let claims: CoreUserInfoClaims = request.request_async(&self.http).await.map_err(|e| {
            AuthenticationError::CodeExchange {
                reason: format!("user info request failed: {e}"),
            }
        })?;
        Ok(Some(claims))
    }
}

/// Returns the discovery document URL for an issuer.
#[must_use]
pub fn discovery_url(issuer_url: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        issuer_url.trim_end_matches('/')
    )
}

async fn fetch_extra_metadata(http: &reqwest::Client, issuer_url: &str) -> ExtraMetadata {
    let response = match http.get(discovery_url(issuer_url)).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "failed to re-read discovery document");
            return ExtraMetadata::default();
        }
    };
    match response.json::<ExtraMetadata>().await {
        Ok(extra) => extra,
        Err(e) => {
            warn!(error = %e, "failed to parse discovery document");
            ExtraMetadata::default()
        }
    }
}

fn profile_from_id_token(claims: &CoreIdTokenClaims) -> UserProfile {
    UserProfile {
        subject: claims.subject().to_string(),
        email: claims.email().map(|e| e.as_str().to_string()),
        family_name: claims
            .family_name()
            .and_then(|n| n.get(None))
            .map(|n| n.as_str().to_string()),
        given_name: claims
            .given_name()
            .and_then(|n| n.get(None))
            .map(|n| n.as_str().to_string()),
        name: claims
            .name()
            .and_then(|n| n.get(None))
            .map(|n| n.as_str().to_string()),
        preferred_username: claims.preferred_username().map(|u| u.as_str().to_string()),
    }
}

/// Overlays user-info claims onto the profile taken from the ID token.
fn merge_user_info(mut profile: UserProfile, info: &CoreUserInfoClaims) -> UserProfile {
    if let Some(email) = info.email() {
        profile.email = Some(email.as_str().to_string());
    }
    if let Some(name) = info.family_name().and_then(|n| n.get(None)) {
        profile.family_name = Some(name.as_str().to_string());
    }
    if let Some(name) = info.given_name().and_then(|n| n.get(None)) {
        profile.given_name = Some(name.as_str().to_string());
    }
    if let Some(name) = info.name().and_then(|n| n.get(None)) {
        profile.name = Some(name.as_str().to_string());
    }
    if let Some(username) = info.preferred_username() {
        profile.preferred_username = Some(username.as_str().to_string());
    }
    profile
}

#[derive(Deserialize)]
struct IntrospectionResponse {
    active: bool,
    exp: Option<i64>,
}

#[async_trait]
impl IdentityProvider for OidcClient {
    fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    fn authorization_url(&self, requested_url: &str) -> LoginRedirect {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self
            .client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);
        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token, nonce) = auth_request.url();

        LoginRedirect {
            authorization_url: auth_url.to_string(),
            state: AuthState {
                csrf_token: csrf_token.secret().clone(),
                pkce_verifier: pkce_verifier.secret().clone(),
                nonce: nonce.secret().clone(),
                requested_url: requested_url.to_string(),
            },
        }
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        state: &AuthState,
    ) -> Result<Authenticated, AuthenticationError> {
        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| AuthenticationError::CodeExchange {
                reason: format!("token endpoint error: {e}"),
            })?
            .set_pkce_verifier(PkceCodeVerifier::new(state.pkce_verifier.clone()))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthenticationError::CodeExchange {
                reason: e.to_string(),
            })?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| AuthenticationError::InvalidToken {
                reason: "no ID token in response".to_string(),
            })?;
        let nonce = Nonce::new(state.nonce.clone());
        let claims = id_token
            .claims(&self.client.id_token_verifier(), &nonce)
            .map_err(|e| AuthenticationError::InvalidToken {
                reason: e.to_string(),
            })?;

        let mut profile = profile_from_id_token(claims);
        if profile.subject.is_empty() {
            return Err(AuthenticationError::MissingClaim {
                claim: "sub".to_string(),
            });
        }
        if let Some(info) = self.user_info(token_response.access_token()).await? {
            profile = merge_user_info(profile, &info);
        }
        debug!(subject = %profile.subject, "authorization code exchanged");

        let tokens = TokenSet::new(token_response.access_token().secret().clone())
            .with_refresh_token(token_response.refresh_token().map(|t| t.secret().clone()))
            .with_id_token(Some(id_token.to_string()));
        Ok(Authenticated { tokens, profile })
    }

    #[instrument(skip_all)]
    async fn introspect(&self, access_token: &str) -> Result<Introspection, AuthenticationError> {
        let endpoint =
            self.introspection_endpoint
                .as_deref()
                .ok_or_else(|| AuthenticationError::Introspection {
                    reason: "provider has no introspection endpoint".to_string(),
                })?;

        let response = self
            .http
            .post(endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("token", access_token), ("token_type_hint", "access_token")])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthenticationError::Introspection {
                reason: e.to_string(),
            })?;
        let body: IntrospectionResponse =
            response
                .json()
                .await
                .map_err(|e| AuthenticationError::Introspection {
                    reason: format!("malformed response: {e}"),
                })?;

        Ok(Introspection {
            active: body.active,
            expires_at: body.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)),
        })
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthenticationError> {
        let token_response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .map_err(|e| AuthenticationError::Refresh {
                reason: format!("token endpoint error: {e}"),
            })?
            .request_async(&self.http)
            .await
            .map_err(|e| AuthenticationError::Refresh {
                reason: e.to_string(),
            })?;

        let id_token = token_response
            .id_token()
            .map(|token| verify_refreshed_id_token(&self.client, token))
            .transpose()?;

        Ok(TokenSet::new(token_response.access_token().secret().clone())
            .with_refresh_token(token_response.refresh_token().map(|t| t.secret().clone()))
            .with_id_token(id_token))
    }

    fn end_session_url(
        &self,
        id_token_hint: Option<&str>,
        session_state: Option<&str>,
        post_logout_redirect: &str,
    ) -> Option<String> {
        let mut url = url::Url::parse(self.end_session_endpoint.as_deref()?).ok()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("post_logout_redirect_uri", post_logout_redirect);
            query.append_pair("client_id", &self.client_id);
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
            if let Some(state) = session_state {
                query.append_pair("session_state", state);
            }
        }
        Some(url.to_string())
    }
}

/// Refreshed ID tokens carry no nonce; signature, issuer and audience are
/// still checked.
fn verify_refreshed_id_token(
    client: &DiscoveredClient,
    token: &CoreIdToken,
) -> Result<String, AuthenticationError> {
    token
        .claims(&client.id_token_verifier(), |_: Option<&Nonce>| -> Result<(), String> { Ok(()) })
        .map_err(|e| AuthenticationError::InvalidToken {
            reason: e.to_string(),
        })?;
    Ok(token.to_string())
}

/// Errors building the client at boot.
#[derive(Debug)]
pub enum OidcError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
    /// Failed to discover provider metadata.
    Discovery(String),
}

impl std::fmt::Display for OidcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "OIDC configuration error: {msg}"),
            Self::Discovery(msg) => write!(f, "OIDC discovery error: {msg}"),
        }
    }
}

impl std::error::Error for OidcError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REALM: &str = "/realms/demo";
    const BASIC_AUTH: &str = "Basic ZnJvbnRnYXRlOnMzY3JldA==";

    /// Serves a discovery document for a realm on `server`, merged with `extra`.
    async fn mount_discovery(server: &MockServer, extra: Value) {
        let issuer = format!("{}{REALM}", server.uri());
        let mut document = json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/protocol/openid-connect/auth"),
            "token_endpoint": format!("{issuer}/protocol/openid-connect/token"),
            "jwks_uri": format!("{issuer}/protocol/openid-connect/certs"),
            "response_types_supported": ["code"],
            "subject_types_supported": ["public"],
            "id_token_signing_alg_values_supported": ["RS256"],
        });
        if let (Some(document), Some(extra)) = (document.as_object_mut(), extra.as_object()) {
            document.extend(extra.clone());
        }

        Mock::given(method("GET"))
            .and(path(format!("{REALM}/.well-known/openid-configuration")))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{REALM}/protocol/openid-connect/certs")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keys": []})))
            .mount(server)
            .await;
    }

    async fn discovered(server: &MockServer, extra: Value) -> OidcClient {
        mount_discovery(server, extra).await;
        let config = OidcConfig::new(
            format!("{}{REALM}", server.uri()),
            "frontgate".to_string(),
            "s3cret".to_string(),
        );
        OidcClient::discover(&config, "http://localhost:8080/app/auth/callback".to_string())
            .await
            .expect("discovery")
    }

    async fn full_client(server: &MockServer) -> OidcClient {
        let issuer = format!("{}{REALM}", server.uri());
        discovered(
            server,
            json!({
                "introspection_endpoint": format!("{issuer}/protocol/openid-connect/token/introspect"),
                "end_session_endpoint": format!("{issuer}/protocol/openid-connect/logout"),
            }),
        )
        .await
    }

    fn pending_login(client: &OidcClient) -> AuthState {
        let mut state = client.authorization_url("/app/ui").state;
        state.pkce_verifier = "verifier-abc".to_string();
        state
    }

    #[test]
    fn discovery_url_tolerates_trailing_slash() {
        assert_eq!(
            discovery_url("https://idp.example.com/realms/demo/"),
            "https://idp.example.com/realms/demo/.well-known/openid-configuration"
        );
        assert_eq!(
            discovery_url("https://idp.example.com/realms/demo"),
            "https://idp.example.com/realms/demo/.well-known/openid-configuration"
        );
    }

    #[test]
    fn introspection_response_without_expiry() {
        let body: IntrospectionResponse =
            serde_json::from_str(r#"{"active": false}"#).expect("parse");
        assert!(!body.active);
        assert!(body.exp.is_none());
    }

    #[tokio::test]
    async fn discovery_reads_extra_endpoints() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;

        assert_eq!(client.issuer_url(), format!("{}{REALM}", server.uri()));
        assert!(client.introspection_endpoint.is_some());
        assert!(client.end_session_endpoint.is_some());
    }

    #[tokio::test]
    async fn authorization_url_carries_pkce_and_scopes() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;

        let redirect = client.authorization_url("/app/api/example");
        let url = url::Url::parse(&redirect.authorization_url).expect("url");
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "frontgate");
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["state"], redirect.state.csrf_token);
        assert_eq!(query["nonce"], redirect.state.nonce);
        let scopes: Vec<&str> = query["scope"].split_whitespace().collect();
        for scope in ["openid", "email", "profile"] {
            assert!(scopes.contains(&scope), "missing scope {scope}");
        }
        assert_eq!(redirect.state.requested_url, "/app/api/example");
    }

    #[tokio::test]
    async fn introspection_posts_the_token_with_client_credentials() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{REALM}/protocol/openid-connect/token/introspect")))
            .and(header("authorization", BASIC_AUTH))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("token=access-1"))
            .and(body_string_contains("token_type_hint=access_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"active": true, "exp": 1_893_456_000})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let introspection = client.introspect("access-1").await.expect("introspect");
        assert!(introspection.active);
        assert_eq!(
            introspection.expires_at,
            DateTime::from_timestamp(1_893_456_000, 0)
        );
    }

    #[tokio::test]
    async fn inactive_token_is_reported_inactive() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{REALM}/protocol/openid-connect/token/introspect")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"active": false})))
            .mount(&server)
            .await;

        let introspection = client.introspect("access-1").await.expect("introspect");
        assert!(!introspection.active);
        assert!(introspection.expires_at.is_none());
    }

    #[tokio::test]
    async fn introspection_error_status_is_an_error() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{REALM}/protocol/openid-connect/token/introspect")))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(matches!(
            client.introspect("access-1").await,
            Err(AuthenticationError::Introspection { .. })
        ));
    }

    #[tokio::test]
    async fn introspection_without_endpoint_is_an_error() {
        let server = MockServer::start().await;
        let client = discovered(&server, json!({})).await;

        assert!(matches!(
            client.introspect("access-1").await,
            Err(AuthenticationError::Introspection { .. })
        ));
        assert!(client.end_session_url(Some("id"), None, "http://localhost/app/ui").is_none());
    }

    #[tokio::test]
    async fn refresh_returns_rotated_tokens() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{REALM}/protocol/openid-connect/token")))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-2",
                "token_type": "Bearer",
                "refresh_token": "refresh-2",
                "expires_in": 300,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client.refresh("refresh-1").await.expect("refresh");
        assert_eq!(tokens.access_token, "access-2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-2"));
        assert!(tokens.id_token.is_none());
    }

    #[tokio::test]
    async fn rejected_refresh_is_a_refresh_error() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;

        Mock::given(method("POST"))
            .and(path(format!("{REALM}/protocol/openid-connect/token")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token is not active",
            })))
            .mount(&server)
            .await;

        assert!(matches!(
            client.refresh("refresh-1").await,
            Err(AuthenticationError::Refresh { .. })
        ));
    }

    #[tokio::test]
    async fn code_exchange_sends_the_verifier_and_requires_an_id_token() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;
        let state = pending_login(&client);

        Mock::given(method("POST"))
            .and(path(format!("{REALM}/protocol/openid-connect/token")))
            .and(header("authorization", BASIC_AUTH))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=code-1"))
            .and(body_string_contains("code_verifier=verifier-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "token_type": "Bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(matches!(
            client.exchange_code("code-1", &state).await,
            Err(AuthenticationError::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn rejected_code_is_a_code_exchange_error() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;
        let state = pending_login(&client);

        Mock::given(method("POST"))
            .and(path(format!("{REALM}/protocol/openid-connect/token")))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        assert!(matches!(
            client.exchange_code("stolen", &state).await,
            Err(AuthenticationError::CodeExchange { .. })
        ));
    }

    #[tokio::test]
    async fn end_session_url_carries_logout_parameters() {
        let server = MockServer::start().await;
        let client = full_client(&server).await;

        let target = client
            .end_session_url(
                Some("id-token"),
                Some("kc-session"),
                "http://localhost:8080/app/ui",
            )
            .expect("end-session endpoint");
        let url = url::Url::parse(&target).expect("url");
        assert_eq!(url.path(), format!("{REALM}/protocol/openid-connect/logout"));

        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["post_logout_redirect_uri"], "http://localhost:8080/app/ui");
        assert_eq!(query["client_id"], "frontgate");
        assert_eq!(query["id_token_hint"], "id-token");
        assert_eq!(query["session_state"], "kc-session");
    }

    #[tokio::test]
    async fn missing_discovery_document_yields_no_extras() {
        let server = MockServer::start().await;
        let http = reqwest::Client::new();

        let extra = fetch_extra_metadata(&http, &format!("{}{REALM}", server.uri())).await;
        assert!(extra.introspection_endpoint.is_none());
        assert!(extra.end_session_endpoint.is_none());
    }
}
