//! Authentication routes for login, callback, logout and profile info.

use axum::Json;
use axum::extract::Query;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;
use frontgate_access::{
    AuthState, Authenticated, AuthenticationError, IdentityProvider, UserProfile, keys,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::found;
use crate::config::ServeConfig;
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::state::AUTH_STATE_COOKIE;

/// Query parameters for the login route.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    requested_url: Option<String>,
}

/// Query parameters for the OIDC callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    session_state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Body of `GET /auth/info`.
#[derive(Debug, Serialize)]
pub struct ProfileInfo {
    #[serde(flatten)]
    profile: UserProfile,
    logout_url: String,
}

fn provider(ctx: &RequestContext) -> Result<Arc<dyn IdentityProvider>, ApiError> {
    ctx.services
        .provider
        .clone()
        .ok_or_else(|| ApiError::not_found("authentication is disabled"))
}

/// Keeps post-login redirects on this origin.
///
/// Only absolute paths are accepted; anything else, including
/// protocol-relative `//host` forms, falls back to the landing route.
fn sanitize_requested_url(requested: Option<&str>, serve: &ServeConfig) -> String {
    requested
        .filter(|url| url.starts_with('/') && !url.starts_with("//") && !url.contains('\\'))
        .map_or_else(|| serve.path("/ui"), str::to_string)
}

/// Starts a login by redirecting to the provider's authorization endpoint.
///
/// The session is not touched; the pending state travels in the
/// `auth_state` cookie.
pub async fn login(
    ctx: RequestContext,
    jar: PrivateCookieJar,
    Query(query): Query<LoginQuery>,
) -> Result<Response, ApiError> {
    let provider = provider(&ctx)?;
    let requested_url = sanitize_requested_url(query.requested_url.as_deref(), &ctx.services.serve);
    let redirect = provider.authorization_url(&requested_url);

    let state = serde_json::to_string(&redirect.state).map_err(ApiError::internal)?;
    let jar = jar.add(ctx.services.cookies.auth_state_cookie(state));

    Ok((jar, found(&redirect.authorization_url)).into_response())
}

/// Completes a login.
///
/// Any failure leaves the session untouched and sends the browser back to
/// the login route. On success the session moves to a new ID before the
/// tokens are written. The `auth_state` cookie is removed either way.
pub async fn callback(
    ctx: RequestContext,
    jar: PrivateCookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let provider = provider(&ctx)?;
    let pending = jar
        .get(AUTH_STATE_COOKIE)
        .and_then(|cookie| serde_json::from_str::<AuthState>(cookie.value()).ok());
    let jar = jar.remove(ctx.services.cookies.auth_state_removal());

    let (state, authenticated) = match complete_login(provider.as_ref(), pending, &query).await {
        Ok(result) => result,
        Err(e) => {
            warn!(request_id = %ctx.request_id, error = %e, "login callback rejected");
            return Ok((jar, found(&ctx.services.serve.path("/auth/login"))).into_response());
        }
    };

    let mut session = ctx.session.lock().await;
    if let Err(e) = ctx.services.sessions.regenerate(&mut session).await {
        warn!(request_id = %ctx.request_id, error = %e, "failed to regenerate session at login");
        return Ok((jar, found(&ctx.services.serve.path("/auth/login"))).into_response());
    }
    authenticated
        .tokens
        .with_session_state(query.session_state.clone())
        .write_to(&mut session);
    authenticated.profile.write_to(&mut session);
    tracing::info!(
        session_id = %session.id(),
        subject = %authenticated.profile.subject,
        "user authenticated"
    );
    drop(session);

    Ok((jar, found(&state.requested_url)).into_response())
}

async fn complete_login(
    provider: &dyn IdentityProvider,
    pending: Option<AuthState>,
    query: &CallbackQuery,
) -> Result<(AuthState, Authenticated), AuthenticationError> {
    if let Some(error) = &query.error {
        return Err(AuthenticationError::ProviderError {
            provider: provider.issuer_url().to_string(),
            reason: match &query.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            },
        });
    }

    let state = pending.ok_or(AuthenticationError::MissingAuthState)?;
    state.verify(query.state.as_deref().unwrap_or_default())?;

    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AuthenticationError::CodeExchange {
            reason: "no authorization code".to_string(),
        })?;
    let authenticated = provider.exchange_code(code, &state).await?;
    Ok((state, authenticated))
}

/// Destroys the session and ends the provider session when possible.
pub async fn logout(ctx: RequestContext) -> Result<Response, ApiError> {
    let provider = provider(&ctx)?;
    let serve = &ctx.services.serve;

    let mut session = ctx.session.lock().await;
    let id_token = session.get_str(keys::ID_TOKEN).map(str::to_string);
    let session_state = session.get_str(keys::SESSION_STATE).map(str::to_string);
    session.destroy();
    drop(session);

    let post_logout = format!("{}{}", serve.base_url(), serve.path("/ui"));
    let location = provider
        .end_session_url(id_token.as_deref(), session_state.as_deref(), &post_logout)
        .unwrap_or_else(|| serve.path("/auth/login"));
    Ok(found(&location))
}

/// Returns the profile stored at login.
pub async fn info(ctx: RequestContext) -> Result<Json<ProfileInfo>, ApiError> {
    let session = ctx.session.lock().await;
    if !session.contains(keys::ID_TOKEN) {
        return Err(ApiError::unauthorized());
    }
    let profile = UserProfile::from_session(&session).ok_or_else(ApiError::unauthorized)?;

    Ok(Json(ProfileInfo {
        profile,
        logout_url: ctx.services.serve.path("/auth/logout"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_url_must_be_local() {
        let serve = ServeConfig::new("/app");
        assert_eq!(
            sanitize_requested_url(Some("/app/api/example?x=1"), &serve),
            "/app/api/example?x=1"
        );
        assert_eq!(sanitize_requested_url(None, &serve), "/app/ui");
        assert_eq!(
            sanitize_requested_url(Some("https://evil.example.com"), &serve),
            "/app/ui"
        );
        assert_eq!(
            sanitize_requested_url(Some("//evil.example.com"), &serve),
            "/app/ui"
        );
        assert_eq!(sanitize_requested_url(Some("/\\evil"), &serve), "/app/ui");
    }

    #[test]
    fn profile_info_flattens_claims() {
        let mut profile = UserProfile::new("user-1".to_string());
        profile.email = Some("alice@example.com".to_string());
        let body = serde_json::to_value(ProfileInfo {
            profile,
            logout_url: "/app/auth/logout".to_string(),
        })
        .expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({
                "subject": "user-1",
                "email": "alice@example.com",
                "logout_url": "/app/auth/logout"
            })
        );
    }
}
