//! The authentication guard for `/ui` and `/api`.

use axum::extract::{OriginalUri, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use frontgate_access::{TokenState, inspect_and_renew, keys};
use tracing::debug;

use super::found;
use crate::config::ServeConfig;
use crate::context::RequestContext;

/// Rejection produced by the guard. Always a redirect to login, never a 5xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    /// No ID token in the session.
    NotAuthenticated { login_url: String },
    /// The tokens are no longer usable and could not be renewed.
    SessionExpired { login_url: String },
}

impl AuthRejection {
    #[must_use]
    pub fn login_url(&self) -> &str {
        match self {
            Self::NotAuthenticated { login_url } | Self::SessionExpired { login_url } => login_url,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        found(self.login_url())
    }
}

/// `{context_root}/auth/login?requested_url=<path and query>`
fn login_url(serve: &ServeConfig, requested: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(requested.as_bytes()).collect();
    format!("{}?requested_url={encoded}", serve.path("/auth/login"))
}

fn requested_path(request: &Request) -> String {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().clone(), |original| original.0.clone());
    uri.path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string)
}

/// Lets the request through only with usable tokens, renewing them when
/// the access token has lapsed.
///
/// A passthrough when OIDC is disabled.
pub async fn require_authentication(
    ctx: RequestContext,
    request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let Some(provider) = ctx.services.provider.clone() else {
        return Ok(next.run(request).await);
    };
    let serve = &ctx.services.serve;

    let mut session = ctx.session.lock().await;
    if !session.contains(keys::ID_TOKEN) {
        debug!(session_id = %session.id(), "no ID token, redirecting to login");
        return Err(AuthRejection::NotAuthenticated {
            login_url: login_url(serve, &requested_path(&request)),
        });
    }

    let state = inspect_and_renew(
        &mut session,
        provider.as_ref(),
        &ctx.services.sessions,
        &ctx.services.refresh_locks,
    )
    .await;
    drop(session);

    match state {
        TokenState::Active | TokenState::Refreshed => Ok(next.run(request).await),
        TokenState::Unauthenticated => Err(AuthRejection::SessionExpired {
            login_url: login_url(serve, &requested_path(&request)),
        }),
    }
}
