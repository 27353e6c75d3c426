//! Per-request token inspection and renewal.

use frontgate_session::{Session, Sessions};
use tracing::{debug, info, warn};

use crate::locks::RefreshLocks;
use crate::provider::IdentityProvider;
use crate::tokens::{TokenSet, keys};

/// Where a session's tokens stand after [`inspect_and_renew`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// The access token is still active.
    Active,
    /// The access token was replaced, here or by a concurrent request.
    Refreshed,
    /// No usable tokens; the browser has to log in again.
    Unauthenticated,
}

impl TokenState {
    /// Returns true if the request may proceed.
    #[must_use]
    pub fn is_authenticated(self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }
}

/// Removes every token from a session. Profile claims are kept.
pub fn clear_tokens(session: &mut Session) {
    for key in keys::TOKENS {
        session.delete(key);
    }
}

/// Checks the session's access token and refreshes it when inactive.
///
/// Introspection never touches the session. A refresh runs under the
/// session's lock: after acquiring it the stored record is re-read, and if
/// another request already rotated the tokens they are adopted instead of
/// spending the refresh token twice. A successful refresh is written through
/// to the store immediately. A failed refresh removes the tokens.
pub async fn inspect_and_renew(
    session: &mut Session,
    provider: &dyn IdentityProvider,
    sessions: &Sessions,
    locks: &RefreshLocks,
) -> TokenState {
    let Some(tokens) = TokenSet::from_session(session) else {
        debug!(session_id = %session.id(), "no access token in session");
        return TokenState::Unauthenticated;
    };

    match provider.introspect(&tokens.access_token).await {
        Ok(introspection) if introspection.is_usable() => return TokenState::Active,
        Ok(_) => debug!(session_id = %session.id(), "access token inactive"),
        Err(e) => {
            warn!(session_id = %session.id(), error = %e, "token introspection failed");
            return TokenState::Unauthenticated;
        }
    }

    let _guard = locks.acquire(session.id()).await;

    if !session.is_new() {
        match sessions.reload(session.id()).await {
            Ok(Some(stored)) => {
                let stored_tokens = TokenSet::from_session(&stored)
                    .filter(|stored| stored.access_token != tokens.access_token);
                if let Some(stored_tokens) = stored_tokens {
                    debug!(session_id = %session.id(), "adopting tokens refreshed concurrently");
                    stored_tokens.write_to(session);
                    return TokenState::Refreshed;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "failed to reload session before refresh");
            }
        }
    }

    let Some(refresh_token) = tokens.refresh_token else {
        debug!(session_id = %session.id(), "no refresh token in session");
        clear_tokens(session);
        return TokenState::Unauthenticated;
    };

    match provider.refresh(&refresh_token).await {
        Ok(refreshed) => {
            refreshed.write_to(session);
            if let Err(e) = sessions.save(session).await {
                warn!(session_id = %session.id(), error = %e, "failed to persist refreshed tokens");
            }
            info!(session_id = %session.id(), "tokens refreshed");
            TokenState::Refreshed
        }
        Err(e) => {
            warn!(session_id = %session.id(), error = %e, "token refresh failed");
            clear_tokens(session);
            TokenState::Unauthenticated
        }
    }
}
