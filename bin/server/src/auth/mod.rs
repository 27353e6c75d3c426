//! Authentication for the functional routes.
//!
//! - [`oidc`]: the relying party talking to the real provider
//! - [`routes`]: login, callback, logout and profile info
//! - [`middleware`]: the guard in front of `/ui` and `/api`
//!
//! Tokens and profile claims live in the server-side session; the browser
//! only holds the encrypted session cookie and, during a login, the
//! encrypted `auth_state` cookie.

pub mod middleware;
pub mod oidc;
pub mod routes;

use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, LOCATION};
use axum::response::{IntoResponse, Response};

pub use middleware::{AuthRejection, require_authentication};
pub use oidc::{OidcClient, OidcError};
pub use routes::{callback, info, login, logout};

/// A `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [
            (LOCATION, location.to_string()),
            (CACHE_CONTROL, "no-cache".to_string()),
        ],
    )
        .into_response()
}
