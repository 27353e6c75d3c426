//! Route table.
//!
//! Two trees: the non-functional root (`/g` by default) with health and
//! metrics, outside any session handling, and the context root with the
//! authentication routes and the guarded `/ui` and `/api` routes, all
//! behind the request-context chain.

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::get;

use crate::auth::{self, require_authentication};
use crate::state::AppState;
use crate::{api, health, metrics, middleware, static_files};

/// Builds the application router.
pub fn build(state: AppState) -> Router {
    let non_functional = Router::new()
        .route("/health", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(metrics::metrics));

    let guarded = Router::new()
        .route("/ui", get(static_files::landing))
        .route("/ui/", get(static_files::serve))
        .route("/ui/{*path}", get(static_files::serve))
        .merge(api::routes())
        .route_layer(from_fn(require_authentication));

    let mut functional = Router::new().merge(guarded);
    if state.provider.is_some() {
        functional = functional
            .route("/auth/login", get(auth::login))
            .route("/auth/callback", get(auth::callback))
            .route("/auth/logout", get(auth::logout))
            .route("/auth/info", get(auth::info));
    }
    let functional = middleware::install(functional, &state);

    Router::new()
        .nest(&state.serve.non_functional_root, non_functional)
        .nest(&state.serve.context_root, functional)
        .with_state(state)
}
