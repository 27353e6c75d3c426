//! The JSON API behind the authentication guard.

pub mod example;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

/// Routes under `{context_root}/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/example",
            get(example::list).post(example::create),
        )
        .route(
            "/api/example/{id}",
            get(example::get).put(example::replace).delete(example::remove),
        )
}
