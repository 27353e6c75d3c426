//! The landing tree under `{context_root}/ui/`.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::Uri;
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::auth::found;
use crate::state::AppState;

/// `GET /ui`: redirects to the directory form so relative links resolve.
pub async fn landing(State(state): State<AppState>) -> Response {
    found(&state.serve.path("/ui/"))
}

/// Serves a file from the static directory.
pub async fn serve(State(state): State<AppState>, mut request: Request) -> Response {
    let rewritten = strip_ui_prefix(request.uri());
    *request.uri_mut() = rewritten;

    match ServeDir::new(&state.serve.static_path)
        .oneshot(request)
        .await
    {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Maps `/ui/<rest>` to `/<rest>`, keeping the query.
fn strip_ui_prefix(uri: &Uri) -> Uri {
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    let stripped = path_and_query.strip_prefix("/ui").unwrap_or(path_and_query);
    let stripped = if stripped.is_empty() || !stripped.starts_with('/') {
        format!("/{stripped}")
    } else {
        stripped.to_string()
    };
    stripped.parse().unwrap_or_else(|_| Uri::from_static("/"))
}
