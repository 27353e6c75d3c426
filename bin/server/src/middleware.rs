//! The request-context chain installed on functional routes.
//!
//! Outermost first:
//! 1. [`bind_session`] loads this request's session, and after the response
//!    is built flushes it if dirty and re-issues the cookie
//! 2. [`inject_services`] attaches the singletons and a request ID
//! 3. [`log_request`] opens the request span and emits one record per request
//! 4. `CatchPanicLayer` turns a handler panic into a 500, so the flush in (1)
//!    still observes the final session state
//!
//! If the request future is dropped before (1) flushes, `FlushOnDrop`
//! writes a dirty session from a detached task.

use axum::Router;
use axum::extract::{OriginalUri, Request, State};
use axum::http::HeaderValue;
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;
use frontgate_core::{RequestId, SessionId};
use frontgate_session::Sessions;
use std::any::Any;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::context::SessionHandle;
use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on the detached flush of a cancelled request.
const CANCELLED_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Response header echoing the request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wraps `router` in the request-context chain.
pub fn install(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(state.clone(), bind_session))
            .layer(from_fn_with_state(state.clone(), inject_services))
            .layer(from_fn_with_state(state.clone(), log_request))
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

/// Binds the session for the request and persists it afterwards.
pub async fn bind_session(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let id = jar
        .get(&state.cookies.name)
        .and_then(|cookie| cookie.value().parse::<SessionId>().ok());
    let handle = SessionHandle::new(state.sessions.get(id).await);
    request.extensions_mut().insert(handle.clone());

    let mut guard = FlushOnDrop::new(handle.clone(), state.sessions.clone());
    let response = next.run(request).await;
    guard.disarm();

    let jar = flush(&state, &handle, jar).await;
    (jar, response).into_response()
}

/// Writes a dirty session and returns the jar with the cookie to send.
///
/// A failed write is logged; the response is delivered either way.
async fn flush(state: &AppState, handle: &SessionHandle, jar: PrivateCookieJar) -> PrivateCookieJar {
    let mut session = handle.lock().await;
    if !session.is_dirty() {
        return jar;
    }

    let destroyed = session.is_destroyed();
    match state.sessions.save(&mut session).await {
        Ok(()) if destroyed => {
            debug!(session_id = %session.id(), "session destroyed");
            jar.remove(state.cookies.session_removal())
        }
        Ok(()) => jar.add(state.cookies.session_cookie(session.id().to_string())),
        Err(e) => {
            warn!(session_id = %session.id(), error = %e, "failed to persist session");
            jar
        }
    }
}

/// Persists a dirty session if the request future is dropped mid-flight.
struct FlushOnDrop {
    pending: Option<(SessionHandle, Sessions)>,
}

impl FlushOnDrop {
    fn new(handle: SessionHandle, sessions: Sessions) -> Self {
        Self {
            pending: Some((handle, sessions)),
        }
    }

    fn disarm(&mut self) {
        self.pending = None;
    }
}

impl Drop for FlushOnDrop {
    fn drop(&mut self) {
        let Some((handle, sessions)) = self.pending.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            let flush = async {
                let mut session = handle.lock().await;
                if !session.is_dirty() {
                    return;
                }
                if let Err(e) = sessions.save(&mut session).await {
                    warn!(session_id = %session.id(), error = %e, "failed to persist session of cancelled request");
                }
            };
            if tokio::time::timeout(CANCELLED_FLUSH_TIMEOUT, flush)
                .await
                .is_err()
            {
                warn!("session flush of cancelled request timed out");
            }
        });
    }
}

/// Attaches the singletons and a fresh request ID.
pub async fn inject_services(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(RequestId::new());
    request.extensions_mut().insert(state);
    next.run(request).await
}

/// Runs the request inside its span and emits one completion record.
pub async fn log_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .copied()
        .unwrap_or_default();
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path().to_string(), |uri| uri.path().to_string());

    let span = info_span!("request", request_id = %request_id, method = %method, path = %path);
    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let elapsed = started.elapsed();

    let status = response.status();
    state.metrics.record(status, elapsed);
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let _entered = span.enter();
    let elapsed_ms = elapsed.as_millis() as u64;
    if status.is_server_error() {
        error!(status = status.as_u16(), elapsed_ms, "request failed");
    } else if status.is_client_error() {
        debug!(status = status.as_u16(), elapsed_ms, "request rejected");
    } else {
        info!(status = status.as_u16(), elapsed_ms, "request completed");
    }
    response
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    ApiError::internal(format_args!("handler panicked: {details}")).into_response()
}
