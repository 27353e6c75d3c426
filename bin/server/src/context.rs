//! The request-scoped view handlers read from.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use frontgate_core::RequestId;
use frontgate_session::Session;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::ApiError;
use crate::state::AppState;

/// This request's session.
///
/// Each request owns its copy, loaded by the session-binding layer; the
/// handle only lets the layers and the handler of that one request share it.
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }
}

/// Everything a functional handler may touch: the singletons, this
/// request's session, and its correlation ID.
///
/// Only available behind the request-context layers; extracting it
/// elsewhere is a wiring bug and fails with a 500.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub session: SessionHandle,
    pub services: AppState,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts.extensions.get::<RequestId>().copied();
        let session = parts.extensions.get::<SessionHandle>().cloned();
        let services = parts.extensions.get::<AppState>().cloned();

        match (request_id, session, services) {
            (Some(request_id), Some(session), Some(services)) => Ok(Self {
                request_id,
                session,
                services,
            }),
            _ => Err(ApiError::internal("request context layers are not installed")),
        }
    }
}
