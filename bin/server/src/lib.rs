//! frontgate: a presentation-tier gateway.
//!
//! Terminates browser sessions, federates login to an OIDC provider, and
//! guards a small JSON API and a static UI tree behind that login. Health
//! and metrics live under a separate, session-free root.

pub mod api;
pub mod auth;
pub mod boot;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod state;
pub mod static_files;
