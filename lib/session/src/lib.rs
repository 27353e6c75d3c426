//! Session management for frontgate.
//!
//! This crate provides:
//! - `SessionRecord`: the persisted shape of a session
//! - `Session`: the per-request wrapper that tracks mutation
//! - `SessionStore`: the backend contract, with in-memory and PostgreSQL stores
//! - `Sessions`: the process-wide manager that loads and persists sessions
//!
//! # Example
//!
//! ```
//! use frontgate_session::{MemorySessionStore, Sessions};
//! use std::sync::Arc;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let sessions = Sessions::new(Arc::new(MemorySessionStore::new()), chrono::Duration::minutes(30));
//!
//! let mut session = sessions.get(None).await;
//! assert!(!session.is_dirty());
//!
//! session.put("email", "alice@example.com");
//! assert!(session.is_dirty());
//!
//! sessions.save(&mut session).await.expect("memory store never fails");
//! let reloaded = sessions.get(Some(session.id())).await;
//! assert_eq!(reloaded.get_str("email"), Some("alice@example.com"));
//! # });
//! ```

pub mod error;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod session;
pub mod store;

pub use error::SessionStoreError;
pub use manager::Sessions;
pub use memory::MemorySessionStore;
pub use postgres::PostgresSessionStore;
pub use record::SessionRecord;
pub use session::Session;
pub use store::SessionStore;
