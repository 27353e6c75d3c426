//! Repository for the `Example` resource.
//!
//! One capability trait, [`ExampleRepository`], with two backends chosen once
//! at boot: [`MemoryRepository`] (volatile) and [`PostgresRepository`]
//! (durable, lazily bound).
//!
//! # Example
//!
//! ```
//! use frontgate_repository::{Example, ExampleRepository, MemoryRepository, RepositoryError};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let repository = MemoryRepository::new();
//! repository.save(&Example::new("alice", 30)).await.unwrap();
//!
//! let err = repository.save(&Example::new("alice", 31)).await.unwrap_err();
//! assert_eq!(err, RepositoryError::AlreadyExists { name: "alice".to_string() });
//! # });
//! ```

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod repository;

pub use error::RepositoryError;
pub use memory::MemoryRepository;
pub use model::Example;
pub use postgres::{PoolSettings, PostgresRepository};
pub use repository::ExampleRepository;
