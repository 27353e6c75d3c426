//! The repository contract.

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::model::Example;

/// CRUD and connectivity for `Example` records.
#[async_trait]
pub trait ExampleRepository: Send + Sync {
    /// Short backend name used in logs and health labels.
    fn backend(&self) -> &'static str;

    /// Every record, ordered by name. An empty result is not an error.
    async fn find_all(&self) -> Result<Vec<Example>, RepositoryError>;

    async fn find_by_id(&self, name: &str) -> Result<Example, RepositoryError>;

    /// Inserts a record. Fails with `AlreadyExists` if the name is taken.
    async fn save(&self, example: &Example) -> Result<(), RepositoryError>;

    /// Replaces the mutable attributes of an existing record.
    async fn update(&self, example: &Example) -> Result<(), RepositoryError>;

    async fn delete(&self, name: &str) -> Result<(), RepositoryError>;

    /// Binds the backend and verifies it answers.
    async fn connect(&self) -> Result<(), RepositoryError>;

    /// Releases the backend. Later operations bind it again on demand.
    async fn disconnect(&self) -> Result<(), RepositoryError>;

    async fn is_connected(&self) -> bool;

    /// Probes the backend within its configured timeout.
    async fn ping(&self) -> bool;
}
