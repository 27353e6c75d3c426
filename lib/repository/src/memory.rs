//! Volatile, map-backed repository.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::RepositoryError;
use crate::model::Example;
use crate::repository::ExampleRepository;

/// Repository holding records in process memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<BTreeMap<String, Example>>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExampleRepository for MemoryRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_all(&self) -> Result<Vec<Example>, RepositoryError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn find_by_id(&self, name: &str) -> Result<Example, RepositoryError> {
        self.records
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                name: name.to_string(),
            })
    }

    async fn save(&self, example: &Example) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.contains_key(&example.name) {
            return Err(RepositoryError::AlreadyExists {
                name: example.name.clone(),
            });
        }
        records.insert(example.name.clone(), example.clone());
        Ok(())
    }

    async fn update(&self, example: &Example) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&example.name)
            .ok_or_else(|| RepositoryError::NotFound {
                name: example.name.clone(),
            })?;
        stored.age = example.age;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), RepositoryError> {
        self.records
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound {
                name: name.to_string(),
            })
    }

    async fn connect(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn ping(&self) -> bool {
        true
    }
}
