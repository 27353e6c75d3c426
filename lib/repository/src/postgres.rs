//! PostgreSQL-backed repository.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::RepositoryError;
use crate::model::Example;
use crate::repository::ExampleRepository;

/// Connection pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
        }
    }
}

/// Row type for example queries.
#[derive(FromRow)]
struct ExampleRow {
    name: String,
    age: i64,
}

impl From<ExampleRow> for Example {
    fn from(row: ExampleRow) -> Self {
        Self {
            name: row.name,
            age: row.age,
        }
    }
}

/// Durable repository over the `examples` table.
///
/// The pool is bound lazily on first use and bound again after
/// [`ExampleRepository::disconnect`].
#[derive(Debug)]
pub struct PostgresRepository {
    url: String,
    settings: PoolSettings,
    ping_timeout: Duration,
    pool: RwLock<Option<PgPool>>,
}

impl PostgresRepository {
    #[must_use]
    pub fn new(url: String, settings: PoolSettings, ping_timeout: Duration) -> Self {
        Self {
            url,
            settings,
            ping_timeout,
            pool: RwLock::new(None),
        }
    }

    /// Returns the bound pool, binding one if needed.
    async fn pool(&self) -> Result<PgPool, RepositoryError> {
        if let Some(pool) = self.pool.read().await.as_ref().filter(|pool| !pool.is_closed()) {
            return Ok(pool.clone());
        }

        let mut slot = self.pool.write().await;
        if let Some(pool) = slot.as_ref().filter(|pool| !pool.is_closed()) {
            return Ok(pool.clone());
        }
        debug!("binding repository connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .min_connections(self.settings.min_connections)
            .acquire_timeout(self.ping_timeout)
            .connect_lazy(&self.url)
            .map_err(|e| RepositoryError::NotConnected {
                details: e.to_string(),
            })?;
        *slot = Some(pool.clone());
        Ok(pool)
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl ExampleRepository for PostgresRepository {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find_all(&self) -> Result<Vec<Example>, RepositoryError> {
        let rows: Vec<ExampleRow> = sqlx::query_as(
            r#"
            SELECT name, age
            FROM examples
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool().await?)
        .await?;

        Ok(rows.into_iter().map(Example::from).collect())
    }

    async fn find_by_id(&self, name: &str) -> Result<Example, RepositoryError> {
        let row: Option<ExampleRow> = sqlx::query_as(
            r#"
            SELECT name, age
            FROM examples
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool().await?)
        .await?;

        row.map(Example::from)
            .ok_or_else(|| RepositoryError::NotFound {
                name: name.to_string(),
            })
    }

    async fn save(&self, example: &Example) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO examples (name, age)
            VALUES ($1, $2)
            "#,
        )
        .bind(&example.name)
        .bind(example.age)
        .execute(&self.pool().await?)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::AlreadyExists {
                name: example.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, example: &Example) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE examples
            SET age = $2
            WHERE name = $1
            "#,
        )
        .bind(&example.name)
        .bind(example.age)
        .execute(&self.pool().await?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                name: example.name.clone(),
            });
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM examples
            WHERE name = $1
            "#,
        )
        .bind(name)
        .execute(&self.pool().await?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn connect(&self) -> Result<(), RepositoryError> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        info!("repository connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), RepositoryError> {
        let pool = self.pool.write().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            info!("repository disconnected");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.pool
            .read()
            .await
            .as_ref()
            .is_some_and(|pool| !pool.is_closed())
    }

    async fn ping(&self) -> bool {
        let pool = match self.pool().await {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "repository ping could not bind a pool");
                return false;
            }
        };
        match tokio::time::timeout(self.ping_timeout, sqlx::query("SELECT 1").execute(&pool)).await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "repository ping failed");
                false
            }
            Err(_) => {
                warn!(timeout_ms = self.ping_timeout.as_millis() as u64, "repository ping timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable() -> PostgresRepository {
        PostgresRepository::new(
            "postgres://frontgate@127.0.0.1:1/frontgate".to_string(),
            PoolSettings::default(),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn starts_unbound() {
        assert!(!unreachable().is_connected().await);
    }

    #[tokio::test]
    async fn invalid_url_is_not_connected() {
        let repository = PostgresRepository::new(
            "not a url".to_string(),
            PoolSettings::default(),
            Duration::from_millis(200),
        );
        assert!(matches!(
            repository.find_all().await,
            Err(RepositoryError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn ping_against_unreachable_server_is_bounded() {
        let repository = unreachable();
        let started = std::time::Instant::now();
        assert!(!repository.ping().await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn disconnect_releases_the_pool() {
        let repository = unreachable();
        repository.pool().await.expect("lazy bind");
        assert!(repository.is_connected().await);

        repository.disconnect().await.expect("disconnect");
        assert!(!repository.is_connected().await);
    }
}
