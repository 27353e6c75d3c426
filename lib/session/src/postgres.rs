//! PostgreSQL-backed session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use frontgate_core::SessionId;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::SessionStoreError;
use crate::record::SessionRecord;
use crate::store::SessionStore;

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    id: String,
    data: Value,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_record(self) -> Result<SessionRecord, SessionStoreError> {
        let id = SessionId::from_str(&self.id).map_err(|e| SessionStoreError::Corrupt {
            session_id: self.id.clone(),
            reason: e.to_string(),
        })?;
        let values: BTreeMap<String, Value> =
            serde_json::from_value(self.data).map_err(|e| SessionStoreError::Corrupt {
                session_id: self.id.clone(),
                reason: e.to_string(),
            })?;
        Ok(SessionRecord {
            id,
            values,
            expires_at: self.expires_at,
        })
    }
}

/// Durable session store persisting records in the `sessions` table.
///
/// Expiry is enforced on read; [`SessionStore::delete_expired`] reclaims the
/// rows.
#[derive(Debug, Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Creates a store on top of an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self, id: SessionId) -> Result<Option<SessionRecord>, SessionStoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, data, expires_at
            FROM sessions
            WHERE id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::try_into_record).transpose()
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), SessionStoreError> {
        let data = serde_json::to_value(&record.values).map_err(|e| {
            SessionStoreError::Corrupt {
                session_id: record.id.to_string(),
                reason: e.to_string(),
            }
        })?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(record.id.to_string())
        .bind(data)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), SessionStoreError> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
