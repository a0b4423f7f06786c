//! `PostgreSQL` implementation of the `DocumentRepository` trait.
//!
//! Each encounter is one row in `combat_states`. Saves are a single
//! conditional statement, so the version check and the write cannot be
//! interleaved by another writer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use skirmish_core::error::DomainError;
use skirmish_core::repository::{DocumentRepository, StoredDocument};

/// PostgreSQL-backed document repository.
#[derive(Debug, Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    /// Creates a new `PgDocumentRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn stored_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM combat_states WHERE encounter_id = $1")
                .bind(aggregate_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(infrastructure)?;
        Ok(row.map_or(0, |(version,)| version))
    }

    async fn conflict(&self, aggregate_id: Uuid, expected: i64) -> DomainError {
        match self.stored_version(aggregate_id).await {
            Ok(actual) => DomainError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            },
            Err(err) => err,
        }
    }
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("combat state store: {err}"))
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn load_document(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Option<StoredDocument>, DomainError> {
        let row: Option<(i64, serde_json::Value, DateTime<Utc>)> = sqlx::query_as(
            "SELECT version, state, updated_at FROM combat_states WHERE encounter_id = $1",
        )
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(row.map(|(version, payload, updated_at)| StoredDocument {
            aggregate_id,
            version,
            payload,
            updated_at,
        }))
    }

    async fn save_document(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        payload: serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> Result<i64, DomainError> {
        let saved: Option<(i64,)> = if expected_version == 0 {
            sqlx::query_as(
                "INSERT INTO combat_states (encounter_id, version, state, updated_at) \
                 VALUES ($1, 1, $2, $3) \
                 ON CONFLICT (encounter_id) DO NOTHING \
                 RETURNING version",
            )
            .bind(aggregate_id)
            .bind(payload)
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure)?
        } else {
            sqlx::query_as(
                "UPDATE combat_states \
                 SET version = version + 1, state = $2, updated_at = $3 \
                 WHERE encounter_id = $1 AND version = $4 \
                 RETURNING version",
            )
            .bind(aggregate_id)
            .bind(payload)
            .bind(updated_at)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure)?
        };

        match saved {
            Some((version,)) => {
                debug!(%aggregate_id, version, "combat state saved");
                Ok(version)
            }
            None => Err(self.conflict(aggregate_id, expected_version).await),
        }
    }
}
