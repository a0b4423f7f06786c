//! Versioned document repository abstraction.
//!
//! Aggregates are persisted as whole JSON documents. Every successful save
//! bumps the stored version by one; a save only succeeds when the caller's
//! `expected_version` matches what is stored, which gives at-most-one-writer
//! semantics per aggregate without any cross-aggregate locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Stored representation of an aggregate document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Aggregate this document belongs to.
    pub aggregate_id: Uuid,
    /// Version of the stored document. The first save produces version 1.
    pub version: i64,
    /// Serialized aggregate state.
    pub payload: serde_json::Value,
    /// Timestamp of the last successful save.
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for loading and saving aggregate documents.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Load the current document for an aggregate, if one exists.
    async fn load_document(&self, aggregate_id: Uuid)
    -> Result<Option<StoredDocument>, DomainError>;

    /// Replace the document for an aggregate with optimistic concurrency.
    ///
    /// `expected_version` is the version the caller read; `0` means the
    /// document must not exist yet. Returns the new version on success and
    /// `DomainError::ConcurrencyConflict` when the stored version differs.
    async fn save_document(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        payload: serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> Result<i64, DomainError>;
}
