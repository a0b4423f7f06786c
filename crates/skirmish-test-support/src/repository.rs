//! Test repositories — `DocumentRepository` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skirmish_core::error::DomainError;
use skirmish_core::repository::{DocumentRepository, StoredDocument};
use uuid::Uuid;

/// A document repository backed by a map. Enforces the same version check as
/// the Postgres store, so it can stand in for it in handler and route tests.
#[derive(Debug, Default)]
pub struct InMemoryDocumentRepository {
    documents: Mutex<HashMap<Uuid, StoredDocument>>,
    saves: Mutex<Vec<(Uuid, i64)>>,
}

impl InMemoryDocumentRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document directly, bypassing the version check.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert(&self, document: StoredDocument) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.aggregate_id, document);
    }

    /// The stored document for an aggregate, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn document(&self, aggregate_id: Uuid) -> Option<StoredDocument> {
        self.documents.lock().unwrap().get(&aggregate_id).cloned()
    }

    /// The stored version for an aggregate, or 0 if none.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stored_version(&self, aggregate_id: Uuid) -> i64 {
        self.document(aggregate_id).map_or(0, |d| d.version)
    }

    /// Every successful save as `(aggregate_id, new_version)`, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saves(&self) -> Vec<(Uuid, i64)> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn load_document(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Option<StoredDocument>, DomainError> {
        Ok(self.document(aggregate_id))
    }

    async fn save_document(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        payload: serde_json::Value,
        updated_at: DateTime<Utc>,
    ) -> Result<i64, DomainError> {
        let mut documents = self.documents.lock().unwrap();
        let actual = documents.get(&aggregate_id).map_or(0, |d| d.version);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        let version = actual + 1;
        documents.insert(
            aggregate_id,
            StoredDocument {
                aggregate_id,
                version,
                payload,
                updated_at,
            },
        );
        self.saves.lock().unwrap().push((aggregate_id, version));
        Ok(version)
    }
}

/// A document repository that always returns an infrastructure error. Useful
/// for testing error-handling paths.
#[derive(Debug)]
pub struct FailingDocumentRepository;

#[async_trait]
impl DocumentRepository for FailingDocumentRepository {
    async fn load_document(
        &self,
        _aggregate_id: Uuid,
    ) -> Result<Option<StoredDocument>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save_document(
        &self,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _payload: serde_json::Value,
        _updated_at: DateTime<Utc>,
    ) -> Result<i64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
