//! Document store port.
//!
//! The sync rule only ever talks to storage through [`DocumentStore`]; hosts
//! plug in their own backend. [`MemoryStore`] ships for tests and embedding.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::document::{Document, DocumentId};
use crate::error::StoreError;
use crate::filter::Filters;

/// Collection-oriented document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents in `collection` matching `filters`, in insertion order.
    async fn find_many(&self, collection: &str, filters: &Filters)
        -> Result<Vec<Document>, StoreError>;

    /// The document with the given id, if any.
    async fn find_one(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError>;

    /// Insert a new document and return it with its assigned id.
    async fn create(
        &self,
        collection: &str,
        data: Map<String, Value>,
    ) -> Result<Document, StoreError>;

    /// Remove a document. Returns what was removed, `None` if it was absent.
    async fn delete(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError>;

    /// Declare that `field` must hold distinct values across `collection`.
    ///
    /// Idempotent. Fails with [`StoreError::UniqueViolation`] if stored data
    /// already breaks the constraint.
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError>;
}
