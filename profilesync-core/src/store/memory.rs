//! In-memory document store.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::DocumentStore;
use crate::document::{lookup_path, Document, DocumentId};
use crate::error::StoreError;
use crate::filter::{validate_path, Filters};

#[derive(Debug, Default)]
struct Collection {
    /// Documents in insertion order.
    documents: Vec<Document>,
    /// Fields declared unique.
    unique: HashSet<String>,
}

impl Collection {
    fn conflicting_field(&self, data: &Map<String, Value>) -> Option<&str> {
        self.unique.iter().map(String::as_str).find(|field| {
            lookup_path(data, field).is_some_and(|value| {
                self.documents
                    .iter()
                    .any(|doc| doc.get(field) == Some(value))
            })
        })
    }
}

/// Process-local [`DocumentStore`].
///
/// All checks and writes for one call happen under a single lock, so unique
/// constraints hold even when callers race.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Number of documents currently in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.lock()
            .map(|c| c.get(collection).map_or(0, |c| c.documents.len()))
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_many(
        &self,
        collection: &str,
        filters: &Filters,
    ) -> Result<Vec<Document>, StoreError> {
        filters.validate()?;
        let collections = self.lock()?;

        Ok(collections
            .get(collection)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|doc| filters.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.lock()?;

        Ok(collections
            .get(collection)
            .and_then(|c| c.documents.iter().find(|doc| &doc.id == id))
            .cloned())
    }

    async fn create(
        &self,
        collection: &str,
        data: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        validate_path(collection)?;
        let mut collections = self.lock()?;
        let entry = collections.entry(collection.to_string()).or_default();

        if let Some(field) = entry.conflicting_field(&data) {
            return Err(StoreError::UniqueViolation {
                collection: collection.to_string(),
                field: field.to_string(),
            });
        }

        let doc = Document::new(DocumentId::generate(), data);
        entry.documents.push(doc.clone());
        Ok(doc)
    }

    async fn delete(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.lock()?;

        Ok(collections.get_mut(collection).and_then(|c| {
            let pos = c.documents.iter().position(|doc| &doc.id == id)?;
            Some(c.documents.remove(pos))
        }))
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        validate_path(collection)?;
        validate_path(field)?;
        let mut collections = self.lock()?;
        let entry = collections.entry(collection.to_string()).or_default();

        let mut seen = Vec::new();
        for value in entry.documents.iter().filter_map(|doc| doc.get(field)) {
            if seen.contains(&value) {
                return Err(StoreError::UniqueViolation {
                    collection: collection.to_string(),
                    field: field.to_string(),
                });
            }
            seen.push(value);
        }

        entry.unique.insert(field.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryStore::new();

        let created = store
            .create("profiles", data(json!({"user": "1", "bio": "a"})))
            .await
            .unwrap();
        store
            .create("profiles", data(json!({"user": "2", "bio": "b"})))
            .await
            .unwrap();

        let found = store
            .find_many("profiles", &Filters::new().eq("user", "1"))
            .await
            .unwrap();
        assert_eq!(found, vec![created.clone()]);

        let one = store.find_one("profiles", &created.id).await.unwrap();
        assert_eq!(one, Some(created));
    }

    #[tokio::test]
    async fn test_find_many_keeps_insertion_order() {
        let store = MemoryStore::new();
        for bio in ["first", "second", "third"] {
            store
                .create("profiles", data(json!({"user": "1", "bio": bio})))
                .await
                .unwrap();
        }

        let found = store
            .find_many("profiles", &Filters::new().eq("user", "1"))
            .await
            .unwrap();
        let bios: Vec<_> = found.iter().filter_map(|d| d.get_str("bio")).collect();
        assert_eq!(bios, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_booleans_do_not_match_integers() {
        let store = MemoryStore::new();
        store
            .create("profiles", data(json!({"active": 1})))
            .await
            .unwrap();

        let by_true = store
            .find_many("profiles", &Filters::new().eq("active", true))
            .await
            .unwrap();
        assert!(by_true.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        let found = store.find_many("nothing", &Filters::new()).await.unwrap();
        assert!(found.is_empty());
        assert!(store
            .delete("nothing", &DocumentId::from("1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_returns_removed_document() {
        let store = MemoryStore::new();
        let created = store
            .create("profiles", data(json!({"user": "1"})))
            .await
            .unwrap();

        let removed = store.delete("profiles", &created.id).await.unwrap();
        assert_eq!(removed, Some(created.clone()));
        assert!(store.find_one("profiles", &created.id).await.unwrap().is_none());
        assert_eq!(store.len("profiles"), 0);
    }

    #[tokio::test]
    async fn test_unique_constraint_rejects_duplicates() {
        let store = MemoryStore::new();
        store.ensure_unique("profiles", "user").await.unwrap();
        store.ensure_unique("profiles", "user").await.unwrap();

        store
            .create("profiles", data(json!({"user": "1"})))
            .await
            .unwrap();
        let err = store
            .create("profiles", data(json!({"user": "1"})))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::UniqueViolation { ref collection, ref field }
                if collection == "profiles" && field == "user"
        ));
        assert_eq!(store.len("profiles"), 1);
    }

    #[tokio::test]
    async fn test_ensure_unique_fails_on_existing_duplicates() {
        let store = MemoryStore::new();
        for _ in 0..2 {
            store
                .create("profiles", data(json!({"user": "1"})))
                .await
                .unwrap();
        }

        let result = store.ensure_unique("profiles", "user").await;
        assert!(matches!(result, Err(StoreError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_documents_without_unique_field_are_allowed() {
        let store = MemoryStore::new();
        store.ensure_unique("profiles", "user").await.unwrap();

        store.create("profiles", data(json!({"bio": "a"}))).await.unwrap();
        store.create("profiles", data(json!({"bio": "b"}))).await.unwrap();
        assert_eq!(store.len("profiles"), 2);
    }
}
