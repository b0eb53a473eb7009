//! User/profile synchronization.
//!
//! Every user gets at most one profile. The profile is created when the user
//! is created and removed just before the user is deleted. Uniqueness of the
//! back-reference is enforced by the store, so concurrent creation events for
//! one user cannot both insert.

mod names;

pub use names::{is_synthesized, synthesize_display_name, ADJECTIVES, NOUNS};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{Document, DocumentId};
use crate::error::{BoxError, StoreError, SyncError};
use crate::filter::Filters;
use crate::lifecycle::{LifecycleBus, LifecycleEvent, Subscription};
use crate::store::DocumentStore;

/// Model whose lifecycle drives profile creation and removal.
pub const USER_MODEL: &str = "users";
/// Collection profiles are stored in.
pub const PROFILE_COLLECTION: &str = "profiles";
/// Back-reference from a profile to its user.
pub const USER_FIELD: &str = "user";
pub const FULL_NAME_FIELD: &str = "fullName";
pub const BIO_FIELD: &str = "bio";
/// Biography given to users who registered without one.
pub const DEFAULT_BIO: &str = "No bio yet";

/// A user's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: DocumentId,
    pub user: DocumentId,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub bio: String,
}

impl Profile {
    fn data(user: &DocumentId, full_name: &str, bio: &str) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert(USER_FIELD.to_string(), user.to_value());
        data.insert(FULL_NAME_FIELD.to_string(), Value::from(full_name));
        data.insert(BIO_FIELD.to_string(), Value::from(bio));
        data
    }
}

impl From<Document> for Profile {
    fn from(doc: Document) -> Self {
        let user = doc
            .get(USER_FIELD)
            .and_then(DocumentId::from_value)
            .unwrap_or_else(|| DocumentId::new(""));
        Self {
            full_name: doc.get_str(FULL_NAME_FIELD).unwrap_or_default().to_string(),
            bio: doc.get_str(BIO_FIELD).unwrap_or_default().to_string(),
            user,
            id: doc.id,
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.full_name)?;
        writeln!(f, "{}", "=".repeat(self.full_name.chars().count()))?;
        writeln!(f, "Profile: {}", self.id)?;
        writeln!(f, "User: {}", self.user)?;
        write!(f, "Bio: {}", self.bio)
    }
}

/// What a handler did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Created(Profile),
    /// The user already had a profile; nothing was written.
    AlreadyPresent,
    Deleted(DocumentId),
    /// The user had no profile; nothing was removed.
    NothingToDelete,
}

/// Keeps exactly one profile alive per existing user.
pub struct ProfileSyncRule {
    store: Arc<dyn DocumentStore>,
}

impl ProfileSyncRule {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Declare the storage constraint and subscribe to user lifecycle events.
    pub async fn install(self: Arc<Self>, bus: &LifecycleBus) -> Result<(), SyncError> {
        self.store
            .ensure_unique(PROFILE_COLLECTION, USER_FIELD)
            .await
            .map_err(SyncError::Setup)?;

        bus.subscribe(self.subscription()).await;
        tracing::info!(model = USER_MODEL, "Profile sync installed");
        Ok(())
    }

    /// `afterCreate` and `beforeDelete` callbacks for [`USER_MODEL`].
    pub fn subscription(self: &Arc<Self>) -> Subscription {
        let on_create = Arc::clone(self);
        let on_delete = Arc::clone(self);

        Subscription::new([USER_MODEL])
            .after_create(move |event| {
                let rule = Arc::clone(&on_create);
                async move {
                    rule.on_user_created(&event).await?;
                    Ok::<(), BoxError>(())
                }
            })
            .before_delete(move |event| {
                let rule = Arc::clone(&on_delete);
                async move {
                    rule.on_user_deleting(&event).await?;
                    Ok::<(), BoxError>(())
                }
            })
    }

    /// Create the profile for a freshly created user, unless one exists.
    #[tracing::instrument(skip_all, fields(user = ?event.result_id()))]
    pub async fn on_user_created(&self, event: &LifecycleEvent) -> Result<SyncOutcome, SyncError> {
        let user = event
            .result_id()
            .ok_or_else(|| SyncError::MissingIdentifier {
                model: event.model.clone(),
                action: event.action,
            })?;

        let full_name = match event.data_str(FULL_NAME_FIELD) {
            Some(name) => name.to_string(),
            None => synthesize_display_name(&mut rand::rng()),
        };
        let bio = event.data_str(BIO_FIELD).unwrap_or(DEFAULT_BIO);

        if !self.find_profiles(&user).await?.is_empty() {
            tracing::debug!("Profile already exists, skipping");
            return Ok(SyncOutcome::AlreadyPresent);
        }

        let data = Profile::data(&user, &full_name, bio);
        match self.store.create(PROFILE_COLLECTION, data).await {
            Ok(doc) => {
                let profile = Profile::from(doc);
                tracing::info!(profile = %profile.id, "Profile created");
                Ok(SyncOutcome::Created(profile))
            }
            Err(StoreError::UniqueViolation { .. }) => {
                tracing::debug!("Profile created concurrently, skipping");
                Ok(SyncOutcome::AlreadyPresent)
            }
            Err(e) => Err(SyncError::Write(e)),
        }
    }

    /// Remove the profile of a user that is about to be deleted.
    #[tracing::instrument(skip_all, fields(user = ?event.where_id()))]
    pub async fn on_user_deleting(
        &self,
        event: &LifecycleEvent,
    ) -> Result<SyncOutcome, SyncError> {
        let user = event
            .where_id()
            .ok_or_else(|| SyncError::MissingIdentifier {
                model: event.model.clone(),
                action: event.action,
            })?;

        let profiles = self.find_profiles(&user).await?;
        let Some(first) = profiles.first() else {
            tracing::debug!("No profile to delete");
            return Ok(SyncOutcome::NothingToDelete);
        };

        if profiles.len() > 1 {
            tracing::warn!(
                count = profiles.len(),
                "User has several profiles, deleting the first only"
            );
        }

        self.store
            .delete(PROFILE_COLLECTION, &first.id)
            .await
            .map_err(SyncError::Write)?;

        tracing::info!(profile = %first.id, "Profile deleted");
        Ok(SyncOutcome::Deleted(first.id.clone()))
    }

    /// Profiles referencing `user`, in store order.
    pub async fn find_profiles(&self, user: &DocumentId) -> Result<Vec<Profile>, SyncError> {
        let filters = Filters::new().eq(USER_FIELD, user.to_value());
        let docs = self
            .store
            .find_many(PROFILE_COLLECTION, &filters)
            .await
            .map_err(SyncError::Lookup)?;

        Ok(docs.into_iter().map(Profile::from).collect())
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, SyncError> {
        let docs = self
            .store
            .find_many(PROFILE_COLLECTION, &Filters::new())
            .await
            .map_err(SyncError::Lookup)?;

        Ok(docs.into_iter().map(Profile::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleAction;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;

    fn rule() -> (Arc<MemoryStore>, ProfileSyncRule) {
        let store = Arc::new(MemoryStore::new());
        let rule = ProfileSyncRule::new(store.clone());
        (store, rule)
    }

    fn created(id: Value, data: Value) -> LifecycleEvent {
        LifecycleEvent::after_create(
            USER_MODEL,
            data.as_object().cloned().unwrap_or_default(),
            json!({ "id": id }),
        )
    }

    fn deleting(id: u64) -> LifecycleEvent {
        LifecycleEvent::before_delete(USER_MODEL, &DocumentId::from(id))
    }

    #[tokio::test]
    async fn test_supplied_name_and_bio_are_kept_verbatim() {
        let (_, rule) = rule();

        let event = created(json!(42), json!({"fullName": "Ada Lovelace", "bio": "Mathematician"}));
        let outcome = rule.on_user_created(&event).await.unwrap();

        let SyncOutcome::Created(profile) = outcome else {
            panic!("expected a profile to be created");
        };
        assert_eq!(profile.user, DocumentId::from("42"));
        assert_eq!(profile.full_name, "Ada Lovelace");
        assert_eq!(profile.bio, "Mathematician");
    }

    #[tokio::test]
    async fn test_missing_fields_get_generated_name_and_placeholder_bio() {
        let (_, rule) = rule();

        rule.on_user_created(&created(json!(7), json!({})))
            .await
            .unwrap();

        let profiles = rule.find_profiles(&DocumentId::from("7")).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert!(is_synthesized(&profiles[0].full_name));
        assert_eq!(profiles[0].bio, DEFAULT_BIO);
    }

    #[tokio::test]
    async fn test_blank_fields_count_as_missing() {
        let (_, rule) = rule();

        rule.on_user_created(&created(json!("7"), json!({"fullName": "", "bio": "   "})))
            .await
            .unwrap();

        let profile = &rule.find_profiles(&DocumentId::from("7")).await.unwrap()[0];
        assert!(is_synthesized(&profile.full_name));
        assert_eq!(profile.bio, DEFAULT_BIO);
    }

    #[tokio::test]
    async fn test_second_creation_is_noop() {
        let (store, rule) = rule();
        let event = created(json!(7), json!({}));

        assert!(matches!(
            rule.on_user_created(&event).await.unwrap(),
            SyncOutcome::Created(_)
        ));
        assert_eq!(
            rule.on_user_created(&event).await.unwrap(),
            SyncOutcome::AlreadyPresent
        );
        assert_eq!(store.len(PROFILE_COLLECTION), 1);
    }

    #[tokio::test]
    async fn test_numeric_and_string_ids_name_the_same_user() {
        let (store, rule) = rule();

        rule.on_user_created(&created(json!(7), json!({})))
            .await
            .unwrap();
        let outcome = rule
            .on_user_created(&created(json!("7"), json!({})))
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::AlreadyPresent);
        assert_eq!(store.len(PROFILE_COLLECTION), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_profile() {
        let (_, rule) = rule();
        rule.on_user_created(&created(json!(42), json!({"fullName": "Ada Lovelace"})))
            .await
            .unwrap();

        let outcome = rule.on_user_deleting(&deleting(42)).await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Deleted(_)));
        assert!(rule
            .find_profiles(&DocumentId::from("42"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_profile_is_noop() {
        let (store, rule) = rule();
        rule.on_user_created(&created(json!(1), json!({})))
            .await
            .unwrap();

        let outcome = rule.on_user_deleting(&deleting(99)).await.unwrap();

        assert_eq!(outcome, SyncOutcome::NothingToDelete);
        assert_eq!(store.len(PROFILE_COLLECTION), 1);
    }

    #[tokio::test]
    async fn test_delete_only_touches_target_user() {
        let (_, rule) = rule();
        for id in [1, 2] {
            rule.on_user_created(&created(json!(id), json!({})))
                .await
                .unwrap();
        }

        rule.on_user_deleting(&deleting(1)).await.unwrap();

        assert!(rule.find_profiles(&DocumentId::from("1")).await.unwrap().is_empty());
        assert_eq!(rule.find_profiles(&DocumentId::from("2")).await.unwrap().len(), 1);

        let remaining = rule.list_profiles().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user, DocumentId::from("2"));
    }

    #[tokio::test]
    async fn test_delete_removes_first_of_duplicates() {
        // No unique constraint declared, so duplicates can exist.
        let (store, rule) = rule();
        let first = store
            .create(PROFILE_COLLECTION, Profile::data(&DocumentId::from("5"), "A", "a"))
            .await
            .unwrap();
        store
            .create(PROFILE_COLLECTION, Profile::data(&DocumentId::from("5"), "B", "b"))
            .await
            .unwrap();

        let outcome = rule.on_user_deleting(&deleting(5)).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Deleted(first.id));
        let left = rule.find_profiles(&DocumentId::from("5")).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].full_name, "B");
    }

    #[tokio::test]
    async fn test_missing_identifiers_are_rejected() {
        let (store, rule) = rule();

        let no_result = LifecycleEvent::new(
            USER_MODEL,
            LifecycleAction::AfterCreate,
            json!({"data": {}}),
        );
        let err = rule.on_user_created(&no_result).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::MissingIdentifier { action: LifecycleAction::AfterCreate, .. }
        ));

        let no_where = LifecycleEvent::new(
            USER_MODEL,
            LifecycleAction::BeforeDelete,
            json!({"where": {}}),
        );
        let err = rule.on_user_deleting(&no_where).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::MissingIdentifier { action: LifecycleAction::BeforeDelete, .. }
        ));
        assert_eq!(store.len(PROFILE_COLLECTION), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creations_leave_one_profile() {
        let store = Arc::new(MemoryStore::new());
        let rule = Arc::new(ProfileSyncRule::new(store.clone()));
        let bus = LifecycleBus::new();
        Arc::clone(&rule).install(&bus).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let rule = Arc::clone(&rule);
            handles.push(tokio::spawn(async move {
                rule.on_user_created(&created(json!(7), json!({}))).await
            }));
        }

        let mut created_count = 0;
        for handle in handles {
            if let SyncOutcome::Created(_) = handle.await.unwrap().unwrap() {
                created_count += 1;
            }
        }

        assert_eq!(created_count, 1);
        assert_eq!(store.len(PROFILE_COLLECTION), 1);
    }

    #[tokio::test]
    async fn test_installed_rule_reacts_to_bus_events() {
        let store = Arc::new(MemoryStore::new());
        let rule = Arc::new(ProfileSyncRule::new(store.clone()));
        let bus = LifecycleBus::new();
        Arc::clone(&rule).install(&bus).await.unwrap();

        bus.emit(&created(json!(42), json!({"fullName": "Ada Lovelace", "bio": "Mathematician"})))
            .await
            .unwrap();
        assert_eq!(store.len(PROFILE_COLLECTION), 1);

        bus.emit(&deleting(42)).await.unwrap();
        assert_eq!(store.len(PROFILE_COLLECTION), 0);
    }

    #[tokio::test]
    async fn test_install_fails_when_duplicates_exist() {
        let (store, _) = rule();
        for _ in 0..2 {
            store
                .create(PROFILE_COLLECTION, Profile::data(&DocumentId::from("5"), "A", "a"))
                .await
                .unwrap();
        }

        let rule = Arc::new(ProfileSyncRule::new(store));
        let result = rule.install(&LifecycleBus::new()).await;
        assert!(matches!(result, Err(SyncError::Setup(_))));
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn find_many(&self, _: &str, _: &Filters) -> Result<Vec<Document>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn find_one(&self, _: &str, _: &DocumentId) -> Result<Option<Document>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn create(&self, _: &str, _: Map<String, Value>) -> Result<Document, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn delete(&self, _: &str, _: &DocumentId) -> Result<Option<Document>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn ensure_unique(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_failures_propagate_through_bus() {
        let rule = Arc::new(ProfileSyncRule::new(Arc::new(FailingStore)));
        let bus = LifecycleBus::new();
        Arc::clone(&rule).install(&bus).await.unwrap();

        let err = rule
            .on_user_created(&created(json!(1), json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Lookup(_)));

        let err = bus.emit(&deleting(1)).await.unwrap_err();
        assert_eq!(err.action, LifecycleAction::BeforeDelete);
        assert!(err.to_string().contains("connection refused"));
    }
}
