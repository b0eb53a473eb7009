//! User management.
//!
//! Users live in the `users` collection. Every create and delete goes through
//! [`UserService`], which emits the lifecycle events other rules (such as
//! profile sync) subscribe to.

use std::sync::Arc;

use profilesync_core::{
    Document, DocumentId, DocumentStore, Filters, HookError, LifecycleBus, LifecycleEvent,
    StoreError, USER_MODEL,
};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::HookFailurePolicy;

const USERNAME_FIELD: &str = "username";
const EMAIL_FIELD: &str = "email";

/// A user loaded from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: DocumentId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Allow-listed extra fields submitted at registration.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Document> for User {
    fn from(doc: Document) -> Self {
        let mut extra = doc.data;
        let username = match extra.remove(USERNAME_FIELD) {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        let email = match extra.remove(EMAIL_FIELD) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        Self {
            id: doc.id,
            username,
            email,
            extra,
        }
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.username)?;
        writeln!(f, "{}", "=".repeat(self.username.chars().count()))?;
        write!(f, "ID: {}", self.id)?;
        if let Some(email) = &self.email {
            write!(f, "\nEmail: {}", email)?;
        }
        for (key, value) in &self.extra {
            match value {
                Value::String(s) => write!(f, "\n{}: {}", key, s)?,
                other => write!(f, "\n{}: {}", key, other)?,
            }
        }
        Ok(())
    }
}

/// Registration input.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    /// Extra fields; only allow-listed keys are accepted.
    pub extra: Map<String, Value>,
}

impl NewUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Username cannot be empty")]
    MissingUsername,

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Invalid parameters: {}", .0.join(", "))]
    InvalidParameters(Vec<String>),

    #[error("User not found: {0}")]
    NotFound(DocumentId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Creates and deletes users, firing lifecycle events around each write.
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    bus: Arc<LifecycleBus>,
    allowed_fields: Vec<String>,
    hook_failure: HookFailurePolicy,
}

impl UserService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        bus: Arc<LifecycleBus>,
        allowed_fields: Vec<String>,
        hook_failure: HookFailurePolicy,
    ) -> Self {
        Self {
            store,
            bus,
            allowed_fields,
            hook_failure,
        }
    }

    /// Declare the username uniqueness constraint.
    pub async fn prepare(&self) -> Result<(), UserError> {
        self.store.ensure_unique(USER_MODEL, USERNAME_FIELD).await?;
        Ok(())
    }

    fn rejected_fields(&self, extra: &Map<String, Value>) -> Vec<String> {
        extra
            .keys()
            .filter(|key| {
                key.as_str() == "id"
                    || key.as_str() == USERNAME_FIELD
                    || key.as_str() == EMAIL_FIELD
                    || !self.allowed_fields.iter().any(|f| f == *key)
            })
            .cloned()
            .collect()
    }

    /// Register a user.
    ///
    /// `beforeCreate` runs first and can veto the write. `afterCreate` runs
    /// once the user is stored; its failure is handled per the configured
    /// [`HookFailurePolicy`].
    pub async fn register(&self, new_user: NewUser) -> Result<User, UserError> {
        let username = new_user.username.trim().to_string();
        if username.is_empty() {
            return Err(UserError::MissingUsername);
        }

        let rejected = self.rejected_fields(&new_user.extra);
        if !rejected.is_empty() {
            return Err(UserError::InvalidParameters(rejected));
        }

        let mut data = new_user.extra;
        data.insert(USERNAME_FIELD.to_string(), Value::from(username.as_str()));
        if let Some(email) = new_user.email.filter(|e| !e.trim().is_empty()) {
            data.insert(EMAIL_FIELD.to_string(), Value::from(email));
        }

        self.bus
            .emit(&LifecycleEvent::before_create(USER_MODEL, data.clone()))
            .await?;

        let doc = self
            .store
            .create(USER_MODEL, data.clone())
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { ref field, .. } if field == USERNAME_FIELD => {
                    UserError::UsernameTaken(username.clone())
                }
                e => UserError::Store(e),
            })?;
        tracing::info!(user = %doc.id, %username, "User created");

        let event = LifecycleEvent::after_create(USER_MODEL, data, doc.to_value());
        self.after_write(&event).await?;

        Ok(User::from(doc))
    }

    /// Delete a user.
    ///
    /// A failing `beforeDelete` hook leaves the user in place.
    pub async fn delete(&self, id: &DocumentId) -> Result<User, UserError> {
        let existing = self
            .store
            .find_one(USER_MODEL, id)
            .await?
            .ok_or_else(|| UserError::NotFound(id.clone()))?;

        self.bus
            .emit(&LifecycleEvent::before_delete(USER_MODEL, id))
            .await?;

        let removed = self.store.delete(USER_MODEL, id).await?.unwrap_or(existing);
        tracing::info!(user = %id, "User deleted");

        let event = LifecycleEvent::after_delete(USER_MODEL, id, removed.to_value());
        self.after_write(&event).await?;

        Ok(User::from(removed))
    }

    pub async fn get(&self, id: &DocumentId) -> Result<Option<User>, UserError> {
        Ok(self.store.find_one(USER_MODEL, id).await?.map(User::from))
    }

    pub async fn list(&self) -> Result<Vec<User>, UserError> {
        let docs = self.store.find_many(USER_MODEL, &Filters::new()).await?;
        Ok(docs.into_iter().map(User::from).collect())
    }

    async fn after_write(&self, event: &LifecycleEvent) -> Result<(), UserError> {
        match self.bus.emit(event).await {
            Ok(()) => Ok(()),
            Err(e) => match self.hook_failure {
                HookFailurePolicy::Propagate => Err(e.into()),
                HookFailurePolicy::Log => {
                    tracing::error!(error = %e, "Hook failed after write, continuing");
                    Ok(())
                }
            },
        }
    }
}
