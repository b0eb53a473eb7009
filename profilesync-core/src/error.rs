//! Error types shared by stores, the lifecycle bus and the sync rule.

use thiserror::Error;

use crate::lifecycle::LifecycleAction;

/// Boxed error returned by lifecycle callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint on {collection}.{field} violated")]
    UniqueViolation { collection: String, field: String },

    #[error("Unsupported filter value for path: {0}")]
    UnsupportedFilter(String),

    #[error("Invalid path or collection name: {0}")]
    InvalidPath(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors raised by the profile sync rule.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Profile lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("Profile write failed: {0}")]
    Write(#[source] StoreError),

    #[error("Profile store setup failed: {0}")]
    Setup(#[source] StoreError),

    #[error("{action} event on '{model}' carries no usable identifier")]
    MissingIdentifier {
        model: String,
        action: LifecycleAction,
    },
}

/// A lifecycle callback failed.
#[derive(Error, Debug)]
#[error("{action} hook on '{model}' failed: {source}")]
pub struct HookError {
    pub model: String,
    pub action: LifecycleAction,
    #[source]
    pub source: BoxError,
}
