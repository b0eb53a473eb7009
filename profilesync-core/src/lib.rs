//! profilesync core library
//!
//! Lifecycle bus, document store port and the rule that keeps one profile
//! per user.

pub mod document;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod profile;
pub mod store;

pub use document::{Document, DocumentId};
pub use error::{BoxError, HookError, StoreError, SyncError};
pub use filter::Filters;
pub use lifecycle::{Hook, LifecycleAction, LifecycleBus, LifecycleEvent, Subscription};
pub use profile::{
    is_synthesized, synthesize_display_name, Profile, ProfileSyncRule, SyncOutcome, DEFAULT_BIO,
    PROFILE_COLLECTION, USER_MODEL,
};
pub use store::{DocumentStore, MemoryStore};
