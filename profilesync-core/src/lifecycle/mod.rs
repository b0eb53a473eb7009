//! Lifecycle event bus.
//!
//! Hosts emit a [`LifecycleEvent`] around every write on a model; callbacks
//! registered through a [`Subscription`] run in subscription order.
//!
//! ```text
//! bus.subscribe(
//!     Subscription::new(["users"])
//!         .after_create(|event| async move { .. })
//!         .before_delete(|event| async move { .. }),
//! )
//! ```

mod event;

pub use event::{LifecycleAction, LifecycleEvent};

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::RwLock;

use crate::error::{BoxError, HookError};

/// A registered lifecycle callback.
pub type Hook =
    Arc<dyn Fn(LifecycleEvent) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Models to observe and the callbacks to run for them.
#[derive(Clone)]
pub struct Subscription {
    models: HashSet<String>,
    hooks: HashMap<LifecycleAction, Hook>,
}

impl Subscription {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            hooks: HashMap::new(),
        }
    }

    /// Register `callback` for `action`, replacing any previous one.
    pub fn on<F, Fut>(mut self, action: LifecycleAction, callback: F) -> Self
    where
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let hook: Hook = Arc::new(move |event| callback(event).boxed());
        self.hooks.insert(action, hook);
        self
    }

    pub fn before_create<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on(LifecycleAction::BeforeCreate, callback)
    }

    pub fn after_create<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on(LifecycleAction::AfterCreate, callback)
    }

    pub fn before_delete<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on(LifecycleAction::BeforeDelete, callback)
    }

    pub fn after_delete<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on(LifecycleAction::AfterDelete, callback)
    }

    fn hook_for(&self, event: &LifecycleEvent) -> Option<Hook> {
        if !self.models.contains(&event.model) {
            return None;
        }
        self.hooks.get(&event.action).cloned()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("models", &self.models)
            .field("actions", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Dispatches lifecycle events to subscribed callbacks.
#[derive(Debug, Default)]
pub struct LifecycleBus {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl LifecycleBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, subscription: Subscription) {
        tracing::debug!(?subscription, "Lifecycle subscription added");
        self.subscriptions.write().await.push(subscription);
    }

    /// Run every callback registered for this event's model and action.
    ///
    /// Callbacks run one after another; the first failure stops dispatch and
    /// is returned.
    pub async fn emit(&self, event: &LifecycleEvent) -> Result<(), HookError> {
        let hooks: Vec<Hook> = self
            .subscriptions
            .read()
            .await
            .iter()
            .filter_map(|s| s.hook_for(event))
            .collect();

        for hook in hooks {
            hook(event.clone()).await.map_err(|source| HookError {
                model: event.model.clone(),
                action: event.action,
                source,
            })?;
        }

        Ok(())
    }
}
