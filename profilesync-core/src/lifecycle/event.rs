//! Lifecycle events and their payload accessors.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::document::DocumentId;

/// Point in an entity's write path at which an event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleAction {
    BeforeCreate,
    AfterCreate,
    BeforeDelete,
    AfterDelete,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::BeforeCreate => "beforeCreate",
            LifecycleAction::AfterCreate => "afterCreate",
            LifecycleAction::BeforeDelete => "beforeDelete",
            LifecycleAction::AfterDelete => "afterDelete",
        }
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification fired around a write on a model.
///
/// `params` and `result` are untyped; read them through the accessors, which
/// return `None` instead of trusting the payload shape.
///
/// Creation events look like `{ result: { id }, params: { data: {..} } }`,
/// deletion events like `{ params: { where: { id } } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub model: String,
    pub action: LifecycleAction,
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl LifecycleEvent {
    pub fn new(model: impl Into<String>, action: LifecycleAction, params: Value) -> Self {
        Self {
            model: model.into(),
            action,
            params,
            result: None,
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn before_create(model: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::new(model, LifecycleAction::BeforeCreate, json!({ "data": data }))
    }

    pub fn after_create(model: impl Into<String>, data: Map<String, Value>, result: Value) -> Self {
        Self::new(model, LifecycleAction::AfterCreate, json!({ "data": data }))
            .with_result(result)
    }

    pub fn before_delete(model: impl Into<String>, id: &DocumentId) -> Self {
        Self::new(
            model,
            LifecycleAction::BeforeDelete,
            json!({ "where": { "id": id } }),
        )
    }

    pub fn after_delete(model: impl Into<String>, id: &DocumentId, result: Value) -> Self {
        Self::new(
            model,
            LifecycleAction::AfterDelete,
            json!({ "where": { "id": id } }),
        )
        .with_result(result)
    }

    /// `result.id`
    pub fn result_id(&self) -> Option<DocumentId> {
        self.result
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(DocumentId::from_value)
    }

    /// `params.where.id`
    pub fn where_id(&self) -> Option<DocumentId> {
        self.params
            .get("where")
            .and_then(|w| w.get("id"))
            .and_then(DocumentId::from_value)
    }

    /// `params.data.<field>` when it is a string with visible content.
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.params
            .get("data")
            .and_then(|d| d.get(field))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}
