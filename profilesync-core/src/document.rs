//! Documents and their identifiers.
//!
//! A document is a JSON object stored in a named collection. Stores assign
//! the identifier; callers never choose it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Store-assigned document identifier.
///
/// Identifiers are opaque strings. Events coming from the host may carry them
/// as JSON numbers (`42`) or strings (`"42"`); both forms name the same
/// document once converted with [`DocumentId::from_value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate a new random document ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Read an identifier out of an untyped JSON value.
    ///
    /// Accepts non-empty strings and integer numbers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON form used when the id is stored as a back-reference.
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for DocumentId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// A stored document: its identifier plus arbitrary JSON attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: DocumentId, data: Map<String, Value>) -> Self {
        Self { id, data }
    }

    /// Resolve a dot-separated path (`user.id`) through nested objects.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.data, path)
    }

    /// Like [`Document::get`], but only for string values.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// The document as one JSON object, `id` included.
    pub fn to_value(&self) -> Value {
        let mut map = self.data.clone();
        map.insert("id".to_string(), self.id.to_value());
        Value::Object(map)
    }
}

/// Walk `path` through nested JSON objects.
pub(crate) fn lookup_path<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
