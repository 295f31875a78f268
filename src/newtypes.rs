//! Domain-specific newtypes for the resolution core
//!
//! These newtypes prevent identifier confusion (action ids vs task ids vs
//! output keys all being bare strings). All use Arc<str> for O(1) cloning.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

// Helper module for Arc<str> serialization
mod arc_str_serde {
    use super::{Arc, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(arc: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(arc)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(|s| Arc::from(s.as_str()))
    }
}

/// Action identifier, the key an action publishes its output under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(#[serde(with = "arc_str_serde")] Arc<str>);

impl ActionId {
    /// Create a new action id
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty id, which no reference may carry
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Task identifier, the key a task publishes its aggregate output under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(#[serde(with = "arc_str_serde")] Arc<str>);

impl TaskId {
    /// Create a new task id
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty id, which no reference may carry
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Output category in the result store ("action", "task", or caller-chosen).
///
/// The store and the reference parameters never special-case a category;
/// [`EntityKind::action`] and [`EntityKind::task`] are merely the two
/// well-known values the framework itself publishes under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKind(#[serde(with = "arc_str_serde")] Arc<str>);

impl EntityKind {
    /// Create a caller-chosen category
    pub fn new(kind: impl AsRef<str>) -> Self {
        Self(Arc::from(kind.as_ref()))
    }

    /// The category action outputs are published under
    pub fn action() -> Self {
        Self::new("action")
    }

    /// The category task outputs are published under
    pub fn task() -> Self {
        Self::new("task")
    }

    /// Get the category as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityKind {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Declared parameter name on an action
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamName(#[serde(with = "arc_str_serde")] Arc<str>);

impl ParamName {
    /// Create a new parameter name
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Get the parameter name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParamName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParamName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ParamName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Key projected out of a published output mapping
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputKey(#[serde(with = "arc_str_serde")] Arc<str>);

impl OutputKey {
    /// Create a new output key
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OutputKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OutputKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OutputKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
