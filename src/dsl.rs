//! DSL helpers for ergonomic parameter construction
//!
//! Thin free-function wrappers over the [`Param`] constructors to keep action
//! assembly readable.

use serde_json::Value;

use crate::newtypes::{ActionId, EntityKind, OutputKey, TaskId};
use crate::param::Param;

/// Create a literal parameter
///
/// # Example
/// ```
/// use runbook::dsl::literal;
///
/// let dir = literal("/srv/app");
/// let services = literal(vec!["web".to_string(), "db".to_string()]);
/// ```
pub fn literal(value: impl Into<Value>) -> Param {
    Param::literal(value)
}

/// Reference a key of a previously published action output
///
/// # Example
/// ```
/// use runbook::dsl::action_output;
///
/// let dir = action_output("detect-checkout", "workingDir");
/// ```
pub fn action_output(id: impl Into<ActionId>, key: impl Into<OutputKey>) -> Param {
    Param::action_output(id, key)
}

/// Reference a key of a previously published task output
///
/// # Example
/// ```
/// use runbook::dsl::task_output;
///
/// let services = task_output("deploy", "services");
/// ```
pub fn task_output(id: impl Into<TaskId>, key: impl Into<OutputKey>) -> Param {
    Param::task_output(id, key)
}

/// Reference a key of an output published under a caller-chosen category
///
/// # Example
/// ```
/// use runbook::dsl::entity_output;
///
/// let replicas = entity_output("deployment", "blue", "replicas");
/// ```
pub fn entity_output(
    kind: impl Into<EntityKind>,
    id: impl Into<String>,
    key: impl Into<OutputKey>,
) -> Param {
    Param::entity_output(kind, id, key)
}
