//! Late-bound parameters for action configuration
//!
//! A [`Param`] is a deferred value source: either a literal carried at
//! construction time, or a reference into the run's result store, looked up
//! lazily when the owning action executes. References address an output by
//! category + identifier and project one key out of the published mapping,
//! which is how one action's output feeds a later action's input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::context::RunContext;
use crate::newtypes::{ActionId, EntityKind, OutputKey, TaskId};

/// Errors that can occur while resolving a parameter against the store
///
/// All of these are terminal for the action that triggered them; nothing in
/// the resolution path retries or substitutes defaults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A reference was constructed with an empty identifier
    #[error("{kind} identifier cannot be empty")]
    EmptyId {
        /// Category the reference addresses
        kind: EntityKind,
    },

    /// A reference was resolved against a context with no store attached
    #[error("no output store in context, cannot resolve {kind} '{id}'")]
    StoreUnavailable {
        /// Category the reference addresses
        kind: EntityKind,
        /// Identifier the reference addresses
        id: String,
    },

    /// No output has been published under the referenced identifier
    #[error("{kind} '{id}' not found in output store")]
    NotFound {
        /// Category the reference addresses
        kind: EntityKind,
        /// Identifier that has no published output
        id: String,
    },

    /// The published output does not support key projection
    #[error("output of {kind} '{id}' is not a keyed mapping, cannot extract key '{key}'")]
    NotAMapping {
        /// Category of the published output
        kind: EntityKind,
        /// Identifier of the published output
        id: String,
        /// Key the reference tried to project
        key: String,
    },

    /// The published mapping lacks the requested key
    #[error("output key '{key}' not found in {kind} '{id}'")]
    KeyNotFound {
        /// Category of the published output
        kind: EntityKind,
        /// Identifier of the published output
        id: String,
        /// Key that is absent from the mapping
        key: String,
    },
}

/// A deferred value source for one action parameter
///
/// The serde representation matches the reference literals accepted from
/// configuration:
///
/// ```json
/// {"kind": "static", "value": "/srv/app"}
/// {"kind": "actionOutput", "actionID": "detect", "outputKey": "workingDir"}
/// {"kind": "taskOutput", "taskID": "deploy", "outputKey": "services"}
/// {"kind": "entityOutput", "entityType": "deployment", "entityID": "blue", "outputKey": "replicas"}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
#[non_exhaustive]
pub enum Param {
    /// A literal value, returned by resolution unconditionally
    #[serde(rename = "static")]
    Static {
        /// The literal value
        value: Value,
    },

    /// A key projected from a previously published action output
    #[serde(rename = "actionOutput")]
    ActionOutput {
        /// Identifier the producing action published under
        #[serde(rename = "actionID")]
        action_id: ActionId,
        /// Key to project from the published mapping
        #[serde(rename = "outputKey")]
        output_key: OutputKey,
    },

    /// A key projected from a previously published task output
    #[serde(rename = "taskOutput")]
    TaskOutput {
        /// Identifier the producing task published under
        #[serde(rename = "taskID")]
        task_id: TaskId,
        /// Key to project from the published mapping
        #[serde(rename = "outputKey")]
        output_key: OutputKey,
    },

    /// A key projected from an output published under a caller-chosen category
    #[serde(rename = "entityOutput")]
    EntityOutput {
        /// Caller-chosen output category
        #[serde(rename = "entityType")]
        entity_type: EntityKind,
        /// Identifier within that category
        #[serde(rename = "entityID")]
        entity_id: String,
        /// Key to project from the published mapping
        #[serde(rename = "outputKey")]
        output_key: OutputKey,
    },
}

impl Param {
    /// Create a literal parameter
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Static {
            value: value.into(),
        }
    }

    /// Create a reference to a key of a published action output
    pub fn action_output(id: impl Into<ActionId>, key: impl Into<OutputKey>) -> Self {
        Self::ActionOutput {
            action_id: id.into(),
            output_key: key.into(),
        }
    }

    /// Create a reference to a key of a published task output
    pub fn task_output(id: impl Into<TaskId>, key: impl Into<OutputKey>) -> Self {
        Self::TaskOutput {
            task_id: id.into(),
            output_key: key.into(),
        }
    }

    /// Create a reference to a key of an output under a caller-chosen category
    pub fn entity_output(
        kind: impl Into<EntityKind>,
        id: impl Into<String>,
        key: impl Into<OutputKey>,
    ) -> Self {
        Self::EntityOutput {
            entity_type: kind.into(),
            entity_id: id.into(),
            output_key: key.into(),
        }
    }

    /// True for reference variants that will consult the store.
    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Static { .. })
    }

    /// Resolve this parameter to a concrete value.
    ///
    /// `Static` returns its literal unconditionally. Reference variants look
    /// up (category, identifier) in the store reachable from `ctx` and
    /// project the output key from the published mapping. Resolution has no
    /// side effects and is safe to call from concurrently executing actions.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`]; the empty-identifier check runs before anything
    /// else, including store availability.
    pub fn resolve(&self, ctx: &RunContext) -> Result<Value, ResolveError> {
        match self {
            Self::Static { value } => Ok(value.clone()),
            Self::ActionOutput {
                action_id,
                output_key,
            } => resolve_ref(
                ctx,
                EntityKind::action(),
                action_id.as_str(),
                output_key.as_str(),
            ),
            Self::TaskOutput {
                task_id,
                output_key,
            } => resolve_ref(
                ctx,
                EntityKind::task(),
                task_id.as_str(),
                output_key.as_str(),
            ),
            Self::EntityOutput {
                entity_type,
                entity_id,
                output_key,
            } => resolve_ref(ctx, entity_type.clone(), entity_id, output_key.as_str()),
        }
    }
}

fn resolve_ref(
    ctx: &RunContext,
    kind: EntityKind,
    id: &str,
    key: &str,
) -> Result<Value, ResolveError> {
    if id.is_empty() {
        return Err(ResolveError::EmptyId { kind });
    }

    let store = match ctx.store() {
        Some(store) => store,
        None => {
            return Err(ResolveError::StoreUnavailable {
                kind,
                id: id.to_string(),
            })
        }
    };

    let output = match store.entity_output(&kind, id) {
        Some(output) => output,
        None => {
            return Err(ResolveError::NotFound {
                kind,
                id: id.to_string(),
            })
        }
    };

    let mapping = match output.as_object() {
        Some(mapping) => mapping,
        None => {
            return Err(ResolveError::NotAMapping {
                kind,
                id: id.to_string(),
                key: key.to_string(),
            })
        }
    };

    match mapping.get(key) {
        Some(value) => Ok(value.clone()),
        None => Err(ResolveError::KeyNotFound {
            kind,
            id: id.to_string(),
            key: key.to_string(),
        }),
    }
}
