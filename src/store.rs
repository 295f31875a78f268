//! Shared result store for published action and task outputs
//!
//! The store is a process-scoped registry mapping a two-level key
//! (category, identifier) to an opaque output value — usually a mapping from
//! string keys to values, but nothing enforces that shape. Actions publish
//! under the `action` category, tasks under `task`, and callers may publish
//! under any category of their own; nothing in the store special-cases the
//! well-known categories.
//!
//! One store is constructed per independent execution run and reached through
//! [`RunContext`](crate::RunContext) propagation, never through a global, so
//! isolated runs (tests, nested sub-executions) cannot observe each other.
//!
//! Reads tolerate concurrent readers and writes are atomic per key; there are
//! no cross-key transactions.

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

use crate::newtypes::{ActionId, EntityKind, TaskId};

/// Duplicate-publication policy for an [`OutputStore`]
///
/// Identifiers are semantically write-once: each is expected to be published
/// by exactly one action or task instance. The default policy does not guard
/// that expectation — last write wins, silently. [`StorePolicy::Strict`]
/// turns a duplicate publication into an error instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StorePolicy {
    /// Re-publishing an existing identifier silently overwrites it
    #[default]
    LastWriteWins,
    /// Re-publishing an existing identifier fails and leaves the
    /// original entry untouched
    Strict,
}

/// Errors reported by the result store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An identifier was published twice under the strict policy
    #[error("output for {kind} '{id}' already published, rejected by strict store policy")]
    Duplicate {
        /// Category of the duplicate entry
        kind: EntityKind,
        /// Identifier of the duplicate entry
        id: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct StoreKey {
    kind: EntityKind,
    id: String,
}

impl StoreKey {
    fn new(kind: &EntityKind, id: &str) -> Self {
        Self {
            kind: kind.clone(),
            id: id.to_string(),
        }
    }
}

/// Concurrent registry of published outputs, keyed by (category, identifier)
#[derive(Debug, Default)]
pub struct OutputStore {
    entries: DashMap<StoreKey, Value>,
    policy: StorePolicy,
}

impl OutputStore {
    /// Creates an empty store with the default last-write-wins policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given duplicate-publication policy.
    pub fn with_policy(policy: StorePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
        }
    }

    /// The duplicate-publication policy this store was built with.
    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    /// Publishes an output under an arbitrary category.
    ///
    /// Upsert under the default policy; under [`StorePolicy::Strict`] a
    /// duplicate identifier is rejected atomically with respect to other
    /// writers of the same key.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] when the strict policy is active and the
    /// (category, identifier) pair already has an entry.
    pub fn store_entity_output(
        &self,
        kind: &EntityKind,
        id: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let key = StoreKey::new(kind, id);
        match self.policy {
            StorePolicy::LastWriteWins => {
                self.entries.insert(key, value);
                Ok(())
            }
            StorePolicy::Strict => match self.entries.entry(key) {
                dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Duplicate {
                    kind: kind.clone(),
                    id: id.to_string(),
                }),
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(value);
                    Ok(())
                }
            },
        }
    }

    /// Publishes an action output under its identifier.
    ///
    /// # Errors
    ///
    /// See [`OutputStore::store_entity_output`].
    pub fn store_action_output(&self, id: &ActionId, value: Value) -> Result<(), StoreError> {
        self.store_entity_output(&EntityKind::action(), id.as_str(), value)
    }

    /// Publishes a task's aggregate output under its identifier.
    ///
    /// # Errors
    ///
    /// See [`OutputStore::store_entity_output`].
    pub fn store_task_output(&self, id: &TaskId, value: Value) -> Result<(), StoreError> {
        self.store_entity_output(&EntityKind::task(), id.as_str(), value)
    }

    /// Looks up an output under an arbitrary category.
    pub fn entity_output(&self, kind: &EntityKind, id: &str) -> Option<Value> {
        self.entries
            .get(&StoreKey::new(kind, id))
            .map(|entry| entry.value().clone())
    }

    /// Looks up a published action output.
    pub fn action_output(&self, id: &ActionId) -> Option<Value> {
        self.entity_output(&EntityKind::action(), id.as_str())
    }

    /// Looks up a published task output.
    pub fn task_output(&self, id: &TaskId) -> Option<Value> {
        self.entity_output(&EntityKind::task(), id.as_str())
    }

    /// Number of published entries across all categories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
