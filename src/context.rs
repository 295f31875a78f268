//! Execution context threading the result store through nested calls
//!
//! The store is never a global: every execution call receives a
//! [`RunContext`] carrying a shared handle to the run's [`OutputStore`]
//! (or none, for static-only execution) plus the cancellation token every
//! delegated effect must honor. Contexts are cheap to clone and child
//! contexts can be derived for nested sub-executions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::store::OutputStore;

/// Per-run execution context carried through tasks, actions, and resolution.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use runbook::{OutputStore, RunContext};
///
/// let store = Arc::new(OutputStore::new());
/// let ctx = RunContext::new(Arc::clone(&store));
/// assert!(ctx.store().is_some());
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct RunContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    store: Option<Arc<OutputStore>>,
    cancel: CancellationToken,
}

impl RunContext {
    /// Creates a context for a fresh run backed by the given store.
    pub fn new(store: Arc<OutputStore>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            store: Some(store),
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a context with no store attached.
    ///
    /// Actions whose parameters are all `Static` execute normally against a
    /// detached context; any reference parameter fails resolution with a
    /// store-unavailable error.
    pub fn detached() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token, e.g. with one owned by a caller that
    /// manages deadlines itself.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Identifier of this run, shared by all derived child contexts.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// When this run's context was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The run's result store, if one is attached.
    pub fn store(&self) -> Option<&Arc<OutputStore>> {
        self.store.as_ref()
    }

    /// The cancellation token delegated effects must honor.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True once this context (or an ancestor) has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels this context and everything derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Derives a context for a nested sub-execution.
    ///
    /// The child shares the run id and store; its token is cancelled when
    /// the parent is, but cancelling the child leaves the parent running.
    pub fn child(&self) -> Self {
        Self {
            run_id: self.run_id,
            started_at: self.started_at,
            store: self.store.clone(),
            cancel: self.cancel.child_token(),
        }
    }
}
