//! Crate-level error type for action and task execution
//!
//! Module boundaries carry their own error enums ([`ResolveError`],
//! [`CoerceError`], [`StoreError`], [`ExecError`]); this type annotates them
//! with the action/parameter identity at the point of failure while keeping
//! the original cause both in the source chain and in the rendered message.

use thiserror::Error;

use crate::coerce::CoerceError;
use crate::exec::ExecError;
use crate::newtypes::{ActionId, ParamName, TaskId};
use crate::param::ResolveError;
use crate::store::StoreError;

/// Convenient result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or executing actions and tasks
#[derive(Error, Debug)]
pub enum Error {
    /// A declared parameter could not be resolved against the result store
    #[error("action '{action}': parameter '{param}': {source}")]
    Resolution {
        /// The action whose parameter failed to resolve
        action: ActionId,
        /// The declared parameter name
        param: ParamName,
        /// The underlying resolution failure
        #[source]
        source: ResolveError,
    },

    /// A resolved value has the wrong semantic type for its parameter
    #[error("action '{action}': parameter '{param}' {source}")]
    Validation {
        /// The action whose parameter failed validation
        action: ActionId,
        /// The declared parameter name
        param: ParamName,
        /// The expected/actual kind mismatch
        #[source]
        source: CoerceError,
    },

    /// The delegated external command failed, timed out, or was cancelled
    #[error("action '{action}': {source}")]
    Effect {
        /// The action whose effect failed
        action: ActionId,
        /// The underlying command failure
        #[source]
        source: ExecError,
    },

    /// The external command succeeded but produced output the action
    /// could not interpret
    #[error("action '{action}': {message}")]
    InvalidOutput {
        /// The action that could not parse its effect output
        action: ActionId,
        /// What was wrong with the output
        message: String,
    },

    /// An action builder was finalized without a required parameter
    #[error("cannot build action '{kind}': required parameter '{param}' was not supplied")]
    MissingParam {
        /// The action kind being built
        kind: &'static str,
        /// The parameter that was not supplied
        param: ParamName,
    },

    /// A task observed cancellation before starting its next action
    #[error("task '{task}' cancelled before action '{action}' started")]
    Cancelled {
        /// The task that was cancelled
        task: TaskId,
        /// The action that never started
        action: ActionId,
    },

    /// The result store rejected a publication
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Annotate a resolution failure with the action and parameter it hit.
    pub(crate) fn resolution(action: ActionId, param: ParamName, source: ResolveError) -> Self {
        Self::Resolution {
            action,
            param,
            source,
        }
    }

    /// Annotate a type-validation failure with the action and parameter it hit.
    pub(crate) fn validation(action: ActionId, param: ParamName, source: CoerceError) -> Self {
        Self::Validation {
            action,
            param,
            source,
        }
    }

    /// Annotate a command failure with the action that ran it.
    pub(crate) fn effect(action: ActionId, source: ExecError) -> Self {
        Self::Effect { action, source }
    }

    /// Annotate an uninterpretable effect output with the action that produced it.
    pub(crate) fn invalid_output(action: ActionId, message: impl Into<String>) -> Self {
        Self::InvalidOutput {
            action,
            message: message.into(),
        }
    }

    /// True when execution stopped because of cancellation or a deadline
    /// rather than an operational failure.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::Effect { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }
}
