//! # runbook
//!
//! Composable infrastructure actions with late-bound parameter resolution
//! and a shared result store.
//!
//! An [`Action`] is a unit of work with declared parameters and one
//! published output; a [`Task`] is an ordered group of actions sharing one
//! resolution context. A [`Param`] is a deferred value source: a literal,
//! or a reference into the run's [`OutputStore`] by category + identifier,
//! projected by output key and resolved lazily at execution time. That is
//! how one action's output feeds a later action's input without the two
//! ever knowing about each other.
//!
//! The store is reached through [`RunContext`] propagation, never a global,
//! so independent runs (and isolated tests) cannot observe each other. All
//! side effects are delegated to an injectable
//! [`CommandRunner`](exec::CommandRunner); the bundled
//! [`SystemRunner`](exec::SystemRunner) spawns real processes and the
//! [`MockRunner`](exec::MockRunner) replays scripted outcomes.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use runbook::actions::{ComposeUp, ServiceControl, ServiceVerb};
//! use runbook::dsl::{action_output, literal};
//! use runbook::exec::MockRunner;
//! use runbook::{OutputStore, RunContext, Task};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> runbook::Result<()> {
//! let runner = Arc::new(MockRunner::new());
//!
//! let up = ComposeUp::builder(Arc::clone(&runner) as _)
//!     .id("bring-up")
//!     .working_dir(literal("/srv/app"))
//!     .services(literal("web,db"))
//!     .build()?;
//!
//! // The restart list is resolved from the first action's output at
//! // execution time.
//! let restart = ServiceControl::builder(runner, ServiceVerb::Restart)
//!     .services(action_output("bring-up", "services"))
//!     .build()?;
//!
//! let mut task = Task::new("Deploy app").action(up).action(restart);
//! let ctx = RunContext::new(Arc::new(OutputStore::new()));
//! let aggregate = task.execute(&ctx).await?;
//! assert_eq!(aggregate["success"], serde_json::json!(true));
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `logging` (default): pulls `tracing-subscriber` and exposes
//!   [`logging::init`] for binaries and examples.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod action;
pub mod actions;
pub mod coerce;
pub mod context;
pub mod dsl;
pub mod error;
pub mod exec;
#[cfg(feature = "logging")]
pub mod logging;
pub mod newtypes;
pub mod param;
pub mod store;
pub mod task;

pub use action::{Action, ActionCore, ActionState};
pub use context::RunContext;
pub use error::{Error, Result};
pub use newtypes::{ActionId, EntityKind, OutputKey, ParamName, TaskId};
pub use param::{Param, ResolveError};
pub use store::{OutputStore, StoreError, StorePolicy};
pub use task::Task;
