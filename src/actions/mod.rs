//! Concrete infrastructure actions
//!
//! These are the exercised consumers of the resolution core: compose
//! lifecycle actions against a container engine and service actions against
//! a service manager. All of them delegate their effect to an injected
//! [`CommandRunner`](crate::exec::CommandRunner) and follow the shared
//! [`Action`](crate::Action) protocol, so their parameters can be literals
//! or references into the run's result store interchangeably.

mod compose;
mod service;

pub use compose::{ComposeDown, ComposePs, ComposeUp};
pub use service::{ServiceControl, ServiceStatus, ServiceVerb};

/// Parameter name for a resolved working directory.
pub(crate) const PARAM_WORKING_DIR: &str = "workingDir";
/// Parameter name for a service or unit list.
pub(crate) const PARAM_SERVICES: &str = "services";
