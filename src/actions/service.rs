//! Service-manager actions
//!
//! `ServiceControl` drives start/stop/restart verbs and `ServiceStatus`
//! inspects units via `show --property=…`, parsing its `key=value` text
//! output. The manager program defaults to `systemctl` and is configurable
//! per builder. Both actions run once per unit, fail-fast.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use super::PARAM_SERVICES;
use crate::action::{Action, ActionCore};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::newtypes::{ActionId, ParamName};
use crate::param::Param;

const DEFAULT_MANAGER: &str = "systemctl";

/// The lifecycle verb a [`ServiceControl`] action applies to each unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceVerb {
    /// Start the unit
    Start,
    /// Stop the unit
    Stop,
    /// Restart the unit
    Restart,
}

impl ServiceVerb {
    /// The verb as the service manager spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl std::fmt::Display for ServiceVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies one verb to every resolved unit, in order, stopping at the first
/// failure.
///
/// Parameter: `services` (string or sequence of strings, required); the verb
/// is fixed at construction. Publishes `{success, verb, services}`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use runbook::actions::{ServiceControl, ServiceVerb};
/// use runbook::dsl::task_output;
/// use runbook::exec::MockRunner;
///
/// # fn example() -> runbook::Result<()> {
/// let restart = ServiceControl::builder(Arc::new(MockRunner::new()), ServiceVerb::Restart)
///     .services(task_output("deploy", "services"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ServiceControl {
    core: ActionCore,
    manager: String,
    verb: ServiceVerb,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for ServiceControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceControl")
            .field("core", &self.core)
            .field("manager", &self.manager)
            .field("verb", &self.verb)
            .finish_non_exhaustive()
    }
}

impl ServiceControl {
    /// Starts a builder for the given verb using the given command runner.
    #[must_use]
    pub fn builder(runner: Arc<dyn CommandRunner>, verb: ServiceVerb) -> ServiceControlBuilder {
        ServiceControlBuilder {
            name: format!("service {verb}"),
            manager: DEFAULT_MANAGER.to_string(),
            id: None,
            services: None,
            verb,
            runner,
        }
    }
}

/// Builder for [`ServiceControl`]; `services` is required.
#[must_use]
pub struct ServiceControlBuilder {
    name: String,
    manager: String,
    id: Option<ActionId>,
    services: Option<Param>,
    verb: ServiceVerb,
    runner: Arc<dyn CommandRunner>,
}

impl ServiceControlBuilder {
    /// Human-readable action name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Service manager program, defaults to `systemctl`.
    pub fn manager(mut self, manager: impl Into<String>) -> Self {
        self.manager = manager.into();
        self
    }

    /// Overrides the derived deterministic identifier.
    pub fn id(mut self, id: impl Into<ActionId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Units to control (required).
    pub fn services(mut self, param: Param) -> Self {
        self.services = Some(param);
        self
    }

    /// Validates required parameters and builds the action.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParam`] when `services` was not supplied.
    pub fn build(self) -> Result<ServiceControl> {
        let services = self.services.ok_or(Error::MissingParam {
            kind: "service-control",
            param: ParamName::new(PARAM_SERVICES),
        })?;

        let mut params = IndexMap::new();
        params.insert(ParamName::new(PARAM_SERVICES), services);

        let mut core = ActionCore::new("service-control", self.name, params);
        if let Some(id) = self.id {
            core = core.with_id(id);
        }
        Ok(ServiceControl {
            core,
            manager: self.manager,
            verb: self.verb,
            runner: self.runner,
        })
    }
}

#[async_trait]
impl Action for ServiceControl {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    async fn effect(&mut self, ctx: &RunContext) -> Result<Value> {
        let services = self.core.resolved_string_list(PARAM_SERVICES)?;

        for unit in &services {
            let spec = CommandSpec::new(&self.manager)
                .arg(self.verb.as_str())
                .arg(unit);
            self.runner
                .run(&spec, ctx.cancellation())
                .await
                .map_err(|source| Error::effect(self.core.id().clone(), source))?;
        }

        Ok(json!({
            "success": true,
            "verb": self.verb.as_str(),
            "services": services,
        }))
    }
}

/// Reports each resolved unit's active and sub state, parsed from the
/// manager's `key=value` text output.
///
/// Parameter: `services` (string or sequence of strings, required).
/// Publishes `{success, services, states}` where `states` maps each unit to
/// `{activeState, subState}`.
pub struct ServiceStatus {
    core: ActionCore,
    manager: String,
    runner: Arc<dyn CommandRunner>,
}

impl ServiceStatus {
    /// Starts a builder using the given command runner.
    #[must_use]
    pub fn builder(runner: Arc<dyn CommandRunner>) -> ServiceStatusBuilder {
        ServiceStatusBuilder {
            name: "service status".to_string(),
            manager: DEFAULT_MANAGER.to_string(),
            id: None,
            services: None,
            runner,
        }
    }
}

/// Builder for [`ServiceStatus`]; `services` is required.
#[must_use]
pub struct ServiceStatusBuilder {
    name: String,
    manager: String,
    id: Option<ActionId>,
    services: Option<Param>,
    runner: Arc<dyn CommandRunner>,
}

impl ServiceStatusBuilder {
    /// Human-readable action name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Service manager program, defaults to `systemctl`.
    pub fn manager(mut self, manager: impl Into<String>) -> Self {
        self.manager = manager.into();
        self
    }

    /// Overrides the derived deterministic identifier.
    pub fn id(mut self, id: impl Into<ActionId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Units to inspect (required).
    pub fn services(mut self, param: Param) -> Self {
        self.services = Some(param);
        self
    }

    /// Validates required parameters and builds the action.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParam`] when `services` was not supplied.
    pub fn build(self) -> Result<ServiceStatus> {
        let services = self.services.ok_or(Error::MissingParam {
            kind: "service-status",
            param: ParamName::new(PARAM_SERVICES),
        })?;

        let mut params = IndexMap::new();
        params.insert(ParamName::new(PARAM_SERVICES), services);

        let mut core = ActionCore::new("service-status", self.name, params);
        if let Some(id) = self.id {
            core = core.with_id(id);
        }
        Ok(ServiceStatus {
            core,
            manager: self.manager,
            runner: self.runner,
        })
    }
}

#[async_trait]
impl Action for ServiceStatus {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    async fn effect(&mut self, ctx: &RunContext) -> Result<Value> {
        let services = self.core.resolved_string_list(PARAM_SERVICES)?;

        let mut states = Map::new();
        for unit in &services {
            let spec = CommandSpec::new(&self.manager)
                .arg("show")
                .arg(unit)
                .arg("--property=ActiveState,SubState");
            let output = self
                .runner
                .run(&spec, ctx.cancellation())
                .await
                .map_err(|source| Error::effect(self.core.id().clone(), source))?;

            states.insert(
                unit.clone(),
                parse_show_output(self.core.id(), unit, &output.stdout)?,
            );
        }

        Ok(json!({
            "success": true,
            "services": services,
            "states": states,
        }))
    }
}

/// `systemctl show` emits one `Property=value` pair per line.
fn parse_show_output(id: &ActionId, unit: &str, stdout: &str) -> Result<Value> {
    let mut active_state = None;
    let mut sub_state = None;
    for line in stdout.lines() {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "ActiveState" => active_state = Some(value.trim().to_string()),
                "SubState" => sub_state = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    match (active_state, sub_state) {
        (Some(active), Some(sub)) => Ok(json!({"activeState": active, "subState": sub})),
        _ => Err(Error::invalid_output(
            id.clone(),
            format!("status output for unit '{unit}' lacks ActiveState/SubState"),
        )),
    }
}
