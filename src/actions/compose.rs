//! Container compose lifecycle actions
//!
//! `ComposeUp`, `ComposeDown`, and `ComposePs` drive the container engine's
//! compose subcommand in a resolved working directory. The engine program
//! defaults to `docker` and is configurable per builder, so `podman` (or a
//! test shim) drops in without touching the actions.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use super::{PARAM_SERVICES, PARAM_WORKING_DIR};
use crate::action::{Action, ActionCore};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::newtypes::{ActionId, ParamName};
use crate::param::Param;

const DEFAULT_ENGINE: &str = "docker";

/// Brings a compose project up (`compose up -d`), optionally limited to a
/// subset of services.
///
/// Parameters: `workingDir` (string, required), `services` (string or
/// sequence of strings, optional). Publishes
/// `{success, workingDir, services}`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use runbook::actions::ComposeUp;
/// use runbook::dsl::{action_output, literal};
/// use runbook::exec::MockRunner;
///
/// # fn example() -> runbook::Result<()> {
/// let up = ComposeUp::builder(Arc::new(MockRunner::new()))
///     .working_dir(action_output("detect-checkout", "workingDir"))
///     .services(literal("web,db"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ComposeUp {
    core: ActionCore,
    engine: String,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for ComposeUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposeUp")
            .field("core", &self.core)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl ComposeUp {
    /// Starts a builder using the given command runner.
    #[must_use]
    pub fn builder(runner: Arc<dyn CommandRunner>) -> ComposeUpBuilder {
        ComposeUpBuilder {
            name: "compose up".to_string(),
            engine: DEFAULT_ENGINE.to_string(),
            id: None,
            working_dir: None,
            services: None,
            runner,
        }
    }
}

/// Builder for [`ComposeUp`]; `workingDir` is required.
#[must_use]
pub struct ComposeUpBuilder {
    name: String,
    engine: String,
    id: Option<ActionId>,
    working_dir: Option<Param>,
    services: Option<Param>,
    runner: Arc<dyn CommandRunner>,
}

impl ComposeUpBuilder {
    /// Human-readable action name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Container engine program, defaults to `docker`.
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Overrides the derived deterministic identifier.
    pub fn id(mut self, id: impl Into<ActionId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The compose project directory (required).
    pub fn working_dir(mut self, param: Param) -> Self {
        self.working_dir = Some(param);
        self
    }

    /// Services to bring up; all services when absent.
    pub fn services(mut self, param: Param) -> Self {
        self.services = Some(param);
        self
    }

    /// Validates required parameters and builds the action.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParam`] when `workingDir` was not supplied.
    pub fn build(self) -> Result<ComposeUp> {
        let working_dir = self.working_dir.ok_or(Error::MissingParam {
            kind: "compose-up",
            param: ParamName::new(PARAM_WORKING_DIR),
        })?;

        let mut params = IndexMap::new();
        params.insert(ParamName::new(PARAM_WORKING_DIR), working_dir);
        if let Some(services) = self.services {
            params.insert(ParamName::new(PARAM_SERVICES), services);
        }

        let mut core = ActionCore::new("compose-up", self.name, params);
        if let Some(id) = self.id {
            core = core.with_id(id);
        }
        Ok(ComposeUp {
            core,
            engine: self.engine,
            runner: self.runner,
        })
    }
}

#[async_trait]
impl Action for ComposeUp {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    async fn effect(&mut self, ctx: &RunContext) -> Result<Value> {
        let working_dir = self.core.resolved_string(PARAM_WORKING_DIR)?;
        let services = match self.core.resolved(PARAM_SERVICES) {
            Some(_) => self.core.resolved_string_list(PARAM_SERVICES)?,
            None => Vec::new(),
        };

        let spec = CommandSpec::new(&self.engine)
            .args(["compose", "up", "-d"])
            .args(services.clone())
            .current_dir(&working_dir);
        self.runner
            .run(&spec, ctx.cancellation())
            .await
            .map_err(|source| Error::effect(self.core.id().clone(), source))?;

        Ok(json!({
            "success": true,
            "workingDir": working_dir,
            "services": services,
        }))
    }
}

/// Tears a compose project down (`compose down`), optionally removing
/// volumes.
///
/// Parameter: `workingDir` (string, required). Publishes
/// `{success, workingDir}`.
pub struct ComposeDown {
    core: ActionCore,
    engine: String,
    remove_volumes: bool,
    runner: Arc<dyn CommandRunner>,
}

impl ComposeDown {
    /// Starts a builder using the given command runner.
    #[must_use]
    pub fn builder(runner: Arc<dyn CommandRunner>) -> ComposeDownBuilder {
        ComposeDownBuilder {
            name: "compose down".to_string(),
            engine: DEFAULT_ENGINE.to_string(),
            id: None,
            working_dir: None,
            remove_volumes: false,
            runner,
        }
    }
}

/// Builder for [`ComposeDown`]; `workingDir` is required.
#[must_use]
pub struct ComposeDownBuilder {
    name: String,
    engine: String,
    id: Option<ActionId>,
    working_dir: Option<Param>,
    remove_volumes: bool,
    runner: Arc<dyn CommandRunner>,
}

impl ComposeDownBuilder {
    /// Human-readable action name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Container engine program, defaults to `docker`.
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Overrides the derived deterministic identifier.
    pub fn id(mut self, id: impl Into<ActionId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The compose project directory (required).
    pub fn working_dir(mut self, param: Param) -> Self {
        self.working_dir = Some(param);
        self
    }

    /// Also remove named volumes (`--volumes`).
    pub fn remove_volumes(mut self, remove: bool) -> Self {
        self.remove_volumes = remove;
        self
    }

    /// Validates required parameters and builds the action.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParam`] when `workingDir` was not supplied.
    pub fn build(self) -> Result<ComposeDown> {
        let working_dir = self.working_dir.ok_or(Error::MissingParam {
            kind: "compose-down",
            param: ParamName::new(PARAM_WORKING_DIR),
        })?;

        let mut params = IndexMap::new();
        params.insert(ParamName::new(PARAM_WORKING_DIR), working_dir);

        let mut core = ActionCore::new("compose-down", self.name, params);
        if let Some(id) = self.id {
            core = core.with_id(id);
        }
        Ok(ComposeDown {
            core,
            engine: self.engine,
            remove_volumes: self.remove_volumes,
            runner: self.runner,
        })
    }
}

#[async_trait]
impl Action for ComposeDown {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    async fn effect(&mut self, ctx: &RunContext) -> Result<Value> {
        let working_dir = self.core.resolved_string(PARAM_WORKING_DIR)?;

        let mut spec = CommandSpec::new(&self.engine)
            .args(["compose", "down"])
            .current_dir(&working_dir);
        if self.remove_volumes {
            spec = spec.arg("--volumes");
        }
        self.runner
            .run(&spec, ctx.cancellation())
            .await
            .map_err(|source| Error::effect(self.core.id().clone(), source))?;

        Ok(json!({
            "success": true,
            "workingDir": working_dir,
        }))
    }
}

/// Lists a compose project's services (`compose ps --format json`) and
/// parses the JSON-lines output.
///
/// Parameter: `workingDir` (string, required). Publishes
/// `{success, workingDir, services, states}` where `states` maps each
/// service name to its reported state, making both referenceable by later
/// parameters.
pub struct ComposePs {
    core: ActionCore,
    engine: String,
    runner: Arc<dyn CommandRunner>,
}

impl ComposePs {
    /// Starts a builder using the given command runner.
    #[must_use]
    pub fn builder(runner: Arc<dyn CommandRunner>) -> ComposePsBuilder {
        ComposePsBuilder {
            name: "compose ps".to_string(),
            engine: DEFAULT_ENGINE.to_string(),
            id: None,
            working_dir: None,
            runner,
        }
    }
}

/// Builder for [`ComposePs`]; `workingDir` is required.
#[must_use]
pub struct ComposePsBuilder {
    name: String,
    engine: String,
    id: Option<ActionId>,
    working_dir: Option<Param>,
    runner: Arc<dyn CommandRunner>,
}

impl ComposePsBuilder {
    /// Human-readable action name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Container engine program, defaults to `docker`.
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Overrides the derived deterministic identifier.
    pub fn id(mut self, id: impl Into<ActionId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The compose project directory (required).
    pub fn working_dir(mut self, param: Param) -> Self {
        self.working_dir = Some(param);
        self
    }

    /// Validates required parameters and builds the action.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParam`] when `workingDir` was not supplied.
    pub fn build(self) -> Result<ComposePs> {
        let working_dir = self.working_dir.ok_or(Error::MissingParam {
            kind: "compose-ps",
            param: ParamName::new(PARAM_WORKING_DIR),
        })?;

        let mut params = IndexMap::new();
        params.insert(ParamName::new(PARAM_WORKING_DIR), working_dir);

        let mut core = ActionCore::new("compose-ps", self.name, params);
        if let Some(id) = self.id {
            core = core.with_id(id);
        }
        Ok(ComposePs {
            core,
            engine: self.engine,
            runner: self.runner,
        })
    }
}

#[async_trait]
impl Action for ComposePs {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActionCore {
        &mut self.core
    }

    async fn effect(&mut self, ctx: &RunContext) -> Result<Value> {
        let working_dir = self.core.resolved_string(PARAM_WORKING_DIR)?;

        let spec = CommandSpec::new(&self.engine)
            .args(["compose", "ps", "--format", "json"])
            .current_dir(&working_dir);
        let output = self
            .runner
            .run(&spec, ctx.cancellation())
            .await
            .map_err(|source| Error::effect(self.core.id().clone(), source))?;

        let (services, states) = parse_ps_lines(self.core.id(), &output.stdout)?;
        Ok(json!({
            "success": true,
            "workingDir": working_dir,
            "services": services,
            "states": states,
        }))
    }
}

/// One JSON object per line; newer engines emit `Service`, older ones only
/// `Name`. Unparseable lines are an error, not skipped.
fn parse_ps_lines(id: &ActionId, stdout: &str) -> Result<(Vec<String>, Map<String, Value>)> {
    let mut services = Vec::new();
    let mut states = Map::new();
    for line in stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let entry: Value = serde_json::from_str(line).map_err(|err| {
            Error::invalid_output(id.clone(), format!("unparseable ps line {line:?}: {err}"))
        })?;
        let name = entry
            .get("Service")
            .or_else(|| entry.get("Name"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::invalid_output(id.clone(), format!("ps line has no service name: {line}"))
            })?;
        let state = entry.get("State").and_then(Value::as_str).ok_or_else(|| {
            Error::invalid_output(id.clone(), format!("ps line has no state: {line}"))
        })?;
        services.push(name.to_string());
        states.insert(name.to_string(), json!(state));
    }
    Ok((services, states))
}
