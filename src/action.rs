//! The action execution protocol
//!
//! Every concrete action follows the same per-execution state machine:
//! `Unresolved -> Resolving -> Resolved -> Executing -> Completed | Failed`.
//! The protocol is captured once here — [`ActionCore`] holds the identity,
//! the declared parameters, and the state; the [`Action`] trait's provided
//! [`execute`](Action::execute) drives the core through resolution and
//! validation, delegates the effect to the concrete type, and publishes the
//! output to the run's store under the action's identifier.
//!
//! Resolution errors abort execution before any effect runs; effect failures
//! abort before anything is published. A failed action never writes to the
//! store.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::coerce;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::newtypes::{ActionId, ParamName};
use crate::param::Param;

/// Where an action is in its execution lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionState {
    /// Declared parameters have not been resolved yet
    #[default]
    Unresolved,
    /// Parameter resolution is in progress
    Resolving,
    /// All parameters resolved and validated, effect not yet started
    Resolved,
    /// The delegated effect is running
    Executing,
    /// The effect succeeded and the output was published
    Completed,
    /// Resolution, validation, or the effect failed; nothing was published
    Failed,
}

/// Shared identity, parameter, and state plumbing for every concrete action
///
/// A core is built by an action's builder from the declared parameters; the
/// default identifier is derived deterministically from the action's kind,
/// name, and parameter configuration, so identical configurations get
/// identical ids unless explicitly overridden.
#[derive(Clone, Debug)]
pub struct ActionCore {
    id: ActionId,
    kind: &'static str,
    name: String,
    params: IndexMap<ParamName, Param>,
    resolved: IndexMap<ParamName, Value>,
    state: ActionState,
    output: Option<Value>,
}

impl ActionCore {
    /// Builds a core for an action of the given kind with its declared
    /// parameters, deriving the default deterministic identifier.
    pub fn new(
        kind: &'static str,
        name: impl Into<String>,
        params: IndexMap<ParamName, Param>,
    ) -> Self {
        let name = name.into();
        let id = fingerprint_id(kind, &name, &params);
        Self {
            id,
            kind,
            name,
            params,
            resolved: IndexMap::new(),
            state: ActionState::Unresolved,
            output: None,
        }
    }

    /// Replaces the derived identifier with a caller-chosen one.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ActionId>) -> Self {
        self.id = id.into();
        self
    }

    /// The identifier this action publishes its output under.
    pub fn id(&self) -> &ActionId {
        &self.id
    }

    /// The action kind the builder was for.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The human-readable action name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameters, in declaration order.
    pub fn params(&self) -> &IndexMap<ParamName, Param> {
        &self.params
    }

    /// Where this action is in its lifecycle.
    pub fn state(&self) -> ActionState {
        self.state
    }

    /// The published output, available once the action completed.
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Resolves every declared parameter against the store reachable from
    /// `ctx`, in declaration order.
    ///
    /// The first failure aborts resolution; the resolution error is surfaced
    /// annotated with this action's id and the parameter name, with the
    /// original cause kept in the source chain.
    ///
    /// # Errors
    ///
    /// [`Error::Resolution`] for any [`ResolveError`](crate::ResolveError).
    pub fn resolve_params(&mut self, ctx: &RunContext) -> Result<()> {
        self.state = ActionState::Resolving;
        for (name, param) in &self.params {
            tracing::debug!(action = %self.id, param = %name, "resolving parameter");
            let value = param.resolve(ctx).map_err(|source| {
                self.state = ActionState::Failed;
                Error::resolution(self.id.clone(), name.clone(), source)
            })?;
            self.resolved.insert(name.clone(), value);
        }
        self.state = ActionState::Resolved;
        Ok(())
    }

    /// The resolved value of a declared parameter, once resolution ran.
    pub fn resolved(&self, name: &str) -> Option<&Value> {
        self.resolved.get(&ParamName::new(name))
    }

    /// The resolved value of a required parameter, narrowed to a string.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParam`] when the parameter was never declared or
    /// resolved; [`Error::Validation`] when the value is not a string.
    pub fn resolved_string(&self, name: &str) -> Result<String> {
        let value = self.required(name)?;
        coerce::as_str(value)
            .map(String::from)
            .map_err(|source| Error::validation(self.id.clone(), ParamName::new(name), source))
    }

    /// The resolved value of a required parameter, narrowed to a sequence of
    /// strings with the delimited-string coercion applied.
    ///
    /// # Errors
    ///
    /// [`Error::MissingParam`] when the parameter was never declared or
    /// resolved; [`Error::Validation`] when the value is neither a string nor
    /// a sequence of strings.
    pub fn resolved_string_list(&self, name: &str) -> Result<Vec<String>> {
        let value = self.required(name)?;
        coerce::to_string_list(value)
            .map_err(|source| Error::validation(self.id.clone(), ParamName::new(name), source))
    }

    fn required(&self, name: &str) -> Result<&Value> {
        self.resolved(name).ok_or_else(|| Error::MissingParam {
            kind: self.kind,
            param: ParamName::new(name),
        })
    }

    fn set_state(&mut self, state: ActionState) {
        self.state = state;
    }

    fn complete(&mut self, ctx: &RunContext, output: Value) -> Result<()> {
        if let Some(store) = ctx.store() {
            store.store_action_output(&self.id, output.clone())?;
        }
        self.output = Some(output);
        self.state = ActionState::Completed;
        Ok(())
    }
}

/// Deterministic default id: kind plus a truncated digest over the
/// configuration, so identical configurations collide on purpose.
fn fingerprint_id(kind: &str, name: &str, params: &IndexMap<ParamName, Param>) -> ActionId {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b"\0");
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    // Serializing Param to JSON cannot fail; an empty fingerprint segment
    // would still yield a stable id.
    if let Ok(encoded) = serde_json::to_vec(params) {
        hasher.update(&encoded);
    }
    let digest = hasher.finalize();
    let hex = format!("{digest:x}");
    ActionId::new(format!("{kind}-{}", &hex[..12]))
}

/// A unit of work with declared parameters and one published output
///
/// Concrete actions implement [`effect`](Action::effect) and expose their
/// [`ActionCore`]; the provided [`execute`](Action::execute) drives the
/// resolution protocol identically for all of them.
#[async_trait]
pub trait Action: Send {
    /// The action's shared identity and parameter state.
    fn core(&self) -> &ActionCore;

    /// Mutable access for the execution protocol.
    fn core_mut(&mut self) -> &mut ActionCore;

    /// Performs the action's actual side effect and builds its output
    /// mapping. Called only after every parameter resolved and validated;
    /// implementations read resolved values from the core and delegate the
    /// external invocation to their injected runner.
    ///
    /// # Errors
    ///
    /// Validation errors for resolved values of the wrong semantic type,
    /// effect errors from the delegated command, or invalid-output errors
    /// when the command's output cannot be interpreted.
    async fn effect(&mut self, ctx: &RunContext) -> Result<Value>;

    /// Runs the full protocol: resolve and validate every declared
    /// parameter, perform the effect, publish the output under this
    /// action's identifier.
    ///
    /// # Errors
    ///
    /// The first resolution, validation, effect, or store error, annotated
    /// with the action's identity. On any error nothing is published.
    async fn execute(&mut self, ctx: &RunContext) -> Result<()> {
        let id = self.core().id().clone();
        tracing::info!(action = %id, name = %self.core().name(), "executing action");

        self.core_mut().resolve_params(ctx)?;
        self.core_mut().set_state(ActionState::Executing);

        match self.effect(ctx).await {
            Ok(output) => {
                self.core_mut().complete(ctx, output)?;
                tracing::info!(action = %id, "action completed");
                Ok(())
            }
            Err(err) => {
                self.core_mut().set_state(ActionState::Failed);
                tracing::warn!(action = %id, error = %err, "action failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ResolveError;
    use crate::store::OutputStore;
    use serde_json::json;
    use std::sync::Arc;

    /// Minimal action for protocol tests: one declared parameter, effect
    /// echoes the resolved value.
    struct Echo {
        core: ActionCore,
        fail_effect: bool,
    }

    impl Echo {
        fn new(param: Param) -> Self {
            let mut params = IndexMap::new();
            params.insert(ParamName::new("input"), param);
            Self {
                core: ActionCore::new("echo", "echo test", params),
                fail_effect: false,
            }
        }
    }

    #[async_trait]
    impl Action for Echo {
        fn core(&self) -> &ActionCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ActionCore {
            &mut self.core
        }

        async fn effect(&mut self, _ctx: &RunContext) -> Result<Value> {
            if self.fail_effect {
                return Err(Error::invalid_output(
                    self.core.id().clone(),
                    "scripted effect failure",
                ));
            }
            let input = self.core.resolved("input").cloned().unwrap_or(Value::Null);
            Ok(json!({"success": true, "input": input}))
        }
    }

    fn ctx() -> (RunContext, Arc<OutputStore>) {
        let store = Arc::new(OutputStore::new());
        (RunContext::new(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn test_execute_publishes_output_under_own_id() {
        let (ctx, store) = ctx();
        let mut action = Echo::new(Param::literal("hello"));
        action.execute(&ctx).await.unwrap();

        assert_eq!(action.core().state(), ActionState::Completed);
        let published = store.action_output(action.core().id()).unwrap();
        assert_eq!(published["success"], json!(true));
        assert_eq!(published["input"], json!("hello"));
        assert_eq!(action.core().output(), Some(&published));
    }

    #[tokio::test]
    async fn test_static_only_action_succeeds_without_store() {
        let mut action = Echo::new(Param::literal(42));
        action.execute(&RunContext::detached()).await.unwrap();
        assert_eq!(action.core().state(), ActionState::Completed);
        // Output is still cached locally even with nowhere to publish.
        assert!(action.core().output().is_some());
    }

    #[tokio::test]
    async fn test_resolution_failure_aborts_before_effect() {
        let (ctx, store) = ctx();
        let mut action = Echo::new(Param::action_output("ghost", "key"));
        let err = action.execute(&ctx).await.unwrap_err();

        assert_eq!(action.core().state(), ActionState::Failed);
        let msg = err.to_string();
        assert!(msg.contains("ghost"));
        assert!(msg.contains("not found"));
        // The failing action left the store untouched.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_effect_failure_publishes_nothing() {
        let (ctx, store) = ctx();
        let mut action = Echo::new(Param::literal("x"));
        action.fail_effect = true;

        let err = action.execute(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("scripted effect failure"));
        assert_eq!(action.core().state(), ActionState::Failed);
        assert!(store.is_empty());
        assert!(action.core().output().is_none());
    }

    #[tokio::test]
    async fn test_resolution_error_names_action_and_param() {
        let (ctx, _store) = ctx();
        let mut action = Echo::new(Param::action_output("", "key"));
        let err = action.execute(&ctx).await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains(action.core().id().as_str()));
        assert!(msg.contains("input"));
        assert!(msg.contains("identifier cannot be empty"));
        match err {
            Error::Resolution { source, .. } => {
                assert!(matches!(source, ResolveError::EmptyId { .. }));
            }
            other => panic!("expected Resolution, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_reference_param_feeds_from_store() {
        let (ctx, store) = ctx();
        store
            .store_action_output(&ActionId::new("detect"), json!({"workingDir": "/tmp/x"}))
            .unwrap();

        let mut action = Echo::new(Param::action_output("detect", "workingDir"));
        action.execute(&ctx).await.unwrap();

        let published = store.action_output(action.core().id()).unwrap();
        assert_eq!(published["input"], json!("/tmp/x"));
    }

    #[test]
    fn test_fingerprint_ids_are_deterministic() {
        let a = Echo::new(Param::literal("same"));
        let b = Echo::new(Param::literal("same"));
        let c = Echo::new(Param::literal("different"));

        assert_eq!(a.core().id(), b.core().id());
        assert_ne!(a.core().id(), c.core().id());
        assert!(a.core().id().as_str().starts_with("echo-"));
    }

    #[test]
    fn test_id_override() {
        let mut params = IndexMap::new();
        params.insert(ParamName::new("input"), Param::literal(1));
        let core = ActionCore::new("echo", "named", params).with_id("custom-id");
        assert_eq!(core.id().as_str(), "custom-id");
    }

    #[test]
    fn test_typed_accessors_validate() {
        let mut params = IndexMap::new();
        params.insert(ParamName::new("dir"), Param::literal(7));
        let mut core = ActionCore::new("echo", "typed", params);
        core.resolve_params(&RunContext::detached()).unwrap();

        let err = core.resolved_string("dir").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("is not a string"));
        assert!(msg.contains("number"));

        // Undeclared parameter is a missing-param error, not a panic.
        assert!(matches!(
            core.resolved_string("ghost").unwrap_err(),
            Error::MissingParam { .. }
        ));
    }

    #[test]
    fn test_string_list_accessor_splits_delimited_string() {
        let mut params = IndexMap::new();
        params.insert(ParamName::new("services"), Param::literal("web,db"));
        let mut core = ActionCore::new("echo", "split", params);
        core.resolve_params(&RunContext::detached()).unwrap();

        assert_eq!(
            core.resolved_string_list("services").unwrap(),
            vec!["web", "db"]
        );
    }

    #[test]
    fn test_initial_state_is_unresolved() {
        let core = ActionCore::new("echo", "fresh", IndexMap::new());
        assert_eq!(core.state(), ActionState::Unresolved);
        assert!(core.output().is_none());
    }
}
