//! Ordered action groups with an aggregate output
//!
//! A [`Task`] runs its actions in declaration order against one shared
//! store, fail-fast: the first action failure aborts the task and no
//! task-level output is published. After all actions complete, the task
//! merges their outputs into one aggregate mapping and republishes it under
//! its own identifier, so later parameters can reference task outputs the
//! same way they reference action outputs.

use serde_json::{json, Map, Value};
use smallvec::SmallVec;

use crate::action::Action;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::newtypes::TaskId;

/// An ordered collection of actions sharing one resolution context
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use runbook::actions::ComposeUp;
/// use runbook::dsl::literal;
/// use runbook::exec::SystemRunner;
/// use runbook::{OutputStore, RunContext, Task};
///
/// # async fn example() -> runbook::Result<()> {
/// let runner = Arc::new(SystemRunner::new());
/// let up = ComposeUp::builder(runner)
///     .working_dir(literal("/srv/app"))
///     .build()?;
///
/// let mut task = Task::new("Deploy app").action(up);
/// let ctx = RunContext::new(Arc::new(OutputStore::new()));
/// task.execute(&ctx).await?;
/// # Ok(())
/// # }
/// ```
pub struct Task {
    id: TaskId,
    name: String,
    // Small runbooks dominate; most tasks hold a handful of actions.
    actions: SmallVec<[Box<dyn Action>; 4]>,
    output: Option<Value>,
}

impl Task {
    /// Creates an empty task; the identifier defaults to a slug of the name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = TaskId::new(slugify(&name));
        Self {
            id,
            name,
            actions: SmallVec::new(),
            output: None,
        }
    }

    /// Replaces the derived identifier with a caller-chosen one.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    /// Appends an action (chainable); actions run in append order.
    #[must_use]
    pub fn action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    /// Appends an already-boxed action, for dynamically assembled tasks.
    #[must_use]
    pub fn boxed_action(mut self, action: Box<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    /// The identifier this task publishes its aggregate output under.
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// The human-readable task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of actions in this task.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True when the task holds no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The aggregate output, available once the task completed.
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Runs every action in order against the shared store, then publishes
    /// the merged aggregate output under this task's identifier.
    ///
    /// The aggregate contains `success: true`, `actions` (the constituent
    /// action ids in execution order), and the union of all action output
    /// fields merged in execution order, later actions winning on key
    /// conflicts.
    ///
    /// # Errors
    ///
    /// The first action failure, propagated unchanged; cancellation observed
    /// between actions as [`Error::Cancelled`]. On any error no task-level
    /// output is published.
    pub async fn execute(&mut self, ctx: &RunContext) -> Result<Value> {
        tracing::info!(task = %self.id, name = %self.name, actions = self.actions.len(), "executing task");

        for action in &mut self.actions {
            if ctx.is_cancelled() {
                let err = Error::Cancelled {
                    task: self.id.clone(),
                    action: action.core().id().clone(),
                };
                tracing::warn!(task = %self.id, error = %err, "task cancelled");
                return Err(err);
            }
            if let Err(err) = action.execute(ctx).await {
                tracing::warn!(task = %self.id, action = %action.core().id(), error = %err, "task aborted");
                return Err(err);
            }
        }

        let aggregate = self.aggregate();
        if let Some(store) = ctx.store() {
            store.store_task_output(&self.id, aggregate.clone())?;
        }
        self.output = Some(aggregate.clone());
        tracing::info!(task = %self.id, "task completed");
        Ok(aggregate)
    }

    fn aggregate(&self) -> Value {
        let mut merged = Map::new();
        let mut ids = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            ids.push(json!(action.core().id().as_str()));
            if let Some(Value::Object(fields)) = action.core().output() {
                for (key, value) in fields {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged.insert("success".to_string(), json!(true));
        merged.insert("actions".to_string(), Value::Array(ids));
        Value::Object(merged)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}

/// Lowercase slug: alphanumerics kept, everything else collapsed to single
/// dashes, no leading or trailing dash.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionCore, ActionState};
    use crate::newtypes::ParamName;
    use crate::param::Param;
    use crate::store::OutputStore;
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Arc;

    struct Probe {
        core: ActionCore,
        fields: Value,
        fail: bool,
    }

    impl Probe {
        fn publishing(id: &str, fields: Value) -> Self {
            Self {
                core: ActionCore::new("probe", id, IndexMap::new()).with_id(id),
                fields,
                fail: false,
            }
        }

        fn failing(id: &str) -> Self {
            let mut probe = Self::publishing(id, json!({}));
            probe.fail = true;
            probe
        }

        fn reading(id: &str, param: Param) -> Self {
            let mut params = IndexMap::new();
            params.insert(ParamName::new("input"), param);
            Self {
                core: ActionCore::new("probe", id, params).with_id(id),
                fields: json!({}),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Action for Probe {
        fn core(&self) -> &ActionCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ActionCore {
            &mut self.core
        }

        async fn effect(&mut self, _ctx: &RunContext) -> Result<Value> {
            if self.fail {
                return Err(Error::invalid_output(self.core.id().clone(), "probe failure"));
            }
            let mut output = json!({"success": true});
            if let (Some(out), Some(fields)) =
                (output.as_object_mut(), self.fields.as_object())
            {
                for (key, value) in fields {
                    out.insert(key.clone(), value.clone());
                }
                if let Some(input) = self.core.resolved("input") {
                    out.insert("input".to_string(), input.clone());
                }
            }
            Ok(output)
        }
    }

    fn ctx() -> (RunContext, Arc<OutputStore>) {
        let store = Arc::new(OutputStore::new());
        (RunContext::new(Arc::clone(&store)), store)
    }

    #[test]
    fn test_slug_ids() {
        assert_eq!(Task::new("Deploy App").id().as_str(), "deploy-app");
        assert_eq!(Task::new("  restart :: nginx  ").id().as_str(), "restart-nginx");
        assert_eq!(Task::new("simple").id().as_str(), "simple");
        assert_eq!(
            Task::new("x").with_id("explicit").id().as_str(),
            "explicit"
        );
    }

    #[tokio::test]
    async fn test_actions_feed_each_other_within_a_task() {
        let (ctx, _store) = ctx();
        let mut task = Task::new("pipeline")
            .action(Probe::publishing("first", json!({"workingDir": "/tmp/x"})))
            .action(Probe::reading(
                "second",
                Param::action_output("first", "workingDir"),
            ));

        task.execute(&ctx).await.unwrap();
        let store = ctx.store().unwrap();
        let second = store.action_output(&"second".into()).unwrap();
        assert_eq!(second["input"], json!("/tmp/x"));
    }

    #[tokio::test]
    async fn test_aggregate_is_published_under_task_id() {
        let (ctx, store) = ctx();
        let mut task = Task::new("agg")
            .action(Probe::publishing("a1", json!({"workingDir": "/srv"})))
            .action(Probe::publishing("a2", json!({"services": ["web"]})));

        let aggregate = task.execute(&ctx).await.unwrap();
        assert_eq!(aggregate["success"], json!(true));
        assert_eq!(aggregate["actions"], json!(["a1", "a2"]));
        assert_eq!(aggregate["workingDir"], json!("/srv"));
        assert_eq!(aggregate["services"], json!(["web"]));

        assert_eq!(store.task_output(task.id()), Some(aggregate.clone()));
        assert_eq!(task.output(), Some(&aggregate));
    }

    #[tokio::test]
    async fn test_merge_order_later_actions_win() {
        let (ctx, _store) = ctx();
        let mut task = Task::new("conflict")
            .action(Probe::publishing("a1", json!({"workingDir": "/old"})))
            .action(Probe::publishing("a2", json!({"workingDir": "/new"})));

        let aggregate = task.execute(&ctx).await.unwrap();
        assert_eq!(aggregate["workingDir"], json!("/new"));
    }

    #[tokio::test]
    async fn test_first_failure_aborts_and_publishes_no_aggregate() {
        let (ctx, store) = ctx();
        let mut task = Task::new("failing")
            .action(Probe::publishing("ok", json!({})))
            .action(Probe::failing("boom"))
            .action(Probe::publishing("never", json!({})));

        let err = task.execute(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("probe failure"));

        // First action published, the rest did not, no task output.
        assert!(store.action_output(&"ok".into()).is_some());
        assert!(store.action_output(&"never".into()).is_none());
        assert!(store.task_output(task.id()).is_none());
        assert!(task.output().is_none());
    }

    #[tokio::test]
    async fn test_cancellation_between_actions() {
        let (ctx, store) = ctx();
        ctx.cancel();

        let mut task = Task::new("cancelled").action(Probe::publishing("a1", json!({})));
        let err = task.execute(&ctx).await.unwrap_err();

        assert!(err.is_cancellation());
        assert!(err.to_string().contains("cancelled"));
        assert!(err.to_string().contains("a1"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_empty_task_publishes_trivial_aggregate() {
        let (ctx, store) = ctx();
        let mut task = Task::new("empty");
        assert!(task.is_empty());

        let aggregate = task.execute(&ctx).await.unwrap();
        assert_eq!(aggregate["success"], json!(true));
        assert_eq!(aggregate["actions"], json!([]));
        assert!(store.task_output(task.id()).is_some());
    }

    #[tokio::test]
    async fn test_later_task_can_reference_earlier_task_output() {
        let (ctx, _store) = ctx();
        let mut first = Task::new("producer")
            .action(Probe::publishing("p1", json!({"services": ["web", "db"]})));
        first.execute(&ctx).await.unwrap();

        let mut second = Task::new("consumer").action(Probe::reading(
            "c1",
            Param::task_output("producer", "services"),
        ));
        second.execute(&ctx).await.unwrap();

        let store = ctx.store().unwrap();
        let consumer = store.action_output(&"c1".into()).unwrap();
        assert_eq!(consumer["input"], json!(["web", "db"]));
    }

    #[tokio::test]
    async fn test_action_completed_state_visible_after_task_run() {
        let (ctx, _store) = ctx();
        let mut task = Task::new("states").action(Probe::publishing("s1", json!({})));
        task.execute(&ctx).await.unwrap();
        assert_eq!(task.actions[0].core().state(), ActionState::Completed);
    }
}
