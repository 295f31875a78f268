//! End-to-end pipeline tests: actions feeding each other through the
//! result store, task aggregation, and failure propagation.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use runbook::actions::{ComposeDown, ComposePs, ComposeUp, ServiceControl, ServiceVerb};
use runbook::dsl::{action_output, entity_output, literal, task_output};
use runbook::exec::{CommandRunner, ExecError, MockRunner};
use runbook::{
    Action, ActionId, EntityKind, Error, OutputStore, Param, RunContext, StorePolicy, Task, TaskId,
};

fn fresh_run() -> (RunContext, Arc<OutputStore>, Arc<MockRunner>) {
    let store = Arc::new(OutputStore::new());
    let ctx = RunContext::new(Arc::clone(&store));
    (ctx, store, Arc::new(MockRunner::new()))
}

#[tokio::test]
async fn working_dir_flows_from_first_action_to_second() {
    let (ctx, store, runner) = fresh_run();

    // Action 1 publishes {workingDir: "/tmp/x"}; action 2's parameter
    // references that key and resolves to /tmp/x at execution time.
    let up = ComposeUp::builder(Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .id("bring-up")
        .working_dir(literal("/tmp/x"))
        .build()
        .unwrap();
    let ps = ComposePs::builder(Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .id("list")
        .working_dir(action_output("bring-up", "workingDir"))
        .build()
        .unwrap();

    runner.enqueue_stdout(""); // compose up
    runner.enqueue_stdout("{\"Service\":\"web\",\"State\":\"running\"}\n"); // compose ps

    let mut task = Task::new("Deploy").action(up).action(ps);
    let aggregate = task.execute(&ctx).await.unwrap();

    // The second invocation ran in the directory the first action published.
    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].working_dir(),
        Some(std::path::Path::new("/tmp/x"))
    );

    assert_eq!(aggregate["success"], json!(true));
    assert_eq!(aggregate["actions"], json!(["bring-up", "list"]));
    assert_eq!(aggregate["states"], json!({"web": "running"}));
    assert_eq!(store.task_output(&TaskId::new("deploy")), Some(aggregate));
}

#[tokio::test]
async fn ghost_reference_fails_and_leaves_store_untouched() {
    let (ctx, store, runner) = fresh_run();

    let mut up = ComposeUp::builder(runner)
        .working_dir(action_output("ghost", "workingDir"))
        .build()
        .unwrap();

    let err = up.execute(&ctx).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("ghost"), "missing id in: {msg}");
    assert!(msg.contains("not found"), "missing cause in: {msg}");
    assert!(store.is_empty());
}

#[tokio::test]
async fn non_mapping_output_cannot_be_projected() {
    let (ctx, store, runner) = fresh_run();
    store
        .store_action_output(&ActionId::new("bare"), json!("just a string"))
        .unwrap();

    let mut up = ComposeUp::builder(runner)
        .working_dir(action_output("bare", "workingDir"))
        .build()
        .unwrap();

    let err = up.execute(&ctx).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("not a keyed mapping"), "got: {msg}");
    assert!(msg.contains("workingDir"), "got: {msg}");
}

#[tokio::test]
async fn later_task_references_earlier_task_aggregate() {
    let (ctx, _store, runner) = fresh_run();

    let up = ComposeUp::builder(Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .working_dir(literal("/srv/app"))
        .services(literal("web,db"))
        .build()
        .unwrap();
    let mut deploy = Task::new("deploy").action(up);
    deploy.execute(&ctx).await.unwrap();

    // The second task restarts exactly the services the first task's
    // aggregate reports.
    let restart = ServiceControl::builder(
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
        ServiceVerb::Restart,
    )
    .services(task_output("deploy", "services"))
    .build()
    .unwrap();
    let mut follow_up = Task::new("restart units").action(restart);
    follow_up.execute(&ctx).await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].arg_list(), ["restart", "web"]);
    assert_eq!(calls[2].arg_list(), ["restart", "db"]);
}

#[tokio::test]
async fn delimited_string_feeds_a_sequence_parameter() {
    let (ctx, store, runner) = fresh_run();
    // An upstream producer published services as one space-delimited string.
    store
        .store_action_output(&ActionId::new("probe"), json!({"units": "web db redis"}))
        .unwrap();

    let mut restart = ServiceControl::builder(
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
        ServiceVerb::Restart,
    )
    .services(action_output("probe", "units"))
    .build()
    .unwrap();
    restart.execute(&ctx).await.unwrap();

    let units: Vec<String> = runner
        .calls()
        .iter()
        .map(|spec| spec.arg_list()[1].clone())
        .collect();
    assert_eq!(units, ["web", "db", "redis"]);
}

#[tokio::test]
async fn task_failure_stops_subsequent_actions() {
    let (ctx, store, runner) = fresh_run();
    runner.enqueue_failure(1, "compose up failed");

    let up = ComposeUp::builder(Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .id("up")
        .working_dir(literal("/srv/app"))
        .build()
        .unwrap();
    let down = ComposeDown::builder(Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .id("down")
        .working_dir(literal("/srv/app"))
        .build()
        .unwrap();

    let mut task = Task::new("rollout").action(up).action(down);
    let err = task.execute(&ctx).await.unwrap_err();

    assert!(err.to_string().contains("compose up failed"));
    assert!(!err.is_cancellation());
    // Only the first command ran; nothing was published anywhere.
    assert_eq!(runner.call_count(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn cancellation_is_distinguished_from_failure() {
    let (ctx, _store, runner) = fresh_run();
    runner.enqueue_error(ExecError::Cancelled {
        program: "docker".to_string(),
    });

    let up = ComposeUp::builder(Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .working_dir(literal("/srv/app"))
        .build()
        .unwrap();
    let mut task = Task::new("cancelled run").action(up);

    let err = task.execute(&ctx).await.unwrap_err();
    assert!(err.is_cancellation());
    assert!(matches!(err, Error::Effect { .. }));
}

#[tokio::test]
async fn pre_cancelled_context_stops_before_the_first_action() {
    let (ctx, store, runner) = fresh_run();
    ctx.cancel();

    let up = ComposeUp::builder(runner)
        .id("never-runs")
        .working_dir(literal("/srv/app"))
        .build()
        .unwrap();
    let mut task = Task::new("doomed").action(up);

    let err = task.execute(&ctx).await.unwrap_err();
    assert!(err.is_cancellation());
    assert!(err.to_string().contains("never-runs"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn entity_references_accept_arbitrary_categories() {
    let (ctx, store, runner) = fresh_run();
    store
        .store_entity_output(
            &EntityKind::new("deployment"),
            "blue",
            json!({"composeDir": "/srv/blue"}),
        )
        .unwrap();

    let mut up = ComposeUp::builder(Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .working_dir(entity_output("deployment", "blue", "composeDir"))
        .build()
        .unwrap();
    up.execute(&ctx).await.unwrap();

    assert_eq!(
        runner.calls()[0].working_dir(),
        Some(std::path::Path::new("/srv/blue"))
    );
}

#[tokio::test]
async fn strict_store_rejects_a_second_publication() {
    let store = Arc::new(OutputStore::with_policy(StorePolicy::Strict));
    let ctx = RunContext::new(Arc::clone(&store));
    let runner = Arc::new(MockRunner::new());

    let build_up = || {
        ComposeUp::builder(Arc::clone(&runner) as Arc<dyn CommandRunner>)
            .id("fixed-id")
            .working_dir(literal("/srv/app"))
            .build()
            .unwrap()
    };

    let mut first = build_up();
    first.execute(&ctx).await.unwrap();

    let mut second = build_up();
    let err = second.execute(&ctx).await.unwrap_err();
    assert!(err.to_string().contains("already published"));
    assert!(err.to_string().contains("fixed-id"));
}

#[tokio::test]
async fn independent_runs_do_not_observe_each_other() {
    let (ctx_a, _store_a, runner) = fresh_run();
    let up = ComposeUp::builder(Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .id("shared-id")
        .working_dir(literal("/srv/app"))
        .build()
        .unwrap();
    let mut task = Task::new("run a").action(up);
    task.execute(&ctx_a).await.unwrap();

    // A second run with its own store cannot resolve the first run's output.
    let (ctx_b, _store_b, _) = fresh_run();
    let mut dependent = ComposePs::builder(runner)
        .working_dir(action_output("shared-id", "workingDir"))
        .build()
        .unwrap();
    let err = dependent.execute(&ctx_b).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn wire_shape_parameters_round_trip_through_config() {
    // Parameters arriving from configuration deserialize into the same
    // references the DSL builds.
    let from_config: Param = serde_json::from_value(json!({
        "kind": "actionOutput",
        "actionID": "bring-up",
        "outputKey": "services"
    }))
    .unwrap();
    assert_eq!(from_config, action_output("bring-up", "services"));

    let (ctx, store, runner) = fresh_run();
    store
        .store_action_output(&ActionId::new("bring-up"), json!({"services": ["web"]}))
        .unwrap();

    let mut restart = ServiceControl::builder(
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
        ServiceVerb::Restart,
    )
    .services(from_config)
    .build()
    .unwrap();
    restart.execute(&ctx).await.unwrap();
    assert_eq!(runner.calls()[0].arg_list(), ["restart", "web"]);
}
