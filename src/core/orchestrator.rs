//! Builds the task graph, drives the dependency-ready-set execution loop, and coordinates the
//! artifact cache, state store, scheduler, and notifier on behalf of a single workflow.

use crate::core::cache::ArtifactCache;
use crate::core::error::{AppError, ErrorKind};
use crate::core::model::{Task, TaskError, TaskStatus, WorkflowState, WorkflowStatus};
use crate::core::notifier::{NotificationSink, TerminalNotification};
use crate::core::registry::{TaskExecutionContext, TaskRegistry};
use crate::core::scheduler::{RetryEvent, TaskScheduler};
use crate::core::state_store::{ControlSignal, StateStore};
use chrono::Utc;
use dashmap::DashMap;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How often `drive` polls the state directory for a cross-process control signal while no
/// in-process task transition has woken it up sooner.
const CONTROL_SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Per-run handle allowing `cancel`/`pause` to reach a workflow executing in this process.
struct RunHandle {
    cancellation: CancellationToken,
    pause_requested: Arc<AtomicBool>,
}

/// Coordinates one workflow's full lifecycle: construction, execution, pause/cancel, and
/// terminal reporting.
pub struct Orchestrator {
    workspace_root: PathBuf,
    state_store: Arc<StateStore>,
    cache: Arc<ArtifactCache>,
    scheduler: Arc<TaskScheduler>,
    notifier: Arc<dyn NotificationSink>,
    /// Handles for workflows currently executing in this process.
    running: DashMap<Uuid, RunHandle>,
}

impl Orchestrator {
    pub fn new(
        workspace_root: PathBuf,
        state_store: Arc<StateStore>,
        cache: Arc<ArtifactCache>,
        registry: TaskRegistry,
        max_workers: usize,
        retry_policy: crate::core::notifier::RetryPolicy,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Orchestrator {
            workspace_root,
            state_store,
            cache,
            scheduler: Arc::new(TaskScheduler::new(max_workers, registry, retry_policy)),
            notifier,
            running: DashMap::new(),
        }
    }

    /// Validate the task graph (no missing dependencies, no cycles) and persist the initial
    /// `Created` state. Returns the assigned `workflow_id`.
    pub fn create(&self, name: impl Into<String>, tasks: Vec<Task>) -> Result<Uuid, AppError> {
        let task_map: std::collections::BTreeMap<String, Task> =
            tasks.into_iter().map(|t| (t.task_id.clone(), t)).collect();

        validate_graph(&task_map)?;

        let state = WorkflowState::new(name, task_map);
        let workflow_id = state.workflow_id;
        self.state_store.save(&state)?;
        Ok(workflow_id)
    }

    /// Run a freshly created workflow to a terminal state.
    pub async fn execute(&self, workflow_id: Uuid) -> Result<WorkflowState, AppError> {
        let mut state = self.state_store.load(workflow_id)?;
        state.status = WorkflowStatus::Running;
        state.started_at = Some(Utc::now());
        self.state_store.save(&state)?;
        self.drive(state).await
    }

    /// Continue a previously paused, running (crashed mid-flight), or failed workflow. Tasks
    /// already `Completed` are skipped; tasks left `Running` or `Retrying` from a crashed
    /// process are re-enqueued as `Pending` since no scheduler attempt is left running for them
    /// in this fresh process.
    pub async fn resume(&self, workflow_id: Uuid) -> Result<WorkflowState, AppError> {
        let mut state = self.state_store.load(workflow_id)?;
        if state.status.is_terminal() {
            return Err(AppError::new(
                ErrorKind::Validation,
                format!("workflow {workflow_id} already in terminal state {:?}", state.status),
            ));
        }
        for task in state.tasks.values_mut() {
            if task.status == TaskStatus::Running || task.status == TaskStatus::Retrying {
                task.status = TaskStatus::Pending;
            }
        }
        state.status = WorkflowStatus::Running;
        self.state_store.save(&state)?;
        self.drive(state).await
    }

    /// Request cooperative cancellation of `workflow_id`. No-op if the workflow is already
    /// terminal. Cancels the in-process run immediately if one is tracked here, and always
    /// writes a cross-process control signal so a workflow executing in another process (the
    /// only realistic way `pipeline cancel` is invoked) observes the request too.
    pub fn cancel(&self, workflow_id: Uuid) -> Result<(), AppError> {
        let state = self.state_store.load(workflow_id)?;
        if state.status.is_terminal() {
            return Ok(());
        }
        if let Some(handle) = self.running.get(&workflow_id) {
            handle.cancellation.cancel();
        }
        self.state_store.request_cancel(workflow_id)
    }

    /// Request a workflow pause: in-flight tasks run to completion, then the run loop halts
    /// and the workflow transitions `RUNNING -> PAUSED`. No-op if the workflow is not `RUNNING`.
    pub fn pause(&self, workflow_id: Uuid) -> Result<(), AppError> {
        let state = self.state_store.load(workflow_id)?;
        if state.status != WorkflowStatus::Running {
            return Ok(());
        }
        if let Some(handle) = self.running.get(&workflow_id) {
            handle.pause_requested.store(true, Ordering::SeqCst);
        }
        self.state_store.request_pause(workflow_id)
    }

    pub fn status(&self, workflow_id: Uuid) -> Result<WorkflowState, AppError> {
        self.state_store.load(workflow_id)
    }

    pub fn list(&self) -> Result<Vec<WorkflowState>, AppError> {
        self.state_store.list()
    }

    /// Remove persisted workflows that finished in a terminal state more than `older_than` ago,
    /// and sweep expired/corrupt cache entries. Returns `(workflows_removed, cache_entries_removed)`.
    pub fn cleanup(
        &self,
        older_than: chrono::Duration,
        cache_ttl: std::time::Duration,
    ) -> Result<(usize, usize), AppError> {
        let workflows_removed = self.state_store.cleanup(older_than)?;
        let cache_entries_removed = self.cache.sweep(cache_ttl)?;
        Ok((workflows_removed, cache_entries_removed))
    }

    async fn drive(&self, mut state: WorkflowState) -> Result<WorkflowState, AppError> {
        let workflow_id = state.workflow_id;
        let cancellation = CancellationToken::new();
        let pause_requested = Arc::new(AtomicBool::new(false));
        self.running.insert(
            workflow_id,
            RunHandle {
                cancellation: cancellation.clone(),
                pause_requested: pause_requested.clone(),
            },
        );
        self.state_store.clear_control_signal(workflow_id)?;

        let mut join_set: JoinSet<crate::core::scheduler::TaskOutcome> = JoinSet::new();
        let (retry_tx, mut retry_rx) = mpsc::unbounded_channel::<RetryEvent>();

        self.spawn_ready(&mut state, &mut join_set, &cancellation, &retry_tx);
        self.state_store.save(&state)?;

        let mut paused = false;

        loop {
            if join_set.is_empty() {
                break;
            }

            tokio::select! {
                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break; };
                    match joined {
                        Ok(outcome) => {
                            self.apply_outcome(&mut state, outcome);
                            self.state_store.save(&state)?;
                        }
                        Err(join_err) => {
                            tracing::error!(error = %join_err, "task worker panicked");
                            continue;
                        }
                    }

                    if cancellation.is_cancelled() {
                        self.cancel_remaining_pending(&mut state);
                        break;
                    }

                    if !paused
                        && (pause_requested.load(Ordering::SeqCst)
                            || self.state_store.peek_control_signal(workflow_id)? == Some(ControlSignal::Pause))
                    {
                        paused = true;
                    }
                    if !paused {
                        self.spawn_ready(&mut state, &mut join_set, &cancellation, &retry_tx);
                    }
                }
                Some(event) = retry_rx.recv() => {
                    self.apply_retry_event(&mut state, event);
                    self.state_store.save(&state)?;
                }
                _ = tokio::time::sleep(CONTROL_SIGNAL_POLL_INTERVAL), if !paused => {
                    match self.state_store.peek_control_signal(workflow_id)? {
                        Some(ControlSignal::Cancel) => cancellation.cancel(),
                        Some(ControlSignal::Pause) => paused = true,
                        None => {}
                    }
                }
            }
        }

        self.running.remove(&workflow_id);
        self.state_store.clear_control_signal(workflow_id)?;

        if paused && !cancellation.is_cancelled() {
            state.status = WorkflowStatus::Paused;
            self.state_store.save(&state)?;
            return Ok(state);
        }

        self.finalize(&mut state, &cancellation);
        self.state_store.save(&state)?;

        if state.status == WorkflowStatus::Failed || state.status == WorkflowStatus::Cancelled {
            self.notifier
                .notify(&TerminalNotification::from_state(&state))
                .await;
        }

        Ok(state)
    }

    fn spawn_ready(
        &self,
        state: &mut WorkflowState,
        join_set: &mut JoinSet<crate::core::scheduler::TaskOutcome>,
        cancellation: &CancellationToken,
        retry_tx: &UnboundedSender<RetryEvent>,
    ) {
        if cancellation.is_cancelled() {
            return;
        }
        let ready_ids: Vec<String> = ready_set(state);
        for task_id in ready_ids {
            let task = state.tasks.get_mut(&task_id).expect("ready task must exist");
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());

            let scheduler = self.scheduler.clone();
            let task_snapshot = task.clone();
            let arguments = task.arguments.clone();
            let ctx = TaskExecutionContext {
                workspace_root: self.workspace_root.clone(),
                workflow_id: state.workflow_id,
                task_id: task_id.clone(),
                attempt: 0,
                cancellation: cancellation.clone(),
                cache: self.cache.clone(),
            };
            let token = cancellation.clone();
            let retry_tx = retry_tx.clone();
            join_set.spawn(async move { scheduler.run_task(&task_snapshot, arguments, ctx, token, retry_tx).await });
        }
    }

    /// Persist an intermediate `RETRYING` snapshot for a task the scheduler is about to back off
    /// on. The task's next terminal outcome (success or exhausted retries) overwrites this via
    /// `apply_outcome`.
    fn apply_retry_event(&self, state: &mut WorkflowState, event: RetryEvent) {
        if let Some(task) = state.tasks.get_mut(&event.task_id) {
            task.status = TaskStatus::Retrying;
            task.retry_count = event.attempt;
            task.error = Some(event.error);
        }
    }

    fn apply_outcome(&self, state: &mut WorkflowState, outcome: crate::core::scheduler::TaskOutcome) {
        let Some(task) = state.tasks.get_mut(&outcome.task_id) else {
            return;
        };
        task.retry_count = outcome.attempts;
        task.completed_at = Some(Utc::now());
        match outcome.result {
            Ok(value) => {
                task.status = TaskStatus::Completed;
                task.result = Some(value);
                task.error = None;
            }
            Err(err) => {
                // The scheduler already ran the full retry/backoff loop before returning a
                // failure, so by the time the outcome reaches the orchestrator it is terminal.
                task.status = TaskStatus::Failed;
                task.error = Some(err);
            }
        }
        state.recompute_progress();
        self.block_dependents_of_failed_tasks(state);
    }

    /// Any pending task whose dependencies include a permanently `Failed` task can never
    /// become ready; mark it `Failed` with `ErrorKind::Dependency` so the run can terminate.
    fn block_dependents_of_failed_tasks(&self, state: &mut WorkflowState) {
        let failed: HashSet<String> = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| t.task_id.clone())
            .collect();
        if failed.is_empty() {
            return;
        }
        loop {
            let newly_blocked: Vec<String> = state
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending)
                .filter(|t| t.dependencies.iter().any(|dep| {
                    state
                        .tasks
                        .get(dep)
                        .map(|d| d.status == TaskStatus::Failed)
                        .unwrap_or(false)
                }))
                .map(|t| t.task_id.clone())
                .collect();
            if newly_blocked.is_empty() {
                break;
            }
            for task_id in &newly_blocked {
                if let Some(task) = state.tasks.get_mut(task_id) {
                    task.status = TaskStatus::Failed;
                    task.error = Some(TaskError::new(
                        ErrorKind::Dependency,
                        "blocked because a dependency failed",
                    ));
                    task.completed_at = Some(Utc::now());
                }
            }
        }
    }

    fn cancel_remaining_pending(&self, state: &mut WorkflowState) {
        for task in state.tasks.values_mut() {
            if !task.status.is_terminal() {
                task.status = TaskStatus::Cancelled;
                task.error = Some(TaskError::new(ErrorKind::Cancelled, "workflow cancelled"));
                task.completed_at = Some(Utc::now());
            }
        }
    }

    fn finalize(&self, state: &mut WorkflowState, cancellation: &CancellationToken) {
        state.recompute_progress();
        state.completed_at = Some(Utc::now());
        if cancellation.is_cancelled() {
            state.status = WorkflowStatus::Cancelled;
        } else if state.tasks.values().any(|t| t.status == TaskStatus::Failed) {
            state.status = WorkflowStatus::Failed;
        } else if state.tasks.values().all(|t| t.status == TaskStatus::Completed) {
            state.status = WorkflowStatus::Completed;
        } else {
            // No ready tasks remained yet some are not terminal: only possible if the graph
            // validation at create() time had a bug, since cycles are rejected up front.
            state.status = WorkflowStatus::Failed;
        }
    }
}

/// Tasks that are `Pending` and whose every dependency is `Completed`.
fn ready_set(state: &WorkflowState) -> Vec<String> {
    state
        .tasks
        .values()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| {
            t.dependencies.iter().all(|dep| {
                state
                    .tasks
                    .get(dep)
                    .map(|d| d.status == TaskStatus::Completed)
                    .unwrap_or(false)
            })
        })
        .map(|t| t.task_id.clone())
        .collect()
}

/// Reject graphs with a dependency on an unknown task, or with a cycle.
fn validate_graph(tasks: &std::collections::BTreeMap<String, Task>) -> Result<(), AppError> {
    for task in tasks.values() {
        for dep in &task.dependencies {
            if !tasks.contains_key(dep) {
                return Err(AppError::new(
                    ErrorKind::Validation,
                    format!("task '{}' depends on unknown task '{}'", task.task_id, dep),
                )
                .with_code("PIPE-GRAPH-MISSING-DEP"));
            }
        }
    }

    let mut graph = DiGraph::<&str, ()>::new();
    let mut indices = HashMap::new();
    for id in tasks.keys() {
        indices.insert(id.as_str(), graph.add_node(id.as_str()));
    }
    for task in tasks.values() {
        for dep in &task.dependencies {
            graph.add_edge(indices[dep.as_str()], indices[task.task_id.as_str()], ());
        }
    }
    if toposort(&graph, None).is_err() {
        return Err(AppError::new(
            ErrorKind::Validation,
            "task graph contains a dependency cycle",
        )
        .with_code("PIPE-GRAPH-CYCLE"));
    }
    Ok(())
}
