//! Bounded worker pool that executes a single task to completion: per-attempt timeout,
//! linear-backoff retries, and cooperative cancellation.

use crate::core::model::{Task, TaskError};
use crate::core::notifier::RetryPolicy;
use crate::core::registry::{TaskExecutionContext, TaskRegistry};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Result of running one task to either success or exhausted retries.
pub struct TaskOutcome {
    pub task_id: String,
    pub attempts: u32,
    pub result: Result<Value, TaskError>,
}

/// Emitted just before a task enters its backoff sleep between attempts, so a caller can
/// persist an intermediate `RETRYING` snapshot it would otherwise never observe.
#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub task_id: String,
    pub attempt: u32,
    pub error: TaskError,
}

/// Per-task state tracked for the lifetime of a `run_task` call, enabling `cancel`/`status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerTaskStatus {
    Running,
    Completed,
    Cancelled,
}

/// Executes tasks against a fixed-size worker pool shared across a single workflow run.
pub struct TaskScheduler {
    semaphore: Arc<Semaphore>,
    registry: TaskRegistry,
    retry_policy: RetryPolicy,
    /// Per-task cancellation token and last-known status, keyed by `task_id`. Entries persist
    /// after completion so `status(task_id)` remains answerable until `shutdown`.
    tasks: DashMap<String, (CancellationToken, SchedulerTaskStatus)>,
}

impl TaskScheduler {
    pub fn new(max_workers: usize, registry: TaskRegistry, retry_policy: RetryPolicy) -> Self {
        TaskScheduler {
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            registry,
            retry_policy,
            tasks: DashMap::new(),
        }
    }

    /// Request cancellation of a specific task currently tracked by this scheduler. No-op if
    /// the task is unknown or already finished.
    pub fn cancel(&self, task_id: &str) {
        if let Some(entry) = self.tasks.get(task_id) {
            entry.0.cancel();
        }
    }

    /// Last-known status of a task this scheduler has run, or `None` if it was never submitted.
    pub fn status(&self, task_id: &str) -> Option<SchedulerTaskStatus> {
        self.tasks.get(task_id).map(|entry| entry.1)
    }

    /// Cancel every task currently tracked by this scheduler. Used when a workflow run is torn
    /// down entirely rather than one task being singled out.
    pub fn shutdown(&self) {
        for entry in self.tasks.iter() {
            entry.value().0.cancel();
        }
    }

    /// Run `task` to completion, acquiring a worker slot for the whole attempt loop. Honors
    /// `task.retry_count` as the number of attempts already spent in a prior process lifetime
    /// (the resume path), so backoff and the retry ceiling stay consistent across restarts.
    /// `retry_tx` receives a [`RetryEvent`] immediately before each backoff sleep; the receiver
    /// may drop events if it's no longer interested.
    pub async fn run_task(
        &self,
        task: &Task,
        arguments: Value,
        ctx_base: TaskExecutionContext,
        cancellation: CancellationToken,
        retry_tx: UnboundedSender<RetryEvent>,
    ) -> TaskOutcome {
        let task_token = CancellationToken::new();
        self.tasks
            .insert(task.task_id.clone(), (task_token.clone(), SchedulerTaskStatus::Running));

        let outcome = self
            .run_task_inner(task, arguments, ctx_base, cancellation, task_token.clone(), retry_tx)
            .await;

        let final_status = if outcome.result.as_ref().err().map(|e| e.kind) == Some(crate::core::error::ErrorKind::Cancelled) {
            SchedulerTaskStatus::Cancelled
        } else {
            SchedulerTaskStatus::Completed
        };
        if let Some(mut entry) = self.tasks.get_mut(&task.task_id) {
            entry.1 = final_status;
        }

        outcome
    }

    async fn run_task_inner(
        &self,
        task: &Task,
        arguments: Value,
        ctx_base: TaskExecutionContext,
        cancellation: CancellationToken,
        task_token: CancellationToken,
        retry_tx: UnboundedSender<RetryEvent>,
    ) -> TaskOutcome {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return TaskOutcome {
                    task_id: task.task_id.clone(),
                    attempts: task.retry_count,
                    result: Err(TaskError::new(
                        crate::core::error::ErrorKind::Internal,
                        "worker pool semaphore closed",
                    )),
                }
            }
        };

        let function = match self.registry.resolve(&task.function_name) {
            Ok(function) => function,
            Err(err) => {
                drop(permit);
                return TaskOutcome {
                    task_id: task.task_id.clone(),
                    attempts: task.retry_count,
                    result: Err(err.into()),
                };
            }
        };

        let mut attempt = task.retry_count;
        loop {
            attempt += 1;

            if cancellation.is_cancelled() || task_token.is_cancelled() {
                drop(permit);
                return TaskOutcome {
                    task_id: task.task_id.clone(),
                    attempts: attempt,
                    result: Err(TaskError::new(
                        crate::core::error::ErrorKind::Cancelled,
                        "task cancelled before attempt started",
                    )),
                };
            }

            let mut ctx = ctx_base.clone();
            ctx.attempt = attempt;
            ctx.cancellation = cancellation.clone();

            let attempt_result = tokio::select! {
                result = tokio::time::timeout(task.timeout, function.call(arguments.clone(), ctx)) => {
                    match result {
                        Ok(inner) => inner,
                        Err(_) => Err(TaskError::new(
                            crate::core::error::ErrorKind::Timeout,
                            format!("task '{}' exceeded timeout of {:?}", task.task_id, task.timeout),
                        )),
                    }
                }
                _ = cancellation.cancelled() => {
                    Err(TaskError::new(
                        crate::core::error::ErrorKind::Cancelled,
                        format!("task '{}' cancelled mid-attempt", task.task_id),
                    ))
                }
                _ = task_token.cancelled() => {
                    Err(TaskError::new(
                        crate::core::error::ErrorKind::Cancelled,
                        format!("task '{}' cancelled mid-attempt", task.task_id),
                    ))
                }
            };

            match attempt_result {
                Ok(value) => {
                    drop(permit);
                    return TaskOutcome {
                        task_id: task.task_id.clone(),
                        attempts: attempt,
                        result: Ok(value),
                    };
                }
                Err(err) => {
                    if !self.retry_policy.should_retry(&err, attempt - 1) {
                        drop(permit);
                        return TaskOutcome {
                            task_id: task.task_id.clone(),
                            attempts: attempt,
                            result: Err(err),
                        };
                    }
                    let _ = retry_tx.send(RetryEvent {
                        task_id: task.task_id.clone(),
                        attempt,
                        error: err,
                    });
                    let delay = self.retry_policy.backoff(attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancellation.cancelled() => {
                            drop(permit);
                            return TaskOutcome {
                                task_id: task.task_id.clone(),
                                attempts: attempt,
                                result: Err(TaskError::new(
                                    crate::core::error::ErrorKind::Cancelled,
                                    format!("task '{}' cancelled during backoff", task.task_id),
                                )),
                            };
                        }
                        _ = task_token.cancelled() => {
                            drop(permit);
                            return TaskOutcome {
                                task_id: task.task_id.clone(),
                                attempts: attempt,
                                result: Err(TaskError::new(
                                    crate::core::error::ErrorKind::Cancelled,
                                    format!("task '{}' cancelled during backoff", task.task_id),
                                )),
                            };
                        }
                    }
                }
            }
        }
    }
}
