//! Retry policy and terminal-failure notification path.
//!
//! Classification itself lives on `ErrorKind::retryable` (`core::error`); this module owns the
//! backoff schedule built on top of that classification and the notification sink invoked when
//! a workflow reaches a terminal failed/cancelled state.

use crate::core::error::ErrorKind;
use crate::core::model::{TaskError, WorkflowState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Linear backoff: the delay before attempt `N` is `retry_delay * N`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        RetryPolicy {
            max_retries,
            retry_delay,
        }
    }

    /// Whether `error` occurring on `retry_count` (0-indexed attempts already made) should be
    /// retried at all, irrespective of the delay.
    pub fn should_retry(&self, error: &TaskError, retry_count: u32) -> bool {
        error.kind.retryable() && retry_count < self.max_retries
    }

    /// Delay to wait before the next attempt, given the number of attempts already made.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.retry_delay * retry_count.max(1)
    }
}

/// A terminal event delivered once a workflow finishes in a failed or cancelled state.
#[derive(Debug, Clone)]
pub struct TerminalNotification {
    pub workflow_id: uuid::Uuid,
    pub workflow_name: String,
    pub status: crate::core::model::WorkflowStatus,
    /// The task whose failure is reported in `kind`/`message`, if the workflow ended with at
    /// least one failed task rather than a workflow-level cancellation.
    pub task_id: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// A short summary of any other failed tasks beyond the one named in `task_id`.
    pub diagnostics: Option<String>,
}

impl TerminalNotification {
    pub fn from_state(state: &WorkflowState) -> Self {
        let mut failed: Vec<&crate::core::model::Task> = state
            .tasks
            .values()
            .filter(|t| t.status == crate::core::model::TaskStatus::Failed)
            .collect();
        failed.sort_by(|a, b| a.task_id.cmp(&b.task_id));

        let (task_id, kind, message, diagnostics) = match failed.split_first() {
            Some((first, rest)) => {
                let error = first.error.clone().unwrap_or_else(|| {
                    crate::core::model::TaskError::new(ErrorKind::Internal, "task failed with no recorded error")
                });
                let diagnostics = if rest.is_empty() {
                    None
                } else {
                    Some(format!(
                        "also failed: {}",
                        rest.iter().map(|t| t.task_id.as_str()).collect::<Vec<_>>().join(", ")
                    ))
                };
                (Some(first.task_id.clone()), error.kind, error.message, diagnostics)
            }
            None => {
                let kind = if state.status == crate::core::model::WorkflowStatus::Cancelled {
                    ErrorKind::Cancelled
                } else {
                    ErrorKind::Internal
                };
                (None, kind, format!("workflow ended in state {:?} with no failed task", state.status), None)
            }
        };

        TerminalNotification {
            workflow_id: state.workflow_id,
            workflow_name: state.name.clone(),
            status: state.status,
            task_id,
            kind,
            message,
            timestamp: Utc::now(),
            diagnostics,
        }
    }
}

/// Delivery target for terminal workflow notifications. Kept deliberately narrow: the core
/// only needs to know a notification was attempted, not how it was rendered or transported.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &TerminalNotification);
}

/// Default sink: emits a structured `tracing` event. Sufficient for CLI use; real delivery
/// (email, Slack, PagerDuty) is out of scope for the core and would be a separate sink.
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(&self, notification: &TerminalNotification) {
        tracing::warn!(
            workflow_id = %notification.workflow_id,
            workflow_name = %notification.workflow_name,
            status = ?notification.status,
            task_id = ?notification.task_id,
            kind = %notification.kind,
            message = %notification.message,
            timestamp = %notification.timestamp,
            diagnostics = ?notification.diagnostics,
            "workflow reached a terminal failure state"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn backoff_scales_linearly_with_retry_count() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(6));
    }

    #[test]
    fn should_retry_respects_both_kind_and_retry_count() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let transient = TaskError::new(ErrorKind::TransientIo, "flaky");
        assert!(policy.should_retry(&transient, 0));
        assert!(policy.should_retry(&transient, 1));
        assert!(!policy.should_retry(&transient, 2));

        let validation = TaskError::new(ErrorKind::Validation, "bad input");
        assert!(!policy.should_retry(&validation, 0));
    }

    #[test]
    fn from_state_reports_first_failed_task_and_summarizes_rest() {
        use crate::core::model::{Task, TaskStatus, WorkflowState, WorkflowStatus};
        use std::collections::BTreeMap;

        let mut tasks = BTreeMap::new();
        let mut a = Task::new("a", "A", "noop");
        a.status = TaskStatus::Failed;
        a.error = Some(TaskError::new(ErrorKind::Validation, "bad input"));
        let mut b = Task::new("b", "B", "noop");
        b.status = TaskStatus::Failed;
        b.error = Some(TaskError::new(ErrorKind::Dependency, "blocked"));
        tasks.insert("a".to_string(), a);
        tasks.insert("b".to_string(), b);

        let mut state = WorkflowState::new("wf", tasks);
        state.status = WorkflowStatus::Failed;

        let notification = TerminalNotification::from_state(&state);
        assert_eq!(notification.task_id, Some("a".to_string()));
        assert_eq!(notification.kind, ErrorKind::Validation);
        assert_eq!(notification.message, "bad input");
        assert!(notification.diagnostics.unwrap().contains('b'));
    }

    #[test]
    fn from_state_falls_back_to_cancelled_with_no_failed_tasks() {
        use crate::core::model::{Task, WorkflowState, WorkflowStatus};
        use std::collections::BTreeMap;

        let mut tasks = BTreeMap::new();
        tasks.insert("a".to_string(), Task::new("a", "A", "noop"));
        let mut state = WorkflowState::new("wf", tasks);
        state.status = WorkflowStatus::Cancelled;

        let notification = TerminalNotification::from_state(&state);
        assert_eq!(notification.task_id, None);
        assert_eq!(notification.kind, ErrorKind::Cancelled);
    }
}
