//! Core domain types: tasks, workflow state, and cache entries persisted by the orchestrator.

use crate::core::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

fn default_max_retries() -> u32 {
    3
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_metadata() -> Map<String, Value> {
    Map::new()
}

/// Lifecycle states of a single task within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Retrying,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Lifecycle states of an entire workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Created,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

/// Error recorded against a task that is `Failed` or `Retrying`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        TaskError {
            kind,
            message: message.into(),
        }
    }
}

impl From<crate::core::error::AppError> for TaskError {
    fn from(err: crate::core::error::AppError) -> Self {
        TaskError::new(err.kind, err.message)
    }
}

/// A single unit of work in a workflow's dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub name: String,
    /// Name resolved against the task function registry at execution time.
    pub function_name: String,
    #[serde(default = "default_metadata_value")]
    pub arguments: Value,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout", with = "humantime_serde_duration")]
    pub timeout: Duration,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<TaskError>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_metadata")]
    pub metadata: Map<String, Value>,
}

fn default_metadata_value() -> Value {
    Value::Object(Map::new())
}

impl Task {
    pub fn new(task_id: impl Into<String>, name: impl Into<String>, function_name: impl Into<String>) -> Self {
        Task {
            task_id: task_id.into(),
            name: name.into(),
            function_name: function_name.into(),
            arguments: Value::Object(Map::new()),
            dependencies: BTreeSet::new(),
            retry_count: 0,
            max_retries: default_max_retries(),
            timeout: default_timeout(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            metadata: Map::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = String>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn exhausted_retries(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Persisted state of an entire workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: Uuid,
    pub name: String,
    pub status: WorkflowStatus,
    pub tasks: BTreeMap<String, Task>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default = "default_metadata")]
    pub metadata: Map<String, Value>,
}

impl WorkflowState {
    pub fn new(name: impl Into<String>, tasks: BTreeMap<String, Task>) -> Self {
        WorkflowState {
            workflow_id: Uuid::new_v4(),
            name: name.into(),
            status: WorkflowStatus::Created,
            tasks,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: 0.0,
            metadata: Map::new(),
        }
    }

    /// Recompute `progress` as the percentage of tasks in a terminal, successful state.
    /// An empty task set is vacuously fully complete, so it reports 100.
    pub fn recompute_progress(&mut self) {
        if self.tasks.is_empty() {
            self.progress = 100.0;
            return;
        }
        let completed = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        self.progress = (completed as f64 / self.tasks.len() as f64) * 100.0;
    }
}

/// A single file recorded inside a cache entry's manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFileRecord {
    pub path: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Manifest describing one cached artifact set, keyed by source + parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "humantime_serde_duration")]
    pub ttl: Duration,
    pub files: Vec<CacheFileRecord>,
    #[serde(default = "default_metadata")]
    pub metadata: Map<String, Value>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(self.timestamp) > ttl,
            Err(_) => false,
        }
    }
}

/// Serializes a `Duration` as whole seconds for the `timeout_seconds` field.
mod humantime_serde_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
