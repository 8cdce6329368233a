//! Atomic JSON snapshots of `WorkflowState`, enabling resume-from-failed-step semantics
//! across process restarts.

use crate::core::atomic_file::atomic_write;
use crate::core::error::{AppError, ErrorKind};
use crate::core::model::WorkflowState;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persists and loads `WorkflowState` snapshots as one JSON file per workflow.
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StateStore { root: root.into() }
    }

    fn path_for(&self, workflow_id: Uuid) -> PathBuf {
        self.root.join(format!("{workflow_id}.json"))
    }

    pub fn save(&self, state: &WorkflowState) -> Result<(), AppError> {
        let encoded = serde_json::to_vec_pretty(state)?;
        atomic_write(&self.path_for(state.workflow_id), &encoded)
    }

    pub fn load(&self, workflow_id: Uuid) -> Result<WorkflowState, AppError> {
        let path = self.path_for(workflow_id);
        let bytes = fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                AppError::new(
                    ErrorKind::Validation,
                    format!("no workflow state found for {workflow_id}"),
                )
                .with_code("PIPE-STATE-404")
            } else {
                AppError::from(err)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn delete(&self, workflow_id: Uuid) -> Result<(), AppError> {
        let path = self.path_for(workflow_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::from(err)),
        }
    }

    /// List every persisted workflow, most recently created first.
    pub fn list(&self) -> Result<Vec<WorkflowState>, AppError> {
        let mut states = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(states),
            Err(err) => return Err(AppError::from(err)),
        };
        for entry in entries {
            let entry = entry.map_err(AppError::from)?;
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(entry.path()).map_err(AppError::from)?;
            match serde_json::from_slice::<WorkflowState>(&bytes) {
                Ok(state) => states.push(state),
                Err(_) => continue,
            }
        }
        states.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(states)
    }

    /// Remove persisted workflows in a terminal state whose `created_at` is older than
    /// `older_than`. Returns the number of workflows removed.
    pub fn cleanup(&self, older_than: chrono::Duration) -> Result<usize, AppError> {
        let cutoff = chrono::Utc::now() - older_than;
        let mut removed = 0;
        for state in self.list()? {
            if !state.status.is_terminal() {
                continue;
            }
            if state.created_at < cutoff {
                self.delete(state.workflow_id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn control_path(&self, workflow_id: Uuid) -> PathBuf {
        self.root.join(format!("{workflow_id}.control"))
    }

    /// Record a cross-process cancel request for `workflow_id`. A separate process actually
    /// running the workflow polls for this file and honors it cooperatively.
    pub fn request_cancel(&self, workflow_id: Uuid) -> Result<(), AppError> {
        self.write_control_signal(workflow_id, ControlSignal::Cancel)
    }

    /// Record a cross-process pause request for `workflow_id`.
    pub fn request_pause(&self, workflow_id: Uuid) -> Result<(), AppError> {
        self.write_control_signal(workflow_id, ControlSignal::Pause)
    }

    fn write_control_signal(&self, workflow_id: Uuid, signal: ControlSignal) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).map_err(AppError::from)?;
        atomic_write(&self.control_path(workflow_id), signal.as_str().as_bytes())
    }

    /// Read any pending control signal for `workflow_id` without clearing it.
    pub fn peek_control_signal(&self, workflow_id: Uuid) -> Result<Option<ControlSignal>, AppError> {
        match fs::read_to_string(self.control_path(workflow_id)) {
            Ok(contents) => Ok(ControlSignal::parse(contents.trim())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::from(err)),
        }
    }

    /// Remove any pending control signal for `workflow_id`. Best-effort.
    pub fn clear_control_signal(&self, workflow_id: Uuid) -> Result<(), AppError> {
        match fs::remove_file(self.control_path(workflow_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::from(err)),
        }
    }
}

/// A cross-process signal written to a `<workflow_id>.control` sentinel file in the state
/// directory, so a CLI invocation in one process can request cancel/pause of a workflow
/// actually executing in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Cancel,
    Pause,
}

impl ControlSignal {
    fn as_str(self) -> &'static str {
        match self {
            ControlSignal::Cancel => "cancel",
            ControlSignal::Pause => "pause",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "cancel" => Some(ControlSignal::Cancel),
            "pause" => Some(ControlSignal::Pause),
            _ => None,
        }
    }
}
