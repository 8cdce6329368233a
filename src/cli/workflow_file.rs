//! Parses the JSON workflow definitions accepted by `pipeline run`.

use crate::core::model::Task;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct TaskDefinition {
    pub task_id: String,
    pub name: String,
    pub function: String,
    #[serde(default = "default_arguments")]
    pub arguments: Value,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    pub max_retries: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

fn default_arguments() -> Value {
    Value::Object(Map::new())
}

impl TaskDefinition {
    pub fn into_task(self) -> Task {
        let mut task = Task::new(self.task_id, self.name, self.function)
            .with_dependencies(self.dependencies)
            .with_arguments(self.arguments);
        if let Some(max_retries) = self.max_retries {
            task = task.with_max_retries(max_retries);
        }
        if let Some(timeout_seconds) = self.timeout_seconds {
            task = task.with_timeout(Duration::from_secs(timeout_seconds));
        }
        task
    }
}

/// Load and parse a workflow definition file. Only JSON is supported; the document is forwarded
/// to `Orchestrator::create` verbatim once converted to `Task`s.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read workflow file {}", path.display()))?;
    let definition: WorkflowDefinition = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse workflow file {}", path.display()))?;
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_minimal_definition() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("workflow.json");
        std::fs::write(
            &path,
            r#"{
                "name": "demo",
                "tasks": [
                    {"task_id": "a", "name": "A", "function": "string_interaction"},
                    {"task_id": "b", "name": "B", "function": "docking_prediction", "dependencies": ["a"]}
                ]
            }"#,
        )
        .unwrap();

        let definition = load_workflow_file(&path).unwrap();
        assert_eq!(definition.name, "demo");
        assert_eq!(definition.tasks.len(), 2);
        assert!(definition.tasks[1].dependencies.contains("a"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load_workflow_file(Path::new("/nonexistent/workflow.json"));
        assert!(result.is_err());
    }

    #[test]
    fn task_definition_honors_overrides() {
        let definition = TaskDefinition {
            task_id: "a".to_string(),
            name: "A".to_string(),
            function: "string_interaction".to_string(),
            arguments: Value::Object(Map::new()),
            dependencies: BTreeSet::new(),
            max_retries: Some(5),
            timeout_seconds: Some(120),
        };
        let task = definition.into_task();
        assert_eq!(task.max_retries, 5);
        assert_eq!(task.timeout, Duration::from_secs(120));
    }
}
