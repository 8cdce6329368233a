//! Task function registry: a name -> callable lookup resolved at workflow construction and
//! execution time, replacing the original pipeline's dynamically dispatched callables.

use crate::core::cache::ArtifactCache;
use crate::core::error::{AppError, ErrorKind};
use crate::core::model::TaskError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a task function needs besides its own arguments.
#[derive(Clone)]
pub struct TaskExecutionContext {
    pub workspace_root: PathBuf,
    pub workflow_id: uuid::Uuid,
    pub task_id: String,
    pub attempt: u32,
    pub cancellation: CancellationToken,
    pub cache: Arc<ArtifactCache>,
}

/// The ABI boundary every registered task implements. Dynamic dispatch lives here instead of
/// a scripting layer: the orchestrator only ever knows a task by its `function_name`.
#[async_trait]
pub trait TaskFunction: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn call(&self, arguments: Value, ctx: TaskExecutionContext) -> Result<Value, TaskError>;
}

/// Immutable, thread-safe lookup of task functions by name.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    functions: Arc<HashMap<String, Arc<dyn TaskFunction>>>,
}

impl TaskRegistry {
    pub fn resolve(&self, function_name: &str) -> Result<Arc<dyn TaskFunction>, AppError> {
        self.functions.get(function_name).cloned().ok_or_else(|| {
            AppError::new(
                ErrorKind::Validation,
                format!("no task function registered under name '{function_name}'"),
            )
            .with_code("PIPE-REGISTRY-001")
        })
    }

    pub fn contains(&self, function_name: &str) -> bool {
        self.functions.contains_key(function_name)
    }
}

/// Builds a `TaskRegistry`, panicking on duplicate names since that indicates a programming
/// error in how built-ins were assembled, not a runtime condition callers should recover from.
#[derive(Default)]
pub struct TaskRegistryBuilder {
    functions: HashMap<String, Arc<dyn TaskFunction>>,
}

impl TaskRegistryBuilder {
    pub fn new() -> Self {
        TaskRegistryBuilder::default()
    }

    pub fn register(mut self, function: impl TaskFunction) -> Self {
        let name = function.name();
        if self.functions.insert(name.to_string(), Arc::new(function)).is_some() {
            panic!("duplicate task function registered under name '{name}'");
        }
        self
    }

    pub fn build(self) -> TaskRegistry {
        TaskRegistry {
            functions: Arc::new(self.functions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind as Kind;

    struct Echo;

    #[async_trait]
    impl TaskFunction for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn call(&self, arguments: Value, _ctx: TaskExecutionContext) -> Result<Value, TaskError> {
            Ok(arguments)
        }
    }

    #[test]
    fn resolve_missing_function_is_validation_error() {
        let registry = TaskRegistryBuilder::new().build();
        let err = registry.resolve("missing").unwrap_err();
        assert_eq!(err.kind, Kind::Validation);
    }

    #[test]
    fn resolve_returns_registered_function_by_name() {
        let registry = TaskRegistryBuilder::new().register(Echo).build();
        assert!(registry.contains("echo"));
        assert!(registry.resolve("echo").is_ok());
    }

    #[test]
    #[should_panic(expected = "duplicate task function")]
    fn duplicate_registration_panics() {
        TaskRegistryBuilder::new().register(Echo).register(Echo).build();
    }
}
