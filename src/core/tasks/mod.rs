//! Built-in task functions and the default registry assembled from them.

pub mod builtin;

use crate::core::registry::{TaskRegistry, TaskRegistryBuilder};

/// The registry used by `pipeline run`/`resume` unless a caller supplies its own.
pub fn default_registry() -> TaskRegistry {
    TaskRegistryBuilder::new()
        .register(builtin::StringInteraction)
        .register(builtin::DockingPrediction)
        .register(builtin::ConservationCheck)
        .register(builtin::PeptideOptimize)
        .register(builtin::ReportGenerate)
        .build()
}
