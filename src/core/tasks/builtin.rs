//! Stub task functions representative of the five analysis stages the pipeline drives
//! (string interaction mining, docking prediction, conservation check, peptide optimization,
//! report generation). Each simulates the shape of the real analysis — latency, occasional
//! transient failure, structured JSON output — without touching a real network or database.

use crate::core::error::{AppError, ErrorKind};
use crate::core::fingerprint::cache_key;
use crate::core::model::TaskError;
use crate::core::registry::{TaskExecutionContext, TaskFunction};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;
use std::time::Duration;

const ARTIFACT_TTL: Duration = Duration::from_secs(24 * 3600);
const RESULT_FILE: &str = "result.json";

fn arg_str(arguments: &Value, key: &str, default: &str) -> String {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Serve `identity`'s cached result for `stage` if present and valid, otherwise run `compute`,
/// persist its output as the new entry, and return it. Shared by every built-in stage so caching
/// is wired in exactly once rather than per stage.
fn cached_or_compute(
    ctx: &TaskExecutionContext,
    stage: &'static str,
    identity: &str,
    compute: impl FnOnce() -> Value,
) -> Result<Value, TaskError> {
    let key = cache_key(stage, &[identity]);
    if ctx.cache.get(&key)?.is_some() {
        let path = ctx.cache.entry_dir_for_write(&key).join(RESULT_FILE);
        let bytes = fs::read(&path).map_err(AppError::from)?;
        return Ok(serde_json::from_slice(&bytes).map_err(AppError::from)?);
    }

    let output = compute();
    let entry_dir = ctx.cache.entry_dir_for_write(&key);
    fs::create_dir_all(&entry_dir).map_err(AppError::from)?;
    let artifact_path = entry_dir.join(RESULT_FILE);
    let encoded = serde_json::to_vec_pretty(&output).map_err(AppError::from)?;
    fs::write(&artifact_path, &encoded).map_err(AppError::from)?;
    ctx.cache.put(&key, stage, ARTIFACT_TTL, &[artifact_path])?;
    Ok(output)
}

/// Flakiness hook: a task whose arguments carry `"fail_attempts": N` fails transiently on the
/// first `N` attempts, then succeeds. Used by integration tests to exercise retry/backoff.
fn maybe_fail_transiently(arguments: &Value, attempt: u32, stage: &str) -> Result<(), TaskError> {
    let fail_attempts = arguments
        .get("fail_attempts")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    if attempt <= fail_attempts {
        return Err(TaskError::new(
            ErrorKind::TransientIo,
            format!("{stage}: simulated transient failure on attempt {attempt}"),
        ));
    }
    Ok(())
}

pub struct StringInteraction;

#[async_trait]
impl TaskFunction for StringInteraction {
    fn name(&self) -> &'static str {
        "string_interaction"
    }

    async fn call(&self, arguments: Value, ctx: TaskExecutionContext) -> Result<Value, TaskError> {
        maybe_fail_transiently(&arguments, ctx.attempt, "string_interaction")?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let protein = arg_str(&arguments, "protein_id", "UNKNOWN");
        cached_or_compute(&ctx, "string_interaction", &protein, || {
            json!({
                "stage": "string_interaction",
                "protein_id": protein,
                "partners": [format!("{protein}-PARTNER-A"), format!("{protein}-PARTNER-B")],
                "confidence": 0.87,
            })
        })
    }
}

pub struct DockingPrediction;

#[async_trait]
impl TaskFunction for DockingPrediction {
    fn name(&self) -> &'static str {
        "docking_prediction"
    }

    async fn call(&self, arguments: Value, ctx: TaskExecutionContext) -> Result<Value, TaskError> {
        maybe_fail_transiently(&arguments, ctx.attempt, "docking_prediction")?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let ligand = arg_str(&arguments, "ligand_id", "UNKNOWN");
        cached_or_compute(&ctx, "docking_prediction", &ligand, || {
            json!({
                "stage": "docking_prediction",
                "ligand_id": ligand,
                "binding_affinity_kcal_mol": -7.4,
                "pose_count": 9,
            })
        })
    }
}

pub struct ConservationCheck;

#[async_trait]
impl TaskFunction for ConservationCheck {
    fn name(&self) -> &'static str {
        "conservation_check"
    }

    async fn call(&self, arguments: Value, ctx: TaskExecutionContext) -> Result<Value, TaskError> {
        maybe_fail_transiently(&arguments, ctx.attempt, "conservation_check")?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let sequence = arg_str(&arguments, "sequence_id", "UNKNOWN");
        cached_or_compute(&ctx, "conservation_check", &sequence, || {
            json!({
                "stage": "conservation_check",
                "sequence_id": sequence,
                "conservation_score": 0.62,
                "species_compared": 12,
            })
        })
    }
}

pub struct PeptideOptimize;

#[async_trait]
impl TaskFunction for PeptideOptimize {
    fn name(&self) -> &'static str {
        "peptide_optimize"
    }

    async fn call(&self, arguments: Value, ctx: TaskExecutionContext) -> Result<Value, TaskError> {
        maybe_fail_transiently(&arguments, ctx.attempt, "peptide_optimize")?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let candidate = arg_str(&arguments, "candidate_id", "UNKNOWN");
        cached_or_compute(&ctx, "peptide_optimize", &candidate, || {
            json!({
                "stage": "peptide_optimize",
                "candidate_id": candidate,
                "optimized_sequence": "ACDEFGHIK",
                "stability_delta": 1.3,
            })
        })
    }
}

pub struct ReportGenerate;

#[async_trait]
impl TaskFunction for ReportGenerate {
    fn name(&self) -> &'static str {
        "report_generate"
    }

    async fn call(&self, arguments: Value, ctx: TaskExecutionContext) -> Result<Value, TaskError> {
        maybe_fail_transiently(&arguments, ctx.attempt, "report_generate")?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let workflow_id = ctx.workflow_id.to_string();
        cached_or_compute(&ctx, "report_generate", &workflow_id, || {
            json!({
                "stage": "report_generate",
                "workflow_id": workflow_id,
                "summary": "pipeline stages completed",
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::ArtifactCache;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    /// A cache root unique to this context, so tests don't trip over each other's entries.
    fn ctx(attempt: u32) -> TaskExecutionContext {
        let root = std::env::temp_dir().join(format!("pipeline-cache-test-{}", uuid::Uuid::new_v4()));
        TaskExecutionContext {
            workspace_root: PathBuf::from("."),
            workflow_id: uuid::Uuid::new_v4(),
            task_id: "t1".to_string(),
            attempt,
            cancellation: CancellationToken::new(),
            cache: Arc::new(ArtifactCache::new(root)),
        }
    }

    #[tokio::test]
    async fn string_interaction_returns_partners_for_protein() {
        let result = StringInteraction
            .call(json!({"protein_id": "P53"}), ctx(1))
            .await
            .unwrap();
        assert_eq!(result["protein_id"], "P53");
        assert_eq!(result["partners"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fail_attempts_forces_transient_failures_then_succeeds() {
        let args = json!({"protein_id": "P53", "fail_attempts": 2});
        assert!(StringInteraction.call(args.clone(), ctx(1)).await.is_err());
        assert!(StringInteraction.call(args.clone(), ctx(2)).await.is_err());
        assert!(StringInteraction.call(args, ctx(3)).await.is_ok());
    }

    #[tokio::test]
    async fn docking_prediction_reports_binding_affinity() {
        let result = DockingPrediction
            .call(json!({"ligand_id": "LIG-1"}), ctx(1))
            .await
            .unwrap();
        assert!(result["binding_affinity_kcal_mol"].is_number());
    }

    #[tokio::test]
    async fn second_call_with_same_identity_and_cache_is_served_from_cache() {
        let shared_ctx = ctx(1);
        let key = cache_key("docking_prediction", &["LIG-9"]);
        assert!(shared_ctx.cache.get(&key).unwrap().is_none());

        let first = DockingPrediction
            .call(json!({"ligand_id": "LIG-9"}), shared_ctx.clone())
            .await
            .unwrap();
        assert!(shared_ctx.cache.get(&key).unwrap().is_some());

        let second = DockingPrediction
            .call(json!({"ligand_id": "LIG-9"}), shared_ctx)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
