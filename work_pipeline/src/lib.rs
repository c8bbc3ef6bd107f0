//! Generic multi-stage work-pipeline primitive (`spec.md` §4.1).
//!
//! A pipeline is a chain `T0 -> T1 -> ... -> Tn` (1 <= n <= 6). Each
//! stage runs `instances` parallel tasks; every task runs the stage's
//! `execute` step against the stage's input and produces a typed
//! sub-result. Once every instance of a stage has produced (or failed
//! to produce) a sub-result, the stage's `merge` step combines them into
//! the stage's output, which becomes the next stage's input. There is a
//! strict happens-before at that merge boundary: no instance of stage
//! `k+1` starts before every instance of stage `k` has completed.
//!
//! The source this system is modeled on expresses a stage's execute step
//! as a callback returning `NONE` / `INCOMPLETE` / an external-call
//! descriptor, re-invoked by the runtime as external results arrive
//! (`spec.md` §9 "Coroutine-like step functions"). Rust's `async fn`
//! already suspends at every `.await` point and is driven by the
//! executor the same way, so that three-way return is collapsed here
//! into a plain `async fn` that awaits whatever external call it needs
//! (storage engine fetch, result-bus write, ...); there is no separate
//! `INCOMPLETE` variant because the runtime doesn't need one to regain
//! control — it already has it at the `.await`.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod error;
mod value;

pub use error::PipelineError;
pub use value::AnyValue;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use observability_deps::tracing::{debug, warn};

/// One instance's execute step: given its index within the stage and the
/// stage's shared input, produce a sub-result or fail.
pub type ExecuteFn =
    Arc<dyn Fn(usize, AnyValue) -> Pin<Box<dyn Future<Output = Result<AnyValue, String>> + Send>> + Send + Sync>;

/// Combines every instance's sub-result (plus the stage's input, in case
/// the merge needs it) into the stage's output.
pub type MergeFn = Arc<dyn Fn(Vec<AnyValue>, AnyValue) -> Result<AnyValue, String> + Send + Sync>;

/// One stage of a pipeline: `instances` parallel executions of `execute`,
/// then `merge` (or, if absent, a single promoted sub-result — the
/// `S == R` shortcut in `spec.md` §4.1).
#[derive(Clone)]
pub struct Stage {
    pub name: &'static str,
    pub instances: usize,
    pub execute: ExecuteFn,
    pub merge: Option<MergeFn>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("instances", &self.instances)
            .field("has_merge", &self.merge.is_some())
            .finish()
    }
}

impl Stage {
    pub fn new(name: &'static str, instances: usize, execute: ExecuteFn) -> Self {
        Self { name, instances: instances.max(1), execute, merge: None }
    }

    pub fn with_merge(mut self, merge: MergeFn) -> Self {
        self.merge = Some(merge);
        self
    }
}

/// A typed chain of 1-6 stages, run once per query (`spec.md` §4.1).
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        assert!(!stages.is_empty() && stages.len() <= 6, "pipeline must have 1-6 stages, got {}", stages.len());
        Self { stages }
    }

    /// Runs every stage in order. Returns the final stage's output, or
    /// the first failure encountered — downstream stages are never
    /// started once an upstream stage fails (`spec.md` §4.1 "Failure").
    pub async fn run(&self, input: AnyValue) -> Result<AnyValue, PipelineError> {
        let mut current = input;
        for (stage_idx, stage) in self.stages.iter().enumerate() {
            debug!(stage = stage.name, stage_idx, instances = stage.instances, "starting pipeline stage");
            let mut handles = Vec::with_capacity(stage.instances);
            for instance in 0..stage.instances {
                let execute = Arc::clone(&stage.execute);
                let stage_input = current.clone();
                handles.push(tokio::spawn(async move { execute(instance, stage_input).await }));
            }

            // Happens-before barrier: collect every instance's sub-result
            // before this stage's merge (or the next stage) runs.
            let mut subresults = Vec::with_capacity(stage.instances);
            for (instance, handle) in handles.into_iter().enumerate() {
                match handle.await {
                    Ok(Ok(value)) => subresults.push(value),
                    Ok(Err(detail)) => {
                        warn!(stage = stage.name, instance, detail, "pipeline instance failed");
                        return Err(PipelineError::InstanceFailed { stage: stage_idx, instance, detail });
                    }
                    Err(_join_err) => {
                        return Err(PipelineError::InstancePanicked { stage: stage_idx, instance });
                    }
                }
            }

            current = match &stage.merge {
                Some(merge) => merge(subresults, current.clone())
                    .map_err(|detail| PipelineError::MergeFailed { stage: stage_idx, detail })?,
                None => {
                    if subresults.len() != 1 {
                        return Err(PipelineError::MergeRequired { stage: stage_idx, got: subresults.len() });
                    }
                    subresults.into_iter().next().unwrap()
                }
            };
        }
        Ok(current)
    }

    /// Runs the pipeline and invokes `on_complete` exactly once with the
    /// success flag and, on success, the final output (`spec.md` §4.1
    /// "Final-stage completion invokes the client-supplied callback
    /// exactly once").
    pub async fn run_with_callback<F>(&self, input: AnyValue, on_complete: F)
    where
        F: FnOnce(Result<AnyValue, PipelineError>) + Send,
    {
        let result = self.run(input).await;
        on_complete(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn execute_identity(factor: u64) -> ExecuteFn {
        Arc::new(move |instance, input: AnyValue| {
            Box::pin(async move {
                let base = *input.downcast_ref::<u64>();
                Ok(AnyValue::new(base + instance as u64 * factor))
            })
        })
    }

    fn merge_sum() -> MergeFn {
        Arc::new(|subresults: Vec<AnyValue>, _input: AnyValue| {
            let total: u64 = subresults.iter().map(|v| *v.downcast_ref::<u64>()).sum();
            Ok(AnyValue::new(total))
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn two_stage_pipeline_merges_then_chains() {
        let stage0 = Stage::new("stage0", 4, execute_identity(1)).with_merge(merge_sum());
        let stage1 = Stage::new(
            "stage1",
            1,
            Arc::new(|_instance, input: AnyValue| {
                Box::pin(async move {
                    let v = *input.downcast_ref::<u64>();
                    Ok(AnyValue::new(v * 2))
                })
            }),
        );
        let pipeline = Pipeline::new(vec![stage0, stage1]);
        let result = pipeline.run(AnyValue::new(10u64)).await.unwrap();
        // stage0: 4 instances producing 10,11,12,13 -> merge sum = 46
        // stage1: 46 * 2 = 92
        assert_eq!(*result.downcast_ref::<u64>(), 92);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_instance_without_merge_is_promoted() {
        let stage0 = Stage::new("solo", 1, execute_identity(0));
        let pipeline = Pipeline::new(vec![stage0]);
        let result = pipeline.run(AnyValue::new(7u64)).await.unwrap();
        assert_eq!(*result.downcast_ref::<u64>(), 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_merge_with_multiple_instances_is_an_error() {
        let stage0 = Stage::new("broken", 3, execute_identity(1));
        let pipeline = Pipeline::new(vec![stage0]);
        let err = pipeline.run(AnyValue::new(0u64)).await.unwrap_err();
        assert!(matches!(err, PipelineError::MergeRequired { stage: 0, got: 3 }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_instance_fails_the_pipeline_and_skips_downstream_stages() {
        let downstream_ran = Arc::new(AtomicBool::new(false));
        let downstream_ran_clone = Arc::clone(&downstream_ran);

        let failing: ExecuteFn = Arc::new(|_instance, _input: AnyValue| {
            Box::pin(async move { Err("boom".to_string()) })
        });
        let stage0 = Stage::new("failing", 2, failing).with_merge(merge_sum());
        let stage1 = Stage::new(
            "never",
            1,
            Arc::new(move |_instance, input: AnyValue| {
                let flag = Arc::clone(&downstream_ran_clone);
                Box::pin(async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(input)
                })
            }),
        );
        let pipeline = Pipeline::new(vec![stage0, stage1]);
        let result = pipeline.run(AnyValue::new(0u64)).await;
        assert!(result.is_err());
        assert!(!downstream_ran.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn callback_fires_exactly_once() {
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let stage0 = Stage::new("solo", 1, execute_identity(0));
        let pipeline = Pipeline::new(vec![stage0]);
        pipeline
            .run_with_callback(AnyValue::new(1u64), move |result| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                assert!(result.is_ok());
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
