//! The coordinator's pipeline-admission bookkeeping (`spec.md` §4.3 steps
//! 3-4): a global cap on in-flight pipelines, enforced without blocking
//! the intake loop, plus the per-qid single-pipeline invariant.

use std::sync::Arc;

use metric::{Metric, U64Gauge};
use query_types::QueryError;
use tracker::{AsyncSemaphore, AsyncSemaphorePermit, JobRegistry};

/// Tracks in-flight pipelines: a bounded slot pool plus a qid registry so
/// a duplicate admission for a query already running is rejected rather
/// than double-counted.
#[derive(Debug)]
pub struct PipelineSlots {
    semaphore: AsyncSemaphore,
    running: JobRegistry<String, ()>,
}

impl PipelineSlots {
    pub fn new(max_inflight: usize, gauge_family: &Metric<U64Gauge>) -> Self {
        Self { semaphore: AsyncSemaphore::new(max_inflight, gauge_family), running: JobRegistry::new() }
    }

    /// Takes a slot for `qid`, or fails with [`QueryError::TooManyPipelines`]
    /// if the global cap is saturated, and with [`QueryError::Admission`]
    /// if `qid` already has a pipeline running. Both checks are
    /// non-blocking: the intake loop never waits on a free slot, it moves
    /// on to the next queued query id.
    pub fn try_admit<'a>(&'a self, qid: &str) -> Result<Admission<'a>, QueryError> {
        let permit = self.semaphore.try_acquire().ok_or_else(|| QueryError::TooManyPipelines { qid: qid.to_string() })?;
        if !self.running.register(qid.to_string(), ()) {
            return Err(QueryError::Admission {
                qid: qid.to_string(),
                detail: "pipeline already running for this query id".to_string(),
            });
        }
        Ok(Admission { _permit: permit, registry: &self.running, qid: qid.to_string() })
    }

    pub fn in_flight(&self) -> usize {
        self.running.len()
    }
}

/// Held for the lifetime of one admitted pipeline. Dropping it frees the
/// global slot and the qid registration together, so a panicking handler
/// can't leak either.
#[derive(Debug)]
pub struct Admission<'a> {
    _permit: AsyncSemaphorePermit<'a>,
    registry: &'a JobRegistry<String, ()>,
    qid: String,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.qid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metric::Registry;

    #[test]
    fn rejects_duplicate_qid_without_consuming_a_second_slot() {
        let registry = Registry::new();
        let gauges = registry.register_gauge("inflight_pipelines", "in-flight pipelines");
        let slots = PipelineSlots::new(4, &gauges);

        let first = slots.try_admit("q1").expect("first admission succeeds");
        assert_eq!(slots.in_flight(), 1);
        assert!(matches!(slots.try_admit("q1"), Err(QueryError::Admission { .. })));
        drop(first);
        assert_eq!(slots.in_flight(), 0);
        assert!(slots.try_admit("q1").is_ok());
    }

    #[test]
    fn rejects_when_global_cap_saturated() {
        let registry = Registry::new();
        let gauges = registry.register_gauge("inflight_pipelines", "in-flight pipelines");
        let slots = PipelineSlots::new(1, &gauges);

        let _first = slots.try_admit("q1").unwrap();
        assert!(matches!(slots.try_admit("q2"), Err(QueryError::TooManyPipelines { .. })));
    }
}
