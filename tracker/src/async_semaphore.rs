//! Bounds the number of in-flight query pipelines a coordinator will run
//! concurrently. Acquiring a permit blocks the caller (asynchronously)
//! until a running pipeline completes and releases its slot.

use std::sync::Arc;

use metric::{Metric, U64Gauge};
use tokio::sync::{Semaphore, SemaphorePermit};

/// A counting semaphore reporting its current occupancy through a gauge,
/// so the in-flight pipeline count shows up on the metrics endpoint
/// without each caller having to remember to increment one.
#[derive(Debug)]
pub struct AsyncSemaphore {
    semaphore: Semaphore,
    in_flight: Arc<U64Gauge>,
}

impl AsyncSemaphore {
    pub fn new(permits: usize, gauge_family: &Metric<U64Gauge>) -> Self {
        Self { semaphore: Semaphore::new(permits), in_flight: gauge_family.recorder(vec![]) }
    }

    /// Waits for a free slot. The returned guard releases it on drop.
    pub async fn acquire(&self) -> AsyncSemaphorePermit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("tracker semaphore is never closed");
        self.in_flight.inc();
        AsyncSemaphorePermit { _permit: permit, in_flight: &self.in_flight }
    }

    /// Takes a slot immediately, or returns `None` without waiting if the
    /// cap is already saturated. Callers that must reject rather than
    /// queue (`spec.md` §4.3 step 3's global in-flight cap) use this
    /// instead of `acquire`.
    pub fn try_acquire(&self) -> Option<AsyncSemaphorePermit<'_>> {
        let permit = self.semaphore.try_acquire().ok()?;
        self.in_flight.inc();
        Some(AsyncSemaphorePermit { _permit: permit, in_flight: &self.in_flight })
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[derive(Debug)]
pub struct AsyncSemaphorePermit<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a U64Gauge,
}

impl Drop for AsyncSemaphorePermit<'_> {
    fn drop(&mut self) {
        self.in_flight.dec();
    }
}
