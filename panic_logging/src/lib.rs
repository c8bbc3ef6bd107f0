//! Installs a panic hook that logs through `tracing` instead of writing
//! straight to stderr, and counts panics in a `metric::Registry`.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]

use std::panic;
use std::sync::Arc;

use metric::{Registry, U64Counter};
use observability_deps::tracing::error;

/// Installs the logging panic hook. The returned guard restores the
/// previous hook when dropped (useful in tests).
pub struct SendPanicsToTracing {
    counter: Arc<metric::Metric<U64Counter>>,
    prev: Option<Box<dyn Fn(&panic::PanicInfo<'_>) + Sync + Send + 'static>>,
}

impl SendPanicsToTracing {
    pub fn new(registry: &Registry) -> Self {
        let counter = registry.register_counter("panics_total", "total panics observed by this process");
        let prev = Some(panic::take_hook());
        let recorder = counter.recorder(vec![]);
        panic::set_hook(Box::new(move |info| {
            recorder.inc();
            error!(%info, "panic");
        }));
        Self { counter, prev }
    }
}

impl SendPanicsToTracing {
    /// The underlying panic counter, for tests or dashboards that want a
    /// direct handle instead of scraping Prometheus text.
    pub fn counter(&self) -> &Arc<metric::Metric<U64Counter>> {
        &self.counter
    }
}

impl Drop for SendPanicsToTracing {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            panic::set_hook(prev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installing_and_dropping_restores_previous_hook() {
        let registry = Registry::new();
        {
            let _guard = SendPanicsToTracing::new(&registry);
        }
        // no assertion beyond "doesn't panic itself"; the hook swap is
        // inherently process-global and exercised here for compile/drop
        // correctness only.
    }
}
