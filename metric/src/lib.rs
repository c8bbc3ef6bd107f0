//! Metric registry: named, attribute-keyed counters, gauges, and duration
//! histograms, with a Prometheus text exporter in the sibling
//! `metric_exporters` crate.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod instrument;

pub use instrument::{DurationHistogram, U64Counter, U64Gauge};

use std::fmt::Write as _;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

/// A set of key=value labels distinguishing one time series within a
/// metric family (e.g. `table=FlowSeriesTable`).
pub type Attributes = Vec<(String, String)>;

fn render_labels(attrs: &Attributes) -> String {
    if attrs.is_empty() {
        return String::new();
    }
    let mut s = String::from("{");
    for (i, (k, v)) in attrs.iter().enumerate() {
        if i > 0 {
            s.push(',');
        }
        let _ = write!(s, "{k}=\"{v}\"");
    }
    s.push('}');
    s
}

/// One named family of counters (or gauges, or histograms), fanned out
/// by [`Attributes`].
#[derive(Debug)]
pub struct Metric<T> {
    name: String,
    description: String,
    values: Mutex<HashMap<Attributes, Arc<T>>>,
}

impl<T: Default> Metric<T> {
    fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), values: Mutex::new(HashMap::new()) }
    }

    /// Returns the instrument for this label set, creating it on first
    /// use.
    pub fn recorder(&self, attributes: Attributes) -> Arc<T> {
        let mut values = self.values.lock();
        Arc::clone(values.entry(attributes).or_insert_with(|| Arc::new(T::default())))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A metric family that can render itself as Prometheus text exposition
/// lines.
pub trait RenderPrometheus: std::fmt::Debug + Send + Sync {
    fn prometheus_text(&self) -> String;
}

impl RenderPrometheus for Metric<U64Counter> {
    fn prometheus_text(&self) -> String {
        let mut out = format!("# HELP {} {}\n# TYPE {} counter\n", self.name, self.description, self.name);
        for (attrs, v) in self.values.lock().iter() {
            let _ = writeln!(out, "{}{} {}", self.name, render_labels(attrs), v.fetch());
        }
        out
    }
}

impl RenderPrometheus for Metric<U64Gauge> {
    fn prometheus_text(&self) -> String {
        let mut out = format!("# HELP {} {}\n# TYPE {} gauge\n", self.name, self.description, self.name);
        for (attrs, v) in self.values.lock().iter() {
            let _ = writeln!(out, "{}{} {}", self.name, render_labels(attrs), v.fetch());
        }
        out
    }
}

impl RenderPrometheus for Metric<DurationHistogram> {
    fn prometheus_text(&self) -> String {
        let mut out = format!("# HELP {} {}\n# TYPE {} histogram\n", self.name, self.description, self.name);
        for (attrs, v) in self.values.lock().iter() {
            for (boundary, count) in v.bucket_counts() {
                let mut labels = attrs.clone();
                labels.push(("le".to_string(), format!("{}", boundary.as_secs_f64())));
                let _ = writeln!(out, "{}_bucket{} {}", self.name, render_labels(&labels), count);
            }
            let mut labels = attrs.clone();
            labels.push(("le".to_string(), "+Inf".to_string()));
            let _ = writeln!(out, "{}_bucket{} {}", self.name, render_labels(&labels), v.overflow_count());
        }
        out
    }
}

/// Process-wide metric registry. One is created by `qed` at startup and
/// shared with `coordinator`, `resultbus`, and `storage_engine`.
#[derive(Debug, Default)]
pub struct Registry {
    families: Mutex<Vec<Arc<dyn RenderPrometheus>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_counter(&self, name: impl Into<String>, description: impl Into<String>) -> Arc<Metric<U64Counter>> {
        let m = Arc::new(Metric::new(name, description));
        self.families.lock().push(Arc::clone(&m) as Arc<dyn RenderPrometheus>);
        m
    }

    pub fn register_gauge(&self, name: impl Into<String>, description: impl Into<String>) -> Arc<Metric<U64Gauge>> {
        let m = Arc::new(Metric::new(name, description));
        self.families.lock().push(Arc::clone(&m) as Arc<dyn RenderPrometheus>);
        m
    }

    pub fn register_histogram(&self, name: impl Into<String>, description: impl Into<String>) -> Arc<Metric<DurationHistogram>> {
        let m = Arc::new(Metric::new(name, description));
        self.families.lock().push(Arc::clone(&m) as Arc<dyn RenderPrometheus>);
        m
    }

    /// Renders every registered family as Prometheus text exposition.
    pub fn prometheus_text(&self) -> String {
        self.families.lock().iter().map(|f| f.prometheus_text()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_recorder_is_shared_per_attribute_set() {
        let registry = Registry::new();
        let m = registry.register_counter("queries_admitted", "total queries admitted");
        let a = m.recorder(vec![("table".into(), "Messages".into())]);
        let b = m.recorder(vec![("table".into(), "Messages".into())]);
        a.inc();
        b.inc();
        assert_eq!(a.fetch(), 2);
    }

    #[test]
    fn prometheus_text_includes_registered_families() {
        let registry = Registry::new();
        let m = registry.register_gauge("inflight_pipelines", "in-flight pipeline count");
        m.recorder(vec![]).set(3);
        let text = registry.prometheus_text();
        assert!(text.contains("inflight_pipelines"));
        assert!(text.contains("3"));
    }
}
