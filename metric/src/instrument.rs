//! Instrument kinds: counters, gauges, and fixed-bucket duration
//! histograms.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// A monotonically increasing count (queries admitted, rows streamed,
/// reconnects).
#[derive(Debug, Default)]
pub struct U64Counter(AtomicU64);

impl U64Counter {
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn fetch(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A value that can go up or down (in-flight pipeline count).
#[derive(Debug, Default)]
pub struct U64Gauge(AtomicI64);

impl U64Gauge {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn set(&self, v: i64) {
        self.0.store(v, Ordering::Relaxed);
    }

    pub fn fetch(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket duration histogram: each boundary owns a `U64Counter` of
/// observations `<=` that boundary (the teacher's `metric` crate favors
/// simple bucket counters over a full HDR histogram for exactly this kind
/// of coarse latency tracking).
#[derive(Debug)]
pub struct DurationHistogram {
    boundaries: Vec<Duration>,
    buckets: Vec<U64Counter>,
    overflow: U64Counter,
}

impl DurationHistogram {
    pub fn new(boundaries: Vec<Duration>) -> Self {
        let buckets = boundaries.iter().map(|_| U64Counter::default()).collect();
        Self { boundaries, buckets, overflow: U64Counter::default() }
    }

    pub fn record(&self, d: Duration) {
        for (i, boundary) in self.boundaries.iter().enumerate() {
            if d <= *boundary {
                self.buckets[i].inc();
                return;
            }
        }
        self.overflow.inc();
    }

    pub fn bucket_counts(&self) -> Vec<(Duration, u64)> {
        self.boundaries.iter().copied().zip(self.buckets.iter().map(U64Counter::fetch)).collect()
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow.fetch()
    }
}

impl Default for DurationHistogram {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_millis(1),
            Duration::from_millis(10),
            Duration::from_millis(100),
            Duration::from_secs(1),
            Duration::from_secs(10),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = U64Counter::default();
        c.inc();
        c.add(4);
        assert_eq!(c.fetch(), 5);
    }

    #[test]
    fn gauge_tracks_up_and_down() {
        let g = U64Gauge::default();
        g.inc();
        g.inc();
        g.dec();
        assert_eq!(g.fetch(), 1);
    }

    #[test]
    fn histogram_buckets_by_boundary() {
        let h = DurationHistogram::new(vec![Duration::from_millis(10), Duration::from_millis(100)]);
        h.record(Duration::from_millis(5));
        h.record(Duration::from_millis(50));
        h.record(Duration::from_secs(1));
        let counts = h.bucket_counts();
        assert_eq!(counts[0].1, 1);
        assert_eq!(counts[1].1, 1);
        assert_eq!(h.overflow_count(), 1);
    }
}
