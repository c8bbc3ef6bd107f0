//! Chunk math (`spec.md` §3 "Chunk (K)" and §4.4 "Parallelization
//! decision"), plus the atomic counter stage-0 instances draw chunks
//! from.
//!
//! `ROW_TIME_BITS` and the default `max_slice` come from the original
//! `contrail-controller` query engine's row-time-bucketing scheme
//! (`examples/original_source/src/query_engine/query.h`), preserved here
//! since `spec.md` references but does not restate them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Number of low-order microsecond bits that define one row bucket.
pub const ROW_TIME_BITS: u32 = 24;

/// `2^ROW_TIME_BITS` microseconds, the smallest legal chunk size.
pub const MIN_CHUNK_MICROS: u64 = 1 << ROW_TIME_BITS;

/// A time slice assigned to one stage-0 execute-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: u64,
    pub t_start: u64,
    /// Exclusive upper bound.
    pub t_end: u64,
}

/// Rounds `chunk_size` up to a multiple of `granularity`, when one is set,
/// per `spec.md` §4.4.
fn round_up(chunk_size: u64, granularity: Option<u64>) -> u64 {
    match granularity {
        Some(g) if g > 0 => {
            let rem = chunk_size % g;
            if rem == 0 {
                chunk_size
            } else {
                chunk_size + (g - rem)
            }
        }
        _ => chunk_size,
    }
}

/// Computes the chunk size for a query covering `[t_from, t_to)`, clamped
/// to `[2^ROW_TIME_BITS, 2^ROW_TIME_BITS * max_slice]` and rounded to a
/// multiple of `granularity` if present (`spec.md` §4.4).
pub fn compute_chunk_size(
    t_from: u64,
    t_to: u64,
    parallel_batches: u64,
    max_slice: u64,
    granularity: Option<u64>,
) -> u64 {
    let span = t_to.saturating_sub(t_from);
    let batches = parallel_batches.max(1);
    let raw = (span / batches) + 1;
    let clamped = raw.clamp(MIN_CHUNK_MICROS, MIN_CHUNK_MICROS * max_slice.max(1));
    round_up(clamped, granularity)
}

/// The full set of chunks covering `[t_from, t_to)` at `chunk_size`,
/// satisfying the invariant that every timestamp in the range is covered
/// by exactly one chunk (`spec.md` §3).
pub fn plan_chunks(t_from: u64, t_to: u64, chunk_size: u64) -> Vec<Chunk> {
    if t_from >= t_to || chunk_size == 0 {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut start = t_from;
    let mut idx = 0u64;
    while start < t_to {
        let end = (start + chunk_size).min(t_to);
        chunks.push(Chunk { index: idx, t_start: start, t_end: end });
        start = end;
        idx += 1;
    }
    chunks
}

/// Process-wide monotonically increasing counter each stage-0 instance
/// draws chunks from atomically (`spec.md` §3).
#[derive(Debug)]
pub struct ChunkCounter {
    chunks: Vec<Chunk>,
    next: AtomicU64,
}

impl ChunkCounter {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks, next: AtomicU64::new(0) }
    }

    /// Draws the next chunk, or `None` once all chunks are exhausted.
    pub fn draw(&self) -> Option<Chunk> {
        let idx = self.next.fetch_add(1, Ordering::SeqCst);
        self.chunks.get(idx as usize).copied()
    }

    pub fn total(&self) -> usize {
        self.chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_clamped() {
        // tiny range still gets at least the minimum chunk
        let size = compute_chunk_size(0, 10, 4, 100, None);
        assert_eq!(size, MIN_CHUNK_MICROS);

        // huge range is clamped to the max_slice ceiling
        let size = compute_chunk_size(0, u64::MAX / 2, 4, 100, None);
        assert_eq!(size, MIN_CHUNK_MICROS * 100);
    }

    #[test]
    fn chunk_size_rounds_to_granularity() {
        let size = compute_chunk_size(0, 1_000_000, 1, 100, Some(7_000_000));
        assert_eq!(size % 7_000_000, 0);
    }

    #[test]
    fn plan_chunks_covers_full_range_exactly_once() {
        let chunks = plan_chunks(100, 1_000, 300);
        assert_eq!(chunks.first().unwrap().t_start, 100);
        assert_eq!(chunks.last().unwrap().t_end, 1_000);
        for w in chunks.windows(2) {
            assert_eq!(w[0].t_end, w[1].t_start);
        }
    }

    #[test]
    fn counter_draws_are_atomic_and_exhaust() {
        let counter = ChunkCounter::new(plan_chunks(0, 100, 10));
        let mut seen = Vec::new();
        while let Some(c) = counter.draw() {
            seen.push(c.index);
        }
        assert_eq!(seen.len(), 10);
        assert!(counter.draw().is_none());
    }
}
