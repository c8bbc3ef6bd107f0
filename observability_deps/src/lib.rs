//! Re-exports the observability crates so the rest of the workspace
//! pulls one pinned version of each instead of declaring them directly.
pub use tracing;
