//! Type-erased values passed between stages. A pipeline's stages are
//! declared independently and chained at runtime, so the value flowing
//! from one stage's merge into the next stage's execute is carried as an
//! `Any` and downcast by the stage that knows its concrete type
//! (`spec.md` §4.1: "Buffers are passed by shared ownership to avoid
//! copying").

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A stage input/sub-result/output, erased to `Any` so heterogeneous
/// stages can be chained without a fixed compile-time type per stage.
#[derive(Clone)]
pub struct AnyValue(Arc<dyn Any + Send + Sync>);

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyValue").finish_non_exhaustive()
    }
}

impl AnyValue {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Downcasts to `&T`. Panics if the stage wiring is wrong; a pipeline
    /// is constructed once, in-process, by code that knows every stage's
    /// concrete types, so a mismatch here is a programmer error, not a
    /// runtime condition to recover from.
    pub fn downcast_ref<T: Send + Sync + 'static>(&self) -> &T {
        self.0
            .downcast_ref::<T>()
            .unwrap_or_else(|| panic!("pipeline stage wired with the wrong type for {}", std::any::type_name::<T>()))
    }
}
