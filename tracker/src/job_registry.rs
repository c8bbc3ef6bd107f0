//! A generic registry mapping a query id to whatever handle the owning
//! crate needs to track it — cancellation tokens, progress counters,
//! pipeline join handles. `work_pipeline` keys this by query id to find
//! the running pipeline when a CANCEL request comes in.

use std::hash::Hash;

use hashbrown::HashMap;
use parking_lot::Mutex;

/// Thread-safe `K -> V` map with insert-if-absent semantics, matching the
/// single-registration-per-query invariant pipelines rely on.
#[derive(Debug)]
pub struct JobRegistry<K, V> {
    jobs: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for JobRegistry<K, V> {
    fn default() -> Self {
        Self { jobs: Mutex::new(HashMap::new()) }
    }
}

impl<K, V> JobRegistry<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `key`. Returns `false` without inserting if
    /// a job is already registered for that key.
    pub fn register(&self, key: K, value: V) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&key) {
            return false;
        }
        jobs.insert(key, value);
        true
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.jobs.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V: Clone> JobRegistry<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn get(&self, key: &K) -> Option<V> {
        self.jobs.lock().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_registration() {
        let registry: JobRegistry<String, u32> = JobRegistry::new();
        assert!(registry.register("q1".to_string(), 1));
        assert!(!registry.register("q1".to_string(), 2));
        assert_eq!(registry.get(&"q1".to_string()), Some(1));
    }

    #[test]
    fn remove_frees_the_slot() {
        let registry: JobRegistry<String, u32> = JobRegistry::new();
        registry.register("q1".to_string(), 1);
        assert_eq!(registry.remove(&"q1".to_string()), Some(1));
        assert!(registry.is_empty());
        assert!(registry.register("q1".to_string(), 2));
    }
}
