// Concurrent cache of compiled expressions keyed by expression text

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::evaluator::CompiledExpression;

/// Expression text → compiled expression.
///
/// Reads are lock-free per shard; inserts are rare. When the cache reaches
/// capacity it is cleared before the next insert. A capacity of 0 disables
/// caching entirely.
#[derive(Debug)]
pub struct ExpressionCache {
    entries: DashMap<String, Arc<CompiledExpression>>,
    capacity: usize,
}

impl ExpressionCache {
    pub fn new(capacity: usize) -> Self {
        ExpressionCache {
            entries: DashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, expression: &str) -> Option<Arc<CompiledExpression>> {
        self.entries
            .get(expression)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Return the cached expression or build, cache and return it.
    ///
    /// Errors from `build` are returned as-is and nothing is cached.
    pub fn get_or_try_insert<E>(
        &self,
        expression: &str,
        build: impl FnOnce() -> Result<CompiledExpression, E>,
    ) -> Result<Arc<CompiledExpression>, E> {
        if let Some(hit) = self.get(expression) {
            trace!(expression, "expression cache hit");
            return Ok(hit);
        }

        let compiled = Arc::new(build()?);
        if self.capacity == 0 {
            return Ok(compiled);
        }
        if self.entries.len() >= self.capacity {
            debug!(capacity = self.capacity, "expression cache full; clearing");
            self.entries.clear();
        }
        let entry = self
            .entries
            .entry(expression.to_string())
            .or_insert(compiled);
        Ok(Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
