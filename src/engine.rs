// Reusable filter engine: configuration plus a shared expression cache

use std::sync::Arc;

use tracing::debug;

use crate::cache::ExpressionCache;
use crate::compiler;
use crate::config::EngineConfig;
use crate::evaluator::CompiledExpression;
use crate::parser::{self, ParserError};
use crate::value::Value;

/// Compiles expressions at most once per distinct text and applies them to
/// record batches. Safe to share between threads.
#[derive(Debug)]
pub struct FilterEngine {
    config: EngineConfig,
    cache: ExpressionCache,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let cache = ExpressionCache::new(config.cache_capacity);
        FilterEngine { config, cache }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    /// Parse and compile `expression`, reusing a cached compilation when
    /// available. Syntax errors are never cached.
    pub fn compile(&self, expression: &str) -> Result<Arc<CompiledExpression>, ParserError> {
        self.cache.get_or_try_insert(expression, || {
            let ast = parser::parse_with_max_depth(expression, self.config.max_depth)
                .inspect_err(|e| debug!(expression, error = %e, "expression rejected"))?;
            debug!(expression, "compiled expression");
            Ok(compiler::compile(&ast).with_source(expression))
        })
    }

    /// Records for which `expression` is truthy, in input order.
    pub fn filter<'a>(
        &self,
        records: &'a [Value],
        expression: &str,
    ) -> Result<Vec<&'a Value>, ParserError> {
        let compiled = self.compile(expression)?;
        Ok(compiled.filter(records))
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value;

    #[test]
    fn test_compile_is_cached() {
        let engine = FilterEngine::new();
        let a = engine.compile("x > 1").unwrap();
        let b = engine.compile("x > 1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.cache().len(), 1);
        assert_eq!(a.source(), Some("x > 1"));
    }

    #[test]
    fn test_syntax_errors_are_not_cached() {
        let engine = FilterEngine::new();
        assert!(engine.compile("x ==").is_err());
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_max_depth_is_applied() {
        let engine = FilterEngine::with_config(EngineConfig::default().with_max_depth(4));
        assert!(matches!(
            engine.compile("((((((x))))))"),
            Err(ParserError::TooDeep { max_depth: 4, .. })
        ));
        assert!(engine.compile("x").is_ok());
    }

    #[test]
    fn test_filter() {
        let engine = FilterEngine::new();
        let records = vec![value!({"x": 2, "y": 1}), value!({"x": 2, "y": 0})];
        let kept = engine.filter(&records, "x == 2 && y > 0").unwrap();
        assert_eq!(kept, vec![&records[0]]);
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FilterEngine>();
    }
}
