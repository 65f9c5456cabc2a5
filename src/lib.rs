// histfilter - Filter expression engine for record histories
// Copyright (c) 2025 histfilter contributors
// Licensed under the MIT License

//! # histfilter
//!
//! A small expression language for selecting records: a caller writes a
//! predicate such as `x == 2 && y < 1`, which is parsed once, compiled once
//! and then applied to any number of records.
//!
//! ## Architecture
//!
//! - `parser` - Expression parser (converts expression strings to AST)
//! - `ast` - Abstract Syntax Tree definitions
//! - `compiler` - Lowers the AST, resolving calls, `Math` and literal patterns
//! - `evaluator` - Applies a compiled expression to records
//! - `functions` - Built-in operator library (`eq`, `glob`, `all`, ...)
//! - `pattern` - Regex and glob matching
//! - `math` - The `Math` namespace
//! - `value` - Runtime value model
//! - `engine` / `cache` / `config` - Reusable engine with an expression cache
//!
//! Only syntax errors are reported. Missing fields, invalid patterns and
//! unknown functions evaluate to `false`/undefined instead of failing.
//!
//! ```
//! use histfilter::{filter_records, value};
//!
//! let records = vec![
//!     value!({"x": 1, "y": 1}),
//!     value!({"x": 0, "y": 1}),
//!     value!({"y": 1}),
//! ];
//! let kept = filter_records(&records, "x").unwrap();
//! assert_eq!(kept, vec![&records[0]]);
//! ```

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod functions;
pub mod math;
pub mod parser;
pub mod pattern;
pub mod value;

pub use cache::ExpressionCache;
pub use config::{ConfigError, EngineConfig};
pub use engine::FilterEngine;
pub use evaluator::{filter_records, CompiledExpression};
pub use parser::{parse, ParserError};
pub use value::Value;

/// Compile an expression string into a reusable form.
///
/// # Arguments
///
/// * `expression` - Filter expression text
///
/// # Errors
///
/// Returns `ParserError` if the expression cannot be parsed
///
/// # Examples
///
/// ```
/// use histfilter::{compile, value};
///
/// let expr = compile("name =* 'a*' && age >= 18").unwrap();
/// assert!(expr.matches(&value!({"name": "ada", "age": 36})));
/// assert!(!expr.matches(&value!({"name": "bob", "age": 40})));
/// ```
pub fn compile(expression: &str) -> Result<CompiledExpression, ParserError> {
    let ast = parser::parse(expression)?;
    Ok(compiler::compile(&ast).with_source(expression))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value;

    #[test]
    fn test_compile_keeps_source() {
        let expr = compile("x > 1").unwrap();
        assert_eq!(expr.source(), Some("x > 1"));
        assert!(expr.matches(&value!({"x": 2})));
    }

    #[test]
    fn test_compile_reports_position() {
        let err = compile("x ==").unwrap_err();
        assert_eq!(err.position(), 4);
    }
}
