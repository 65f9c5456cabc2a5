// Operator library: built-in functions callable from call expressions
// The registry is built once on first use and never mutated.

use std::cmp::Ordering;
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::pattern::{self, PatternKind};
use crate::value::Value;

/// Signature shared by every built-in.
pub type BuiltinFn = fn(&[Value]) -> Value;

/// Operator classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// Binary predicate; the only kind quantifiers accept
    Comparison,
    /// Inspects a single value (`typeof`)
    Inspection,
    /// `all` / `any`
    Quantifier,
}

/// A named built-in
#[derive(Debug, Clone, Copy)]
pub struct Operator {
    pub name: &'static str,
    pub kind: OperatorKind,
    pub func: BuiltinFn,
}

impl Operator {
    #[inline]
    pub fn call(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }

    #[inline]
    pub fn is_comparison(&self) -> bool {
        self.kind == OperatorKind::Comparison
    }
}

/// Read-only table of built-ins keyed by name
#[derive(Debug)]
pub struct OperatorRegistry {
    operators: HashMap<&'static str, Operator>,
}

static REGISTRY: Lazy<OperatorRegistry> = Lazy::new(OperatorRegistry::builtin);

impl OperatorRegistry {
    /// The process-wide registry.
    pub fn global() -> &'static OperatorRegistry {
        &REGISTRY
    }

    fn builtin() -> Self {
        use OperatorKind::*;

        let table: [(&'static str, OperatorKind, BuiltinFn); 11] = [
            ("eq", Comparison, |a| Value::Bool(equals(arg(a, 0), arg(a, 1)))),
            ("lt", Comparison, |a| Value::Bool(less_than(arg(a, 0), arg(a, 1)))),
            ("gt", Comparison, |a| Value::Bool(greater_than(arg(a, 0), arg(a, 1)))),
            ("lte", Comparison, |a| Value::Bool(less_equal(arg(a, 0), arg(a, 1)))),
            ("gte", Comparison, |a| Value::Bool(greater_equal(arg(a, 0), arg(a, 1)))),
            ("in", Comparison, |a| Value::Bool(contains(arg(a, 0), arg(a, 1)))),
            ("glob", Comparison, |a| Value::Bool(glob(arg(a, 0), arg(a, 1)))),
            ("regx", Comparison, |a| Value::Bool(regx(arg(a, 0), arg(a, 1)))),
            ("typeof", Inspection, |a| Value::from(arg(a, 0).type_name())),
            ("all", Quantifier, |a| Value::Bool(quantify(a, true))),
            ("any", Quantifier, |a| Value::Bool(quantify(a, false))),
        ];

        let operators = table
            .into_iter()
            .map(|(name, kind, func)| (name, Operator { name, kind, func }))
            .collect();
        OperatorRegistry { operators }
    }

    pub fn get(&self, name: &str) -> Option<&Operator> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Shorthand for `OperatorRegistry::global().get(name)`.
pub fn lookup(name: &str) -> Option<&'static Operator> {
    REGISTRY.get(name)
}

static ABSENT: Value = Value::Absent;

/// Positional argument, Absent when missing.
#[inline]
fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&ABSENT)
}

// ── Comparison primitives ────────────────────────────────────────────────────
//
// Shared with the binary operators so `eq(a, b)` and `a == b` cannot drift.

#[inline]
pub fn equals(a: &Value, b: &Value) -> bool {
    a == b
}

#[inline]
pub fn less_than(a: &Value, b: &Value) -> bool {
    a.compare(b) == Some(Ordering::Less)
}

#[inline]
pub fn greater_than(a: &Value, b: &Value) -> bool {
    a.compare(b) == Some(Ordering::Greater)
}

#[inline]
pub fn less_equal(a: &Value, b: &Value) -> bool {
    matches!(a.compare(b), Some(Ordering::Less | Ordering::Equal))
}

#[inline]
pub fn greater_equal(a: &Value, b: &Value) -> bool {
    matches!(a.compare(b), Some(Ordering::Greater | Ordering::Equal))
}

/// List membership by structural equality; false when `haystack` is not a
/// list.
pub fn contains(needle: &Value, haystack: &Value) -> bool {
    haystack
        .as_list()
        .is_some_and(|items| items.iter().any(|item| item == needle))
}

pub fn glob(subject: &Value, pattern: &Value) -> bool {
    pattern::dynamic_match(PatternKind::Glob, subject, pattern)
}

pub fn regx(subject: &Value, pattern: &Value) -> bool {
    pattern::dynamic_match(PatternKind::Regex, subject, pattern)
}

/// `all(op, list, value)` / `any(op, list, value)`.
fn quantify(args: &[Value], every: bool) -> bool {
    let Some(op) = arg(args, 0)
        .as_str()
        .and_then(lookup)
        .filter(|op| op.is_comparison())
    else {
        return false;
    };
    let Some(items) = arg(args, 1).as_list() else {
        return false;
    };

    let value = arg(args, 2);
    let test = |item: &Value| op.call(&[item.clone(), value.clone()]).is_truthy();
    if every {
        items.iter().all(test)
    } else {
        items.iter().any(test)
    }
}
