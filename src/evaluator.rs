// Expression evaluator
// Applies a compiled expression tree to one record at a time.

use std::sync::Arc;

use tracing::debug;

use crate::ast::{BinaryOp, UnaryOp};
use crate::compiler::{self, CompiledExpr, MemberKey};
use crate::functions;
use crate::math;
use crate::parser::{self, ParserError};
use crate::pattern::{self, PatternKind};
use crate::value::Value;

/// A parsed and compiled expression, reusable across records and threads.
///
/// Evaluation is pure: the same record always produces the same value and
/// the record is never modified.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    root: CompiledExpr,
    source: Option<Arc<str>>,
}

impl CompiledExpression {
    pub fn new(root: CompiledExpr) -> Self {
        CompiledExpression { root, source: None }
    }

    /// Attach the expression text this was compiled from.
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Expression text, when compiled from a string.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn root(&self) -> &CompiledExpr {
        &self.root
    }

    /// Evaluate against a single record.
    pub fn evaluate(&self, record: &Value) -> Value {
        eval_compiled(&self.root, record)
    }

    /// True when the expression is truthy for `record`.
    pub fn matches(&self, record: &Value) -> bool {
        self.evaluate(record).is_truthy()
    }

    /// Records for which the expression is truthy, in input order.
    pub fn filter<'a>(&self, records: &'a [Value]) -> Vec<&'a Value> {
        let kept: Vec<&Value> = records.iter().filter(|r| self.matches(r)).collect();
        debug!(
            expression = self.source().unwrap_or("<ast>"),
            total = records.len(),
            kept = kept.len(),
            "filtered records"
        );
        kept
    }
}

/// Parse, compile and apply `expression` to `records`.
///
/// A syntax error is returned before any record is examined.
pub fn filter_records<'a>(
    records: &'a [Value],
    expression: &str,
) -> Result<Vec<&'a Value>, ParserError> {
    let ast = parser::parse(expression)?;
    let compiled = compiler::compile(&ast).with_source(expression);
    Ok(compiled.filter(records))
}

/// Evaluate a compiled node against `record`.
pub fn eval_compiled(expr: &CompiledExpr, record: &Value) -> Value {
    match expr {
        CompiledExpr::Constant(value) => value.clone(),
        CompiledExpr::Field(name) => record.get(name).cloned().unwrap_or(Value::Absent),
        CompiledExpr::This => record.clone(),

        CompiledExpr::Member { object, key } => {
            let object = eval_compiled(object, record);
            match key {
                MemberKey::Static(key) => object.member(key),
                MemberKey::Computed(key) => object.member(&eval_compiled(key, record)),
            }
        }

        CompiledExpr::Array(elements) => {
            Value::list(elements.iter().map(|e| eval_compiled(e, record)).collect())
        }

        CompiledExpr::Builtin { operator, args } => {
            let args: Vec<Value> = args.iter().map(|a| eval_compiled(a, record)).collect();
            operator.call(&args)
        }

        CompiledExpr::MathCall { function, args, .. } => {
            let args: Vec<f64> = args
                .iter()
                .map(|a| eval_compiled(a, record).to_number())
                .collect();
            Value::Number(function(&args))
        }

        CompiledExpr::And(lhs, rhs) => {
            let left = eval_compiled(lhs, record);
            if left.is_truthy() {
                eval_compiled(rhs, record)
            } else {
                left
            }
        }

        CompiledExpr::Or(lhs, rhs) => {
            let left = eval_compiled(lhs, record);
            if left.is_truthy() {
                left
            } else {
                eval_compiled(rhs, record)
            }
        }

        CompiledExpr::Binary { op, lhs, rhs } => {
            let left = eval_compiled(lhs, record);
            let right = eval_compiled(rhs, record);
            apply_binary(*op, &left, &right)
        }

        CompiledExpr::PatternMatch { subject, pattern } => {
            Value::Bool(pattern.matches_value(&eval_compiled(subject, record)))
        }

        CompiledExpr::Unary { op, operand } => apply_unary(*op, &eval_compiled(operand, record)),

        CompiledExpr::Conditional {
            condition,
            then_expr,
            else_expr,
        } => {
            if eval_compiled(condition, record).is_truthy() {
                eval_compiled(then_expr, record)
            } else {
                eval_compiled(else_expr, record)
            }
        }
    }
}

/// Apply a binary operator to two evaluated operands.
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Equal | BinaryOp::StrictEqual => Value::Bool(functions::equals(left, right)),
        BinaryOp::NotEqual | BinaryOp::StrictNotEqual => {
            Value::Bool(!functions::equals(left, right))
        }
        BinaryOp::LessThan => Value::Bool(functions::less_than(left, right)),
        BinaryOp::LessThanOrEqual => Value::Bool(functions::less_equal(left, right)),
        BinaryOp::GreaterThan => Value::Bool(functions::greater_than(left, right)),
        BinaryOp::GreaterThanOrEqual => Value::Bool(functions::greater_equal(left, right)),
        BinaryOp::In => Value::Bool(functions::contains(left, right)),
        BinaryOp::RegexMatch => Value::Bool(pattern::dynamic_match(PatternKind::Regex, left, right)),
        BinaryOp::GlobMatch => Value::Bool(pattern::dynamic_match(PatternKind::Glob, left, right)),

        BinaryOp::BitAnd => Value::from(left.to_int32() & right.to_int32()),
        BinaryOp::BitOr => Value::from(left.to_int32() | right.to_int32()),
        BinaryOp::BitXor => Value::from(left.to_int32() ^ right.to_int32()),
        BinaryOp::ShiftLeft => Value::from(left.to_int32().wrapping_shl(shift_count(right))),
        BinaryOp::ShiftRight => Value::from(left.to_int32().wrapping_shr(shift_count(right))),
        BinaryOp::UnsignedShiftRight => {
            Value::from(left.to_uint32().wrapping_shr(shift_count(right)))
        }

        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Divide => Value::Number(left.to_number() / right.to_number()),
        // f64 `%` is the truncated remainder, sign follows the dividend
        BinaryOp::Modulo => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Power => Value::Number(math::pow(left.to_number(), right.to_number())),
    }
}

#[inline]
fn shift_count(value: &Value) -> u32 {
    value.to_uint32() & 31
}

/// Apply a unary operator to an evaluated operand.
pub fn apply_unary(op: UnaryOp, operand: &Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!operand.is_truthy()),
        UnaryOp::Negate => Value::Number(-operand.to_number()),
        UnaryOp::BitNot => Value::from(!operand.to_int32()),
        UnaryOp::Plus => Value::Number(operand.to_number()),
    }
}
