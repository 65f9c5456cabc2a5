//! Compiler: lowers an `AstNode` tree into a `CompiledExpr` tree.
//!
//! Everything that does not depend on the record is decided here, once per
//! expression: call targets are resolved against the operator registry and
//! the `Math` namespace, `Math` members become constants, and string-literal
//! patterns on the right of `=~` / `=*` are compiled to matchers. The
//! resulting tree is evaluated per record by [`crate::evaluator`].

use std::sync::Arc;

use tracing::debug;

use crate::ast::{AstNode, BinaryOp, LogicalOp, UnaryOp};
use crate::evaluator::CompiledExpression;
use crate::functions::{Operator, OperatorRegistry};
use crate::math::{self, MathFn};
use crate::pattern::{CompiledPattern, PatternKind};
use crate::value::Value;

/// Root identifier of the math namespace.
pub const MATH_NAMESPACE: &str = "Math";

/// Compiled expression node
#[derive(Debug, Clone)]
pub enum CompiledExpr {
    Constant(Value),

    /// Top-level record field
    Field(Arc<str>),

    /// The whole record
    This,

    Member {
        object: Box<CompiledExpr>,
        key: MemberKey,
    },

    Array(Vec<CompiledExpr>),

    /// Operator-library call
    Builtin {
        operator: Operator,
        args: Vec<CompiledExpr>,
    },

    /// `Math.<fn>(...)` call; arguments are coerced to numbers
    MathCall {
        name: &'static str,
        function: MathFn,
        args: Vec<CompiledExpr>,
    },

    And(Box<CompiledExpr>, Box<CompiledExpr>),
    Or(Box<CompiledExpr>, Box<CompiledExpr>),

    Binary {
        op: BinaryOp,
        lhs: Box<CompiledExpr>,
        rhs: Box<CompiledExpr>,
    },

    /// `=~` / `=*` against a pattern compiled ahead of time
    PatternMatch {
        subject: Box<CompiledExpr>,
        pattern: Arc<CompiledPattern>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<CompiledExpr>,
    },

    Conditional {
        condition: Box<CompiledExpr>,
        then_expr: Box<CompiledExpr>,
        else_expr: Box<CompiledExpr>,
    },
}

/// Key of a member access
#[derive(Debug, Clone)]
pub enum MemberKey {
    /// `a.b`: the key is known at compile time
    Static(Value),
    /// `a[expr]`: the key is evaluated against the record
    Computed(Box<CompiledExpr>),
}

/// Lowers AST nodes using the global operator registry.
pub struct Compiler {
    registry: &'static OperatorRegistry,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            registry: OperatorRegistry::global(),
        }
    }

    pub fn compile_expr(&self, node: &AstNode) -> CompiledExpr {
        match node {
            AstNode::Identifier(name) => CompiledExpr::Field(Arc::from(name.as_str())),
            AstNode::Literal(value) => CompiledExpr::Constant(value.clone()),
            AstNode::This => CompiledExpr::This,

            AstNode::Member {
                object,
                property,
                computed,
            } => {
                if matches!(object.as_ref(), AstNode::Identifier(name) if name == MATH_NAMESPACE) {
                    return self.compile_math_member(property, *computed);
                }
                let key = match (property.as_ref(), *computed) {
                    (AstNode::Identifier(name), false) => {
                        MemberKey::Static(Value::from(name.as_str()))
                    }
                    (AstNode::Literal(value), _) => MemberKey::Static(value.clone()),
                    (other, _) => MemberKey::Computed(Box::new(self.compile_expr(other))),
                };
                CompiledExpr::Member {
                    object: Box::new(self.compile_expr(object)),
                    key,
                }
            }

            AstNode::Array(elements) => {
                CompiledExpr::Array(elements.iter().map(|e| self.compile_expr(e)).collect())
            }

            AstNode::Call { callee, args } => self.compile_call(callee, args),

            AstNode::Logical { op, lhs, rhs } => {
                let lhs = Box::new(self.compile_expr(lhs));
                let rhs = Box::new(self.compile_expr(rhs));
                match op {
                    LogicalOp::And => CompiledExpr::And(lhs, rhs),
                    LogicalOp::Or => CompiledExpr::Or(lhs, rhs),
                }
            }

            AstNode::Binary { op, lhs, rhs } => self.compile_binary(*op, lhs, rhs),

            AstNode::Unary { op, operand } => CompiledExpr::Unary {
                op: *op,
                operand: Box::new(self.compile_expr(operand)),
            },

            AstNode::Conditional {
                condition,
                then_branch,
                else_branch,
            } => CompiledExpr::Conditional {
                condition: Box::new(self.compile_expr(condition)),
                then_expr: Box::new(self.compile_expr(then_branch)),
                else_expr: Box::new(self.compile_expr(else_branch)),
            },
        }
    }

    /// `Math.NAME` / `Math["NAME"]`. Only constants have a value; function
    /// members and unknown names are Absent.
    fn compile_math_member(&self, property: &AstNode, computed: bool) -> CompiledExpr {
        let name = match (property, computed) {
            (AstNode::Identifier(name), false) => Some(name.as_str()),
            (AstNode::Literal(Value::String(name)), _) => Some(name.as_ref()),
            _ => None,
        };
        match name.and_then(math::constant) {
            Some(constant) => CompiledExpr::Constant(Value::Number(constant)),
            None => {
                debug!(member = ?name, "math member has no constant value");
                CompiledExpr::Constant(Value::Absent)
            }
        }
    }

    fn compile_call(&self, callee: &str, args: &[AstNode]) -> CompiledExpr {
        if let Some(operator) = self.registry.get(callee) {
            return CompiledExpr::Builtin {
                operator: *operator,
                args: self.compile_args(args),
            };
        }

        let math_function = callee
            .strip_prefix(MATH_NAMESPACE)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(math::function_entry);
        if let Some((name, function)) = math_function {
            return CompiledExpr::MathCall {
                name,
                function,
                args: self.compile_args(args),
            };
        }

        debug!(callee, "unknown function; call compiles to false");
        CompiledExpr::Constant(Value::Bool(false))
    }

    fn compile_args(&self, args: &[AstNode]) -> Vec<CompiledExpr> {
        args.iter().map(|a| self.compile_expr(a)).collect()
    }

    fn compile_binary(&self, op: BinaryOp, lhs: &AstNode, rhs: &AstNode) -> CompiledExpr {
        let kind = match op {
            BinaryOp::RegexMatch => Some(PatternKind::Regex),
            BinaryOp::GlobMatch => Some(PatternKind::Glob),
            _ => None,
        };

        if let (Some(kind), AstNode::Literal(literal)) = (kind, rhs) {
            let Some(source) = literal.as_str() else {
                // Non-string patterns never match
                return CompiledExpr::Constant(Value::Bool(false));
            };
            let pattern = CompiledPattern::compile(kind, source);
            if matches!(pattern, CompiledPattern::Never) {
                debug!(pattern = source, ?kind, "invalid literal pattern never matches");
            }
            return CompiledExpr::PatternMatch {
                subject: Box::new(self.compile_expr(lhs)),
                pattern: Arc::new(pattern),
            };
        }

        CompiledExpr::Binary {
            op,
            lhs: Box::new(self.compile_expr(lhs)),
            rhs: Box::new(self.compile_expr(rhs)),
        }
    }
}

/// Compile an AST with the global operator registry.
pub fn compile(ast: &AstNode) -> CompiledExpression {
    CompiledExpression::new(Compiler::new().compile_expr(ast))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn lower(expr: &str) -> CompiledExpr {
        let ast = parse(expr).unwrap();
        Compiler::new().compile_expr(&ast)
    }

    #[test]
    fn test_math_constant_is_folded() {
        match lower("Math.PI") {
            CompiledExpr::Constant(Value::Number(n)) => assert_eq!(n, std::f64::consts::PI),
            other => panic!("Expected constant, got {:?}", other),
        }
        match lower("Math['E']") {
            CompiledExpr::Constant(Value::Number(n)) => assert_eq!(n, std::f64::consts::E),
            other => panic!("Expected constant, got {:?}", other),
        }
    }

    #[test]
    fn test_math_non_constant_members_are_absent() {
        assert!(matches!(lower("Math.floor"), CompiledExpr::Constant(Value::Absent)));
        assert!(matches!(lower("Math.nope"), CompiledExpr::Constant(Value::Absent)));
        assert!(matches!(lower("Math[x]"), CompiledExpr::Constant(Value::Absent)));
    }

    #[test]
    fn test_calls_are_resolved() {
        match lower("glob(name, 'a*')") {
            CompiledExpr::Builtin { operator, args } => {
                assert_eq!(operator.name, "glob");
                assert_eq!(args.len(), 2);
            }
            other => panic!("Expected builtin call, got {:?}", other),
        }
        match lower("Math.max(a, 1)") {
            CompiledExpr::MathCall { name, args, .. } => {
                assert_eq!(name, "max");
                assert_eq!(args.len(), 2);
            }
            other => panic!("Expected math call, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_call_is_false() {
        assert!(matches!(lower("nope(x)"), CompiledExpr::Constant(Value::Bool(false))));
        assert!(matches!(lower("Math.random()"), CompiledExpr::Constant(Value::Bool(false))));
        assert!(matches!(lower("x.glob(y)"), CompiledExpr::Constant(Value::Bool(false))));
    }

    #[test]
    fn test_literal_patterns_are_precompiled() {
        match lower("name =* 'a*'") {
            CompiledExpr::PatternMatch { pattern, .. } => {
                assert!(pattern.is_match("abc"));
                assert!(!pattern.is_match("bcd"));
            }
            other => panic!("Expected pattern match, got {:?}", other),
        }
        match lower("name =~ '('") {
            CompiledExpr::PatternMatch { pattern, .. } => {
                assert!(matches!(*pattern, CompiledPattern::Never));
            }
            other => panic!("Expected pattern match, got {:?}", other),
        }
        assert!(matches!(lower("name =~ 1"), CompiledExpr::Constant(Value::Bool(false))));
        assert!(matches!(
            lower("name =~ other"),
            CompiledExpr::Binary { op: BinaryOp::RegexMatch, .. }
        ));
    }

    #[test]
    fn test_member_keys() {
        match lower("a.b") {
            CompiledExpr::Member { object, key: MemberKey::Static(key) } => {
                assert!(matches!(*object, CompiledExpr::Field(ref name) if &**name == "a"));
                assert_eq!(key, Value::from("b"));
            }
            other => panic!("Expected member, got {:?}", other),
        }
        assert!(matches!(
            lower("a[0]"),
            CompiledExpr::Member { key: MemberKey::Static(Value::Number(_)), .. }
        ));
        assert!(matches!(
            lower("a[i]"),
            CompiledExpr::Member { key: MemberKey::Computed(_), .. }
        ));
    }

    #[test]
    fn test_record_field_named_math_is_not_the_namespace() {
        // Only the bare root identifier is special
        assert!(matches!(lower("Math"), CompiledExpr::Field(_)));
        assert!(matches!(lower("this.Math.PI"), CompiledExpr::Member { .. }));
    }

    #[test]
    fn test_builtin_calls_resolve_through_registry() {
        let ast = parse("eq(1, 1)").unwrap();
        match Compiler::new().compile_expr(&ast) {
            CompiledExpr::Builtin { operator, args } => {
                assert_eq!(operator.name, "eq");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected a builtin, got {:?}", other),
        }
    }
}
