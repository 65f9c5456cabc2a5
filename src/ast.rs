// Abstract Syntax Tree definitions for filter expressions

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// AST Node types
///
/// Produced once by the parser and never mutated afterwards. The compiler
/// walks this tree exactly once per expression string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstNode {
    /// Field reference resolved against the record (e.g. `x`)
    Identifier(String),

    /// Number, string, boolean or null literal
    Literal(Value),

    /// Member access: `object.property` or `object[property]`
    ///
    /// For static access the property is an `Identifier` holding the name.
    Member {
        object: Box<AstNode>,
        property: Box<AstNode>,
        computed: bool,
    },

    /// Array literal `[a, b, c]`
    Array(Vec<AstNode>),

    /// Call of a named function, e.g. `glob(x, "a*")` or `Math.floor(x)`
    Call { callee: String, args: Vec<AstNode> },

    /// Short-circuit `&&` / `||`
    Logical {
        op: LogicalOp,
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },

    /// Binary operation, both sides evaluated eagerly
    Binary {
        op: BinaryOp,
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },

    /// Prefix unary operation
    Unary { op: UnaryOp, operand: Box<AstNode> },

    /// `this`: the whole record
    This,

    /// Ternary `condition ? then_branch : else_branch`
    Conditional {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Box<AstNode>,
    },
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,

    // Equality
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,

    // Relational
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    RegexMatch, // =~
    GlobMatch,  // =*

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Logical NOT (`!`)
    Not,

    /// Negation (`-`)
    Negate,

    /// Bitwise complement (`~`)
    BitNot,

    /// Numeric coercion (`+`)
    Plus,
}

impl BinaryOp {
    /// Source text of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "**",
            BinaryOp::Equal => "==",
            BinaryOp::StrictEqual => "===",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrictNotEqual => "!==",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::In => "in",
            BinaryOp::RegexMatch => "=~",
            BinaryOp::GlobMatch => "=*",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::UnsignedShiftRight => ">>>",
        }
    }
}

impl AstNode {
    /// Create an identifier node
    pub fn identifier(name: impl Into<String>) -> Self {
        AstNode::Identifier(name.into())
    }

    /// Create a literal node
    pub fn literal(value: impl Into<Value>) -> Self {
        AstNode::Literal(value.into())
    }

    /// Create a static member access node (`object.name`)
    pub fn member(object: AstNode, name: impl Into<String>) -> Self {
        AstNode::Member {
            object: Box::new(object),
            property: Box::new(AstNode::Identifier(name.into())),
            computed: false,
        }
    }

    /// Create a binary operation node
    pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
        AstNode::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Create a logical operation node
    pub fn logical(op: LogicalOp, lhs: AstNode, rhs: AstNode) -> Self {
        AstNode::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Dotted name of a callable expression (`f` or `Math.floor`).
    ///
    /// Only identifiers and static member chains rooted at an identifier
    /// have a name.
    pub fn callee_name(&self) -> Option<String> {
        match self {
            AstNode::Identifier(name) => Some(name.clone()),
            AstNode::Member {
                object,
                property,
                computed: false,
            } => match property.as_ref() {
                AstNode::Identifier(prop) => {
                    object.callee_name().map(|root| format!("{}.{}", root, prop))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ast_node_creation() {
        let node = AstNode::literal(42.0);
        assert!(matches!(node, AstNode::Literal(Value::Number(_))));

        let node = AstNode::identifier("x");
        assert_eq!(node, AstNode::Identifier("x".to_string()));
    }

    #[test]
    fn test_callee_name() {
        assert_eq!(AstNode::identifier("glob").callee_name().as_deref(), Some("glob"));

        let math_floor = AstNode::member(AstNode::identifier("Math"), "floor");
        assert_eq!(math_floor.callee_name().as_deref(), Some("Math.floor"));

        let computed = AstNode::Member {
            object: Box::new(AstNode::identifier("a")),
            property: Box::new(AstNode::literal("b")),
            computed: true,
        };
        assert_eq!(computed.callee_name(), None);
        assert_eq!(AstNode::This.callee_name(), None);
    }

    #[test]
    fn test_ast_serializes() {
        let node = AstNode::binary(
            BinaryOp::GlobMatch,
            AstNode::identifier("name"),
            AstNode::literal("a*"),
        );
        let json = serde_json::to_string(&node).unwrap();
        let back: AstNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }
}
