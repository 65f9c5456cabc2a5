// Filter expression parser
// Hand-written lexer plus a Pratt parser over the operator table below.

use std::fmt;

use thiserror::Error;

use crate::ast::{AstNode, BinaryOp, LogicalOp, UnaryOp};
use crate::value::Value;

/// Default limit on expression nesting (parentheses, unary chains,
/// right-associative operators).
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Parser errors
///
/// Every variant carries the character offset in the source text where the
/// problem was detected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    #[error("Unexpected token {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("Unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },

    #[error("Unexpected end of expression at position {position}")]
    UnexpectedEnd { position: usize },

    #[error("Invalid number {text:?} at position {position}")]
    InvalidNumber { text: String, position: usize },

    #[error("Unclosed string literal starting at position {position}")]
    UnclosedString { position: usize },

    #[error("Invalid escape sequence {sequence} at position {position}")]
    InvalidEscape { sequence: String, position: usize },

    #[error("Expected {expected}, found {found} at position {position}")]
    Expected {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("Only named functions can be called (position {position})")]
    InvalidCallTarget { position: usize },

    #[error("Expression nesting exceeds {max_depth} levels at position {position}")]
    TooDeep { max_depth: usize, position: usize },
}

impl ParserError {
    /// Character offset of the error in the expression text.
    pub fn position(&self) -> usize {
        match self {
            ParserError::UnexpectedToken { position, .. }
            | ParserError::UnexpectedChar { position, .. }
            | ParserError::UnexpectedEnd { position }
            | ParserError::InvalidNumber { position, .. }
            | ParserError::UnclosedString { position }
            | ParserError::InvalidEscape { position, .. }
            | ParserError::Expected { position, .. }
            | ParserError::InvalidCallTarget { position }
            | ParserError::TooDeep { position, .. } => *position,
        }
    }
}

/// Token types for the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    String(String),
    Number(f64),
    True,
    False,
    Null,
    This,

    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    Tilde,
    Caret,
    Ampersand,
    AmpAmp,
    Pipe,
    PipePipe,
    EqualEqual,
    EqualEqualEqual,
    BangEqual,
    BangEqualEqual,
    EqualTilde,
    EqualStar,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    In,
    Dot,
    Question,
    Colon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::String(s) => return write!(f, "{:?}", s),
            Token::Number(n) => return write!(f, "{}", n),
            Token::Identifier(name) => return write!(f, "'{}'", name),
            Token::True => "'true'",
            Token::False => "'false'",
            Token::Null => "'null'",
            Token::This => "'this'",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::StarStar => "'**'",
            Token::Slash => "'/'",
            Token::Percent => "'%'",
            Token::Bang => "'!'",
            Token::Tilde => "'~'",
            Token::Caret => "'^'",
            Token::Ampersand => "'&'",
            Token::AmpAmp => "'&&'",
            Token::Pipe => "'|'",
            Token::PipePipe => "'||'",
            Token::EqualEqual => "'=='",
            Token::EqualEqualEqual => "'==='",
            Token::BangEqual => "'!='",
            Token::BangEqualEqual => "'!=='",
            Token::EqualTilde => "'=~'",
            Token::EqualStar => "'=*'",
            Token::LessThan => "'<'",
            Token::LessThanOrEqual => "'<='",
            Token::GreaterThan => "'>'",
            Token::GreaterThanOrEqual => "'>='",
            Token::ShiftLeft => "'<<'",
            Token::ShiftRight => "'>>'",
            Token::UnsignedShiftRight => "'>>>'",
            Token::In => "'in'",
            Token::Dot => "'.'",
            Token::Question => "'?'",
            Token::Colon => "':'",
            Token::LeftParen => "'('",
            Token::RightParen => "')'",
            Token::LeftBracket => "'['",
            Token::RightBracket => "']'",
            Token::Comma => "','",
            Token::Eof => "end of expression",
        };
        f.write_str(text)
    }
}

/// Lexer for tokenizing filter expressions
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    /// Offset of the first character of the most recently returned token.
    token_start: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            token_start: 0,
        }
    }

    /// Offset where the last token returned by `next_token` begins.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            self.position += 1;
        }
    }

    /// Consume `len` characters and return `token`.
    fn emit(&mut self, len: usize, token: Token) -> Token {
        for _ in 0..len {
            self.advance();
        }
        token
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_hex_escape(&mut self, digits: usize, prefix: char) -> Result<char, ParserError> {
        let start = self.position;
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.current() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(h);
                    self.advance();
                }
                _ => {
                    return Err(ParserError::InvalidEscape {
                        sequence: format!("\\{}{}", prefix, hex),
                        position: start,
                    })
                }
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(ParserError::InvalidEscape {
                sequence: format!("\\{}{}", prefix, hex),
                position: start,
            })
    }

    fn read_string(&mut self, quote_char: char) -> Result<String, ParserError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // skip opening quote

        loop {
            match self.current() {
                None => return Err(ParserError::UnclosedString { position: start }),
                Some(ch) if ch == quote_char => {
                    self.advance();
                    return Ok(result);
                }
                Some('\\') => {
                    let escape_at = self.position;
                    self.advance();
                    let escaped = match self.current() {
                        None => return Err(ParserError::UnclosedString { position: start }),
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some('\\') => '\\',
                        Some('/') => '/',
                        Some('b') => '\u{0008}',
                        Some('f') => '\u{000C}',
                        Some('v') => '\u{000B}',
                        Some('0') => '\0',
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('t') => '\t',
                        Some('x') => {
                            self.advance();
                            result.push(self.read_hex_escape(2, 'x')?);
                            continue;
                        }
                        Some('u') => {
                            self.advance();
                            result.push(self.read_hex_escape(4, 'u')?);
                            continue;
                        }
                        Some(ch) => {
                            return Err(ParserError::InvalidEscape {
                                sequence: format!("\\{}", ch),
                                position: escape_at,
                            })
                        }
                    };
                    result.push(escaped);
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<f64, ParserError> {
        let start = self.position;

        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        // Fractional part; `1.foo` leaves the dot for member access
        if self.current() == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if matches!(self.current(), Some('e') | Some('E')) {
            self.advance();
            if matches!(self.current(), Some('+') | Some('-')) {
                self.advance();
            }
            if !self.current().is_some_and(|c| c.is_ascii_digit()) {
                let text: String = self.input[start..self.position].iter().collect();
                return Err(ParserError::InvalidNumber {
                    text,
                    position: start,
                });
            }
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // `12abc` is not a number followed by an identifier
        if self.current().is_some_and(is_identifier_start) {
            while self.current().is_some_and(is_identifier_part) {
                self.advance();
            }
            let text: String = self.input[start..self.position].iter().collect();
            return Err(ParserError::InvalidNumber {
                text,
                position: start,
            });
        }

        let text: String = self.input[start..self.position].iter().collect();
        text.parse()
            .map_err(|_| ParserError::InvalidNumber {
                text,
                position: start,
            })
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while self.current().is_some_and(is_identifier_part) {
            self.advance();
        }
        self.input[start..self.position].iter().collect()
    }

    pub fn next_token(&mut self) -> Result<Token, ParserError> {
        self.skip_whitespace();
        self.token_start = self.position;

        let Some(ch) = self.current() else {
            return Ok(Token::Eof);
        };

        let token = match ch {
            '"' | '\'' => Token::String(self.read_string(ch)?),

            c if c.is_ascii_digit() => Token::Number(self.read_number()?),
            '.' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => {
                Token::Number(self.read_number()?)
            }

            c if is_identifier_start(c) => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "this" => Token::This,
                    "in" => Token::In,
                    _ => Token::Identifier(ident),
                }
            }

            '=' => match (self.peek(1), self.peek(2)) {
                (Some('='), Some('=')) => self.emit(3, Token::EqualEqualEqual),
                (Some('='), _) => self.emit(2, Token::EqualEqual),
                (Some('~'), _) => self.emit(2, Token::EqualTilde),
                (Some('*'), _) => self.emit(2, Token::EqualStar),
                _ => {
                    return Err(ParserError::UnexpectedChar {
                        found: '=',
                        position: self.position,
                    })
                }
            },
            '!' => match (self.peek(1), self.peek(2)) {
                (Some('='), Some('=')) => self.emit(3, Token::BangEqualEqual),
                (Some('='), _) => self.emit(2, Token::BangEqual),
                _ => self.emit(1, Token::Bang),
            },
            '<' => match self.peek(1) {
                Some('<') => self.emit(2, Token::ShiftLeft),
                Some('=') => self.emit(2, Token::LessThanOrEqual),
                _ => self.emit(1, Token::LessThan),
            },
            '>' => match (self.peek(1), self.peek(2)) {
                (Some('>'), Some('>')) => self.emit(3, Token::UnsignedShiftRight),
                (Some('>'), _) => self.emit(2, Token::ShiftRight),
                (Some('='), _) => self.emit(2, Token::GreaterThanOrEqual),
                _ => self.emit(1, Token::GreaterThan),
            },
            '&' if self.peek(1) == Some('&') => self.emit(2, Token::AmpAmp),
            '&' => self.emit(1, Token::Ampersand),
            '|' if self.peek(1) == Some('|') => self.emit(2, Token::PipePipe),
            '|' => self.emit(1, Token::Pipe),
            '*' if self.peek(1) == Some('*') => self.emit(2, Token::StarStar),
            '*' => self.emit(1, Token::Star),

            '+' => self.emit(1, Token::Plus),
            '-' => self.emit(1, Token::Minus),
            '/' => self.emit(1, Token::Slash),
            '%' => self.emit(1, Token::Percent),
            '^' => self.emit(1, Token::Caret),
            '~' => self.emit(1, Token::Tilde),
            '?' => self.emit(1, Token::Question),
            ':' => self.emit(1, Token::Colon),
            '.' => self.emit(1, Token::Dot),
            ',' => self.emit(1, Token::Comma),
            '(' => self.emit(1, Token::LeftParen),
            ')' => self.emit(1, Token::RightParen),
            '[' => self.emit(1, Token::LeftBracket),
            ']' => self.emit(1, Token::RightBracket),

            other => {
                return Err(ParserError::UnexpectedChar {
                    found: other,
                    position: self.position,
                })
            }
        };

        Ok(token)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Infix operator classes recognised by the Pratt loop.
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
    Conditional,
}

/// Binding power of the ternary operator: lower than every binary operator.
const TERNARY_BP: u8 = 2;

/// Parser for filter expressions using Pratt parsing
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    /// Offset of `current_token` in the source.
    position: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParserError> {
        Self::with_max_depth(input, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(input: &str, max_depth: usize) -> Result<Self, ParserError> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        let position = lexer.token_start();
        Ok(Parser {
            lexer,
            current_token,
            position,
            depth: 0,
            max_depth,
        })
    }

    fn advance(&mut self) -> Result<(), ParserError> {
        self.current_token = self.lexer.next_token()?;
        self.position = self.lexer.token_start();
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParserError> {
        if self.current_token == expected {
            self.advance()
        } else if self.current_token == Token::Eof {
            Err(ParserError::UnexpectedEnd {
                position: self.position,
            })
        } else {
            Err(ParserError::Expected {
                expected: expected.to_string(),
                found: self.current_token.to_string(),
                position: self.position,
            })
        }
    }

    fn unexpected(&self) -> ParserError {
        if self.current_token == Token::Eof {
            ParserError::UnexpectedEnd {
                position: self.position,
            }
        } else {
            ParserError::UnexpectedToken {
                found: self.current_token.to_string(),
                position: self.position,
            }
        }
    }

    /// Run `parse` one nesting level deeper, failing past `max_depth`.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParserError>,
    ) -> Result<T, ParserError> {
        let start = self.depth;
        let result = self.descend().and_then(|()| parse(self));
        self.depth = start;
        result
    }

    /// Count one more level of tree depth, failing past `max_depth`.
    fn descend(&mut self) -> Result<(), ParserError> {
        if self.depth >= self.max_depth {
            return Err(ParserError::TooDeep {
                max_depth: self.max_depth,
                position: self.position,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Infix operator and its (left, right) binding power for the current token.
    ///
    /// Higher numbers bind tighter. Left-associative operators use
    /// `right = left + 1`; `**` uses `right = left`.
    fn infix(&self) -> Option<(Infix, u8, u8)> {
        use BinaryOp::*;
        let (infix, left_bp, right_bp) = match self.current_token {
            Token::Question => (Infix::Conditional, TERNARY_BP, TERNARY_BP),
            Token::PipePipe => (Infix::Logical(LogicalOp::Or), 4, 5),
            Token::AmpAmp => (Infix::Logical(LogicalOp::And), 6, 7),
            Token::Pipe => (Infix::Binary(BitOr), 8, 9),
            Token::Caret => (Infix::Binary(BitXor), 10, 11),
            Token::Ampersand => (Infix::Binary(BitAnd), 12, 13),
            Token::EqualEqual => (Infix::Binary(Equal), 14, 15),
            Token::EqualEqualEqual => (Infix::Binary(StrictEqual), 14, 15),
            Token::BangEqual => (Infix::Binary(NotEqual), 14, 15),
            Token::BangEqualEqual => (Infix::Binary(StrictNotEqual), 14, 15),
            Token::LessThan => (Infix::Binary(LessThan), 16, 17),
            Token::LessThanOrEqual => (Infix::Binary(LessThanOrEqual), 16, 17),
            Token::GreaterThan => (Infix::Binary(GreaterThan), 16, 17),
            Token::GreaterThanOrEqual => (Infix::Binary(GreaterThanOrEqual), 16, 17),
            Token::In => (Infix::Binary(In), 16, 17),
            Token::EqualTilde => (Infix::Binary(RegexMatch), 16, 17),
            Token::EqualStar => (Infix::Binary(GlobMatch), 16, 17),
            Token::ShiftLeft => (Infix::Binary(ShiftLeft), 18, 19),
            Token::ShiftRight => (Infix::Binary(ShiftRight), 18, 19),
            Token::UnsignedShiftRight => (Infix::Binary(UnsignedShiftRight), 18, 19),
            Token::Plus => (Infix::Binary(Add), 20, 21),
            Token::Minus => (Infix::Binary(Subtract), 20, 21),
            Token::Star => (Infix::Binary(Multiply), 22, 23),
            Token::Slash => (Infix::Binary(Divide), 22, 23),
            Token::Percent => (Infix::Binary(Modulo), 22, 23),
            Token::StarStar => (Infix::Binary(Power), 24, 24),
            _ => return None,
        };
        Some((infix, left_bp, right_bp))
    }

    /// Parse a primary expression (literals, identifiers, grouping, arrays)
    fn parse_primary(&mut self) -> Result<AstNode, ParserError> {
        let node = match &self.current_token {
            Token::String(s) => AstNode::Literal(Value::from(s.as_str())),
            Token::Number(n) => AstNode::Literal(Value::Number(*n)),
            Token::True => AstNode::Literal(Value::Bool(true)),
            Token::False => AstNode::Literal(Value::Bool(false)),
            Token::Null => AstNode::Literal(Value::Null),
            Token::This => AstNode::This,
            Token::Identifier(name) => AstNode::Identifier(name.clone()),
            Token::In => {
                // `in` doubles as the name of the membership built-in
                let at = self.position;
                self.advance()?;
                if self.current_token != Token::LeftParen {
                    return Err(ParserError::UnexpectedToken {
                        found: Token::In.to_string(),
                        position: at,
                    });
                }
                return Ok(AstNode::Identifier("in".to_string()));
            }
            Token::LeftParen => {
                self.advance()?;
                let inner = self.parse_expression(0)?;
                self.expect(Token::RightParen)?;
                return Ok(inner);
            }
            Token::LeftBracket => {
                self.advance()?;
                let elements = self.parse_list(Token::RightBracket)?;
                return Ok(AstNode::Array(elements));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance()?;
        Ok(node)
    }

    /// Parse comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: Token) -> Result<Vec<AstNode>, ParserError> {
        let mut items = Vec::new();
        if self.current_token != close {
            loop {
                items.push(self.parse_expression(0)?);
                if self.current_token != Token::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    /// Property name after `.`; reserved words are valid property names.
    fn parse_property_name(&mut self) -> Result<String, ParserError> {
        let name = match &self.current_token {
            Token::Identifier(name) => name.clone(),
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            Token::Null => "null".to_string(),
            Token::This => "this".to_string(),
            Token::In => "in".to_string(),
            Token::Eof => {
                return Err(ParserError::UnexpectedEnd {
                    position: self.position,
                })
            }
            other => {
                return Err(ParserError::Expected {
                    expected: "property name".to_string(),
                    found: other.to_string(),
                    position: self.position,
                })
            }
        };
        self.advance()?;
        Ok(name)
    }

    /// Parse member access and call suffixes
    fn parse_postfix(&mut self) -> Result<AstNode, ParserError> {
        let start = self.depth;
        let result = self.parse_suffixes();
        self.depth = start;
        result
    }

    /// Each suffix wraps the node so far, adding one tree level.
    fn parse_suffixes(&mut self) -> Result<AstNode, ParserError> {
        let mut node = self.parse_primary()?;

        loop {
            if matches!(
                self.current_token,
                Token::Dot | Token::LeftBracket | Token::LeftParen
            ) {
                self.descend()?;
            }
            match self.current_token {
                Token::Dot => {
                    self.advance()?;
                    let name = self.parse_property_name()?;
                    node = AstNode::member(node, name);
                }
                Token::LeftBracket => {
                    self.advance()?;
                    let property = self.parse_expression(0)?;
                    self.expect(Token::RightBracket)?;
                    node = AstNode::Member {
                        object: Box::new(node),
                        property: Box::new(property),
                        computed: true,
                    };
                }
                Token::LeftParen => {
                    let at = self.position;
                    let callee = node
                        .callee_name()
                        .ok_or(ParserError::InvalidCallTarget { position: at })?;
                    self.advance()?;
                    let args = self.parse_list(Token::RightParen)?;
                    node = AstNode::Call { callee, args };
                }
                _ => break,
            }
        }

        Ok(node)
    }

    /// Parse prefix operators (right-to-left) above a postfix expression
    fn parse_unary(&mut self) -> Result<AstNode, ParserError> {
        let op = match self.current_token {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Negate,
            Token::Tilde => UnaryOp::BitNot,
            Token::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.advance()?;
        let operand = self.nested(|p| p.parse_unary())?;
        Ok(AstNode::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// Parse an expression with Pratt parsing
    fn parse_expression(&mut self, min_bp: u8) -> Result<AstNode, ParserError> {
        self.nested(|p| p.parse_expression_inner(min_bp))
    }

    fn parse_expression_inner(&mut self, min_bp: u8) -> Result<AstNode, ParserError> {
        let start = self.depth;
        let result = self.parse_infix_chain(min_bp);
        self.depth = start;
        result
    }

    /// Left-associative folds deepen the tree without recursing, so each one
    /// is counted against `max_depth`.
    fn parse_infix_chain(&mut self, min_bp: u8) -> Result<AstNode, ParserError> {
        let mut lhs = self.parse_unary()?;

        while let Some((infix, left_bp, right_bp)) = self.infix() {
            if left_bp < min_bp {
                break;
            }
            self.descend()?;
            self.advance()?;

            lhs = match infix {
                Infix::Conditional => {
                    let then_branch = self.parse_expression(0)?;
                    self.expect(Token::Colon)?;
                    let else_branch = self.parse_expression(right_bp)?;
                    AstNode::Conditional {
                        condition: Box::new(lhs),
                        then_branch: Box::new(then_branch),
                        else_branch: Box::new(else_branch),
                    }
                }
                Infix::Logical(op) => {
                    let rhs = self.parse_expression(right_bp)?;
                    AstNode::logical(op, lhs, rhs)
                }
                Infix::Binary(op) => {
                    let rhs = self.parse_expression(right_bp)?;
                    AstNode::binary(op, lhs, rhs)
                }
            };
        }

        Ok(lhs)
    }

    pub fn parse(&mut self) -> Result<AstNode, ParserError> {
        let ast = self.parse_expression(0)?;

        if self.current_token != Token::Eof {
            return Err(ParserError::Expected {
                expected: "end of expression".to_string(),
                found: self.current_token.to_string(),
                position: self.position,
            });
        }

        Ok(ast)
    }
}

/// Parse a filter expression string into an AST
pub fn parse(expression: &str) -> Result<AstNode, ParserError> {
    Parser::new(expression)?.parse()
}

/// Parse with an explicit nesting limit
pub fn parse_with_max_depth(expression: &str, max_depth: usize) -> Result<AstNode, ParserError> {
    Parser::with_max_depth(expression, max_depth)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    fn ident(name: &str) -> AstNode {
        AstNode::identifier(name)
    }

    fn num(n: f64) -> AstNode {
        AstNode::literal(n)
    }

    // Lexer tests
    #[test]
    fn test_lexer_numbers() {
        assert_eq!(
            tokens("42 3.14 .5 2.5e10 1E-5"),
            vec![
                Token::Number(42.0),
                Token::Number(3.14),
                Token::Number(0.5),
                Token::Number(2.5e10),
                Token::Number(1e-5),
            ]
        );
    }

    #[test]
    fn test_lexer_minus_is_never_part_of_number() {
        assert_eq!(tokens("-1"), vec![Token::Minus, Token::Number(1.0)]);
        assert_eq!(
            tokens("x-1"),
            vec![Token::Identifier("x".to_string()), Token::Minus, Token::Number(1.0)]
        );
    }

    #[test]
    fn test_lexer_strings() {
        assert_eq!(
            tokens(r#""hello" 'world' "a\"b\\c\/d" '\x41B\n'"#),
            vec![
                Token::String("hello".to_string()),
                Token::String("world".to_string()),
                Token::String("a\"b\\c/d".to_string()),
                Token::String("AB\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_lexer_keywords() {
        assert_eq!(
            tokens("true false null this in"),
            vec![Token::True, Token::False, Token::Null, Token::This, Token::In]
        );
    }

    #[test]
    fn test_lexer_identifiers() {
        assert_eq!(
            tokens("foo bar_baz $ref Math"),
            vec![
                Token::Identifier("foo".to_string()),
                Token::Identifier("bar_baz".to_string()),
                Token::Identifier("$ref".to_string()),
                Token::Identifier("Math".to_string()),
            ]
        );
    }

    #[test]
    fn test_lexer_operators() {
        assert_eq!(
            tokens("+ - * ** / % ! ~ ^ & && | || == === != !== =~ =* < <= << > >= >> >>>"),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::StarStar,
                Token::Slash,
                Token::Percent,
                Token::Bang,
                Token::Tilde,
                Token::Caret,
                Token::Ampersand,
                Token::AmpAmp,
                Token::Pipe,
                Token::PipePipe,
                Token::EqualEqual,
                Token::EqualEqualEqual,
                Token::BangEqual,
                Token::BangEqualEqual,
                Token::EqualTilde,
                Token::EqualStar,
                Token::LessThan,
                Token::LessThanOrEqual,
                Token::ShiftLeft,
                Token::GreaterThan,
                Token::GreaterThanOrEqual,
                Token::ShiftRight,
                Token::UnsignedShiftRight,
            ]
        );
    }

    #[test]
    fn test_lexer_delimiters() {
        assert_eq!(
            tokens("()[],:?."),
            vec![
                Token::LeftParen,
                Token::RightParen,
                Token::LeftBracket,
                Token::RightBracket,
                Token::Comma,
                Token::Colon,
                Token::Question,
                Token::Dot,
            ]
        );
    }

    #[test]
    fn test_lexer_errors_carry_position() {
        let err = Lexer::new("  'abc").next_token().unwrap_err();
        assert_eq!(err, ParserError::UnclosedString { position: 2 });

        let mut lexer = Lexer::new("a = b");
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err, ParserError::UnexpectedChar { found: '=', position: 2 });

        let err = Lexer::new(r#""\q""#).next_token().unwrap_err();
        assert_eq!(err.position(), 1);

        let err = Lexer::new("12abc").next_token().unwrap_err();
        assert!(matches!(err, ParserError::InvalidNumber { position: 0, .. }));
    }

    // Parser tests
    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("42").unwrap(), num(42.0));
        assert_eq!(parse("'hi'").unwrap(), AstNode::literal("hi"));
        assert_eq!(parse("true").unwrap(), AstNode::literal(true));
        assert_eq!(parse("null").unwrap(), AstNode::Literal(Value::Null));
        assert_eq!(parse("this").unwrap(), AstNode::This);
    }

    #[test]
    fn test_parse_member_chain() {
        let ast = parse("a.b[0].c").unwrap();
        let expected = AstNode::member(
            AstNode::Member {
                object: Box::new(AstNode::member(ident("a"), "b")),
                property: Box::new(num(0.0)),
                computed: true,
            },
            "c",
        );
        assert_eq!(ast, expected);
    }

    #[test]
    fn test_parse_reserved_word_property() {
        assert_eq!(parse("a.in").unwrap(), AstNode::member(ident("a"), "in"));
    }

    #[test]
    fn test_parse_precedence() {
        // 1 + 2 * 3 should parse as 1 + (2 * 3)
        let ast = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Add,
                num(1.0),
                AstNode::binary(BinaryOp::Multiply, num(2.0), num(3.0))
            )
        );
    }

    #[test]
    fn test_parse_logical_groups_comparisons() {
        let ast = parse("x == 2 && y > 0").unwrap();
        assert_eq!(
            ast,
            AstNode::logical(
                LogicalOp::And,
                AstNode::binary(BinaryOp::Equal, ident("x"), num(2.0)),
                AstNode::binary(BinaryOp::GreaterThan, ident("y"), num(0.0)),
            )
        );
    }

    #[test]
    fn test_parse_or_binds_looser_than_and() {
        let ast = parse("a || b && c").unwrap();
        assert_eq!(
            ast,
            AstNode::logical(
                LogicalOp::Or,
                ident("a"),
                AstNode::logical(LogicalOp::And, ident("b"), ident("c")),
            )
        );
    }

    #[test]
    fn test_parse_power_is_right_associative() {
        let ast = parse("2 ** 3 ** 2").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Power,
                num(2.0),
                AstNode::binary(BinaryOp::Power, num(3.0), num(2.0))
            )
        );
    }

    #[test]
    fn test_parse_power_binds_tighter_than_multiply() {
        let ast = parse("a * b ** c").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Multiply,
                ident("a"),
                AstNode::binary(BinaryOp::Power, ident("b"), ident("c"))
            )
        );
    }

    #[test]
    fn test_parse_subtraction_is_left_associative() {
        let ast = parse("a - b - c").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Subtract,
                AstNode::binary(BinaryOp::Subtract, ident("a"), ident("b")),
                ident("c")
            )
        );
    }

    #[test]
    fn test_parse_custom_relational_operators() {
        // Same tier as `<`, tighter than `==`, looser than shifts
        let ast = parse("a =~ 'x' == b in c").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Equal,
                AstNode::binary(BinaryOp::RegexMatch, ident("a"), AstNode::literal("x")),
                AstNode::binary(BinaryOp::In, ident("b"), ident("c")),
            )
        );

        let ast = parse("a =* b << 1").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::GlobMatch,
                ident("a"),
                AstNode::binary(BinaryOp::ShiftLeft, ident("b"), num(1.0)),
            )
        );
    }

    #[test]
    fn test_parse_bitwise_order() {
        // & binds tighter than ^, which binds tighter than |
        let ast = parse("a | b ^ c & d").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::BitOr,
                ident("a"),
                AstNode::binary(
                    BinaryOp::BitXor,
                    ident("b"),
                    AstNode::binary(BinaryOp::BitAnd, ident("c"), ident("d")),
                ),
            )
        );
    }

    #[test]
    fn test_parse_unary() {
        let ast = parse("!-~+x").unwrap();
        let expected = [UnaryOp::Not, UnaryOp::Negate, UnaryOp::BitNot, UnaryOp::Plus]
            .iter()
            .rev()
            .fold(ident("x"), |operand, op| AstNode::Unary {
                op: *op,
                operand: Box::new(operand),
            });
        assert_eq!(ast, expected);

        // Unary binds tighter than `**`
        let ast = parse("-2 ** 2").unwrap();
        assert!(matches!(ast, AstNode::Binary { op: BinaryOp::Power, .. }));
    }

    #[test]
    fn test_parse_conditional_is_right_associative() {
        let ast = parse("a ? b : c ? d : e").unwrap();
        assert_eq!(
            ast,
            AstNode::Conditional {
                condition: Box::new(ident("a")),
                then_branch: Box::new(ident("b")),
                else_branch: Box::new(AstNode::Conditional {
                    condition: Box::new(ident("c")),
                    then_branch: Box::new(ident("d")),
                    else_branch: Box::new(ident("e")),
                }),
            }
        );

        let ast = parse("a || b ? 1 : 2").unwrap();
        match ast {
            AstNode::Conditional { condition, .. } => {
                assert!(matches!(*condition, AstNode::Logical { op: LogicalOp::Or, .. }));
            }
            _ => panic!("Expected Conditional node"),
        }
    }

    #[test]
    fn test_parse_array() {
        assert_eq!(
            parse("[1, 'a', [x]]").unwrap(),
            AstNode::Array(vec![
                num(1.0),
                AstNode::literal("a"),
                AstNode::Array(vec![ident("x")]),
            ])
        );
        assert_eq!(parse("[]").unwrap(), AstNode::Array(vec![]));
    }

    #[test]
    fn test_parse_function_calls() {
        assert_eq!(
            parse("glob(name, '*.md')").unwrap(),
            AstNode::Call {
                callee: "glob".to_string(),
                args: vec![ident("name"), AstNode::literal("*.md")],
            }
        );
        assert_eq!(
            parse("Math.max(1, 2)").unwrap(),
            AstNode::Call {
                callee: "Math.max".to_string(),
                args: vec![num(1.0), num(2.0)],
            }
        );
        assert_eq!(
            parse("in(2, [1])").unwrap(),
            AstNode::Call {
                callee: "in".to_string(),
                args: vec![num(2.0), AstNode::Array(vec![num(1.0)])],
            }
        );
        assert_eq!(
            parse("typeof()").unwrap(),
            AstNode::Call {
                callee: "typeof".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("x ==").unwrap_err(), ParserError::UnexpectedEnd { position: 4 });
        assert_eq!(parse("").unwrap_err(), ParserError::UnexpectedEnd { position: 0 });
        assert!(matches!(parse("(1 + 2"), Err(ParserError::UnexpectedEnd { .. })));
        assert!(matches!(parse("1 2"), Err(ParserError::Expected { position: 2, .. })));
        assert!(matches!(parse("a[0](1)"), Err(ParserError::InvalidCallTarget { position: 4 })));
        assert!(matches!(parse("in"), Err(ParserError::UnexpectedToken { position: 0, .. })));
        assert!(matches!(parse("a ? b"), Err(ParserError::UnexpectedEnd { .. })));
        assert!(matches!(parse("a."), Err(ParserError::UnexpectedEnd { position: 2 })));
        assert!(matches!(parse("* 2"), Err(ParserError::UnexpectedToken { position: 0, .. })));
    }

    #[test]
    fn test_parse_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse(&deep).is_ok());
        assert!(matches!(
            parse_with_max_depth(&deep, 20),
            Err(ParserError::TooDeep { max_depth: 20, .. })
        ));

        let bangs = format!("{}x", "!".repeat(10_000));
        assert!(matches!(parse(&bangs), Err(ParserError::TooDeep { .. })));
    }

    #[test]
    fn test_parse_depth_counts_flat_chains() {
        let sum = format!("x{}", " + 1".repeat(20_000));
        assert!(matches!(parse(&sum), Err(ParserError::TooDeep { .. })));

        let members = format!("x{}", ".a".repeat(20_000));
        assert!(matches!(parse(&members), Err(ParserError::TooDeep { .. })));

        let indexes = format!("x{}", "[0]".repeat(20_000));
        assert!(matches!(parse(&indexes), Err(ParserError::TooDeep { .. })));

        assert!(parse(&format!("x{}", " + 1".repeat(100))).is_ok());
        assert!(parse(&format!("x{}", ".a".repeat(100))).is_ok());
        assert!(matches!(
            parse_with_max_depth("a + b + c + d", 3),
            Err(ParserError::TooDeep { max_depth: 3, .. })
        ));
    }
}
