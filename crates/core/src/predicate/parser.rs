//! Parser for notification predicates.
//!
//! Produces a [`Program`]: a list of statements whose last one yields the
//! predicate's value. No evaluation happens here.

use super::lexer::{Spanned, Token};
use super::PredicateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(serde_json::Value),
    Name {
        name: String,
        line: u32,
    },
    List(Vec<Expr>),
    Attr {
        target: Box<Expr>,
        field: String,
        line: u32,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        line: u32,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { name: String, value: Expr },
    Expr(Expr),
}

/// A parsed predicate: statements in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// Words that cannot be used as binding names.
const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "true", "false", "null", "True", "False", "None",
];

/// Deepest expression nesting the parser accepts.
///
/// Counts parentheses, brackets, `not` prefixes and chained operators, so
/// the resulting tree stays shallow enough for the recursive evaluator.
const MAX_NESTING: usize = 64;

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn descend(&mut self) -> Result<(), PredicateError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.err("expression nested too deeply"));
        }
        Ok(())
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn err(&self, msg: impl Into<String>) -> PredicateError {
        PredicateError::syntax(self.cur_line(), msg)
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), PredicateError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {}, got {:?}", what, self.peek())))
        }
    }

    fn skip_separators(&mut self) {
        while *self.peek() == Token::Sep {
            self.advance();
        }
    }

    // -- Statements ----------------------------------------------

    fn parse_program(&mut self) -> Result<Program, PredicateError> {
        let mut statements = Vec::new();
        self.skip_separators();
        while *self.peek() != Token::Eof {
            statements.push(self.parse_statement()?);
            match self.peek() {
                Token::Sep => self.skip_separators(),
                Token::Eof => break,
                other => {
                    return Err(self.err(format!("expected end of statement, got {:?}", other)))
                }
            }
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Stmt, PredicateError> {
        let is_assignment = *self.peek_at(1) == Token::Assign;
        if let (Token::Word(name), true) = (self.peek().clone(), is_assignment) {
            if KEYWORDS.contains(&name.as_str()) {
                return Err(self.err(format!("cannot assign to keyword '{}'", name)));
            }
            self.advance();
            self.advance();
            let value = self.parse_expr()?;
            return Ok(Stmt::Assign { name, value });
        }
        Ok(Stmt::Expr(self.parse_expr()?))
    }

    // -- Expressions ---------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, PredicateError> {
        self.descend()?;
        let expr = self.parse_or_expr()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_or_expr(&mut self) -> Result<Expr, PredicateError> {
        let base = self.depth;
        let mut left = self.parse_and_expr()?;
        while self.is_word("or") {
            self.advance();
            self.descend()?;
            let right = self.parse_and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, PredicateError> {
        let base = self.depth;
        let mut left = self.parse_not_expr()?;
        while self.is_word("and") {
            self.advance();
            self.descend()?;
            let right = self.parse_not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, PredicateError> {
        if self.is_word("not") {
            self.advance();
            self.descend()?;
            let e = self.parse_not_expr()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(e)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, PredicateError> {
        let left = self.parse_operand()?;
        let line = self.cur_line();
        let op = match self.peek().clone() {
            Token::Eq => CompareOp::Eq,
            Token::Neq => CompareOp::Neq,
            Token::Lt => CompareOp::Lt,
            Token::Lte => CompareOp::Lte,
            Token::Gt => CompareOp::Gt,
            Token::Gte => CompareOp::Gte,
            Token::Word(w) if w == "in" => CompareOp::In,
            Token::Word(w) if w == "not" && matches!(self.peek_at(1), Token::Word(x) if x == "in") => {
                self.advance();
                CompareOp::NotIn
            }
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_operand()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
            line,
        })
    }

    fn parse_operand(&mut self) -> Result<Expr, PredicateError> {
        let base = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    let line = self.cur_line();
                    self.advance();
                    self.descend()?;
                    let field = match self.peek().clone() {
                        Token::Word(w) => {
                            self.advance();
                            w
                        }
                        other => {
                            return Err(self.err(format!(
                                "expected field name after '.', got {:?}",
                                other
                            )))
                        }
                    };
                    expr = Expr::Attr {
                        target: Box::new(expr),
                        field,
                        line,
                    };
                }
                Token::LBracket => {
                    let line = self.cur_line();
                    self.advance();
                    self.descend()?;
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        line,
                    };
                }
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, PredicateError> {
        let line = self.cur_line();
        match self.peek().clone() {
            Token::Int(n) => {
                self.advance();
                Ok(Expr::Literal(serde_json::json!(n)))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Expr::Literal(serde_json::json!(f)))
            }
            Token::Minus => {
                self.advance();
                match self.peek().clone() {
                    Token::Int(n) => {
                        self.advance();
                        Ok(Expr::Literal(serde_json::json!(-n)))
                    }
                    Token::Float(f) => {
                        self.advance();
                        Ok(Expr::Literal(serde_json::json!(-f)))
                    }
                    other => Err(self.err(format!(
                        "'-' must be followed by a number, got {:?}",
                        other
                    ))),
                }
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(serde_json::Value::String(s)))
            }
            Token::Word(w) => {
                self.advance();
                match w.as_str() {
                    "true" | "True" => Ok(Expr::Literal(serde_json::Value::Bool(true))),
                    "false" | "False" => Ok(Expr::Literal(serde_json::Value::Bool(false))),
                    "null" | "None" => Ok(Expr::Literal(serde_json::Value::Null)),
                    "and" | "or" | "not" | "in" => {
                        Err(PredicateError::syntax(line, format!("unexpected keyword '{}'", w)))
                    }
                    _ => Ok(Expr::Name { name: w, line }),
                }
            }
            Token::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(e)
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if *self.peek() != Token::RBracket {
                    loop {
                        items.push(self.parse_expr()?);
                        if *self.peek() == Token::Comma {
                            self.advance();
                            // trailing comma
                            if *self.peek() == Token::RBracket {
                                break;
                            }
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            other => Err(self.err(format!("expected expression, got {:?}", other))),
        }
    }
}

/// Parse a token stream into a program.
pub fn parse(tokens: &[Spanned]) -> Result<Program, PredicateError> {
    Parser::new(tokens).parse_program()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
