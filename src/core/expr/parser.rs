use super::UnevaluableExpression;
use super::lexer::Token;
use crate::core::variable::{Bindings, Variable};

/// Nesting beyond this depth is rejected rather than recursed into.
const MAX_DEPTH: usize = 64;

/// Binary chains are built left-deep, so the token count bounds the depth of
/// the tree that `eval` and `Drop` recurse through.
const MAX_TOKENS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(Variable),
    Neg(Box<Expr>),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Evaluates the tree with IEEE-754 semantics. Division by zero yields an
    /// infinity or NaN here; the caller decides what a non-finite result means.
    pub fn eval(&self, bindings: &Bindings) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Variable(v) => bindings.get(*v),
            Expr::Neg(inner) => -inner.eval(bindings),
            Expr::BinaryOp { left, op, right } => {
                let l = left.eval(bindings);
                let r = right.eval(bindings);
                match op {
                    BinaryOperator::Add => l + r,
                    BinaryOperator::Sub => l - r,
                    BinaryOperator::Mul => l * r,
                    BinaryOperator::Div => l / r,
                }
            }
        }
    }

    pub fn collect_variables(&self, out: &mut Vec<Variable>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Expr::Neg(inner) => inner.collect_variables(out),
            Expr::BinaryOp { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn current(&self) -> Token {
        self.tokens.get(self.pos).copied().unwrap_or(Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Parses a complete expression; trailing tokens are an error.
    pub fn parse(mut self) -> Result<Expr, UnevaluableExpression> {
        if self.current() == Token::Eof {
            return Err(UnevaluableExpression::Empty);
        }
        if self.tokens.len() > MAX_TOKENS {
            return Err(UnevaluableExpression::TooLong(MAX_TOKENS));
        }
        let expr = self.parse_additive()?;
        match self.current() {
            Token::Eof => Ok(expr),
            Token::RParen => Err(UnevaluableExpression::UnbalancedParens),
            other => Err(UnevaluableExpression::UnexpectedToken(other.to_string())),
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, UnevaluableExpression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, UnevaluableExpression> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current() {
                Token::Star => BinaryOperator::Mul,
                Token::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, UnevaluableExpression> {
        match self.current() {
            Token::Minus => {
                self.advance();
                let inner = self.nested(Self::parse_unary)?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Token::Plus => {
                self.advance();
                self.nested(Self::parse_unary)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, UnevaluableExpression> {
        let expr = match self.current() {
            Token::Number(n) => {
                self.advance();
                Expr::Number(n)
            }
            Token::Variable(v) => {
                self.advance();
                Expr::Variable(v)
            }
            Token::LParen => {
                self.advance();
                let inner = self.nested(Self::parse_additive)?;
                if self.current() != Token::RParen {
                    return Err(match self.current() {
                        Token::Eof => UnevaluableExpression::UnbalancedParens,
                        other => UnevaluableExpression::UnexpectedToken(other.to_string()),
                    });
                }
                self.advance();
                inner
            }
            Token::Eof => return Err(UnevaluableExpression::UnexpectedEnd),
            Token::RParen => return Err(UnevaluableExpression::UnbalancedParens),
            other => return Err(UnevaluableExpression::UnexpectedToken(other.to_string())),
        };

        Ok(expr)
    }

    fn nested(
        &mut self,
        rule: fn(&mut Self) -> Result<Expr, UnevaluableExpression>,
    ) -> Result<Expr, UnevaluableExpression> {
        if self.depth >= MAX_DEPTH {
            return Err(UnevaluableExpression::NestingTooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }
}
