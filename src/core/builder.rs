//! Component view of a formula for display and in-place editing

use crate::core::expr;
use crate::core::variable::{Bindings, Variable};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Open,
    Close,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Open,
        Operator::Close,
    ];

    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
            Operator::Open => '(',
            Operator::Close => ')',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        Operator::ALL.into_iter().find(|op| op.symbol() == c)
    }
}

impl FromStr for Operator {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Operator::from_char(c).ok_or_else(|| BuilderError::InvalidOperator(s.to_string()))
            }
            _ => Err(BuilderError::InvalidOperator(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Variable(Variable),
    Operator(Operator),
    /// Kept as typed so editing does not reformat the literal.
    Number(String),
}

impl Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Component::Variable(v) => write!(f, "{v}"),
            Component::Operator(op) => write!(f, "{}", op.symbol()),
            Component::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuilderError {
    #[error("No component at position {0}")]
    OutOfRange(usize),
    #[error("Variables cannot be reassigned (position {0})")]
    VariableLocked(usize),
    #[error("Position {0} does not hold {1}")]
    WrongKind(usize, &'static str),
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

/// Editable sequence of formula components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulaBuilder {
    components: Vec<Component>,
}

impl FormulaBuilder {
    /// Splits an expression into components. Identifiers outside the
    /// vocabulary and stray characters are dropped.
    pub fn parse(expression: &str) -> Self {
        let chars: Vec<char> = expression.chars().collect();
        let mut components = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c.is_ascii_alphabetic() || c == '_' {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphabetic() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                if let Ok(variable) = ident.parse::<Variable>() {
                    components.push(Component::Variable(variable));
                }
                continue;
            }
            if c.is_ascii_digit() {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i < chars.len() && chars[i] == '.' {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                components.push(Component::Number(chars[start..i].iter().collect()));
                continue;
            }
            if let Some(op) = Operator::from_char(c) {
                components.push(Component::Operator(op));
            }
            i += 1;
        }

        Self { components }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn set_operator(&mut self, index: usize, op: Operator) -> Result<(), BuilderError> {
        match self.components.get_mut(index) {
            Some(Component::Operator(slot)) => {
                *slot = op;
                Ok(())
            }
            Some(Component::Variable(_)) => Err(BuilderError::VariableLocked(index)),
            Some(Component::Number(_)) => Err(BuilderError::WrongKind(index, "an operator")),
            None => Err(BuilderError::OutOfRange(index)),
        }
    }

    pub fn set_number(&mut self, index: usize, literal: &str) -> Result<(), BuilderError> {
        let literal = literal.trim();
        if literal.parse::<f64>().map_or(true, |v| !v.is_finite()) {
            return Err(BuilderError::InvalidNumber(literal.to_string()));
        }
        match self.components.get_mut(index) {
            Some(Component::Number(slot)) => {
                *slot = literal.to_string();
                Ok(())
            }
            Some(Component::Variable(_)) => Err(BuilderError::VariableLocked(index)),
            Some(Component::Operator(_)) => Err(BuilderError::WrongKind(index, "a number")),
            None => Err(BuilderError::OutOfRange(index)),
        }
    }

    /// Flat expression with components separated by single spaces.
    pub fn expression(&self) -> String {
        self.components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn preview(&self, bindings: &Bindings) -> Option<f64> {
        expr::evaluate(&self.expression(), bindings)
    }
}

/// Distinct vocabulary variables used by `expression` with their meanings.
pub fn describe_variables(expression: &str) -> Vec<(Variable, &'static str)> {
    let mut seen = Vec::new();
    for component in FormulaBuilder::parse(expression).components() {
        if let Component::Variable(v) = component {
            if !seen.contains(v) {
                seen.push(*v);
            }
        }
    }
    seen.into_iter().map(|v| (v, v.description())).collect()
}
