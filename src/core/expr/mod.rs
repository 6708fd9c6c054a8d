//! Arithmetic formula evaluation over the variable vocabulary.
//!
//! The grammar is closed: decimal literals, vocabulary variables, `+ - * /`,
//! unary sign and parentheses. Anything else is unevaluable.

mod lexer;
mod parser;

use crate::core::variable::{Bindings, Variable};
use parser::{Expr, Parser};
use thiserror::Error;
use tracing::debug;

/// Why an expression produced no result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnevaluableExpression {
    #[error("Unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Unbalanced parentheses")]
    UnbalancedParens,
    #[error("Empty expression")]
    Empty,
    #[error("Expression nested deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("Expression longer than {0} tokens")]
    TooLong(usize),
    #[error("Result is not a finite number")]
    NonFinite,
}

/// A parsed formula expression, reusable across binding sets.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Expr,
}

impl Expression {
    pub fn parse(input: &str) -> Result<Self, UnevaluableExpression> {
        let tokens = lexer::tokenize(input)?;
        let root = Parser::new(tokens).parse()?;
        Ok(Self { root })
    }

    pub fn eval(&self, bindings: &Bindings) -> Result<f64, UnevaluableExpression> {
        let value = self.root.eval(bindings);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(UnevaluableExpression::NonFinite)
        }
    }

    /// Distinct variables referenced, in order of first appearance.
    pub fn variables(&self) -> Vec<Variable> {
        let mut vars = Vec::new();
        self.root.collect_variables(&mut vars);
        vars
    }
}

/// Checks an expression against the grammar without evaluating it.
pub fn validate(expression: &str) -> Result<(), UnevaluableExpression> {
    Expression::parse(expression).map(|_| ())
}

pub fn try_evaluate(expression: &str, bindings: &Bindings) -> Result<f64, UnevaluableExpression> {
    Expression::parse(expression)?.eval(bindings)
}

/// Evaluates `expression`, returning `None` when it is unevaluable.
pub fn evaluate(expression: &str, bindings: &Bindings) -> Option<f64> {
    match try_evaluate(expression, bindings) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(expression, reason = %e, "Formula is unevaluable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_company_value_example() {
        let bindings = Bindings::new()
            .with(Variable::ProfitL, 50000.0)
            .with(Variable::ExpectedProfitPct, 15.5);
        let value = evaluate("profit_l / (expected_profit_pct / 100)", &bindings).unwrap();
        assert!(approx(value, 322580.65), "got {value}");
    }

    #[test]
    fn test_division_by_zero_is_unevaluable() {
        let bindings = Bindings::new()
            .with(Variable::InvestmentL, 75000.0)
            .with(Variable::ExchangeRate, 0.0);
        assert_eq!(evaluate("investment_l / exchange_rate", &bindings), None);
        assert_eq!(
            try_evaluate("investment_l / exchange_rate", &bindings),
            Err(UnevaluableExpression::NonFinite)
        );
        assert_eq!(evaluate("0 / 0", &Bindings::new()), None);
        // Only the final result must be finite.
        assert_eq!(evaluate("1 / (1 / 0)", &Bindings::new()), Some(0.0));
    }

    #[test]
    fn test_malformed_expression_is_unevaluable() {
        let bindings = Bindings::new().with(Variable::ProfitL, 10.0);
        assert_eq!(evaluate("profit_l + (", &bindings), None);
        assert!(try_evaluate("profit_l + (", &bindings).is_err());
    }

    #[test]
    fn test_zero_bindings_yield_zero_or_unevaluable() {
        let zero = Bindings::new();
        let expressions = [
            "profit_l + expected_profit_pct",
            "company_value_l * (investment_l - exchange_rate)",
            "-reported_shares",
            "profit_l / expected_profit_pct",
            "investment_l * exchange_rate / company_value_l",
        ];
        for expr in expressions {
            match evaluate(expr, &zero) {
                Some(v) => assert_eq!(v, 0.0, "{expr}"),
                None => assert_eq!(try_evaluate(expr, &zero), Err(UnevaluableExpression::NonFinite)),
            }
        }
    }

    #[test]
    fn test_longer_binding_name_is_not_corrupted() {
        let bindings = Bindings::from_pairs([
            ("investment", 999.0),
            ("investment_l", 75000.0),
            ("exchange_rate", 25.0),
        ]);
        assert_eq!(evaluate("investment_l / exchange_rate", &bindings), Some(3000.0));
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let bindings = Bindings::new()
            .with(Variable::CompanyValueL, 322580.65)
            .with(Variable::ExpectedProfitPct, 15.5);
        let expr = "company_value_l * (expected_profit_pct / 100)";
        assert_eq!(evaluate(expr, &bindings), evaluate(expr, &bindings));

        let parsed = Expression::parse(expr).unwrap();
        assert_eq!(parsed.eval(&bindings), parsed.eval(&bindings));
    }

    #[test]
    fn test_unbound_variable_defaults_to_zero() {
        let bindings = Bindings::new().with(Variable::InvestmentL, 100.0);
        assert_eq!(evaluate("investment_l + reported_shares", &bindings), Some(100.0));
    }

    #[test]
    fn test_code_is_not_executed() {
        let bindings = Bindings::new();
        for expr in [
            "constructor",
            "profit_l.constructor",
            "(() => 1)()",
            "process",
            "1; 2",
            "\"1\" + 1",
        ] {
            assert_eq!(evaluate(expr, &bindings), None, "{expr}");
        }
    }

    #[test]
    fn test_long_expression_is_unevaluable_not_fatal() {
        let bindings = Bindings::new().with(Variable::ProfitL, 2.0);
        let chain = vec!["profit_l"; 60_000].join(" - ");
        assert_eq!(evaluate(&chain, &bindings), None);
        assert!(validate(&chain).is_err());
    }

    #[test]
    fn test_validate_and_variables() {
        assert!(validate("investment_l / exchange_rate").is_ok());
        assert!(validate("investment_l /").is_err());

        let parsed = Expression::parse("profit_l / (expected_profit_pct / 100)").unwrap();
        assert_eq!(
            parsed.variables(),
            vec![Variable::ProfitL, Variable::ExpectedProfitPct]
        );
    }
}
