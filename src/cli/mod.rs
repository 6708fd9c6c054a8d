//! Command-line views over the formula engine and the portal

pub mod compute;
pub mod describe;
pub mod draft;
pub mod eval;
pub mod formulas;
pub mod rates;
pub mod setup;
pub mod ui;

use crate::core::form::parse_amount;
use crate::core::variable::Bindings;
use anyhow::{Result, anyhow};

/// Splits `name=value` arguments. The value may be empty.
pub fn parse_assignments(args: &[String]) -> Result<Vec<(String, String)>> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| anyhow!("Expected name=value, got: {}", arg))
        })
        .collect()
}

/// Builds bindings from `name=value` arguments. Values read like form inputs,
/// so blank or unparsable values count as zero.
pub fn parse_bindings(args: &[String]) -> Result<Bindings> {
    let pairs = parse_assignments(args)?;
    Ok(Bindings::from_pairs(
        pairs
            .iter()
            .map(|(name, value)| (name.as_str(), parse_amount(value))),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variable::Variable;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_bindings() {
        let bindings = parse_bindings(&args(&[
            "profit_l=50000",
            "expected_profit_pct = 15.5",
            "exchange_rate=",
            "investment=99",
        ]))
        .unwrap();

        assert_eq!(bindings.get(Variable::ProfitL), 50000.0);
        assert_eq!(bindings.get(Variable::ExpectedProfitPct), 15.5);
        assert!(bindings.is_bound(Variable::ExchangeRate));
        assert_eq!(bindings.get(Variable::ExchangeRate), 0.0);
        assert!(!bindings.is_bound(Variable::InvestmentL));
    }

    #[test]
    fn test_parse_assignments_requires_equals() {
        assert!(parse_assignments(&args(&["profit_l"])).is_err());
        assert!(parse_assignments(&args(&["=5"])).is_err());
        let pairs = parse_assignments(&args(&["notes=a=b"])).unwrap();
        assert_eq!(pairs, vec![("notes".to_string(), "a=b".to_string())]);
    }
}
