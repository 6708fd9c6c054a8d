//! Formula variable vocabulary and binding sets

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

/// A named input a formula may reference. The vocabulary is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    ProfitL,
    ExpectedProfitPct,
    CompanyValueL,
    InvestmentL,
    ExchangeRate,
    ReportedShares,
}

impl Variable {
    pub const ALL: [Variable; 6] = [
        Variable::ProfitL,
        Variable::ExpectedProfitPct,
        Variable::CompanyValueL,
        Variable::InvestmentL,
        Variable::ExchangeRate,
        Variable::ReportedShares,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::ProfitL => "profit_l",
            Variable::ExpectedProfitPct => "expected_profit_pct",
            Variable::CompanyValueL => "company_value_l",
            Variable::InvestmentL => "investment_l",
            Variable::ExchangeRate => "exchange_rate",
            Variable::ReportedShares => "reported_shares",
        }
    }

    /// Plain-language meaning shown next to formulas.
    pub fn description(&self) -> &'static str {
        match self {
            Variable::ProfitL => {
                "The actual profit amount earned by the company, measured in Honduran Lempiras (L)"
            }
            Variable::ExpectedProfitPct => {
                "The expected profit percentage the company should make"
            }
            Variable::CompanyValueL => {
                "The total estimated worth of the company in Honduran Lempiras (L)"
            }
            Variable::InvestmentL => {
                "The amount of money invested in the company, in Honduran Lempiras (L)"
            }
            Variable::ExchangeRate => {
                "The conversion rate from Honduran Lempiras (L) to US Dollars ($)"
            }
            Variable::ReportedShares => "The number of shares reported by the partner company",
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Variable {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variable::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown variable: {}", s))
    }
}

/// Current numeric values available to a formula.
///
/// Reads of an unbound variable yield `0.0`, and non-finite values are stored
/// as `0.0`, so evaluation always sees a finite input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: HashMap<Variable, f64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a binding set from raw name/value pairs. Names outside the
    /// vocabulary are dropped.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut bindings = Self::new();
        for (name, value) in pairs {
            match name.parse::<Variable>() {
                Ok(variable) => bindings.set(variable, value),
                Err(_) => debug!(name, "Ignoring binding outside the variable vocabulary"),
            }
        }
        bindings
    }

    pub fn set(&mut self, variable: Variable, value: f64) {
        let value = if value.is_finite() { value } else { 0.0 };
        self.values.insert(variable, value);
    }

    pub fn with(mut self, variable: Variable, value: f64) -> Self {
        self.set(variable, value);
        self
    }

    pub fn get(&self, variable: Variable) -> f64 {
        self.values.get(&variable).copied().unwrap_or(0.0)
    }

    pub fn is_bound(&self, variable: Variable) -> bool {
        self.values.contains_key(&variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_round_trips_through_name() {
        for variable in Variable::ALL {
            assert_eq!(variable.as_str().parse::<Variable>().unwrap(), variable);
        }
        assert!("investment".parse::<Variable>().is_err());
        assert!("PROFIT_L".parse::<Variable>().is_err());
    }

    #[test]
    fn test_unbound_and_non_finite_read_as_zero() {
        let mut bindings = Bindings::new();
        assert_eq!(bindings.get(Variable::ProfitL), 0.0);

        bindings.set(Variable::ProfitL, f64::NAN);
        assert_eq!(bindings.get(Variable::ProfitL), 0.0);
        bindings.set(Variable::ExchangeRate, f64::INFINITY);
        assert_eq!(bindings.get(Variable::ExchangeRate), 0.0);
        assert!(bindings.is_bound(Variable::ExchangeRate));
    }

    #[test]
    fn test_from_pairs_ignores_unknown_names() {
        let bindings = Bindings::from_pairs([("investment", 999.0), ("investment_l", 75000.0)]);
        assert_eq!(bindings.get(Variable::InvestmentL), 75000.0);
        assert!(!bindings.is_bound(Variable::ExchangeRate));
    }
}
