//! Forms with computed fields and their recalculation chain

use crate::core::expr;
use crate::core::formula::FormulaSet;
use crate::core::variable::{Bindings, Variable};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Profit,
    Matching,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::Profit => "profit",
            FormType::Matching => "matching",
        }
    }

    /// Identifier used for the form's draft storage key.
    pub fn form_id(&self) -> &'static str {
        match self {
            FormType::Profit => "profit-form",
            FormType::Matching => "matching-form",
        }
    }

    /// Variables the user types in directly.
    pub fn inputs(&self) -> &'static [Variable] {
        match self {
            FormType::Profit => &[
                Variable::ProfitL,
                Variable::ExpectedProfitPct,
                Variable::ExchangeRate,
            ],
            FormType::Matching => &[
                Variable::ReportedShares,
                Variable::InvestmentL,
                Variable::ExchangeRate,
            ],
        }
    }

    /// Computed fields in evaluation order.
    pub fn computed_fields(&self) -> &'static [ComputedField] {
        match self {
            FormType::Profit => &[
                ComputedField::CompanyValueL,
                ComputedField::InvestmentL,
                ComputedField::InvestmentUsd,
            ],
            FormType::Matching => &[ComputedField::InvestmentUsd],
        }
    }
}

impl Display for FormType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FormType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profit" => Ok(FormType::Profit),
            "matching" => Ok(FormType::Matching),
            _ => Err(anyhow::anyhow!("Invalid form type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputedField {
    CompanyValueL,
    InvestmentL,
    InvestmentUsd,
}

impl ComputedField {
    pub fn key(&self) -> &'static str {
        match self {
            ComputedField::CompanyValueL => "company_value_l",
            ComputedField::InvestmentL => "investment_l",
            ComputedField::InvestmentUsd => "investment_usd",
        }
    }

    /// The variable later formulas read this field through, if any.
    pub fn feeds(&self) -> Option<Variable> {
        match self {
            ComputedField::CompanyValueL => Some(Variable::CompanyValueL),
            ComputedField::InvestmentL => Some(Variable::InvestmentL),
            ComputedField::InvestmentUsd => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedValue {
    pub field: ComputedField,
    pub expression: String,
    /// `None` leaves the field blank.
    pub value: Option<f64>,
}

impl ComputedValue {
    pub fn display(&self) -> String {
        self.value.map(to_fixed_2).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Recalculation {
    pub values: Vec<ComputedValue>,
    pub bindings: Bindings,
}

impl Recalculation {
    pub fn value_of(&self, field: ComputedField) -> Option<f64> {
        self.values
            .iter()
            .find(|v| v.field == field)
            .and_then(|v| v.value)
    }
}

/// Recomputes every computed field of `form` that has a formula.
///
/// Computed fields that double as variables start from zero and are fed
/// forward as they resolve. Unevaluable or non-positive results blank the
/// field.
pub fn recalculate(form: FormType, formulas: &FormulaSet, mut bindings: Bindings) -> Recalculation {
    for field in form.computed_fields() {
        if let Some(variable) = field.feeds() {
            bindings.set(variable, 0.0);
        }
    }

    let mut values = Vec::new();
    for field in form.computed_fields() {
        let Some(formula) = formulas.get(field.key()) else {
            debug!(form = %form, field = field.key(), "No formula for computed field");
            continue;
        };

        let value = expr::evaluate(&formula.expression, &bindings).filter(|v| *v > 0.0);
        if let (Some(v), Some(variable)) = (value, field.feeds()) {
            bindings.set(variable, v);
        }
        values.push(ComputedValue {
            field: *field,
            expression: formula.expression.clone(),
            value,
        });
    }

    Recalculation { values, bindings }
}

/// Parses a raw numeric input. Blank or unparsable input reads as zero.
pub fn parse_amount(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Formats with two decimals, rounding half away from zero.
pub fn to_fixed_2(value: f64) -> String {
    match Decimal::from_f64(value) {
        Some(d) => {
            let rounded = d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            format!("{:.2}", rounded.to_f64().unwrap_or(value))
        }
        None => format!("{value:.2}"),
    }
}
