//! Versioned formulas and the abstractions for fetching and revising them

use crate::core::form::FormType;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn first_version() -> u32 {
    1
}

/// The expression deriving one computed field. A revision produces a new
/// `Formula`; an existing one is never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub formula_key: String,
    pub expression: String,
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default)]
    pub effective_from: Option<NaiveDateTime>,
}

impl Formula {
    pub fn revise(&self, expression: &str, effective_from: NaiveDateTime) -> Result<Formula> {
        let version = self.version.checked_add(1).ok_or_else(|| {
            anyhow::anyhow!(
                "Formula {} has no version after {}",
                self.formula_key,
                self.version
            )
        })?;
        Ok(Formula {
            formula_key: self.formula_key.clone(),
            expression: expression.to_string(),
            version,
            effective_from: Some(effective_from),
        })
    }
}

/// Active formulas for one form, keyed by computed-field key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormulaSet(BTreeMap<String, Formula>);

impl FormulaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field_key: &str) -> Option<&Formula> {
        self.0.get(field_key)
    }

    pub fn insert(&mut self, field_key: &str, formula: Formula) {
        self.0.insert(field_key.to_string(), formula);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Formula)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An active formula as listed by the formula manager.
#[derive(Debug, Clone, Deserialize)]
pub struct FormulaRecord {
    pub formula_id: i64,
    pub formula_key: String,
    #[serde(default)]
    pub field_label: Option<String>,
    pub expression: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default)]
    pub effective_from: Option<NaiveDateTime>,
}

impl FormulaRecord {
    /// Form label derived from the key prefix, e.g. `profit_investment_usd` -> `Profit`.
    pub fn form_label(&self) -> String {
        match self.formula_key.split_once('_') {
            Some((prefix, _)) => {
                let mut chars = prefix.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => "Unknown".to_string(),
                }
            }
            None => "Unknown".to_string(),
        }
    }
}

impl From<&FormulaRecord> for Formula {
    fn from(record: &FormulaRecord) -> Self {
        Formula {
            formula_key: record.formula_key.clone(),
            expression: record.expression.clone(),
            version: record.version,
            effective_from: record.effective_from,
        }
    }
}

/// One stored version of a formula.
#[derive(Debug, Clone, Deserialize)]
pub struct FormulaVersion {
    pub version: u32,
    pub expression: String,
    #[serde(default)]
    pub effective_from: Option<NaiveDateTime>,
    #[serde(default)]
    pub effective_to: Option<NaiveDateTime>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

/// One audited formula change across all formulas.
#[derive(Debug, Clone, Deserialize)]
pub struct FormulaChange {
    pub formula_key: String,
    #[serde(default)]
    pub field_label: Option<String>,
    pub old_expression: String,
    pub new_expression: String,
    pub old_version: u32,
    pub new_version: u32,
    pub changed_by: String,
    #[serde(default)]
    pub changed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub change_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormulaUpdate {
    pub expression: String,
    pub description: String,
    pub reason: String,
}

impl FormulaUpdate {
    /// Trims inputs and rejects edits the backend would refuse, plus any
    /// expression outside the formula grammar.
    pub fn new(expression: &str, description: &str, reason: &str) -> Result<Self> {
        let expression = expression.trim();
        let reason = reason.trim();
        if expression.is_empty() {
            anyhow::bail!("Formula expression is required");
        }
        if reason.is_empty() {
            anyhow::bail!("Reason for change is required");
        }
        crate::core::expr::validate(expression)
            .map_err(|e| anyhow::anyhow!("Invalid formula expression: {e}"))?;
        Ok(Self {
            expression: expression.to_string(),
            description: description.trim().to_string(),
            reason: reason.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VersionBump {
    pub old_version: u32,
    pub new_version: u32,
}

#[async_trait]
pub trait FormulaProvider: Send + Sync {
    async fn fetch_for_form(&self, form: FormType) -> Result<FormulaSet>;
    async fn fetch_active(&self) -> Result<Vec<FormulaRecord>>;
    async fn fetch_history(&self, formula_key: &str) -> Result<Vec<FormulaVersion>>;
    async fn fetch_change_log(&self) -> Result<Vec<FormulaChange>>;
    async fn update(&self, formula_key: &str, update: &FormulaUpdate) -> Result<VersionBump>;
}
