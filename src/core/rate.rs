//! Exchange rate abstractions

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Rate used when converting Lempiras into US dollars. The portal quotes it
/// as Lempiras per dollar.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    /// Decimal string as stored by the portal, e.g. "25.2500".
    pub rate: String,
    #[serde(default)]
    pub valid_from: Option<NaiveDateTime>,
    #[serde(default)]
    pub valid_to: Option<NaiveDateTime>,
}

impl ExchangeRate {
    pub fn value(&self) -> Result<f64> {
        let value: f64 = self
            .rate
            .trim()
            .parse()
            .with_context(|| format!("Invalid exchange rate: {}", self.rate))?;
        if !value.is_finite() || value <= 0.0 {
            anyhow::bail!("Exchange rate must be positive: {}", self.rate);
        }
        Ok(value)
    }
}

/// One audited rate change, as recorded when a new rate was published.
#[derive(Debug, Clone, Deserialize)]
pub struct RateChange {
    pub from_currency: String,
    pub to_currency: String,
    #[serde(default)]
    pub old_rate: Option<String>,
    pub new_rate: String,
    #[serde(default)]
    pub effective_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub changed_by: Option<String>,
    #[serde(default)]
    pub changed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Accepts `2024-07-01`, `2024-07-01 09:30:00` or `2024-07-01T09:30:00`.
/// A bare date means midnight.
pub fn parse_effective_date(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .with_context(|| format!("Invalid effective date: {raw}"))
}

/// A new HNL to USD rate, validated before it is sent.
#[derive(Debug, Clone, Serialize)]
pub struct RateUpdate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub effective_date: NaiveDateTime,
    pub reason: String,
}

impl RateUpdate {
    pub fn new(rate: f64, effective_date: &str, reason: &str) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            anyhow::bail!("Please enter a valid exchange rate");
        }
        if effective_date.trim().is_empty() {
            anyhow::bail!("Effective date is required");
        }
        let reason = reason.trim();
        if reason.is_empty() {
            anyhow::bail!("Reason for change is required");
        }
        Ok(Self {
            from_currency: "HNL".to_string(),
            to_currency: "USD".to_string(),
            rate,
            effective_date: parse_effective_date(effective_date)?,
            reason: reason.to_string(),
        })
    }
}

/// A stored rate joined with the audit record that introduced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RateEntry {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: String,
    pub valid_from: Option<NaiveDateTime>,
    pub valid_to: Option<NaiveDateTime>,
    pub changed_by: String,
    pub changed_at: Option<NaiveDateTime>,
    pub reason: Option<String>,
}

impl RateEntry {
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }
}

/// Joins each rate with the change whose effective date is the rate's start,
/// newest first. Rates without an audit record are attributed to `System`.
pub fn rate_ledger(rates: &[ExchangeRate], history: &[RateChange]) -> Vec<RateEntry> {
    let mut entries: Vec<RateEntry> = rates
        .iter()
        .map(|rate| {
            let change = history.iter().rev().find(|change| {
                change.from_currency == rate.from_currency
                    && change.to_currency == rate.to_currency
                    && change.effective_date == rate.valid_from
            });
            RateEntry {
                from_currency: rate.from_currency.clone(),
                to_currency: rate.to_currency.clone(),
                rate: rate.rate.clone(),
                valid_from: rate.valid_from,
                valid_to: rate.valid_to,
                changed_by: change
                    .and_then(|c| c.changed_by.clone())
                    .unwrap_or_else(|| "System".to_string()),
                changed_at: change.and_then(|c| c.changed_at).or(rate.valid_from),
                reason: change.and_then(|c| c.reason.clone()),
            }
        })
        .collect();
    entries.sort_by(|a, b| b.valid_from.cmp(&a.valid_from));
    entries
}

#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    async fn current_rate(&self) -> Result<ExchangeRate>;
    async fn all_rates(&self) -> Result<Vec<ExchangeRate>>;
    async fn rate_history(&self) -> Result<Vec<RateChange>>;
    async fn update_rate(&self, update: &RateUpdate) -> Result<ExchangeRate>;
}
