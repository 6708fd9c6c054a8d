use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::config::PortalConfig;
use crate::core::context::{ANONYMOUS, SessionInfo, SessionProvider};
use crate::core::form::FormType;
use crate::core::formula::{
    FormulaChange, FormulaProvider, FormulaRecord, FormulaSet, FormulaUpdate, FormulaVersion,
    VersionBump,
};
use crate::core::rate::{ExchangeRate, ExchangeRateProvider, RateChange, RateUpdate};
use crate::providers::util::with_retry;

/// REST client for the equity portal. Formula sets are cached per form type
/// for as long as the client lives.
pub struct PortalClient {
    base_url: Url,
    client: reqwest::Client,
    retries: usize,
    retry_delay_ms: u64,
    formula_cache: Arc<Cache<FormType, FormulaSet>>,
}

impl PortalClient {
    pub fn new(
        config: &PortalConfig,
        formula_cache: Arc<Cache<FormType, FormulaSet>>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie).context("Invalid session cookie")?;
            headers.insert(COOKIE, value);
        }
        let client = reqwest::Client::builder()
            .user_agent("formulary/0.1")
            .default_headers(headers)
            .build()?;

        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid portal URL: {}", config.base_url))?;

        Ok(PortalClient {
            base_url,
            client,
            retries: config.retries,
            retry_delay_ms: config.retry_delay_ms,
            formula_cache,
        })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Portal URL cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!("Requesting {}", url);

        let response = with_retry(
            || self.client.get(url.clone()).send(),
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .map_err(|e| anyhow!("Request error: {} URL: {}", e, url))?;

        read_envelope(response).await
    }
}

/// Unwraps the portal's `{ok|success, error?, message?}` envelope. A non-2xx
/// status or a false flag fails with `error`, then `message`, then the status.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;
    debug!(%status, body = %text, "Received portal response");

    let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    check_envelope(status, &value)?;
    serde_json::from_value(value).context("Failed to parse portal response")
}

fn check_envelope(status: StatusCode, value: &Value) -> Result<()> {
    let flag = value
        .get("ok")
        .or_else(|| value.get("success"))
        .and_then(Value::as_bool);
    if status.is_success() && flag != Some(false) {
        return Ok(());
    }

    let message = ["error", "message"]
        .iter()
        .find_map(|field| value.get(field).and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());
    Err(anyhow!("Portal request failed: {}", message))
}

#[derive(Deserialize, Debug)]
struct FormFormulasResponse {
    formulas: FormulaSet,
}

#[derive(Deserialize, Debug)]
struct ActiveFormulasResponse {
    formulas: Vec<FormulaRecord>,
}

#[derive(Deserialize, Debug)]
struct VersionsResponse {
    history: Vec<FormulaVersion>,
}

#[derive(Deserialize, Debug)]
struct ChangeLogResponse {
    history: Vec<FormulaChange>,
}

#[derive(Deserialize, Debug)]
struct RateResponse {
    rate: ExchangeRate,
}

#[derive(Deserialize, Debug)]
struct AllRatesResponse {
    #[serde(default)]
    rates: Vec<ExchangeRate>,
}

#[derive(Deserialize, Debug)]
struct RateHistoryResponse {
    #[serde(default)]
    history: Vec<RateChange>,
}

#[async_trait]
impl FormulaProvider for PortalClient {
    #[instrument(name = "FormulaFetch", skip(self), fields(form = %form))]
    async fn fetch_for_form(&self, form: FormType) -> Result<FormulaSet> {
        if let Some(cached) = self.formula_cache.get(&form).await {
            return Ok(cached);
        }

        let data: FormFormulasResponse = self
            .get_json(&["api", "equity", "formulas", "for-form", form.as_str()])
            .await?;
        self.formula_cache.put(form, data.formulas.clone()).await;
        Ok(data.formulas)
    }

    async fn fetch_active(&self) -> Result<Vec<FormulaRecord>> {
        let data: ActiveFormulasResponse = self.get_json(&["api", "equity", "formulas"]).await?;
        Ok(data.formulas)
    }

    #[instrument(name = "FormulaHistory", skip(self))]
    async fn fetch_history(&self, formula_key: &str) -> Result<Vec<FormulaVersion>> {
        let data: VersionsResponse = self
            .get_json(&["api", "equity", "formulas", "history", formula_key])
            .await?;
        Ok(data.history)
    }

    async fn fetch_change_log(&self) -> Result<Vec<FormulaChange>> {
        let data: ChangeLogResponse = self
            .get_json(&["api", "equity", "formulas", "all-history"])
            .await?;
        Ok(data.history)
    }

    /// Sent once; a revision is not idempotent.
    #[instrument(name = "FormulaUpdate", skip(self, update))]
    async fn update(&self, formula_key: &str, update: &FormulaUpdate) -> Result<VersionBump> {
        let url = self.endpoint(&["api", "equity", "formulas", "update", formula_key])?;
        debug!("Submitting formula update to {}", url);

        let response = self
            .client
            .put(url.clone())
            .json(update)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} URL: {}", e, url))?;
        let bump: VersionBump = read_envelope(response).await?;

        self.formula_cache.clear().await;
        Ok(bump)
    }
}

#[async_trait]
impl ExchangeRateProvider for PortalClient {
    async fn current_rate(&self) -> Result<ExchangeRate> {
        let data: RateResponse = self.get_json(&["api", "fx-rates", "current"]).await?;
        Ok(data.rate)
    }

    async fn all_rates(&self) -> Result<Vec<ExchangeRate>> {
        let data: AllRatesResponse = self.get_json(&["api", "fx-rates", "all"]).await?;
        Ok(data.rates)
    }

    async fn rate_history(&self) -> Result<Vec<RateChange>> {
        let data: RateHistoryResponse = self.get_json(&["api", "fx-rates", "history"]).await?;
        Ok(data.history)
    }

    /// Sent once, like formula updates.
    #[instrument(name = "RateUpdate", skip(self, update), fields(rate = update.rate))]
    async fn update_rate(&self, update: &RateUpdate) -> Result<ExchangeRate> {
        let url = self.endpoint(&["api", "fx-rates", "update"])?;
        debug!("Submitting exchange rate update to {}", url);

        let response = self
            .client
            .post(url.clone())
            .json(update)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} URL: {}", e, url))?;
        let data: RateResponse = read_envelope(response).await?;
        Ok(data.rate)
    }
}

#[async_trait]
impl SessionProvider for PortalClient {
    async fn user_key(&self) -> String {
        match self
            .get_json::<SessionInfo>(&["api", "auth", "check-session"])
            .await
        {
            Ok(info) => info.user_key(),
            Err(err) => {
                debug!("Session check failed, using anonymous: {}", err);
                ANONYMOUS.to_string()
            }
        }
    }
}
