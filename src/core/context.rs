//! Per-request user and language context

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
}

impl Language {
    pub fn pick<'a>(&self, en: &'a str, es: &'a str) -> &'a str {
        match self {
            Language::En => en,
            Language::Es => es,
        }
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" => Ok(Language::En),
            "es" => Ok(Language::Es),
            _ => Err(anyhow::anyhow!("Unsupported language: {}", s)),
        }
    }
}

/// Identity of the signed-in user as reported by the portal session check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
}

impl SessionInfo {
    /// Email, then username, then user id; anonymous when none is present.
    pub fn user_key(&self) -> String {
        let non_empty = |s: &Option<String>| {
            s.as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_lowercase)
        };

        if let Some(email) = non_empty(&self.email) {
            return email;
        }
        if let Some(username) = non_empty(&self.username) {
            return username;
        }
        match &self.user_id {
            Some(serde_json::Value::String(id)) if !id.is_empty() => id.clone(),
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => ANONYMOUS.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_key: String,
    pub language: Language,
}

impl SessionContext {
    pub fn new(user_key: impl Into<String>, language: Language) -> Self {
        Self {
            user_key: user_key.into(),
            language,
        }
    }

    pub fn anonymous(language: Language) -> Self {
        Self::new(ANONYMOUS, language)
    }
}

impl Display for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.user_key, self.language)
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Never fails; an unreachable session endpoint yields the anonymous key.
    async fn user_key(&self) -> String;
}
