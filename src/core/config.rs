use crate::core::context::Language;
use crate::core::draft::AutosaveOptions;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_max_age_days() -> i64 {
    7
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Raw `Cookie` header value of an authenticated portal session.
    #[serde(default)]
    pub session_cookie: Option<String>,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        PortalConfig {
            base_url: default_base_url(),
            session_cookie: None,
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AutosaveConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    #[serde(default)]
    pub exclude_fields: Vec<String>,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        AutosaveConfig {
            debounce_ms: default_debounce_ms(),
            max_age_days: default_max_age_days(),
            exclude_fields: Vec::new(),
        }
    }
}

impl AutosaveConfig {
    pub fn options(&self) -> AutosaveOptions {
        AutosaveOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            max_age: chrono::Duration::days(self.max_age_days),
            exclude_fields: self.exclude_fields.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub language: Language,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "formulary", "formulary")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "formulary", "formulary")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
