// ============================================================================
// File: src/config.rs
// Configuration structures and validation
// ============================================================================

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::extract::{HostMatch, OfferPolicy, DEFAULT_PRICE_FLOOR};
use crate::llm_client::DEFAULT_API_BASE;
use crate::retailer::{default_retailers, Retailer};

/// Environment variables checked, in order, for the API key.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Main configuration structure loaded from config.json
#[derive(Deserialize, Serialize, Clone)]
pub struct Config {
    /// Gemini API key (overridden by GEMINI_API_KEY / API_KEY)
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the Gemini REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Model used for each kind of request
    #[serde(default)]
    pub models: ModelConfig,

    /// Offer validation and request limits
    #[serde(default)]
    pub search: SearchConfig,

    /// Retailers a scan can cover
    #[serde(default = "default_retailers")]
    pub retailers: Vec<Retailer>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    /// Search-grounded model that extracts offers
    #[serde(default = "default_extraction_model")]
    pub extraction: String,

    /// Conversational assistant
    #[serde(default = "default_chat_model")]
    pub chat: String,

    /// Low-latency model for the advisory tip
    #[serde(default = "default_tip_model")]
    pub tip: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Offers priced at or below this are dropped
    #[serde(default = "default_price_floor")]
    pub price_floor: f64,

    /// How an offer's URL host must relate to the retailer domain
    #[serde(default)]
    pub host_match: HostMatch,

    /// Upper bound for each model call; unset means wait indefinitely
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// tracing EnvFilter directive (e.g. "info", "ram_tracker=debug")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_extraction_model() -> String {
    "gemini-3-pro-preview".to_string()
}
fn default_chat_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_tip_model() -> String {
    "gemini-flash-lite-latest".to_string()
}
fn default_price_floor() -> f64 {
    DEFAULT_PRICE_FLOOR
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            extraction: default_extraction_model(),
            chat: default_chat_model(),
            tip: default_tip_model(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            price_floor: default_price_floor(),
            host_match: HostMatch::default(),
            request_timeout_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: default_api_base_url(),
            models: ModelConfig::default(),
            search: SearchConfig::default(),
            retailers: default_retailers(),
            logging: LoggingConfig::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("models", &self.models)
            .field("search", &self.search)
            .field("retailers", &self.retailers)
            .field("logging", &self.logging)
            .finish()
    }
}

impl Config {
    /// Reads `path` if it exists (defaults otherwise), applies the API key
    /// from the environment and validates the result.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let config_content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_json(&config_content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };

        if let Some(key) = API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        {
            config.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn offer_policy(&self) -> OfferPolicy {
        OfferPolicy {
            price_floor: self.search.price_floor,
            host_match: self.search.host_match,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(anyhow!(
                "Gemini API key is required (set api_key or {})",
                API_KEY_VARS.join(" / ")
            ));
        }

        if !self.search.price_floor.is_finite() || self.search.price_floor < 0.0 {
            return Err(anyhow!("price_floor must be a non-negative number"));
        }

        if self.search.request_timeout_secs == Some(0) {
            return Err(anyhow!("request_timeout_secs must be greater than zero"));
        }

        if self.retailers.is_empty() {
            return Err(anyhow!("At least one retailer is required"));
        }

        let mut seen = HashSet::new();
        for retailer in &self.retailers {
            if retailer.id.trim().is_empty() || retailer.domain.trim().is_empty() {
                return Err(anyhow!(
                    "Retailer '{}' needs both an id and a domain",
                    retailer.label
                ));
            }
            if !seen.insert(retailer.id.to_ascii_lowercase()) {
                return Err(anyhow!("Duplicate retailer id '{}'", retailer.id));
            }
        }

        for (kind, model) in [
            ("extraction", &self.models.extraction),
            ("chat", &self.models.chat),
            ("tip", &self.models.tip),
        ] {
            if model.trim().is_empty() {
                return Err(anyhow!("The {} model name must not be empty", kind));
            }
        }

        Ok(())
    }
}
