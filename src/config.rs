use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::energy::DEFAULT_MIN_DAILY_CALORIES;
use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub firebase: FirebaseConfig,
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub energy: EnergyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FirebaseConfig {
    /// Public Web API key of the Firebase project
    #[serde(default)]
    pub api_key: String,
    pub project_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnergyConfig {
    /// Lowest intake a deficit may produce (kcal/day)
    #[serde(default = "default_min_daily_calories")]
    pub min_daily_calories: i64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            min_daily_calories: default_min_daily_calories(),
        }
    }
}

fn default_min_daily_calories() -> i64 {
    DEFAULT_MIN_DAILY_CALORIES
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (NUTRISCAN__GEMINI__API_KEY, etc.)
    /// 2. Config file specified by path, NUTRISCAN_CONFIG, or ./nutriscan.toml
    /// 3. Hardcoded defaults
    pub fn load(config_path: Option<String>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder()
            .set_default("firebase.project_id", "eaty-cd6c6")?
            .set_default("gemini.model", DEFAULT_MODEL)?
            .set_default("gemini.base_url", DEFAULT_BASE_URL)?
            .set_default("energy.min_daily_calories", DEFAULT_MIN_DAILY_CALORIES)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        let config_file_path = config_path
            .or_else(|| env::var("NUTRISCAN_CONFIG").ok())
            .unwrap_or_else(|| "nutriscan.toml".to_string());

        // The file is optional; env vars alone are enough
        if std::path::Path::new(&config_file_path).exists() {
            builder = builder.add_source(File::with_name(&config_file_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("NUTRISCAN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.firebase.api_key.trim().is_empty() {
            return Err("firebase.api_key must be set".to_string());
        }
        if self.firebase.project_id.trim().is_empty() {
            return Err("firebase.project_id must be set".to_string());
        }
        if self.gemini.api_key.trim().is_empty() {
            return Err("gemini.api_key must be set".to_string());
        }
        if self.energy.min_daily_calories < 0 {
            return Err("energy.min_daily_calories must not be negative".to_string());
        }
        Ok(())
    }
}
