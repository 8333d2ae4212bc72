use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable consulted for the API key when the config has none.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (also holds the weather cache)
    pub config_dir: PathBuf,

    /// Weather / geocoding API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Search behaviour
    #[serde(default)]
    pub search: SearchConfig,

    /// Last-result cache
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Measurement system requested from the weather API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
    Standard,
}

impl Units {
    /// Value of the `units` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            Units::Imperial => "imperial",
            Units::Metric => "metric",
            Units::Standard => "standard",
        }
    }

    /// Suffix for rendering temperatures in this unit system.
    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Units::Imperial => "\u{2109}",
            Units::Metric => "\u{2103}",
            Units::Standard => "K",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root URL shared by the geocoding and current weather endpoints
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (falls back to `OPENWEATHER_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub units: Units,

    /// Maximum number of candidates returned by a city search
    #[serde(default = "default_geocode_limit")]
    pub geocode_limit: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_geocode_limit() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            units: Units::default(),
            geocode_limit: default_geocode_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// API key from the config, else from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Quiet period before a typed query or a selection is acted on
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_file_name")]
    pub file_name: String,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_file_name() -> String {
    "weather_cache.json".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            file_name: default_cache_file_name(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skycast");

        Self {
            config_dir,
            api: ApiConfig::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults there on first use.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.base_url, "api.base_url", &mut result);

        if self.api.resolved_api_key().is_none() {
            result.add_warning(
                "api.api_key",
                format!("No API key configured (set it here or in {API_KEY_ENV})"),
            );
        }

        if self.api.geocode_limit == 0 {
            result.add_error("api.geocode_limit", "Geocode limit must be greater than 0");
        } else if self.api.geocode_limit > 50 {
            result.add_warning("api.geocode_limit", "Geocode limit is unusually large (>50)");
        }

        if self.api.timeout_secs == 0 {
            result.add_error("api.timeout_secs", "Request timeout must be greater than 0");
        }

        if self.search.debounce_ms == 0 {
            result.add_warning(
                "search.debounce_ms",
                "Debounce disabled (0 ms) - every keystroke hits the network",
            );
        } else if self.search.debounce_ms > 5000 {
            result.add_warning("search.debounce_ms", "Debounce is longer than 5 seconds");
        }

        if self.cache.enabled && self.cache.file_name.trim().is_empty() {
            result.add_error("cache.file_name", "Cache file name must not be empty");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Where the last displayed weather snapshot is kept
    pub fn cache_path(&self) -> PathBuf {
        self.config_dir.join(&self.cache.file_name)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn config_with_key() -> Config {
        let mut config = Config::default();
        config.api.api_key = Some("test-key".to_string());
        config
    }

    #[test]
    fn test_valid_default_config() {
        let result = config_with_key().validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_defaults_match_app_behaviour() {
        let config = Config::default();
        assert_eq!(config.search.debounce(), Duration::from_millis(300));
        assert_eq!(config.api.units, Units::Imperial);
        assert_eq!(config.api.geocode_limit, 10);
        assert!(config.cache_path().ends_with("weather_cache.json"));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = config_with_key();
        config.api.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "api.base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = config_with_key();
        config.api.base_url = "ftp://api.example.com".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_geocode_limit_is_error() {
        let mut config = config_with_key();
        config.api.geocode_limit = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "api.geocode_limit"));
    }

    #[test]
    fn test_zero_debounce_is_warning() {
        let mut config = config_with_key();
        config.search.debounce_ms = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "search.debounce_ms"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }

    #[test]
    fn test_load_from_creates_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut created = Config::load_from(&path).unwrap();
        assert!(path.exists());

        created.search.debounce_ms = 450;
        created.api.units = Units::Metric;
        created.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.search.debounce_ms, 450);
        assert_eq!(loaded.api.units, Units::Metric);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "config_dir = \"/tmp/skycast\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.search.debounce_ms, 300);
        assert!(loaded.cache.enabled);
        assert_eq!(loaded.api.base_url, "https://api.openweathermap.org");
    }

    #[test]
    fn test_units_query_values() {
        assert_eq!(Units::Imperial.as_query(), "imperial");
        assert_eq!(Units::Metric.as_query(), "metric");
        assert_eq!(Units::Standard.temperature_suffix(), "K");
    }
}
