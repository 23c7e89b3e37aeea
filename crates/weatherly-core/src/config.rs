use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{AppError, ConfigError};

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
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather lookup settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// City autocomplete settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Reachability probing
    #[serde(default)]
    pub network: NetworkConfig,

    /// Local persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Timeline endpoint; the city is appended as a path segment
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    pub api_key: String,

    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    /// Upper bound for a single lookup; expiry counts as a service failure
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_weather_base_url() -> String {
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline"
        .to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            api_key: "YOUR_WEATHER_API_KEY".to_string(),
            temperature_unit: TemperatureUnit::Auto,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    pub api_key: String,

    #[serde(default = "default_search_api_host")]
    pub api_host: String,

    /// Maximum suggestions per query
    #[serde(default = "default_search_limit")]
    pub limit: u32,

    /// Quiet period after the last keystroke before a lookup is issued
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Queries shorter than this (in characters) never reach the service
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_search_base_url() -> String {
    "https://wft-geo-db.p.rapidapi.com/v1/geo/cities".to_string()
}

fn default_search_api_host() -> String {
    "wft-geo-db.p.rapidapi.com".to_string()
}

fn default_search_limit() -> u32 {
    10
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_min_query_len() -> usize {
    2
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key: "YOUR_RAPID_API_KEY".to_string(),
            api_host: default_search_api_host(),
            limit: default_search_limit(),
            debounce_ms: default_debounce_ms(),
            min_query_len: default_min_query_len(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Any HTTP response from this URL counts as "online"
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_probe_url() -> String {
    "https://clients3.google.com/generate_204".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_probe_timeout_secs() -> u64 {
    3
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            poll_interval_secs: default_poll_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file name, relative to `config_dir` unless absolute
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_database_file() -> String {
    "weatherly.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weatherly");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            search: SearchConfig::default(),
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

fn is_placeholder_key(key: &str) -> bool {
    key.is_empty() || key.starts_with("YOUR_")
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self, AppError> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there first if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::Config(ConfigError::NotFound(path.display().to_string()))
            }
            _ => AppError::Io(e),
        })?;

        let config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings are logged.
    pub fn load_validated() -> Result<(Self, ValidationResult), AppError> {
        let config_path = Self::config_path()?;
        Self::load_validated_from(&config_path)
    }

    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult), AppError> {
        let config = Self::load_from(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);
        self.validate_url(&self.search.base_url, "search.base_url", &mut result);
        self.validate_url(&self.network.probe_url, "network.probe_url", &mut result);

        if is_placeholder_key(&self.weather.api_key) {
            result.add_warning(
                "weather.api_key",
                "Weather API key not configured; lookups will fail until it is set",
            );
        }

        if is_placeholder_key(&self.search.api_key) {
            result.add_warning(
                "search.api_key",
                "Search API key not configured; city suggestions will be empty",
            );
        }

        if self.weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.weather.request_timeout_secs > 120 {
            result.add_warning(
                "weather.request_timeout_secs",
                "Request timeout is unusually long (>120s)",
            );
        }

        if self.search.request_timeout_secs == 0 {
            result.add_error(
                "search.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if self.network.poll_interval_secs == 0 {
            result.add_error(
                "network.poll_interval_secs",
                "Poll interval must be greater than 0",
            );
        }

        if self.network.probe_timeout_secs == 0 {
            result.add_error(
                "network.probe_timeout_secs",
                "Probe timeout must be greater than 0",
            );
        }

        if self.search.min_query_len == 0 {
            result.add_warning(
                "search.min_query_len",
                "A minimum query length of 0 issues a lookup for every keystroke",
            );
        }

        if self.storage.database_file.trim().is_empty() {
            result.add_error("storage.database_file", "Database file name cannot be empty");
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

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Absolute path of the SQLite store.
    pub fn database_path(&self) -> PathBuf {
        let file = PathBuf::from(&self.storage.database_file);
        if file.is_absolute() {
            file
        } else {
            self.config_dir.join(file)
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), AppError> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, contents)?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf, AppError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("no user config directory".to_string()))?
            .join("weatherly");

        Ok(config_dir.join("config.toml"))
    }
}
