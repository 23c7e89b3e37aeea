use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use weatherly_core::NetworkError;

/// Normalized identity for a city: trimmed and lowercased.
///
/// Normalization never fails and is idempotent, so any two raw inputs that
/// normalize identically share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityKey(String);

impl CityKey {
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_lowercase().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Weather condition categories mapped from provider icon names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Wind,
    Rain,
    Snow,
    Thunderstorm,
}

impl WeatherCondition {
    /// Map a Visual Crossing icon set name (e.g. `partly-cloudy-day`).
    pub fn from_icon(icon: &str) -> Self {
        match icon {
            "clear-day" | "clear-night" => Self::Clear,
            "partly-cloudy-day" | "partly-cloudy-night" => Self::PartlyCloudy,
            "cloudy" => Self::Cloudy,
            "fog" => Self::Fog,
            "wind" => Self::Wind,
            "rain" | "showers-day" | "showers-night" => Self::Rain,
            "snow" | "snow-showers-day" | "snow-showers-night" | "sleet" => Self::Snow,
            "thunder-rain" | "thunder-showers-day" | "thunder-showers-night" => {
                Self::Thunderstorm
            }
            _ => Self::Clear,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Wind => "Windy",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Fog => "cloud_fog",
            Self::Wind => "wind",
            Self::Rain => "cloud_rain",
            Self::Snow => "cloud_snow",
            Self::Thunderstorm => "cloud_lightning",
        }
    }
}

/// Current conditions, in the provider's wire shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temp: f64,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub windspeed: f64,
    #[serde(default)]
    pub visibility: f64,
    #[serde(default)]
    pub uvindex: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl CurrentConditions {
    pub fn condition(&self) -> WeatherCondition {
        self.icon
            .as_deref()
            .map(WeatherCondition::from_icon)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub datetime: NaiveDate,
    pub temp: f64,
    #[serde(default)]
    pub conditions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ForecastDay {
    pub fn condition(&self) -> WeatherCondition {
        self.icon
            .as_deref()
            .map(WeatherCondition::from_icon)
            .unwrap_or_default()
    }
}

/// Snapshot returned by a weather lookup and stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherPayload {
    pub resolved_address: String,
    pub current_conditions: CurrentConditions,
    #[serde(default)]
    pub days: Vec<ForecastDay>,
}

/// A city autocomplete suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityResult {
    pub city: String,
    pub country: String,
    pub country_code: String,
}

/// Failure modes of the remote weather lookup.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    /// The remote confirmed the city does not exist
    #[error("City not found: {0}")]
    NotFound(String),
    /// Any other failure, including timeouts and malformed bodies
    #[error("Weather service error: {0}")]
    Service(#[from] NetworkError),
}

/// Why a resolution ended in an error state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty city name after normalization
    InvalidInput,
    /// Offline and nothing usable in the cache
    NoCachedData,
    /// The remote confirmed the city does not exist
    CityNotFound,
    /// Transient failure with no cached fallback
    FetchFailed,
}

impl ErrorKind {
    /// User-friendly message for the error view.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Please enter a city name.",
            Self::NoCachedData => "You're offline and this city hasn't been saved yet.",
            Self::CityNotFound => "Unable to find the city.",
            Self::FetchFailed => "Failed to load weather data. Please try again.",
        }
    }

    /// Whether offering "retry" makes sense for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoCachedData | Self::FetchFailed)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidInput => "invalid input",
            Self::NoCachedData => "no cached data",
            Self::CityNotFound => "city not found",
            Self::FetchFailed => "fetch failed",
        };
        f.write_str(name)
    }
}
