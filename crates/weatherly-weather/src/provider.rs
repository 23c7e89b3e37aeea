//! Remote weather lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;
use weatherly_core::{NetworkError, ReqwestErrorExt, TemperatureUnit, WeatherConfig};

use crate::types::{CurrentConditions, FetchError, ForecastDay, WeatherPayload};

/// The weather lookup collaborator used by the coordinator.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self, city: &str) -> Result<WeatherPayload, FetchError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineResponse {
    resolved_address: Option<String>,
    current_conditions: Option<CurrentConditions>,
    #[serde(default)]
    days: Vec<ForecastDay>,
}

/// Visual Crossing timeline API client.
#[derive(Debug, Clone)]
pub struct VisualCrossingClient {
    client: Client,
    base_url: Url,
    api_key: String,
    unit: TemperatureUnit,
}

impl VisualCrossingClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, NetworkError> {
        Self::with_timeout(
            &config.base_url,
            &config.api_key,
            config.temperature_unit,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        unit: TemperatureUnit,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| NetworkError::ConnectionFailed(format!("Invalid base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(NetworkError::ConnectionFailed(format!(
                "Base URL cannot take a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            unit,
        })
    }

    pub fn set_unit(&mut self, unit: TemperatureUnit) {
        self.unit = unit;
    }

    fn unit_group(&self) -> &'static str {
        match self.unit {
            TemperatureUnit::Fahrenheit => "us",
            TemperatureUnit::Auto | TemperatureUnit::Celsius => "metric",
        }
    }

    fn request_url(&self, city: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(city);
        }
        url.query_pairs_mut()
            .append_pair("unitGroup", self.unit_group())
            .append_pair("key", &self.api_key);
        url
    }
}

#[async_trait]
impl WeatherSource for VisualCrossingClient {
    async fn fetch_weather(&self, city: &str) -> Result<WeatherPayload, FetchError> {
        let url = self.request_url(city);
        tracing::debug!("Fetching weather for '{}'", city);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Service(e.into_network_error()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(city.to_string()));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Service(NetworkError::ServerError {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            }));
        }

        let body: TimelineResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Service(NetworkError::InvalidResponse(e.to_string())))?;

        let current_conditions = body.current_conditions.ok_or_else(|| {
            FetchError::Service(NetworkError::InvalidResponse(
                "response has no currentConditions".to_string(),
            ))
        })?;

        Ok(WeatherPayload {
            resolved_address: body.resolved_address.unwrap_or_else(|| city.to_string()),
            current_conditions,
            days: body.days,
        })
    }
}
