//! City autocomplete via the GeoDB cities API.
//!
//! Failures are logged and reported as "no matches"; callers cannot tell the
//! two apart.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use weatherly_core::SearchConfig;

use crate::types::CityResult;

#[async_trait]
pub trait CitySearch: Send + Sync {
    /// Matching cities, or an empty list on no match or any failure.
    async fn search_cities(&self, query: &str) -> Vec<CityResult>;
}

#[derive(Debug, Deserialize)]
struct GeoDbResponse {
    #[serde(default)]
    data: Vec<GeoDbCity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoDbCity {
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    country_code: String,
}

#[derive(Debug, Clone)]
pub struct GeoDbClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_host: String,
    limit: u32,
    min_query_len: usize,
}

impl GeoDbClient {
    pub fn new(config: &SearchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            api_host: config.api_host.clone(),
            limit: config.limit,
            min_query_len: config.min_query_len,
        })
    }

    async fn try_search(&self, query: &str) -> Result<Vec<CityResult>, reqwest::Error> {
        let limit = self.limit.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("namePrefix", query),
                ("limit", limit.as_str()),
                ("sort", "-population"),
            ])
            .header("X-RapidAPI-Key", self.api_key.as_str())
            .header("X-RapidAPI-Host", self.api_host.as_str())
            .send()
            .await?
            .error_for_status()?;

        let body: GeoDbResponse = response.json().await?;

        Ok(body
            .data
            .into_iter()
            .map(|item| CityResult {
                city: item.name,
                country: item.country,
                country_code: item.country_code,
            })
            .collect())
    }
}

#[async_trait]
impl CitySearch for GeoDbClient {
    async fn search_cities(&self, query: &str) -> Vec<CityResult> {
        if query.chars().count() < self.min_query_len {
            return Vec::new();
        }

        match self.try_search(query).await {
            Ok(results) => {
                tracing::debug!("City search '{}' returned {} results", query, results.len());
                results
            }
            Err(e) => {
                tracing::warn!("Error fetching cities for '{}': {}", query, e);
                Vec::new()
            }
        }
    }
}
