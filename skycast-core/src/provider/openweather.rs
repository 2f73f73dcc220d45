use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    Config,
    coordinate::{City, Coordinate},
    error::{ProviderError, truncate_body},
    model::Units,
};

use super::{CitySearchProvider, WeatherProvider};

/// OpenWeatherMap 2.5 API binding.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    /// Provider on a default client with no transport timeout; the fetcher
    /// bounds each call instead.
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Build from config: requires an API key and applies the request timeout
    /// at the transport level as well.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?.to_owned();
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ProviderError> {
        let res = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            tracing::debug!(path, status = status.as_u16(), "OpenWeather request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

fn coordinate_params(at: Coordinate) -> Vec<(&'static str, String)> {
    vec![("lat", at.lat.to_string()), ("lon", at.lon.to_string())]
}

#[derive(Debug, Deserialize)]
struct OwFindResponse {
    #[serde(default)]
    list: Vec<OwFindEntry>,
}

#[derive(Debug, Deserialize)]
struct OwFindEntry {
    name: String,
    sys: OwSys,
    coord: OwCoord,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

impl From<OwFindEntry> for City {
    fn from(entry: OwFindEntry) -> Self {
        City {
            name: entry.name,
            country: entry.sys.country,
            lat: entry.coord.lat,
            lon: entry.coord.lon,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_weather(&self, at: Coordinate, units: Units) -> Result<Value, ProviderError> {
        let mut params = coordinate_params(at);
        params.push(("units", units.as_str().to_string()));
        self.get_json("weather", &params).await
    }

    async fn forecast(&self, at: Coordinate, units: Units) -> Result<Value, ProviderError> {
        let mut params = coordinate_params(at);
        params.push(("units", units.as_str().to_string()));
        self.get_json("forecast", &params).await
    }

    async fn air_quality(&self, at: Coordinate) -> Result<Value, ProviderError> {
        self.get_json("air_pollution", &coordinate_params(at)).await
    }
}

#[async_trait]
impl CitySearchProvider for OpenWeatherProvider {
    async fn search_cities(&self, query: &str, limit: usize) -> Result<Vec<City>, ProviderError> {
        let params = [
            ("q", query.to_string()),
            ("type", "like".to_string()),
            ("sort", "population".to_string()),
            ("cnt", limit.to_string()),
        ];
        let body = self.get_json("find", &params).await?;

        let parsed: OwFindResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(parsed.list.into_iter().take(limit).map(City::from).collect())
    }
}
