use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::{
    coordinate::{City, Coordinate},
    error::ProviderError,
    model::Units,
};

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// The three weather endpoints. Responses are passed through as opaque JSON.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(&self, at: Coordinate, units: Units) -> Result<Value, ProviderError>;

    /// 5-day / 3-hour forecast.
    async fn forecast(&self, at: Coordinate, units: Units) -> Result<Value, ProviderError>;

    async fn air_quality(&self, at: Coordinate) -> Result<Value, ProviderError>;
}

/// Text query to ranked city candidates.
#[async_trait]
pub trait CitySearchProvider: Send + Sync + Debug {
    /// At most `limit` cities, most populous first when names collide.
    async fn search_cities(&self, query: &str, limit: usize) -> Result<Vec<City>, ProviderError>;
}
