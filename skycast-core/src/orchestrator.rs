//! Weather fetch: three provider calls in parallel, joined into one bundle.
//!
//! Any failing call fails the whole fetch and the remaining calls are dropped.
//! Which fetch is current (and whether its result may be applied) is decided
//! by the reducer through the request generation; this module only does the I/O.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::{
    coordinate::Coordinate,
    error::{Endpoint, FetchError, ProviderError},
    model::{Units, WeatherBundle},
    provider::WeatherProvider,
};

#[derive(Debug, Clone)]
pub struct WeatherFetcher {
    provider: Arc<dyn WeatherProvider>,
    units: Units,
    timeout: Duration,
}

impl WeatherFetcher {
    /// `timeout` applies to each of the three calls separately.
    pub fn new(provider: Arc<dyn WeatherProvider>, units: Units, timeout: Duration) -> Self {
        Self {
            provider,
            units,
            timeout,
        }
    }

    pub async fn fetch(&self, at: Coordinate) -> Result<WeatherBundle, FetchError> {
        let (current, forecast, air_quality) = tokio::try_join!(
            self.call(Endpoint::Current, self.provider.current_weather(at, self.units)),
            self.call(Endpoint::Forecast, self.provider.forecast(at, self.units)),
            self.call(Endpoint::AirQuality, self.provider.air_quality(at)),
        )?;

        Ok(WeatherBundle {
            coordinate: at,
            current,
            forecast,
            air_quality,
            fetched_at: Utc::now(),
        })
    }

    async fn call<F>(&self, endpoint: Endpoint, request: F) -> Result<Value, FetchError>
    where
        F: Future<Output = Result<Value, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(FetchError::new(endpoint, source)),
            Err(_) => Err(FetchError::new(endpoint, ProviderError::Timeout)),
        }
    }
}
