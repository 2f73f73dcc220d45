//! Error taxonomy.
//!
//! Location failures degrade to the default coordinate, fetch failures are
//! shown next to stale data, and search failures stay inside the search box.
//! All three are `Clone` because they are carried in state snapshots.

use thiserror::Error;

/// Device location could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location unavailable")]
    PositionUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Unknown(String),
}

/// Which provider call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Current,
    Forecast,
    AirQuality,
    CitySearch,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Current => "current weather",
            Endpoint::Forecast => "forecast",
            Endpoint::AirQuality => "air quality",
            Endpoint::CitySearch => "city search",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single provider call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("No API key configured")]
    MissingApiKey,
    #[error("Request timed out")]
    Timeout,
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// One or more of the three weather calls failed; nothing was committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to fetch {endpoint}: {source}")]
pub struct FetchError {
    pub endpoint: Endpoint,
    pub source: ProviderError,
}

impl FetchError {
    pub fn new(endpoint: Endpoint, source: ProviderError) -> Self {
        Self { endpoint, source }
    }

    pub fn is_timeout(&self) -> bool {
        self.source == ProviderError::Timeout
    }
}

/// City lookup failed. Scoped to the search box.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("City search failed: {source}")]
pub struct SearchError {
    #[from]
    pub source: ProviderError,
}

/// Truncate a response body for inclusion in an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
