//! City search: text query to candidate locations.

use std::sync::Arc;
use std::time::Duration;

use crate::{coordinate::City, error::SearchError, provider::CitySearchProvider};

/// Queries shorter than this (after trimming) never reach the provider.
pub const MIN_QUERY_CHARS: usize = 3;

pub fn is_searchable(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_CHARS
}

#[derive(Debug, Clone)]
pub struct CitySearch {
    provider: Arc<dyn CitySearchProvider>,
    window: Duration,
    limit: usize,
}

impl CitySearch {
    pub fn new(provider: Arc<dyn CitySearchProvider>, window: Duration, limit: usize) -> Self {
        Self {
            provider,
            window,
            limit,
        }
    }

    /// Quiet period before a query is sent.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Look up `query`, capped at the configured limit.
    pub async fn lookup(&self, query: &str) -> Result<Vec<City>, SearchError> {
        let query = query.trim();
        if !is_searchable(query) {
            return Ok(Vec::new());
        }

        let mut cities = self.provider.search_cities(query, self.limit).await?;
        cities.truncate(self.limit);
        tracing::debug!(query, found = cities.len(), "City search finished");
        Ok(cities)
    }
}
