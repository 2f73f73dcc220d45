//! Application state: the single location/weather record plus the search box.
//!
//! Only the reducer mutates these. Everything else reads snapshots.

use std::sync::Arc;

use crate::{
    coordinate::{City, Coordinate},
    error::{FetchError, LocationError, SearchError},
    model::{FetchGeneration, WeatherBundle},
};

/// Who decides the active coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Tracks the geolocation source.
    #[default]
    Automatic,
    /// Set by city search; geolocation is ignored until the user asks for it again.
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationState {
    pub coordinate: Coordinate,
    pub mode: SelectionMode,
    /// The chosen city while in manual mode.
    pub city: Option<City>,
    /// Replaced as a whole, never field by field. Kept during refreshes and after failures.
    pub bundle: Option<Arc<WeatherBundle>>,
    pub loading: bool,
    pub error: Option<FetchError>,
    /// Last geolocation failure. Informational: the app keeps running on the fallback.
    pub location_error: Option<LocationError>,
    pub generation: FetchGeneration,
    /// Coordinate of the last committed bundle.
    pub last_fetched: Option<Coordinate>,
    /// Tolerance for treating coordinates as equal.
    pub epsilon: f64,
}

impl LocationState {
    pub fn new(coordinate: Coordinate, epsilon: f64) -> Self {
        Self {
            coordinate,
            mode: SelectionMode::Automatic,
            city: None,
            bundle: None,
            loading: false,
            error: None,
            location_error: None,
            generation: FetchGeneration::default(),
            last_fetched: None,
            epsilon,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.mode == SelectionMode::Manual
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchState {
    pub query: String,
    pub suggestions: Vec<City>,
    pub loading: bool,
    pub error: Option<SearchError>,
}

impl SearchState {
    pub fn clear(&mut self) {
        self.suggestions.clear();
        self.loading = false;
        self.error = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub location: LocationState,
    pub search: SearchState,
}

impl AppState {
    pub fn new(default_location: Coordinate, epsilon: f64) -> Self {
        Self {
            location: LocationState::new(default_location, epsilon),
            search: SearchState::default(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Coordinate::default(), crate::coordinate::DEFAULT_EPSILON_DEG)
    }
}
