//! Actions (inputs to the reducer) and effects (work the reducer asks for).
//!
//! Naming follows intent vs. result: `Did*` actions carry the outcome of
//! async work back into the store.

use crate::{
    coordinate::{City, Coordinate},
    error::{FetchError, LocationError, SearchError},
    geolocation::GeoEvent,
    model::{FetchGeneration, WeatherBundle},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// User picked a city: switch to manual mode.
    SetManualLocation(City),
    /// User asked to follow the device location again.
    UseCurrentLocation,

    GeolocationDidUpdate(Coordinate),
    GeolocationDidFail(LocationError),

    /// A coordinate survived the debounce window: request weather for it.
    CoordinateDidSettle(Coordinate),

    /// Result of the fetch tagged `generation`.
    ApplyFetchResult {
        generation: FetchGeneration,
        result: Result<WeatherBundle, FetchError>,
    },

    SearchQueryChange(String),
    SearchSelect(usize),
    SearchDidLoad {
        query: String,
        result: Result<Vec<City>, SearchError>,
    },

    Shutdown,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetManualLocation(_) => "SetManualLocation",
            Action::UseCurrentLocation => "UseCurrentLocation",
            Action::GeolocationDidUpdate(_) => "GeolocationDidUpdate",
            Action::GeolocationDidFail(_) => "GeolocationDidFail",
            Action::CoordinateDidSettle(_) => "CoordinateDidSettle",
            Action::ApplyFetchResult { .. } => "ApplyFetchResult",
            Action::SearchQueryChange(_) => "SearchQueryChange",
            Action::SearchSelect(_) => "SearchSelect",
            Action::SearchDidLoad { .. } => "SearchDidLoad",
            Action::Shutdown => "Shutdown",
        }
    }
}

impl From<GeoEvent> for Action {
    fn from(event: GeoEvent) -> Self {
        match event {
            GeoEvent::Position(coordinate) => Action::GeolocationDidUpdate(coordinate),
            GeoEvent::Error(err) => Action::GeolocationDidFail(err),
        }
    }
}

/// Side effects declared by the reducer and run by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    EnableGeolocation,
    DisableGeolocation,
    /// Drop any pending coordinate and forget the last emitted one.
    ResetDebouncer,
    DebounceCoordinate(Coordinate),
    FetchWeather {
        generation: FetchGeneration,
        coordinate: Coordinate,
    },
    /// Best-effort abort of the in-flight fetch.
    CancelFetch,
    SearchCities { query: String },
    CancelSearch,
}
