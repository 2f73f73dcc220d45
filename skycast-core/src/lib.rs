//! Location resolution and weather fetching for the `skycast` dashboard.
//!
//! This crate defines:
//! - Configuration loading (file plus environment)
//! - The device geolocation seam and its coordinate debouncer
//! - Weather and city search providers, with an OpenWeather implementation
//! - A single-writer store that decides which coordinate to fetch and which
//!   fetch result is current
//!
//! [`WeatherController`] wires these together and is the entry point for a UI:
//! drive it through a [`WeatherHandle`] and watch [`AppState`] snapshots.

pub mod action;
pub mod config;
pub mod controller;
pub mod coordinate;
pub mod debounce;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod reducer;
pub mod search;
pub mod state;
pub mod store;
pub mod tasks;

pub use config::Config;
pub use controller::{ControllerClosed, WeatherController, WeatherHandle};
pub use coordinate::{City, Coordinate};
pub use error::{Endpoint, FetchError, LocationError, ProviderError, SearchError};
pub use geolocation::{PositionProvider, PositionWatch, UnavailablePositionProvider, WatchOptions};
pub use model::{FetchGeneration, Units, WeatherBundle};
pub use provider::{CitySearchProvider, OpenWeatherProvider, WeatherProvider};
pub use state::{AppState, LocationState, SearchState, SelectionMode};
