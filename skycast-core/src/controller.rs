//! The controller: one task that owns the state and everything that feeds it.
//!
//! All mutation happens inside [`WeatherController::run`], one action at a
//! time. Geolocation readings, debounce timers, fetch and search results and
//! user calls through [`WeatherHandle`] all arrive as [`Action`]s on a single
//! channel, so no two transitions interleave. Subscribers see a fresh
//! [`AppState`] snapshot after every change.

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::{
    Config,
    action::{Action, Effect},
    coordinate::City,
    debounce::CoordinateDebouncer,
    geolocation::{GeolocationSource, PositionProvider, WatchOptions},
    orchestrator::WeatherFetcher,
    provider::{CitySearchProvider, OpenWeatherProvider, WeatherProvider},
    reducer::reducer,
    search::CitySearch,
    state::AppState,
    store::Store,
    tasks::{TaskKey, TaskManager},
};

const FETCH_TASK: TaskKey = TaskKey::new("weather");
const SEARCH_TASK: TaskKey = TaskKey::new("city_search");

/// The controller is gone; nothing will process further requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Weather controller has stopped")]
pub struct ControllerClosed;

pub struct WeatherController {
    store: Store,
    action_rx: mpsc::UnboundedReceiver<Action>,
    tasks: TaskManager<Action>,
    geolocation: GeolocationSource<Action>,
    debouncer: CoordinateDebouncer,
    fetcher: WeatherFetcher,
    search: CitySearch,
    state_tx: watch::Sender<AppState>,
}

impl WeatherController {
    pub fn new(
        config: &Config,
        weather: Arc<dyn WeatherProvider>,
        cities: Arc<dyn CitySearchProvider>,
        positions: Arc<dyn PositionProvider>,
    ) -> (Self, WeatherHandle) {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let state = AppState::new(config.default_location, config.epsilon_deg);
        let (state_tx, state_rx) = watch::channel(state.clone());

        let watch_options = WatchOptions {
            timeout: config.geolocation_timeout(),
            ..WatchOptions::default()
        };

        let controller = Self {
            store: Store::new(state, reducer),
            action_rx,
            tasks: TaskManager::new(action_tx.clone()),
            geolocation: GeolocationSource::new(positions, watch_options, action_tx.clone()),
            debouncer: CoordinateDebouncer::new(config.debounce_window(), config.epsilon_deg),
            fetcher: WeatherFetcher::new(weather, config.units, config.request_timeout()),
            search: CitySearch::new(cities, config.debounce_window(), config.search_limit),
            state_tx,
        };
        let handle = WeatherHandle {
            action_tx,
            state_rx,
        };

        (controller, handle)
    }

    /// OpenWeather for weather and city search.
    pub fn from_config(
        config: &Config,
        positions: Arc<dyn PositionProvider>,
    ) -> Result<(Self, WeatherHandle)> {
        config.validate()?;
        let provider = Arc::new(OpenWeatherProvider::from_config(config)?);
        Ok(Self::new(config, provider.clone(), provider, positions))
    }

    pub fn state(&self) -> &AppState {
        self.store.state()
    }

    /// Run until [`WeatherHandle::shutdown`] is called or every handle and
    /// subscriber is dropped.
    ///
    /// Starts in automatic mode with geolocation enabled. On exit every
    /// in-flight task is cancelled and the geolocation watch is released.
    pub async fn run(mut self) {
        tracing::info!(
            coordinate = %self.store.state().location.coordinate,
            "Weather controller started"
        );
        self.run_effect(Effect::EnableGeolocation);

        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                biased;

                action = self.action_rx.recv() => match action {
                    Some(Action::Shutdown) | None => break,
                    Some(action) => self.dispatch(action),
                },

                _ = sleep_until(deadline) => {
                    if let Some(coordinate) = self.debouncer.fire(Instant::now()) {
                        self.dispatch(Action::CoordinateDidSettle(coordinate));
                    }
                }

                // Every handle and subscriber is gone.
                _ = self.state_tx.closed() => break,
            }
        }

        self.tasks.cancel_all();
        self.geolocation.stop();
        tracing::info!("Weather controller stopped");
    }

    fn dispatch(&mut self, action: Action) {
        let result = self.store.dispatch(action);
        for effect in result.effects {
            self.run_effect(effect);
        }
        if result.changed {
            self.state_tx.send_replace(self.store.state().clone());
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::EnableGeolocation => self.geolocation.set_enabled(true),
            Effect::DisableGeolocation => self.geolocation.set_enabled(false),
            Effect::ResetDebouncer => self.debouncer.reset(),
            Effect::DebounceCoordinate(coordinate) => {
                self.debouncer.push(coordinate, Instant::now());
            }
            Effect::FetchWeather {
                generation,
                coordinate,
            } => {
                let fetcher = self.fetcher.clone();
                self.tasks.spawn(FETCH_TASK, async move {
                    let result = fetcher.fetch(coordinate).await;
                    Action::ApplyFetchResult { generation, result }
                });
            }
            Effect::CancelFetch => self.tasks.cancel(&FETCH_TASK),
            Effect::SearchCities { query } => {
                let search = self.search.clone();
                self.tasks.debounce(SEARCH_TASK, search.window(), async move {
                    let result = search.lookup(&query).await;
                    Action::SearchDidLoad { query, result }
                });
            }
            Effect::CancelSearch => self.tasks.cancel(&SEARCH_TASK),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cheap, cloneable access to a running controller.
#[derive(Debug, Clone)]
pub struct WeatherHandle {
    action_tx: mpsc::UnboundedSender<Action>,
    state_rx: watch::Receiver<AppState>,
}

impl WeatherHandle {
    /// Switch to manual mode at `city`. Geolocation stops until
    /// [`use_current_location`](Self::use_current_location).
    pub fn set_manual_location(&self, city: City) -> Result<(), ControllerClosed> {
        self.send(Action::SetManualLocation(city))
    }

    /// Follow the device location again. Also the way to retry after a
    /// location failure.
    pub fn use_current_location(&self) -> Result<(), ControllerClosed> {
        self.send(Action::UseCurrentLocation)
    }

    /// Update the search box text. Lookups are debounced and need at least
    /// three characters.
    pub fn search(&self, query: impl Into<String>) -> Result<(), ControllerClosed> {
        self.send(Action::SearchQueryChange(query.into()))
    }

    /// Pick entry `index` of the current suggestions.
    pub fn select_suggestion(&self, index: usize) -> Result<(), ControllerClosed> {
        self.send(Action::SearchSelect(index))
    }

    pub fn shutdown(&self) -> Result<(), ControllerClosed> {
        self.send(Action::Shutdown)
    }

    /// Receiver that is notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state_rx.clone()
    }

    pub fn snapshot(&self) -> AppState {
        self.state_rx.borrow().clone()
    }

    fn send(&self, action: Action) -> Result<(), ControllerClosed> {
        self.action_tx.send(action).map_err(|_| ControllerClosed)
    }
}
