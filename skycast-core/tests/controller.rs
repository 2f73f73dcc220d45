//! End-to-end behavior of the controller against scripted providers.
//! Runs on a paused clock so debounce windows and slow fetches are exact.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use skycast_core::coordinate::DEFAULT_COORDINATE;
use skycast_core::geolocation::Position;
use skycast_core::{
    AppState, City, CitySearchProvider, Config, ControllerClosed, Coordinate, Endpoint,
    LocationError, PositionProvider, PositionWatch, ProviderError, SelectionMode,
    UnavailablePositionProvider, Units, WatchOptions, WeatherController, WeatherHandle,
    WeatherProvider,
};

type Readings = mpsc::UnboundedSender<Result<Position, LocationError>>;

#[derive(Debug)]
struct ScriptedPositions {
    readings: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Position, LocationError>>>>,
    live: Arc<AtomicUsize>,
}

struct ScriptedWatch {
    readings: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Position, LocationError>>>>,
    live: Arc<AtomicUsize>,
}

impl Drop for ScriptedWatch {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PositionProvider for ScriptedPositions {
    async fn watch(
        &self,
        _options: &WatchOptions,
    ) -> Result<Box<dyn PositionWatch>, LocationError> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedWatch {
            readings: self.readings.clone(),
            live: self.live.clone(),
        }))
    }
}

#[async_trait]
impl PositionWatch for ScriptedWatch {
    async fn next_position(&mut self) -> Result<Position, LocationError> {
        match self.readings.lock().await.recv().await {
            Some(reading) => reading,
            None => std::future::pending().await,
        }
    }
}

#[derive(Debug, Default)]
struct ScriptedWeather {
    /// Coordinate and time of every fetch, recorded on the current-weather call.
    calls: Mutex<Vec<(Coordinate, Instant)>>,
    slow: Vec<(Coordinate, Duration)>,
    failing: Vec<Coordinate>,
}

impl ScriptedWeather {
    fn delay(&self, at: Coordinate) -> Duration {
        self.slow
            .iter()
            .find(|(c, _)| c.approx_eq(&at, 1e-9))
            .map(|(_, d)| *d)
            .unwrap_or(Duration::from_millis(10))
    }

    fn fetched(&self) -> Vec<Coordinate> {
        self.calls.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }
}

#[async_trait]
impl WeatherProvider for ScriptedWeather {
    async fn current_weather(&self, at: Coordinate, _units: Units) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push((at, Instant::now()));
        tokio::time::sleep(self.delay(at)).await;
        if self.failing.iter().any(|c| c.approx_eq(&at, 1e-9)) {
            return Err(ProviderError::Status {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(json!({ "coord": { "lat": at.lat, "lon": at.lon } }))
    }

    async fn forecast(&self, at: Coordinate, _units: Units) -> Result<Value, ProviderError> {
        tokio::time::sleep(self.delay(at)).await;
        Ok(json!({ "list": [] }))
    }

    async fn air_quality(&self, at: Coordinate) -> Result<Value, ProviderError> {
        tokio::time::sleep(self.delay(at)).await;
        Ok(json!({ "list": [{ "main": { "aqi": 2 } }] }))
    }
}

#[derive(Debug, Default)]
struct FakeCities {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl CitySearchProvider for FakeCities {
    async fn search_cities(&self, query: &str, _limit: usize) -> Result<Vec<City>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(vec![
            City {
                name: "Paris".into(),
                country: "FR".into(),
                lat: 48.8566,
                lon: 2.3522,
            },
            City {
                name: "Paris".into(),
                country: "US".into(),
                lat: 33.6609,
                lon: -95.5555,
            },
        ])
    }
}

struct Harness {
    handle: WeatherHandle,
    readings: Readings,
    live: Arc<AtomicUsize>,
    weather: Arc<ScriptedWeather>,
    cities: Arc<FakeCities>,
    task: JoinHandle<()>,
}

fn config() -> Config {
    // Most scenarios never send a first reading; without this they would see
    // the first-fix timeout fall back to the default location.
    Config {
        geolocation_timeout_ms: 3_600_000,
        ..Config::default()
    }
}

fn start(weather: ScriptedWeather) -> Harness {
    start_with(&config(), weather)
}

fn start_with(config: &Config, weather: ScriptedWeather) -> Harness {
    let (readings, rx) = mpsc::unbounded_channel();
    let live = Arc::new(AtomicUsize::new(0));
    let positions = Arc::new(ScriptedPositions {
        readings: Arc::new(tokio::sync::Mutex::new(rx)),
        live: live.clone(),
    });
    let weather = Arc::new(weather);
    let cities = Arc::new(FakeCities::default());

    let (controller, handle) =
        WeatherController::new(config, weather.clone(), cities.clone(), positions);
    let task = tokio::spawn(controller.run());

    Harness {
        handle,
        readings,
        live,
        weather,
        cities,
        task,
    }
}

fn reading(lat: f64, lon: f64) -> Result<Position, LocationError> {
    Ok(Position {
        latitude: lat,
        longitude: lon,
        accuracy: 15.0,
    })
}

async fn wait_for(
    rx: &mut watch::Receiver<AppState>,
    predicate: impl FnMut(&AppState) -> bool,
) -> AppState {
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(predicate))
        .await
        .expect("state never matched")
        .expect("controller stopped")
        .clone()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn jittery_readings_settle_into_one_fetch() {
    let h = start(ScriptedWeather::default());
    let mut rx = h.handle.subscribe();
    let started = Instant::now();

    h.readings.send(reading(12.97, 77.60)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.readings.send(reading(12.9716, 77.5946)).unwrap();

    let state = wait_for(&mut rx, |s| s.location.bundle.is_some()).await;
    let bundle = state.location.bundle.expect("bundle");
    assert_eq!(bundle.coordinate, Coordinate::new(12.97, 77.60));
    assert!(!state.location.loading);
    assert!(state.location.error.is_none());

    let calls = h.weather.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let fired_after = calls[0].1 - started;
    assert!(fired_after >= Duration::from_millis(600) && fired_after < Duration::from_millis(620));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.weather.fetched().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stationary_device_keeps_being_followed() {
    let h = start_with(&Config::default(), ScriptedWeather::default());
    let mut rx = h.handle.subscribe();

    h.readings.send(reading(10.0, 10.0)).unwrap();
    wait_for(&mut rx, |s| s.location.bundle.is_some()).await;

    // No movement for longer than the geolocation timeout.
    tokio::time::sleep(Duration::from_secs(6)).await;
    let state = h.handle.snapshot();
    assert_eq!(state.location.location_error, None);
    assert_eq!(h.live.load(Ordering::SeqCst), 1);

    h.readings.send(reading(20.0, 20.0)).unwrap();
    let state = wait_for(&mut rx, |s| {
        s.location
            .bundle
            .as_ref()
            .is_some_and(|b| b.coordinate == Coordinate::new(20.0, 20.0))
    })
    .await;

    assert_eq!(state.location.mode, SelectionMode::Automatic);
    assert_eq!(state.location.coordinate, Coordinate::new(20.0, 20.0));
    assert_eq!(
        h.weather.fetched(),
        vec![Coordinate::new(10.0, 10.0), Coordinate::new(20.0, 20.0)]
    );
}

#[tokio::test(start_paused = true)]
async fn nearby_reading_does_not_refetch() {
    let h = start(ScriptedWeather::default());
    let mut rx = h.handle.subscribe();

    h.readings.send(reading(10.0, 10.0)).unwrap();
    wait_for(&mut rx, |s| s.location.bundle.is_some()).await;

    h.readings.send(reading(10.002, 10.002)).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.weather.fetched(), vec![Coordinate::new(10.0, 10.0)]);

    h.readings.send(reading(11.0, 11.0)).unwrap();
    let state = wait_for(&mut rx, |s| {
        s.location
            .bundle
            .as_ref()
            .is_some_and(|b| b.coordinate == Coordinate::new(11.0, 11.0))
    })
    .await;
    assert_eq!(state.location.last_fetched, Some(Coordinate::new(11.0, 11.0)));
    assert_eq!(h.weather.fetched().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_earlier_fetch_never_overwrites_newer_one() {
    let a = Coordinate::new(10.0, 10.0);
    let b = Coordinate::new(20.0, 20.0);
    let h = start(ScriptedWeather {
        slow: vec![(a, Duration::from_secs(3))],
        ..ScriptedWeather::default()
    });
    let mut rx = h.handle.subscribe();

    h.readings.send(reading(a.lat, a.lon)).unwrap();
    wait_for(&mut rx, |s| s.location.loading).await;

    h.readings.send(reading(b.lat, b.lon)).unwrap();
    let state = wait_for(&mut rx, |s| s.location.bundle.is_some()).await;
    assert_eq!(state.location.bundle.expect("bundle").coordinate, b);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let state = h.handle.snapshot();
    assert_eq!(state.location.bundle.expect("bundle").coordinate, b);
    assert!(!state.location.loading);
    assert_eq!(h.weather.fetched(), vec![a, b]);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_keeps_previous_bundle() {
    let a = Coordinate::new(10.0, 10.0);
    let b = Coordinate::new(20.0, 20.0);
    let h = start(ScriptedWeather {
        failing: vec![b],
        ..ScriptedWeather::default()
    });
    let mut rx = h.handle.subscribe();

    h.readings.send(reading(a.lat, a.lon)).unwrap();
    wait_for(&mut rx, |s| s.location.bundle.is_some()).await;

    h.readings.send(reading(b.lat, b.lon)).unwrap();
    let state = wait_for(&mut rx, |s| s.location.error.is_some()).await;

    let error = state.location.error.expect("error");
    assert_eq!(error.endpoint, Endpoint::Current);
    assert_eq!(
        error.source,
        ProviderError::Status {
            status: 500,
            body: "boom".into()
        }
    );
    assert_eq!(state.location.bundle.expect("bundle").coordinate, a);
    assert_eq!(state.location.coordinate, b);
    assert!(!state.location.loading);
}

#[tokio::test(start_paused = true)]
async fn manual_location_stops_geolocation_until_resumed() {
    let h = start(ScriptedWeather::default());
    let mut rx = h.handle.subscribe();
    settle().await;
    assert_eq!(h.live.load(Ordering::SeqCst), 1);

    let paris = City {
        name: "Paris".into(),
        country: "FR".into(),
        lat: 48.8566,
        lon: 2.3522,
    };
    h.handle.set_manual_location(paris.clone()).unwrap();
    let state = wait_for(&mut rx, |s| s.location.bundle.is_some()).await;

    assert_eq!(state.location.mode, SelectionMode::Manual);
    assert_eq!(state.location.city, Some(paris.clone()));
    assert_eq!(state.location.bundle.expect("bundle").coordinate, paris.coordinate());
    assert_eq!(h.live.load(Ordering::SeqCst), 0);

    h.readings.send(reading(1.0, 1.0)).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let state = h.handle.snapshot();
    assert_eq!(state.location.coordinate, paris.coordinate());
    assert_eq!(h.weather.fetched(), vec![paris.coordinate()]);

    h.handle.use_current_location().unwrap();
    let state = wait_for(&mut rx, |s| {
        s.location
            .bundle
            .as_ref()
            .is_some_and(|b| b.coordinate == Coordinate::new(1.0, 1.0))
    })
    .await;
    assert_eq!(state.location.mode, SelectionMode::Automatic);
    assert_eq!(state.location.city, None);
    assert_eq!(h.live.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn unavailable_location_falls_back_to_default() {
    let weather = Arc::new(ScriptedWeather::default());
    let (controller, handle) = WeatherController::new(
        &Config::default(),
        weather.clone(),
        Arc::new(FakeCities::default()),
        Arc::new(UnavailablePositionProvider),
    );
    tokio::spawn(controller.run());
    let mut rx = handle.subscribe();

    let state = wait_for(&mut rx, |s| s.location.bundle.is_some()).await;

    assert_eq!(state.location.bundle.expect("bundle").coordinate, DEFAULT_COORDINATE);
    assert_eq!(state.location.location_error, Some(LocationError::PositionUnavailable));
    assert_eq!(state.location.mode, SelectionMode::Automatic);
    assert_eq!(weather.fetched(), vec![DEFAULT_COORDINATE]);
}

#[tokio::test(start_paused = true)]
async fn location_error_is_cleared_by_next_reading() {
    let h = start(ScriptedWeather::default());
    let mut rx = h.handle.subscribe();

    h.readings.send(Err(LocationError::PermissionDenied)).unwrap();
    let state = wait_for(&mut rx, |s| s.location.bundle.is_some()).await;
    assert_eq!(state.location.location_error, Some(LocationError::PermissionDenied));
    assert_eq!(state.location.bundle.expect("bundle").coordinate, DEFAULT_COORDINATE);
    assert_eq!(h.live.load(Ordering::SeqCst), 0);

    h.handle.use_current_location().unwrap();
    h.readings.send(reading(30.0, 30.0)).unwrap();
    let state = wait_for(&mut rx, |s| {
        s.location
            .bundle
            .as_ref()
            .is_some_and(|b| b.coordinate == Coordinate::new(30.0, 30.0))
    })
    .await;
    assert_eq!(state.location.location_error, None);
}

#[tokio::test(start_paused = true)]
async fn search_is_debounced_and_selection_switches_to_manual() {
    let h = start(ScriptedWeather::default());
    let mut rx = h.handle.subscribe();

    h.handle.search("Pa").unwrap();
    h.handle.search("Par").unwrap();
    h.handle.search("Pari").unwrap();
    h.handle.search("Paris").unwrap();

    let state = wait_for(&mut rx, |s| !s.search.suggestions.is_empty()).await;
    assert_eq!(state.search.query, "Paris");
    assert!(!state.search.loading);
    assert_eq!(h.cities.queries.lock().unwrap().as_slice(), &["Paris".to_string()]);

    h.handle.select_suggestion(1).unwrap();
    let state = wait_for(&mut rx, |s| s.location.bundle.is_some()).await;

    assert_eq!(state.location.mode, SelectionMode::Manual);
    assert_eq!(state.location.coordinate, Coordinate::new(33.6609, -95.5555));
    assert_eq!(state.location.city.as_ref().map(|c| c.country.as_str()), Some("US"));
    assert!(state.search.query.is_empty());
    assert!(state.search.suggestions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn short_query_never_reaches_provider() {
    let h = start(ScriptedWeather::default());

    h.handle.search("Pa").unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let state = h.handle.snapshot();
    assert_eq!(state.search.query, "Pa");
    assert!(state.search.suggestions.is_empty());
    assert!(!state.search.loading);
    assert!(h.cities.queries.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_everything() {
    let a = Coordinate::new(10.0, 10.0);
    let h = start(ScriptedWeather {
        slow: vec![(a, Duration::from_secs(30))],
        ..ScriptedWeather::default()
    });
    let mut rx = h.handle.subscribe();

    h.readings.send(reading(a.lat, a.lon)).unwrap();
    wait_for(&mut rx, |s| s.location.loading).await;

    h.handle.shutdown().unwrap();
    h.task.await.expect("controller task");
    settle().await;

    assert_eq!(h.live.load(Ordering::SeqCst), 0);
    assert_eq!(h.handle.use_current_location(), Err(ControllerClosed));
    assert!(h.handle.snapshot().location.bundle.is_none());
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_stops_the_controller() {
    let (controller, handle) = WeatherController::new(
        &config(),
        Arc::new(ScriptedWeather::default()),
        Arc::new(FakeCities::default()),
        Arc::new(UnavailablePositionProvider),
    );
    let task = tokio::spawn(controller.run());

    drop(handle);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("controller did not stop")
        .expect("controller task");
}
