//! Device geolocation as a start/stop subscription.
//!
//! A [`GeolocationSource`] owns at most one platform watch at a time. While
//! enabled it forwards each reading (or the first failure) to the owner's
//! channel as a [`GeoEvent`]. It never retries on its own: after a failure
//! the watch ends and the owner has to enable it again.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{coordinate::Coordinate, error::LocationError};

/// A single reading from the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of uncertainty in meters.
    pub accuracy: f64,
}

impl Position {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// How long to wait for the watch and its first reading before
    /// reporting `Timeout`. Later readings may be arbitrarily far apart.
    pub timeout: Duration,
    pub high_accuracy: bool,
    /// Oldest cached reading the platform may return.
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            high_accuracy: true,
            maximum_age: Duration::ZERO,
        }
    }
}

/// Platform location service.
#[async_trait]
pub trait PositionProvider: Send + Sync + Debug {
    /// Register a continuous watch. Dropping the returned watch releases it.
    async fn watch(&self, options: &WatchOptions) -> Result<Box<dyn PositionWatch>, LocationError>;
}

/// An active platform watch.
#[async_trait]
pub trait PositionWatch: Send {
    async fn next_position(&mut self) -> Result<Position, LocationError>;
}

/// For hosts without a location service: every watch fails immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailablePositionProvider;

#[async_trait]
impl PositionProvider for UnavailablePositionProvider {
    async fn watch(
        &self,
        _options: &WatchOptions,
    ) -> Result<Box<dyn PositionWatch>, LocationError> {
        Err(LocationError::PositionUnavailable)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoEvent {
    Position(Coordinate),
    Error(LocationError),
}

pub struct GeolocationSource<M> {
    provider: Arc<dyn PositionProvider>,
    options: WatchOptions,
    tx: mpsc::UnboundedSender<M>,
    watch: Option<JoinHandle<()>>,
}

impl<M> GeolocationSource<M>
where
    M: From<GeoEvent> + Send + 'static,
{
    pub fn new(
        provider: Arc<dyn PositionProvider>,
        options: WatchOptions,
        tx: mpsc::UnboundedSender<M>,
    ) -> Self {
        Self {
            provider,
            options,
            tx,
            watch: None,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Begin watching. No-op while a watch is live; restarts one that ended
    /// after a failure.
    pub fn start(&mut self) {
        if self.is_watching() {
            return;
        }

        let provider = self.provider.clone();
        let options = self.options;
        let tx = self.tx.clone();

        tracing::debug!(
            timeout_ms = options.timeout.as_millis() as u64,
            "Starting geolocation watch"
        );
        self.watch = Some(tokio::spawn(async move {
            run_watch(provider, options, tx).await;
        }));
    }

    /// Stop watching and release the platform watch.
    pub fn stop(&mut self) {
        if let Some(handle) = self.watch.take() {
            tracing::debug!("Stopping geolocation watch");
            handle.abort();
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watch.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<M> Drop for GeolocationSource<M> {
    fn drop(&mut self) {
        if let Some(handle) = self.watch.take() {
            handle.abort();
        }
    }
}

async fn run_watch<M>(
    provider: Arc<dyn PositionProvider>,
    options: WatchOptions,
    tx: mpsc::UnboundedSender<M>,
) where
    M: From<GeoEvent> + Send + 'static,
{
    let mut watch = match tokio::time::timeout(options.timeout, provider.watch(&options)).await {
        Ok(Ok(watch)) => watch,
        Ok(Err(err)) => {
            let _ = tx.send(GeoEvent::Error(err).into());
            return;
        }
        Err(_) => {
            let _ = tx.send(GeoEvent::Error(LocationError::Timeout).into());
            return;
        }
    };

    // A working watch only reports when the device moves, so only the first
    // fix is bounded by the timeout.
    let mut first_fix = true;
    loop {
        let reading = if first_fix {
            tokio::time::timeout(options.timeout, watch.next_position())
                .await
                .unwrap_or(Err(LocationError::Timeout))
        } else {
            watch.next_position().await
        };

        let event = match reading {
            Ok(position) => {
                first_fix = false;
                GeoEvent::Position(position.coordinate())
            }
            Err(err) => GeoEvent::Error(err),
        };

        let failed = matches!(event, GeoEvent::Error(_));
        if tx.send(event.into()).is_err() || failed {
            break;
        }
    }
}
