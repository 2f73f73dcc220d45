//! Reducer: every state transition lives here.
//!
//! Fetch lifecycle per generation: Idle -> Loading -> Success | Failed, and
//! back to Loading on the next settled coordinate. A result is committed only
//! if its generation is still current, so when requests race the newest one
//! wins no matter which response arrives last.

use std::sync::Arc;

use crate::action::{Action, Effect};
use crate::coordinate::{City, Coordinate};
use crate::error::{FetchError, SearchError};
use crate::model::{FetchGeneration, WeatherBundle};
use crate::search::is_searchable;
use crate::state::{AppState, SearchState, SelectionMode};
use crate::store::DispatchResult;

pub fn reducer(state: &mut AppState, action: Action) -> DispatchResult<Effect> {
    match action {
        Action::SetManualLocation(city) => select_city(state, city),

        Action::SearchSelect(index) => match state.search.suggestions.get(index).cloned() {
            Some(city) => select_city(state, city),
            None => DispatchResult::unchanged(),
        },

        Action::UseCurrentLocation => {
            let loc = &mut state.location;
            loc.mode = SelectionMode::Automatic;
            loc.city = None;
            loc.location_error = None;
            tracing::info!("Following device location");
            // Restart the watch so a fresh reading arrives even if the device
            // has not moved since the last one.
            DispatchResult::changed_with_many(vec![
                Effect::ResetDebouncer,
                Effect::DisableGeolocation,
                Effect::EnableGeolocation,
            ])
        }

        Action::GeolocationDidUpdate(coordinate) => {
            let loc = &mut state.location;
            if loc.is_manual() {
                tracing::debug!(%coordinate, "Ignoring geolocation reading in manual mode");
                return DispatchResult::unchanged();
            }
            let moved = loc.coordinate != coordinate;
            let had_error = loc.location_error.take().is_some();
            loc.coordinate = coordinate;

            DispatchResult {
                changed: moved || had_error,
                effects: vec![Effect::DebounceCoordinate(coordinate)],
            }
        }

        Action::GeolocationDidFail(err) => {
            let loc = &mut state.location;
            if loc.is_manual() {
                return DispatchResult::unchanged();
            }
            tracing::warn!(
                error = %err,
                fallback = %loc.coordinate,
                "Geolocation failed, using fallback"
            );
            loc.location_error = Some(err);
            // Keep the current coordinate (the configured default until a reading
            // succeeds) and make sure it gets fetched.
            DispatchResult::changed_with(Effect::DebounceCoordinate(loc.coordinate))
        }

        Action::CoordinateDidSettle(coordinate) => request(state, coordinate),

        Action::ApplyFetchResult { generation, result } => {
            apply_fetch_result(state, generation, result)
        }

        Action::SearchQueryChange(query) => {
            let search = &mut state.search;
            if search.query == query {
                return DispatchResult::unchanged();
            }
            search.query = query;

            if is_searchable(&search.query) {
                search.loading = true;
                DispatchResult::changed_with(Effect::SearchCities {
                    query: search.query.clone(),
                })
            } else {
                search.clear();
                DispatchResult::changed_with(Effect::CancelSearch)
            }
        }

        Action::SearchDidLoad { query, result } => apply_search_result(state, query, result),

        Action::Shutdown => DispatchResult::unchanged(),
    }
}

fn select_city(state: &mut AppState, city: City) -> DispatchResult<Effect> {
    let coordinate = city.coordinate();
    tracing::info!(city = %city.label(), %coordinate, "Manual location selected");

    let loc = &mut state.location;
    loc.mode = SelectionMode::Manual;
    loc.coordinate = coordinate;
    loc.city = Some(city);
    // A geolocation fetch still in flight must not land next to the new city.
    loc.generation = loc.generation.next();
    loc.loading = false;

    state.search = SearchState::default();

    DispatchResult::changed_with_many(vec![
        Effect::DisableGeolocation,
        Effect::CancelFetch,
        Effect::ResetDebouncer,
        Effect::DebounceCoordinate(coordinate),
        Effect::CancelSearch,
    ])
}

fn request(state: &mut AppState, coordinate: Coordinate) -> DispatchResult<Effect> {
    let loc = &mut state.location;

    if loc
        .last_fetched
        .is_some_and(|last| last.approx_eq(&coordinate, loc.epsilon))
    {
        // The bundle on screen is for this place; an error from a fetch
        // elsewhere no longer applies.
        let had_error = loc.error.take().is_some();
        if !loc.loading {
            tracing::debug!(%coordinate, "Weather already current for coordinate");
            return DispatchResult {
                changed: had_error,
                effects: vec![],
            };
        }
        // Back to the place we already have data for while another fetch is
        // running: retire that fetch instead of refetching.
        loc.generation = loc.generation.next();
        loc.loading = false;
        return DispatchResult::changed_with(Effect::CancelFetch);
    }

    loc.generation = loc.generation.next();
    loc.loading = true;
    tracing::debug!(generation = %loc.generation, %coordinate, "Requesting weather");

    DispatchResult::changed_with(Effect::FetchWeather {
        generation: loc.generation,
        coordinate,
    })
}

fn apply_fetch_result(
    state: &mut AppState,
    generation: FetchGeneration,
    result: Result<WeatherBundle, FetchError>,
) -> DispatchResult<Effect> {
    let loc = &mut state.location;
    if generation != loc.generation {
        tracing::debug!(
            %generation,
            current = %loc.generation,
            "Discarding superseded fetch result"
        );
        return DispatchResult::unchanged();
    }

    loc.loading = false;
    match result {
        Ok(bundle) => {
            tracing::info!(%generation, coordinate = %bundle.coordinate, "Weather updated");
            loc.last_fetched = Some(bundle.coordinate);
            loc.bundle = Some(Arc::new(bundle));
            loc.error = None;
        }
        Err(err) => {
            tracing::warn!(%generation, error = %err, "Weather fetch failed");
            loc.error = Some(err);
        }
    }
    DispatchResult::changed()
}

fn apply_search_result(
    state: &mut AppState,
    query: String,
    result: Result<Vec<City>, SearchError>,
) -> DispatchResult<Effect> {
    let search = &mut state.search;
    if query != search.query {
        tracing::debug!(%query, "Discarding results for stale search query");
        return DispatchResult::unchanged();
    }

    search.loading = false;
    match result {
        Ok(cities) => {
            search.suggestions = cities;
            search.error = None;
        }
        Err(err) => {
            tracing::warn!(%query, error = %err, "City search failed");
            search.suggestions.clear();
            search.error = Some(err);
        }
    }
    DispatchResult::changed()
}
