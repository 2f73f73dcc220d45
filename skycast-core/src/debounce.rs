//! Coordinate debouncing.
//!
//! The debouncer holds no timer of its own: it exposes the deadline of its
//! pending value and the owning loop sleeps until then and calls [`fire`].
//! That keeps emission on the same task that owns the state store.
//!
//! [`fire`]: CoordinateDebouncer::fire

use std::time::Duration;

use tokio::time::Instant;

use crate::coordinate::Coordinate;

#[derive(Debug, Clone, Copy)]
struct Pending {
    coordinate: Coordinate,
    deadline: Instant,
}

#[derive(Debug)]
pub struct CoordinateDebouncer {
    window: Duration,
    epsilon: f64,
    pending: Option<Pending>,
    last_emitted: Option<Coordinate>,
}

impl CoordinateDebouncer {
    pub fn new(window: Duration, epsilon: f64) -> Self {
        Self {
            window,
            epsilon,
            pending: None,
            last_emitted: None,
        }
    }

    /// Restart the quiet period with `coordinate`.
    ///
    /// A push within epsilon of the pending value keeps the pending value, so a
    /// jittery sensor doesn't walk the emitted coordinate away from its first fix.
    pub fn push(&mut self, coordinate: Coordinate, now: Instant) {
        let coordinate = match self.pending {
            Some(p) if p.coordinate.approx_eq(&coordinate, self.epsilon) => p.coordinate,
            _ => coordinate,
        };
        self.pending = Some(Pending {
            coordinate,
            deadline: now + self.window,
        });
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Emit the pending coordinate if its quiet period is over.
    ///
    /// Returns `None` before the deadline, and also when the value lies within
    /// epsilon of the last emitted coordinate (the pending value is consumed).
    pub fn fire(&mut self, now: Instant) -> Option<Coordinate> {
        let pending = self.pending.filter(|p| now >= p.deadline)?;
        self.pending = None;

        if self
            .last_emitted
            .is_some_and(|last| last.approx_eq(&pending.coordinate, self.epsilon))
        {
            tracing::debug!(coordinate = %pending.coordinate, "Suppressed duplicate coordinate");
            return None;
        }

        self.last_emitted = Some(pending.coordinate);
        Some(pending.coordinate)
    }

    /// Drop the pending value and forget what was last emitted.
    ///
    /// Used when the user changes source explicitly, so re-selecting the
    /// same place still goes through.
    pub fn reset(&mut self) {
        self.pending = None;
        self.last_emitted = None;
    }
}
