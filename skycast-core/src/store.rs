//! Single-writer state store with an effect-emitting reducer.

use crate::action::{Action, Effect};
use crate::state::AppState;

/// Result of dispatching an action: whether state changed, plus effects to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult<E> {
    pub changed: bool,
    pub effects: Vec<E>,
}

impl<E> Default for DispatchResult<E> {
    fn default() -> Self {
        Self::unchanged()
    }
}

impl<E> DispatchResult<E> {
    #[inline]
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            effects: vec![],
        }
    }

    #[inline]
    pub fn changed() -> Self {
        Self {
            changed: true,
            effects: vec![],
        }
    }

    /// No state change, one effect.
    #[inline]
    pub fn effect(effect: E) -> Self {
        Self {
            changed: false,
            effects: vec![effect],
        }
    }

    #[inline]
    pub fn changed_with(effect: E) -> Self {
        Self {
            changed: true,
            effects: vec![effect],
        }
    }

    #[inline]
    pub fn changed_with_many(effects: Vec<E>) -> Self {
        Self {
            changed: true,
            effects,
        }
    }

    #[inline]
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }
}

pub type Reducer = fn(&mut AppState, Action) -> DispatchResult<Effect>;

/// Holds the state; `dispatch` is the only way to change it.
pub struct Store {
    state: AppState,
    reducer: Reducer,
}

impl Store {
    pub fn new(state: AppState, reducer: Reducer) -> Self {
        Self { state, reducer }
    }

    pub fn dispatch(&mut self, action: Action) -> DispatchResult<Effect> {
        let name = action.name();
        let result = (self.reducer)(&mut self.state, action);
        tracing::debug!(
            action = name,
            changed = result.changed,
            effects = result.effects.len(),
            "Action processed"
        );
        result
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}
