use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use konkt_entities::time::Timestamp;

use crate::{
    cache::{Cache, NS_RATE_LIMIT},
    clock::Clock,
    store::KeyValueStore,
};

/// Endpoint names used for the per-endpoint call breakdown.
pub const ENDPOINT_GEOCODE: &str = "geocode";
pub const ENDPOINT_NEARBY_SEARCH: &str = "nearby_search";
pub const ENDPOINT_PLACE_DETAILS: &str = "place_details";
pub const ENDPOINT_AUTOCOMPLETE: &str = "autocomplete";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    /// Daily cap protecting against provider billing overages.
    pub max_calls_per_window: u32,
    pub window: Duration,
    /// Burst limiter protecting against UI pathologies such as rapid
    /// keystrokes. Distinct from the daily cap on purpose.
    pub min_call_interval: Duration,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            max_calls_per_window: 100,
            window: Duration::from_secs(24 * 60 * 60),
            min_call_interval: Duration::from_millis(200),
        }
    }
}

/// Persisted call-budget state for the current quota window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub window_start: Timestamp,
    pub call_count: u32,
    pub last_call: Option<Timestamp>,
    #[serde(default)]
    pub calls_by_endpoint: BTreeMap<String, u64>,
}

impl QuotaState {
    fn fresh(now: Timestamp) -> Self {
        Self {
            window_start: now,
            call_count: 0,
            last_call: None,
            calls_by_endpoint: BTreeMap::new(),
        }
    }

    fn window_expired(&self, now: Timestamp, window: Duration) -> bool {
        match now.duration_since(self.window_start) {
            Some(elapsed) => elapsed > window,
            // A window start in the future can only come from a
            // clock jump; start over.
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("call quota exhausted ({used}/{max}), resets at {resets_at}")]
    Exceeded {
        resets_at: Timestamp,
        used: u32,
        max: u32,
    },
    #[error("calls too frequent, retry in {retry_after:?}")]
    TooFrequent { retry_after: Duration },
}

/// Tracks provider calls against a fixed window with a daily cap and
/// a minimum inter-call spacing. State is persisted through the cache
/// under the `rate_limit` key after every mutation.
///
/// The check-then-increment sequence runs under a mutex so the
/// at-most-N-per-window invariant holds on a multi-threaded runtime.
#[derive(Debug)]
pub struct QuotaTracker<S, C> {
    cache: Arc<Cache<S, C>>,
    limits: QuotaLimits,
    mutation: Mutex<()>,
}

impl<S: KeyValueStore, C: Clock> QuotaTracker<S, C> {
    pub fn new(cache: Arc<Cache<S, C>>, limits: QuotaLimits) -> Self {
        Self {
            cache,
            limits,
            mutation: Mutex::new(()),
        }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    /// Consume one call from the budget.
    ///
    /// Fails without mutating stored state when the window budget is
    /// exhausted or the previous call was less than the minimum
    /// interval ago.
    pub fn check_and_consume(&self) -> Result<(), QuotaError> {
        let _guard = self.lock_mutation();
        let now = self.cache.now();
        let mut state = self.load(now);

        if state.call_count >= self.limits.max_calls_per_window {
            return Err(QuotaError::Exceeded {
                resets_at: state.window_start + self.limits.window,
                used: state.call_count,
                max: self.limits.max_calls_per_window,
            });
        }
        if let Some(last_call) = state.last_call {
            let elapsed = now.duration_since(last_call).unwrap_or_default();
            if elapsed < self.limits.min_call_interval {
                return Err(QuotaError::TooFrequent {
                    retry_after: self.limits.min_call_interval - elapsed,
                });
            }
        }

        state.call_count += 1;
        state.last_call = Some(now);
        self.persist(&state);
        Ok(())
    }

    /// Record a call against the per-endpoint breakdown.
    ///
    /// Observability only: independent of the consume path and never
    /// blocking.
    pub fn track_endpoint_call(&self, endpoint: &str) {
        let _guard = self.lock_mutation();
        let now = self.cache.now();
        let mut state = self.load(now);
        *state
            .calls_by_endpoint
            .entry(endpoint.to_owned())
            .or_insert(0) += 1;
        self.persist(&state);
    }

    /// Remaining calls against the current (possibly stale) window.
    ///
    /// The count may be off by the reset-window boundary condition;
    /// callers must tolerate that.
    pub fn remaining_calls(&self) -> u32 {
        let state = self.load(self.cache.now());
        self.limits
            .max_calls_per_window
            .saturating_sub(state.call_count)
    }

    pub fn snapshot(&self) -> QuotaState {
        self.load(self.cache.now())
    }

    fn load(&self, now: Timestamp) -> QuotaState {
        let state = self
            .cache
            .get::<QuotaState>(NS_RATE_LIMIT)
            .unwrap_or_else(|| QuotaState::fresh(now));
        if state.window_expired(now, self.limits.window) {
            QuotaState::fresh(now)
        } else {
            state
        }
    }

    fn persist(&self, state: &QuotaState) {
        if let Err(err) = self.cache.set(NS_RATE_LIMIT, state, self.limits.window) {
            log::warn!("Failed to persist quota state: {err}");
        }
    }

    fn lock_mutation(&self) -> MutexGuard<'_, ()> {
        match self.mutation.lock() {
            Ok(guard) => guard,
            Err(poison_err) => {
                log::error!("A poisoned quota mutation lock was found.");
                poison_err.into_inner()
            }
        }
    }
}
