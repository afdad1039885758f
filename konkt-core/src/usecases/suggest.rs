use std::{sync::Arc, time::Duration};

use tokio::time::timeout;

use konkt_entities::geocoding::AddressSuggestion;

use crate::{
    cache::{Cache, NS_SUGGESTIONS},
    clock::Clock,
    gateways::venues::VenueGateway,
    quota::{QuotaTracker, ENDPOINT_AUTOCOMPLETE},
    store::KeyValueStore,
};

use super::{debounce::Debouncer, resolve_address::DEFAULT_PROVIDER_TIMEOUT};

/// Suggestions are short-lived compared to geocode results.
pub const DEFAULT_SUGGESTIONS_TTL: Duration = Duration::from_secs(60 * 60);

/// Inputs shorter than this are not worth a provider round trip.
const MIN_INPUT_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionOptions {
    pub provider_timeout: Duration,
    pub suggestions_ttl: Duration,
}

impl Default for SuggestionOptions {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            suggestions_ttl: DEFAULT_SUGGESTIONS_TTL,
        }
    }
}

/// Autocomplete predictions for partial address input.
///
/// Failures always degrade to an empty suggestion list; an assist
/// widget must never block the form it assists.
#[derive(Debug)]
pub struct SuggestionService<V, S, C> {
    gateway: Arc<V>,
    cache: Arc<Cache<S, C>>,
    quota: Arc<QuotaTracker<S, C>>,
    options: SuggestionOptions,
}

impl<V, S, C> SuggestionService<V, S, C>
where
    V: VenueGateway,
    S: KeyValueStore,
    C: Clock,
{
    pub fn new(
        gateway: Arc<V>,
        cache: Arc<Cache<S, C>>,
        quota: Arc<QuotaTracker<S, C>>,
        options: SuggestionOptions,
    ) -> Self {
        Self {
            gateway,
            cache,
            quota,
            options,
        }
    }

    pub async fn suggestions(&self, input: &str) -> Vec<AddressSuggestion> {
        let trimmed = input.trim();
        if trimmed.chars().count() < MIN_INPUT_LEN {
            return Vec::new();
        }

        let cache_key = suggestions_cache_key(trimmed);
        if let Some(hit) = self.cache.get::<Vec<AddressSuggestion>>(&cache_key) {
            return hit;
        }

        self.quota.track_endpoint_call(ENDPOINT_AUTOCOMPLETE);
        match timeout(
            self.options.provider_timeout,
            self.gateway.autocomplete(trimmed),
        )
        .await
        {
            Ok(Ok(predictions)) => {
                if let Err(err) =
                    self.cache
                        .set(&cache_key, &predictions, self.options.suggestions_ttl)
                {
                    log::warn!("Failed to cache suggestions for {trimmed:?}: {err}");
                }
                predictions
            }
            Ok(Err(err)) => {
                log::warn!("Autocomplete for {trimmed:?} failed: {err}");
                Vec::new()
            }
            Err(_) => {
                log::warn!("Autocomplete for {trimmed:?} timed out");
                Vec::new()
            }
        }
    }
}

/// Debouncing front for interactive callers, sharing the resolver's
/// coalescing semantics.
#[derive(Debug)]
pub struct DebouncedSuggestions<V, S, C> {
    service: Arc<SuggestionService<V, S, C>>,
    debouncer: Debouncer,
}

impl<V, S, C> DebouncedSuggestions<V, S, C>
where
    V: VenueGateway + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
{
    pub fn new(service: Arc<SuggestionService<V, S, C>>, window: Duration) -> Self {
        Self {
            service,
            debouncer: Debouncer::new(window),
        }
    }

    pub fn suggest_debounced<F>(&self, input: String, on_result: F)
    where
        F: FnOnce(Vec<AddressSuggestion>) + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        self.debouncer.schedule(async move {
            on_result(service.suggestions(&input).await);
        });
    }

    pub fn cancel(&self) {
        self.debouncer.cancel();
    }
}

fn suggestions_cache_key(input: &str) -> String {
    format!("{NS_SUGGESTIONS}{}", input.to_lowercase())
}
