use std::sync::Arc;

use konkt_core::{
    cache::Cache,
    clock::Clock,
    gateways::{geocode::GeocodingGateway, venues::VenueGateway},
    quota::QuotaTracker,
    store::KeyValueStore,
    usecases::{
        AddressResolver, DebouncedResolver, DebouncedSuggestions, DetailEnricher,
        SuggestionService, VenueSearchOrchestrator,
    },
};
use konkt_entities::category::Category;

use crate::config::Config;

/// The wired-up orchestration core: one shared cache and quota
/// tracker, explicitly passed to every component that needs them.
#[derive(Debug)]
pub struct Services<G, V, S, C> {
    pub cache: Arc<Cache<S, C>>,
    pub quota: Arc<QuotaTracker<S, C>>,
    pub resolver: Arc<AddressResolver<G, S, C>>,
    pub enricher: Arc<DetailEnricher<V, S, C>>,
    pub orchestrator: Arc<VenueSearchOrchestrator<V, S, C>>,
    pub suggestions: Arc<SuggestionService<V, S, C>>,
    pub(crate) categories: Vec<Category>,
    pub(crate) radius_meters: u32,
    pub(crate) page_size: usize,
}

impl<G, V, S, C> Services<G, V, S, C>
where
    G: GeocodingGateway,
    V: VenueGateway,
    S: KeyValueStore,
    C: Clock,
{
    pub fn new(geocoder: Arc<G>, venues: Arc<V>, store: S, clock: C, config: &Config) -> Self {
        let cache = Arc::new(Cache::new(store, clock));
        let quota = Arc::new(QuotaTracker::new(
            Arc::clone(&cache),
            config.quota_limits(),
        ));
        let resolver = Arc::new(AddressResolver::new(
            geocoder,
            Arc::clone(&cache),
            Arc::clone(&quota),
            config.resolver_options(),
        ));
        let enricher = Arc::new(DetailEnricher::new(
            Arc::clone(&venues),
            Arc::clone(&cache),
            Arc::clone(&quota),
            config.enricher_options(),
        ));
        let orchestrator = Arc::new(VenueSearchOrchestrator::new(
            Arc::clone(&venues),
            Arc::clone(&cache),
            Arc::clone(&quota),
            Arc::clone(&enricher),
            config.search_options(),
        ));
        let suggestions = Arc::new(SuggestionService::new(
            venues,
            Arc::clone(&cache),
            Arc::clone(&quota),
            config.suggestion_options(),
        ));
        Self {
            cache,
            quota,
            resolver,
            enricher,
            orchestrator,
            suggestions,
            categories: config.search.categories.clone(),
            radius_meters: config.search.radius_meters,
            page_size: config.search.page_size,
        }
    }

    pub fn remaining_searches(&self) -> u32 {
        self.quota.remaining_calls()
    }
}

impl<G, V, S, C> Services<G, V, S, C>
where
    G: GeocodingGateway + 'static,
    V: VenueGateway + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
{
    /// The debouncing front ends for interactive callers.
    pub fn debounced_resolver(&self, window: std::time::Duration) -> DebouncedResolver<G, S, C> {
        DebouncedResolver::new(Arc::clone(&self.resolver), window)
    }

    pub fn debounced_suggestions(
        &self,
        window: std::time::Duration,
    ) -> DebouncedSuggestions<V, S, C> {
        DebouncedSuggestions::new(Arc::clone(&self.suggestions), window)
    }
}
