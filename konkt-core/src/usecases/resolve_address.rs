use std::{sync::Arc, time::Duration};

use tokio::time::timeout;

use konkt_entities::geocoding::GeocodeResult;

use crate::{
    cache::{Cache, NS_GEOCODE},
    clock::Clock,
    gateways::{self, geocode::GeocodingGateway},
    quota::{QuotaTracker, ENDPOINT_GEOCODE},
    store::KeyValueStore,
};

use super::{debounce::Debouncer, Error, Result};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_GEOCODE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub provider_timeout: Duration,
    pub geocode_ttl: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            geocode_ttl: DEFAULT_GEOCODE_TTL,
        }
    }
}

/// Turns free-text addresses into coordinates, consulting the cache
/// and enforcing the call quota.
#[derive(Debug)]
pub struct AddressResolver<G, S, C> {
    gateway: Arc<G>,
    cache: Arc<Cache<S, C>>,
    quota: Arc<QuotaTracker<S, C>>,
    options: ResolverOptions,
}

impl<G, S, C> AddressResolver<G, S, C>
where
    G: GeocodingGateway,
    S: KeyValueStore,
    C: Clock,
{
    pub fn new(
        gateway: Arc<G>,
        cache: Arc<Cache<S, C>>,
        quota: Arc<QuotaTracker<S, C>>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            gateway,
            cache,
            quota,
            options,
        }
    }

    /// Resolve an address to a location.
    ///
    /// Cache hits never consume quota. On a miss a single provider
    /// request is issued under a hard timeout; there is no automatic
    /// retry, the caller decides.
    pub async fn resolve(&self, address: &str) -> Result<GeocodeResult> {
        if address.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        // The raw address text as submitted is the cache key.
        let cache_key = geocode_cache_key(address);
        if let Some(hit) = self.cache.get::<GeocodeResult>(&cache_key) {
            log::debug!("Resolved {address:?} from cache");
            return Ok(hit);
        }

        self.quota.check_and_consume()?;
        self.quota.track_endpoint_call(ENDPOINT_GEOCODE);

        // Dropping the future on timeout cancels the in-flight
        // request.
        let response = timeout(
            self.options.provider_timeout,
            self.gateway.resolve_address(address),
        )
        .await
        .map_err(|_| Error::Timeout)?;

        match response {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(first) => {
                    let result = GeocodeResult {
                        pos: first.pos,
                        formatted_address: first.formatted_address,
                    };
                    if let Err(err) =
                        self.cache.set(&cache_key, &result, self.options.geocode_ttl)
                    {
                        log::warn!("Failed to cache geocode result for {address:?}: {err}");
                    }
                    log::debug!("Resolved {address:?} to {}", result.pos);
                    Ok(result)
                }
                None => Err(Error::NotFound {
                    address: address.to_owned(),
                    status: "zero candidates".to_owned(),
                }),
            },
            Err(gateways::Error::Provider(status)) => Err(Error::NotFound {
                address: address.to_owned(),
                status,
            }),
            Err(err @ gateways::Error::Transport(_)) => Err(err.into()),
        }
    }
}

/// Debouncing front for interactive callers: calls within the window
/// coalesce so only the last one reaches the resolver, and a
/// superseded callback never fires.
#[derive(Debug)]
pub struct DebouncedResolver<G, S, C> {
    resolver: Arc<AddressResolver<G, S, C>>,
    debouncer: Debouncer,
}

impl<G, S, C> DebouncedResolver<G, S, C>
where
    G: GeocodingGateway + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
{
    pub fn new(resolver: Arc<AddressResolver<G, S, C>>, window: Duration) -> Self {
        Self {
            resolver,
            debouncer: Debouncer::new(window),
        }
    }

    pub fn resolve_debounced<F>(&self, address: String, on_result: F)
    where
        F: FnOnce(Result<GeocodeResult>) + Send + 'static,
    {
        let resolver = Arc::clone(&self.resolver);
        self.debouncer.schedule(async move {
            let result = resolver.resolve(&address).await;
            on_result(result);
        });
    }

    pub fn cancel(&self) {
        self.debouncer.cancel();
    }
}

fn geocode_cache_key(address: &str) -> String {
    format!("{NS_GEOCODE}{address}")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{
        quota::{QuotaError, QuotaLimits},
        test_support::*,
    };

    type TestResolver = AddressResolver<MockGeocoder, MemStore, TokioClock>;

    fn new_resolver(
        gateway: Arc<MockGeocoder>,
        limits: QuotaLimits,
    ) -> (TestResolver, Arc<QuotaTracker<MemStore, TokioClock>>) {
        let cache = Arc::new(Cache::new(MemStore::default(), TokioClock::default()));
        let quota = Arc::new(QuotaTracker::new(Arc::clone(&cache), limits));
        let resolver = AddressResolver::new(gateway, cache, Arc::clone(&quota), ResolverOptions::default());
        (resolver, quota)
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_fails_before_cache_and_quota() {
        let gateway = Arc::new(MockGeocoder::default());
        let (resolver, quota) = new_resolver(Arc::clone(&gateway), QuotaLimits::default());

        assert!(matches!(resolver.resolve("").await, Err(Error::EmptyInput)));
        assert!(matches!(
            resolver.resolve("   ").await,
            Err(Error::EmptyInput)
        ));
        assert_eq!(0, gateway.calls.load(Ordering::SeqCst));
        assert_eq!(
            QuotaLimits::default().max_calls_per_window,
            quota.remaining_calls()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_resolve_within_ttl_hits_the_cache() {
        let gateway = Arc::new(MockGeocoder::default());
        gateway.insert("221B Baker Street", toronto_candidates());
        let (resolver, quota) = new_resolver(Arc::clone(&gateway), QuotaLimits::default());

        let first = resolver.resolve("221B Baker Street").await.unwrap();
        // Immediately again: a cache hit neither consumes quota nor
        // trips the min-interval check.
        let second = resolver.resolve("221B Baker Street").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(1, gateway.calls.load(Ordering::SeqCst));
        assert_eq!(
            QuotaLimits::default().max_calls_per_window - 1,
            quota.remaining_calls()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cache_key_is_case_sensitive_and_untrimmed() {
        let gateway = Arc::new(MockGeocoder::default());
        gateway.insert("main st", toronto_candidates());
        gateway.insert("Main St", toronto_candidates());
        let (resolver, _) = new_resolver(Arc::clone(&gateway), QuotaLimits::default());

        resolver.resolve("main st").await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        resolver.resolve("Main St").await.unwrap();
        assert_eq!(2, gateway.calls.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_failures_surface_as_rate_limited() {
        let gateway = Arc::new(MockGeocoder::default());
        gateway.insert("somewhere", toronto_candidates());
        let limits = QuotaLimits {
            max_calls_per_window: 0,
            ..QuotaLimits::default()
        };
        let (resolver, _) = new_resolver(Arc::clone(&gateway), limits);

        let err = resolver.resolve("somewhere").await.unwrap_err();
        assert!(matches!(
            err,
            Error::RateLimited(QuotaError::Exceeded { .. })
        ));
        assert_eq!(0, gateway.calls.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let gateway = Arc::new(MockGeocoder::default());
        gateway.insert("somewhere", toronto_candidates());
        gateway.set_delay(Duration::from_secs(11));
        let (resolver, _) = new_resolver(Arc::clone(&gateway), QuotaLimits::default());

        assert!(matches!(
            resolver.resolve("somewhere").await,
            Err(Error::Timeout)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_address_is_not_found_with_context() {
        let gateway = Arc::new(MockGeocoder::default());
        let (resolver, _) = new_resolver(Arc::clone(&gateway), QuotaLimits::default());

        match resolver.resolve("nowhere at all").await.unwrap_err() {
            Error::NotFound { address, .. } => assert_eq!("nowhere at all", address),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_resolution_coalesces_bursts() {
        let gateway = Arc::new(MockGeocoder::default());
        gateway.insert("final input", toronto_candidates());
        let (resolver, _) = new_resolver(Arc::clone(&gateway), QuotaLimits::default());
        let resolver = Arc::new(resolver);
        let debounced =
            DebouncedResolver::new(Arc::clone(&resolver), DEFAULT_DEBOUNCE_WINDOW);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for input in ["f", "fin", "final input"] {
            let tx = tx.clone();
            debounced.resolve_debounced(input.to_owned(), move |result| {
                tx.send(result.map(|r| r.formatted_address)).ok();
            });
        }
        drop(tx);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let delivered: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        // Only the last call in the burst reached the resolver.
        assert_eq!(1, delivered.len());
        assert_eq!(1, gateway.calls.load(Ordering::SeqCst));
    }
}
