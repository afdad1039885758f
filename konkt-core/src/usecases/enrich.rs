use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::time::timeout;

use konkt_entities::{
    geo::MapPoint,
    id::Id,
    venue::{VenueDetail, VenueRecord, VenueSummary},
};

use crate::{
    cache::{Cache, NS_PLACES},
    clock::Clock,
    gateways::venues::VenueGateway,
    quota::{QuotaTracker, ENDPOINT_PLACE_DETAILS},
    store::KeyValueStore,
};

use super::resolve_address::DEFAULT_PROVIDER_TIMEOUT;

/// Venue details change rarely; the persistent entries are long-lived
/// enough to count as indefinite.
pub const DEFAULT_DETAILS_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnricherOptions {
    pub provider_timeout: Duration,
    pub request_delay: Duration,
    pub details_ttl: Duration,
}

impl Default for EnricherOptions {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            request_delay: DEFAULT_REQUEST_DELAY,
            details_ttl: DEFAULT_DETAILS_TTL,
        }
    }
}

/// Fetches venue-intrinsic details under the per-id cache/quota/
/// timeout discipline.
///
/// A process-local map sits in front of the persistent cache for
/// details already fetched this session, so an id is never fetched
/// twice within one process lifetime.
#[derive(Debug)]
pub struct DetailEnricher<V, S, C> {
    gateway: Arc<V>,
    cache: Arc<Cache<S, C>>,
    quota: Arc<QuotaTracker<S, C>>,
    session: Mutex<HashMap<Id, VenueRecord>>,
    options: EnricherOptions,
}

impl<V, S, C> DetailEnricher<V, S, C>
where
    V: VenueGateway,
    S: KeyValueStore,
    C: Clock,
{
    pub fn new(
        gateway: Arc<V>,
        cache: Arc<Cache<S, C>>,
        quota: Arc<QuotaTracker<S, C>>,
        options: EnricherOptions,
    ) -> Self {
        Self {
            gateway,
            cache,
            quota,
            session: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// Enrich the given summaries in order, attaching the straight-line
    /// distance from `origin`.
    ///
    /// Individual failures drop that venue from the result, never the
    /// whole batch.
    pub async fn enrich(&self, summaries: &[VenueSummary], origin: MapPoint) -> Vec<VenueDetail> {
        let mut details = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if let Some(record) = self.fetch_record(&summary.id).await {
                let distance = MapPoint::distance(origin, record.pos);
                details.push(VenueDetail::from((record, distance)));
            }
        }
        details
    }

    async fn fetch_record(&self, id: &Id) -> Option<VenueRecord> {
        if let Some(record) = self.lock_session().get(id).cloned() {
            return Some(record);
        }

        let cache_key = details_cache_key(id);
        if let Some(record) = self.cache.get::<VenueRecord>(&cache_key) {
            self.lock_session().insert(id.clone(), record.clone());
            return Some(record);
        }

        // Space the call out first: a details fetch right on the heels
        // of the preceding provider call would trip the quota
        // tracker's min-interval check.
        tokio::time::sleep(self.options.request_delay).await;
        if let Err(err) = self.quota.check_and_consume() {
            log::warn!("Skipping details for venue {id}: {err}");
            return None;
        }
        self.quota.track_endpoint_call(ENDPOINT_PLACE_DETAILS);

        match timeout(self.options.provider_timeout, self.gateway.venue_details(id)).await {
            Ok(Ok(record)) => {
                if let Err(err) = self.cache.set(&cache_key, &record, self.options.details_ttl) {
                    log::warn!("Failed to cache details for venue {id}: {err}");
                }
                self.lock_session().insert(id.clone(), record.clone());
                Some(record)
            }
            Ok(Err(err)) => {
                log::warn!("Fetching details for venue {id} failed: {err}");
                None
            }
            Err(_) => {
                log::warn!("Fetching details for venue {id} timed out");
                None
            }
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, HashMap<Id, VenueRecord>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poison_err) => {
                log::error!("A poisoned detail session lock was found.");
                poison_err.into_inner()
            }
        }
    }
}

fn details_cache_key(id: &Id) -> String {
    format!("{NS_PLACES}detail_{id}")
}
