use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use konkt_entities::{
    category::Category,
    meeting::MeetingPoint,
    venue::{VenueDetail, VenueSummary},
};

use crate::{
    cache::{Cache, NS_PLACES},
    clock::Clock,
    gateways::venues::{NearbySearchRequest, NearbyVenue, VenueGateway},
    quota::{QuotaTracker, ENDPOINT_NEARBY_SEARCH},
    store::KeyValueStore,
};

use super::{
    enrich::{DetailEnricher, DEFAULT_REQUEST_DELAY},
    resolve_address::DEFAULT_PROVIDER_TIMEOUT,
    Error, Result,
};

pub const DEFAULT_SEARCH_RADIUS_METERS: u32 = 1000;
pub const DEFAULT_MAX_TOTAL_RESULTS: usize = 60;
pub const DEFAULT_FIRST_PAGE_SIZE: usize = 5;
pub const DEFAULT_SEARCH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub provider_timeout: Duration,
    /// Spacing between consecutive category searches. Trades latency
    /// for quota-friendliness: near-simultaneous calls would trip the
    /// quota tracker's min-interval check.
    pub request_delay: Duration,
    pub search_ttl: Duration,
    pub max_total_results: usize,
    pub first_page_size: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            request_delay: DEFAULT_REQUEST_DELAY,
            search_ttl: DEFAULT_SEARCH_TTL,
            max_total_results: DEFAULT_MAX_TOTAL_RESULTS,
            first_page_size: DEFAULT_FIRST_PAGE_SIZE,
        }
    }
}

/// Filters the venue provider understands directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub open_now: bool,
}

#[derive(Debug, Clone)]
pub struct VenueSearchRequest {
    pub meeting_point: MeetingPoint,
    /// Searched in the given order; the order determines dedup
    /// attribution (first seen wins).
    pub categories: Vec<Category>,
    pub radius_meters: u32,
    pub filters: SearchFilters,
}

/// The deduplicated, capped outcome of a multi-category search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultSet {
    /// Deduplicated by venue id, provider-return order across
    /// categories, capped at the configured maximum.
    pub summaries: Vec<VenueSummary>,
    /// Unique venues before the cap was applied.
    pub total_count: usize,
    /// Categories skipped because their search failed. Not part of
    /// the cached value.
    #[serde(skip)]
    pub failed_categories: Vec<Category>,
}

impl SearchResultSet {
    /// The typed partial-failure outcome for callers that want to
    /// surface degraded results distinctly.
    pub fn partial_failure(&self, attempted: usize) -> Option<Error> {
        if self.failed_categories.is_empty() {
            None
        } else {
            Some(Error::PartialFailure {
                attempted,
                failed: self.failed_categories.len(),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedSearch {
    pub result_set: SearchResultSet,
    /// The eagerly enriched first page, sorted ascending by
    /// straight-line distance from the meeting point. This is the
    /// definitive display order.
    pub first_page: Vec<VenueDetail>,
}

/// Multi-category nearby search with deduplication, caching, and
/// first-page detail enrichment.
///
/// A search started later supersedes one still in flight: the stale
/// search's outcome is discarded so it can never clobber a newer
/// search's output.
#[derive(Debug)]
pub struct VenueSearchOrchestrator<V, S, C> {
    gateway: Arc<V>,
    cache: Arc<Cache<S, C>>,
    quota: Arc<QuotaTracker<S, C>>,
    enricher: Arc<DetailEnricher<V, S, C>>,
    options: SearchOptions,
    generation: AtomicU64,
}

impl<V, S, C> VenueSearchOrchestrator<V, S, C>
where
    V: VenueGateway,
    S: KeyValueStore,
    C: Clock,
{
    pub fn new(
        gateway: Arc<V>,
        cache: Arc<Cache<S, C>>,
        quota: Arc<QuotaTracker<S, C>>,
        enricher: Arc<DetailEnricher<V, S, C>>,
        options: SearchOptions,
    ) -> Self {
        Self {
            gateway,
            cache,
            quota,
            enricher,
            options,
            generation: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> SearchOptions {
        self.options
    }

    pub async fn search(&self, req: &VenueSearchRequest) -> Result<EnrichedSearch> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let result_set = self.load_result_set(req, generation).await?;

        // The first page is enriched even on a cache hit; the per-id
        // details cache keeps that cheap.
        let first_page_len = result_set
            .summaries
            .len()
            .min(self.options.first_page_size);
        let mut first_page = self
            .enricher
            .enrich(&result_set.summaries[..first_page_len], req.meeting_point.pos)
            .await;
        first_page.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if !self.is_current(generation) {
            log::debug!("Discarding superseded search result");
            return Err(Error::Superseded);
        }
        Ok(EnrichedSearch {
            result_set,
            first_page,
        })
    }

    async fn load_result_set(
        &self,
        req: &VenueSearchRequest,
        generation: u64,
    ) -> Result<SearchResultSet> {
        let cache_key = search_cache_key(req);
        if let Some(cached) = self.cache.get::<SearchResultSet>(&cache_key) {
            log::debug!("Search served from cache ({cache_key})");
            return Ok(cached);
        }

        let mut merged: Vec<VenueSummary> = Vec::new();
        let mut failed: Vec<Category> = Vec::new();
        let mut last_error: Option<Error> = None;

        // Sequential on purpose, see SearchOptions::request_delay.
        for category in &req.categories {
            if !self.is_current(generation) {
                return Err(Error::Superseded);
            }
            tokio::time::sleep(self.options.request_delay).await;

            self.quota.check_and_consume()?;
            self.quota.track_endpoint_call(ENDPOINT_NEARBY_SEARCH);

            let nearby = NearbySearchRequest {
                location: req.meeting_point.pos,
                radius_meters: req.radius_meters,
                category: category.clone(),
                open_now: req.filters.open_now,
            };
            match timeout(
                self.options.provider_timeout,
                self.gateway.search_nearby(&nearby),
            )
            .await
            {
                Ok(Ok(venues)) => {
                    merged.extend(
                        venues
                            .into_iter()
                            .map(|venue| into_summary(venue, category.clone())),
                    );
                }
                Ok(Err(err)) => {
                    log::warn!("Searching category {category} failed: {err}");
                    failed.push(category.clone());
                    last_error = Some(err.into());
                }
                Err(_) => {
                    log::warn!("Searching category {category} timed out");
                    failed.push(category.clone());
                    last_error = Some(Error::Timeout);
                }
            }
        }

        if merged.is_empty() && failed.len() == req.categories.len() {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        if !failed.is_empty() {
            log::warn!(
                "{} of {} category searches failed",
                failed.len(),
                req.categories.len()
            );
        }

        let unique: Vec<VenueSummary> = merged
            .into_iter()
            .unique_by(|venue| venue.id.clone())
            .collect();
        let total_count = unique.len();
        let mut summaries = unique;
        summaries.truncate(self.options.max_total_results);

        let result_set = SearchResultSet {
            summaries,
            total_count,
            failed_categories: failed,
        };
        if let Err(err) = self
            .cache
            .set(&cache_key, &result_set, self.options.search_ttl)
        {
            log::warn!("Failed to cache search results ({cache_key}): {err}");
        }
        Ok(result_set)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

fn into_summary(venue: NearbyVenue, category: Category) -> VenueSummary {
    let NearbyVenue {
        id,
        name,
        pos,
        types,
    } = venue;
    VenueSummary {
        id,
        name,
        pos,
        category,
        types,
    }
}

/// Canonical cache key: location rounded to cache granularity plus
/// radius, sorted categories and filters.
fn search_cache_key(req: &VenueSearchRequest) -> String {
    let (lat, lng) = req.meeting_point.pos.to_lat_lng_deg();
    let categories = req
        .categories
        .iter()
        .map(Category::as_str)
        .sorted_unstable()
        .join("+");
    let open_now = if req.filters.open_now { "open" } else { "any" };
    format!(
        "{NS_PLACES}{lat:.4}_{lng:.4}_{}_{categories}_{open_now}",
        req.radius_meters
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering as AtomicOrdering;

    use konkt_entities::{geo::MapPoint, meeting::Bias};

    use super::*;
    use crate::{
        quota::{QuotaError, QuotaLimits},
        test_support::*,
        usecases::enrich::EnricherOptions,
    };

    type TestOrchestrator = VenueSearchOrchestrator<MockVenueGateway, MemStore, TokioClock>;

    fn new_orchestrator(gateway: Arc<MockVenueGateway>, options: SearchOptions) -> TestOrchestrator {
        new_orchestrator_with_limits(gateway, options, QuotaLimits::default())
    }

    fn new_orchestrator_with_limits(
        gateway: Arc<MockVenueGateway>,
        options: SearchOptions,
        limits: QuotaLimits,
    ) -> TestOrchestrator {
        init_logging();
        let cache = Arc::new(Cache::new(MemStore::default(), TokioClock::default()));
        let quota = Arc::new(QuotaTracker::new(Arc::clone(&cache), limits));
        let enricher = Arc::new(DetailEnricher::new(
            Arc::clone(&gateway),
            Arc::clone(&cache),
            Arc::clone(&quota),
            EnricherOptions::default(),
        ));
        VenueSearchOrchestrator::new(gateway, cache, quota, enricher, options)
    }

    fn meeting_point() -> MeetingPoint {
        MeetingPoint {
            pos: MapPoint::from_lat_lng_deg(43.655, -79.39),
            bias: Bias::Middle,
        }
    }

    fn request(categories: &[&str]) -> VenueSearchRequest {
        VenueSearchRequest {
            meeting_point: meeting_point(),
            categories: categories.iter().map(|c| c.parse().unwrap()).collect(),
            radius_meters: DEFAULT_SEARCH_RADIUS_METERS,
            filters: SearchFilters::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dedup_is_first_seen_wins() {
        let gateway = Arc::new(MockVenueGateway::default());
        gateway.insert_nearby("restaurant", vec![nearby_venue("x", 43.656, -79.391)]);
        gateway.insert_nearby(
            "bar",
            vec![
                nearby_venue("x", 43.656, -79.391),
                nearby_venue("y", 43.657, -79.392),
            ],
        );
        gateway.insert_record(venue_record("x", 43.656, -79.391));
        gateway.insert_record(venue_record("y", 43.657, -79.392));
        let orchestrator = new_orchestrator(Arc::clone(&gateway), SearchOptions::default());

        let search = orchestrator
            .search(&request(&["restaurant", "bar"]))
            .await
            .unwrap();
        let set = &search.result_set;

        assert_eq!(2, set.total_count);
        assert_eq!(2, set.summaries.len());
        assert_eq!("x", set.summaries[0].id.as_str());
        // "x" is attributed to the category that returned it first.
        assert_eq!("restaurant", set.summaries[0].category.as_str());
        assert_eq!("bar", set.summaries[1].category.as_str());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_results_everywhere_is_an_empty_success() {
        let gateway = Arc::new(MockVenueGateway::default());
        let orchestrator = new_orchestrator(Arc::clone(&gateway), SearchOptions::default());

        let search = orchestrator
            .search(&request(&["restaurant", "bar"]))
            .await
            .unwrap();
        assert!(search.result_set.summaries.is_empty());
        assert_eq!(0, search.result_set.total_count);
        assert!(search.result_set.failed_categories.is_empty());
        assert!(search.first_page.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_category_is_skipped_not_fatal() {
        let gateway = Arc::new(MockVenueGateway::default());
        gateway.insert_nearby("bar", vec![nearby_venue("y", 43.657, -79.392)]);
        gateway.fail_category("restaurant", "UNKNOWN_ERROR");
        gateway.insert_record(venue_record("y", 43.657, -79.392));
        let orchestrator = new_orchestrator(Arc::clone(&gateway), SearchOptions::default());

        let search = orchestrator
            .search(&request(&["restaurant", "bar"]))
            .await
            .unwrap();
        let set = &search.result_set;

        assert_eq!(1, set.summaries.len());
        assert_eq!(1, set.failed_categories.len());
        assert_eq!("restaurant", set.failed_categories[0].as_str());
        assert!(matches!(
            set.partial_failure(2),
            Some(Error::PartialFailure {
                attempted: 2,
                failed: 1
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn all_categories_failing_is_fatal() {
        let gateway = Arc::new(MockVenueGateway::default());
        gateway.fail_category("restaurant", "UNKNOWN_ERROR");
        gateway.fail_category("bar", "UNKNOWN_ERROR");
        let orchestrator = new_orchestrator(Arc::clone(&gateway), SearchOptions::default());

        let err = orchestrator
            .search(&request(&["restaurant", "bar"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_capped_and_total_count_is_pre_cap() {
        let gateway = Arc::new(MockVenueGateway::default());
        let venues: Vec<_> = (0..5)
            .map(|n| nearby_venue(&format!("v{n}"), 43.656, -79.391))
            .collect();
        for venue in &venues {
            gateway.insert_record(venue_record(venue.id.as_str(), 43.656, -79.391));
        }
        gateway.insert_nearby("restaurant", venues);
        let options = SearchOptions {
            max_total_results: 3,
            ..SearchOptions::default()
        };
        let orchestrator = new_orchestrator(Arc::clone(&gateway), options);

        let search = orchestrator.search(&request(&["restaurant"])).await.unwrap();
        assert_eq!(5, search.result_set.total_count);
        assert_eq!(3, search.result_set.summaries.len());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_search_is_served_from_cache() {
        let gateway = Arc::new(MockVenueGateway::default());
        gateway.insert_nearby("restaurant", vec![nearby_venue("x", 43.656, -79.391)]);
        gateway.insert_record(venue_record("x", 43.656, -79.391));
        let orchestrator = new_orchestrator(Arc::clone(&gateway), SearchOptions::default());

        let first = orchestrator.search(&request(&["restaurant"])).await.unwrap();
        let searches_after_first = gateway.search_calls.load(AtomicOrdering::SeqCst);
        let second = orchestrator.search(&request(&["restaurant"])).await.unwrap();

        assert_eq!(first.result_set, second.result_set);
        assert_eq!(
            searches_after_first,
            gateway.search_calls.load(AtomicOrdering::SeqCst)
        );
        // Detail enrichment of the cached set hit the session cache.
        assert_eq!(1, gateway.details_calls.load(AtomicOrdering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn first_page_is_enriched_and_sorted_by_distance() {
        let gateway = Arc::new(MockVenueGateway::default());
        // Provider order is farthest first; the enriched page must be
        // re-ordered nearest first.
        gateway.insert_nearby(
            "restaurant",
            vec![
                nearby_venue("far", 43.70, -79.45),
                nearby_venue("near", 43.6551, -79.3901),
                nearby_venue("mid", 43.66, -79.40),
            ],
        );
        gateway.insert_record(venue_record("far", 43.70, -79.45));
        gateway.insert_record(venue_record("near", 43.6551, -79.3901));
        gateway.insert_record(venue_record("mid", 43.66, -79.40));
        let orchestrator = new_orchestrator(Arc::clone(&gateway), SearchOptions::default());

        let search = orchestrator.search(&request(&["restaurant"])).await.unwrap();
        let ids: Vec<_> = search
            .first_page
            .iter()
            .map(|d| d.id.as_str().to_owned())
            .collect();
        assert_eq!(vec!["near", "mid", "far"], ids);
        assert!(search.first_page[0].distance <= search.first_page[1].distance);
        assert!(search.first_page[1].distance <= search.first_page[2].distance);
        // Summaries keep provider order; only the page is sorted.
        assert_eq!("far", search.result_set.summaries[0].id.as_str());
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_first_page_is_detail_enriched() {
        let gateway = Arc::new(MockVenueGateway::default());
        let venues: Vec<_> = (0..8)
            .map(|n| nearby_venue(&format!("v{n}"), 43.656, -79.391))
            .collect();
        for venue in &venues {
            gateway.insert_record(venue_record(venue.id.as_str(), 43.656, -79.391));
        }
        gateway.insert_nearby("restaurant", venues);
        let orchestrator = new_orchestrator(Arc::clone(&gateway), SearchOptions::default());

        let search = orchestrator.search(&request(&["restaurant"])).await.unwrap();
        assert_eq!(DEFAULT_FIRST_PAGE_SIZE, search.first_page.len());
        assert_eq!(
            DEFAULT_FIRST_PAGE_SIZE,
            gateway.details_calls.load(AtomicOrdering::SeqCst)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn quota_exhaustion_surfaces_as_rate_limited() {
        let gateway = Arc::new(MockVenueGateway::default());
        gateway.insert_nearby("restaurant", vec![nearby_venue("x", 43.656, -79.391)]);
        let limits = QuotaLimits {
            max_calls_per_window: 0,
            ..QuotaLimits::default()
        };
        let orchestrator =
            new_orchestrator_with_limits(Arc::clone(&gateway), SearchOptions::default(), limits);

        let err = orchestrator
            .search(&request(&["restaurant"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RateLimited(QuotaError::Exceeded { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn a_newer_search_supersedes_an_in_flight_one() {
        let gateway = Arc::new(MockVenueGateway::default());
        gateway.insert_nearby("restaurant", vec![nearby_venue("x", 43.656, -79.391)]);
        gateway.insert_record(venue_record("x", 43.656, -79.391));
        gateway.set_search_delay(Duration::from_secs(2));
        let orchestrator = Arc::new(new_orchestrator(
            Arc::clone(&gateway),
            SearchOptions::default(),
        ));

        let stale = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.search(&request(&["restaurant"])).await })
        };
        // Let the first search get past its inter-call delay and into
        // the provider call before starting the second one.
        tokio::time::sleep(Duration::from_millis(300)).await;
        gateway.set_search_delay(Duration::ZERO);
        let fresh = orchestrator.search(&request(&["bar"])).await;

        assert!(fresh.is_ok());
        let stale = stale.await.unwrap();
        assert!(matches!(stale, Err(Error::Superseded)));
    }
}
