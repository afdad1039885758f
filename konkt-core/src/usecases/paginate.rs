use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use tokio::sync::Notify;

use konkt_entities::{
    geo::MapPoint,
    venue::{VenueDetail, VenueSummary},
};

use crate::{clock::Clock, gateways::venues::VenueGateway, store::KeyValueStore};

use super::{enrich::DetailEnricher, search_venues::EnrichedSearch};

#[derive(Debug)]
struct PagerState {
    /// Accumulated enriched venues. The order established at search
    /// time (first page sorted by distance, later pages in summary
    /// order) is never re-sorted.
    details: Vec<VenueDetail>,
    /// How many summaries have been submitted for enrichment. Ahead
    /// of `details.len()` when individual detail fetches failed.
    attempted: usize,
}

/// Lazy, page-windowed detail loading over a search result set.
///
/// A page request that extends beyond the enriched prefix returns
/// whatever is already available and triggers an asynchronous top-up
/// of exactly the missing slice; callers re-render after awaiting
/// [`VenuePager::changed`].
#[derive(Debug)]
pub struct VenuePager<V, S, C> {
    summaries: Arc<Vec<VenueSummary>>,
    total_count: usize,
    origin: MapPoint,
    page_size: usize,
    enricher: Arc<DetailEnricher<V, S, C>>,
    state: Arc<Mutex<PagerState>>,
    loading: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl<V, S, C> VenuePager<V, S, C>
where
    V: VenueGateway + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
{
    /// Continue from an enriched search: the first page is already
    /// loaded, later pages are fetched on demand.
    pub fn from_search(
        search: EnrichedSearch,
        enricher: Arc<DetailEnricher<V, S, C>>,
        origin: MapPoint,
        page_size: usize,
    ) -> Self {
        debug_assert!(page_size > 0);
        let EnrichedSearch {
            result_set,
            first_page,
        } = search;
        let attempted = result_set.summaries.len().min(page_size);
        Self {
            summaries: Arc::new(result_set.summaries),
            total_count: result_set.total_count,
            origin,
            page_size,
            enricher,
            state: Arc::new(Mutex::new(PagerState {
                details: first_page,
                attempted,
            })),
            loading: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.summaries.len().div_ceil(self.page_size)
    }

    /// How many venues are enriched and available right now.
    pub fn available(&self) -> usize {
        self.lock_state().details.len()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Resolves when an asynchronous top-up has appended new venues.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }

    /// The venues of `page_number` (1-based) that are enriched so far.
    ///
    /// An under-populated window triggers a background enrichment of
    /// the missing slice and returns immediately with the partial
    /// result.
    pub fn page(&self, page_number: usize) -> Vec<VenueDetail> {
        debug_assert!(page_number >= 1);
        let start = page_number.saturating_sub(1) * self.page_size;
        // How many enriched venues are needed to fill the requested
        // window, bounded by what the search returned at all.
        let wanted = (start + self.page_size).min(self.summaries.len());

        let state = self.lock_state();
        let window = if start < state.details.len() {
            let end = (start + self.page_size).min(state.details.len());
            state.details[start..end].to_vec()
        } else {
            Vec::new()
        };
        let missing = state.details.len() < wanted && state.attempted < self.summaries.len();
        drop(state);

        if missing {
            self.spawn_top_up(wanted);
        }
        window
    }

    fn spawn_top_up(&self, wanted: usize) {
        if self.loading.swap(true, Ordering::SeqCst) {
            // A top-up is already in flight.
            return;
        }
        let summaries = Arc::clone(&self.summaries);
        let enricher = Arc::clone(&self.enricher);
        let state = Arc::clone(&self.state);
        let loading = Arc::clone(&self.loading);
        let notify = Arc::clone(&self.notify);
        let origin = self.origin;

        tokio::spawn(async move {
            loop {
                let slice = {
                    let mut state = lock_state(&state);
                    let needed = wanted.saturating_sub(state.details.len());
                    let from = state.attempted;
                    let to = (from + needed).min(summaries.len());
                    if needed == 0 || from >= to {
                        break;
                    }
                    // Commit the attempt before awaiting so the slice
                    // is never enriched twice.
                    state.attempted = to;
                    summaries[from..to].to_vec()
                };
                let mut fresh = enricher.enrich(&slice, origin).await;
                let mut state = lock_state(&state);
                state.details.append(&mut fresh);
                // Dropped venues leave the window under-full; loop to
                // top it up from the remaining summaries.
            }
            loading.store(false, Ordering::SeqCst);
            notify.notify_waiters();
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, PagerState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<PagerState>) -> MutexGuard<'_, PagerState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poison_err) => {
            log::error!("A poisoned pager state lock was found.");
            poison_err.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::Ordering as AtomicOrdering, time::Duration};

    use konkt_entities::meeting::{Bias, MeetingPoint};

    use super::*;
    use crate::{
        cache::Cache,
        quota::{QuotaLimits, QuotaTracker},
        test_support::*,
        usecases::{
            enrich::EnricherOptions,
            search_venues::{
                SearchFilters, SearchOptions, VenueSearchOrchestrator, VenueSearchRequest,
                DEFAULT_SEARCH_RADIUS_METERS,
            },
        },
    };

    type TestPager = VenuePager<MockVenueGateway, MemStore, TokioClock>;

    async fn pager_over(gateway: Arc<MockVenueGateway>, venue_count: usize) -> TestPager {
        let venues: Vec<_> = (0..venue_count)
            .map(|n| nearby_venue(&format!("v{n:02}"), 43.656, -79.391))
            .collect();
        for venue in &venues {
            gateway.insert_record(venue_record(venue.id.as_str(), 43.656, -79.391));
        }
        gateway.insert_nearby("restaurant", venues);

        let cache = Arc::new(Cache::new(MemStore::default(), TokioClock::default()));
        let quota = Arc::new(QuotaTracker::new(
            Arc::clone(&cache),
            QuotaLimits::default(),
        ));
        let enricher = Arc::new(DetailEnricher::new(
            Arc::clone(&gateway),
            Arc::clone(&cache),
            Arc::clone(&quota),
            EnricherOptions::default(),
        ));
        let orchestrator = VenueSearchOrchestrator::new(
            Arc::clone(&gateway),
            cache,
            quota,
            Arc::clone(&enricher),
            SearchOptions::default(),
        );

        let meeting_point = MeetingPoint {
            pos: MapPoint::from_lat_lng_deg(43.655, -79.39),
            bias: Bias::Middle,
        };
        let request = VenueSearchRequest {
            meeting_point,
            categories: vec!["restaurant".parse().unwrap()],
            radius_meters: DEFAULT_SEARCH_RADIUS_METERS,
            filters: SearchFilters::default(),
        };
        let search = orchestrator.search(&request).await.unwrap();
        let page_size = orchestrator.options().first_page_size;
        VenuePager::from_search(search, enricher, meeting_point.pos, page_size)
    }

    #[tokio::test(start_paused = true)]
    async fn the_first_page_is_available_immediately() {
        let gateway = Arc::new(MockVenueGateway::default());
        let pager = pager_over(Arc::clone(&gateway), 12).await;

        assert_eq!(5, pager.page(1).len());
        assert!(!pager.is_loading());
        assert_eq!(5, gateway.details_calls.load(AtomicOrdering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn a_later_page_is_topped_up_asynchronously() {
        let gateway = Arc::new(MockVenueGateway::default());
        let pager = pager_over(Arc::clone(&gateway), 12).await;

        // Page 2 is not enriched yet: partial (empty) result now,
        // data after the background top-up finishes.
        assert!(pager.page(2).is_empty());
        pager.changed().await;

        let page = pager.page(2);
        assert_eq!(5, page.len());
        // Later pages keep summary order.
        let ids: Vec<_> = page.iter().map(|d| d.id.as_str().to_owned()).collect();
        assert_eq!(vec!["v05", "v06", "v07", "v08", "v09"], ids);
        assert_eq!(10, gateway.details_calls.load(AtomicOrdering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn the_last_page_may_be_short() {
        let gateway = Arc::new(MockVenueGateway::default());
        let pager = pager_over(Arc::clone(&gateway), 12).await;
        assert_eq!(3, pager.page_count());

        assert!(pager.page(3).is_empty());
        pager.changed().await;
        assert_eq!(2, pager.page(3).len());
        assert_eq!(12, pager.available());
    }

    #[tokio::test(start_paused = true)]
    async fn enriched_ids_are_never_refetched() {
        let gateway = Arc::new(MockVenueGateway::default());
        let pager = pager_over(Arc::clone(&gateway), 12).await;

        pager.page(2);
        pager.changed().await;
        let calls_after_page_2 = gateway.details_calls.load(AtomicOrdering::SeqCst);

        // Requesting already enriched pages issues no further calls.
        pager.page(1);
        pager.page(2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            calls_after_page_2,
            gateway.details_calls.load(AtomicOrdering::SeqCst)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn a_page_beyond_the_result_set_is_empty() {
        let gateway = Arc::new(MockVenueGateway::default());
        let pager = pager_over(Arc::clone(&gateway), 4).await;

        assert!(pager.page(2).is_empty());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!pager.is_loading());
        assert!(pager.page(2).is_empty());
    }
}
