// Shared fakes for unit and integration tests: an in-memory store,
// tokio-driven and manually advanced clocks, and programmable
// provider gateways.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
    time::Duration,
};

use async_trait::async_trait;

use konkt_entities::{
    geo::MapPoint,
    geocoding::AddressSuggestion,
    id::Id,
    time::Timestamp,
    venue::{VenueRecord, VenueSummary},
};

use crate::{
    clock::Clock,
    gateways::{
        geocode::{GeocodeCandidate, GeocodingGateway},
        venues::{NearbySearchRequest, NearbyVenue, VenueGateway},
        Error as GatewayError, Result as GatewayResult,
    },
    store,
    store::KeyValueStore,
};

#[cfg(test)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An in-memory key-value store.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemStore {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poison_err) => poison_err.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poison_err) => poison_err.into_inner(),
        }
    }
}

impl KeyValueStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<String>, store::Error> {
        Ok(self.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), store::Error> {
        self.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), store::Error> {
        self.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, store::Error> {
        Ok(self.read().keys().cloned().collect())
    }
}

/// A manually advanced clock for synchronous tests.
#[derive(Debug, Clone)]
pub struct TestClock {
    now_millis: Arc<AtomicI64>,
}

impl TestClock {
    pub fn at_millis(millis: i64) -> Self {
        Self {
            now_millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now_millis
            .fetch_add(duration.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now_millis.load(Ordering::SeqCst))
    }
}

/// A clock that follows tokio's (possibly paused) time, so that wall
/// clock and timers advance in step inside
/// `#[tokio::test(start_paused = true)]`.
#[derive(Debug, Clone)]
pub struct TokioClock {
    epoch_millis: i64,
    origin: tokio::time::Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self {
            epoch_millis: 1_700_000_000_000,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        let elapsed = self.origin.elapsed().as_millis() as i64;
        Timestamp::from_millis(self.epoch_millis + elapsed)
    }
}

/// A programmable geocoding provider.
#[derive(Debug, Default)]
pub struct MockGeocoder {
    candidates: Mutex<HashMap<String, Vec<GeocodeCandidate>>>,
    delay: Mutex<Duration>,
    fail_with: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn insert(&self, address: &str, candidates: Vec<GeocodeCandidate>) {
        lock(&self.candidates).insert(address.to_owned(), candidates);
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    pub fn fail_with(&self, status: &str) {
        *lock(&self.fail_with) = Some(status.to_owned());
    }
}

#[async_trait]
impl GeocodingGateway for MockGeocoder {
    async fn resolve_address(&self, address: &str) -> GatewayResult<Vec<GeocodeCandidate>> {
        let delay = *lock(&self.delay);
        tokio::time::sleep(delay).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = lock(&self.fail_with).clone() {
            return Err(GatewayError::Provider(status));
        }
        Ok(lock(&self.candidates)
            .get(address)
            .cloned()
            .unwrap_or_default())
    }
}

/// A programmable venue provider.
#[derive(Debug, Default)]
pub struct MockVenueGateway {
    nearby: Mutex<HashMap<String, Vec<NearbyVenue>>>,
    failing_categories: Mutex<HashMap<String, String>>,
    records: Mutex<HashMap<Id, VenueRecord>>,
    suggestions: Mutex<HashMap<String, Vec<AddressSuggestion>>>,
    autocomplete_failure: Mutex<Option<String>>,
    search_delay: Mutex<Duration>,
    pub search_calls: AtomicUsize,
    pub details_calls: AtomicUsize,
    pub autocomplete_calls: AtomicUsize,
}

impl MockVenueGateway {
    pub fn insert_nearby(&self, category: &str, venues: Vec<NearbyVenue>) {
        lock(&self.nearby).insert(category.to_owned(), venues);
    }

    pub fn fail_category(&self, category: &str, status: &str) {
        lock(&self.failing_categories).insert(category.to_owned(), status.to_owned());
    }

    pub fn insert_record(&self, record: VenueRecord) {
        lock(&self.records).insert(record.id.clone(), record);
    }

    pub fn insert_suggestions(&self, input: &str, suggestions: Vec<AddressSuggestion>) {
        lock(&self.suggestions).insert(input.to_owned(), suggestions);
    }

    pub fn fail_autocomplete(&self, status: &str) {
        *lock(&self.autocomplete_failure) = Some(status.to_owned());
    }

    pub fn set_search_delay(&self, delay: Duration) {
        *lock(&self.search_delay) = delay;
    }
}

#[async_trait]
impl VenueGateway for MockVenueGateway {
    async fn search_nearby(&self, req: &NearbySearchRequest) -> GatewayResult<Vec<NearbyVenue>> {
        let delay = *lock(&self.search_delay);
        tokio::time::sleep(delay).await;
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let category = req.category.as_str().to_owned();
        if let Some(status) = lock(&self.failing_categories).get(&category).cloned() {
            return Err(GatewayError::Provider(status));
        }
        Ok(lock(&self.nearby).get(&category).cloned().unwrap_or_default())
    }

    async fn venue_details(&self, id: &Id) -> GatewayResult<VenueRecord> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.records)
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::Provider("NOT_FOUND".to_owned()))
    }

    async fn autocomplete(&self, input: &str) -> GatewayResult<Vec<AddressSuggestion>> {
        self.autocomplete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = lock(&self.autocomplete_failure).clone() {
            return Err(GatewayError::Provider(status));
        }
        Ok(lock(&self.suggestions)
            .get(input)
            .cloned()
            .unwrap_or_default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poison_err) => poison_err.into_inner(),
    }
}

pub fn toronto_candidates() -> Vec<GeocodeCandidate> {
    vec![GeocodeCandidate {
        pos: MapPoint::from_lat_lng_deg(43.65, -79.38),
        formatted_address: "100 Queen St W, Toronto, ON".to_owned(),
    }]
}

pub fn nearby_venue(id: &str, lat: f64, lng: f64) -> NearbyVenue {
    NearbyVenue {
        id: id.into(),
        name: format!("Venue {id}"),
        pos: MapPoint::from_lat_lng_deg(lat, lng),
        types: vec!["point_of_interest".to_owned()],
    }
}

pub fn venue_summary(id: &str, lat: f64, lng: f64) -> VenueSummary {
    VenueSummary {
        id: id.into(),
        name: format!("Venue {id}"),
        pos: MapPoint::from_lat_lng_deg(lat, lng),
        category: "restaurant".parse().unwrap(),
        types: vec!["point_of_interest".to_owned()],
    }
}

pub fn venue_record(id: &str, lat: f64, lng: f64) -> VenueRecord {
    VenueRecord {
        id: id.into(),
        name: format!("Venue {id}"),
        formatted_address: format!("{id} King St W, Toronto, ON"),
        pos: MapPoint::from_lat_lng_deg(lat, lng),
        rating: 4.2,
        review_count: 57,
        price_level: Some(2),
        opening_periods: None,
        website: None,
        primary_type: "restaurant".to_owned(),
    }
}
