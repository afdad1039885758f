
pub mod prelude {
    use std::sync::Arc;

    use konkt_core::{
        gateways::geocode::GeocodeCandidate,
        test_support::{MockGeocoder, MockVenueGateway, TokioClock},
    };
    use konkt_entities::geo::MapPoint;

    use crate::{config::Config, services::Services};

    pub use konkt_core::{test_support, usecases::Error as CoreError};
    pub use konkt_entities::meeting::Bias;
    pub use konkt_gateways::{InMemoryStore, JsonFileStore};

    pub type TestServices<S> = Services<MockGeocoder, MockVenueGateway, S, TokioClock>;

    pub fn candidate(lat: f64, lng: f64, formatted: &str) -> Vec<GeocodeCandidate> {
        vec![GeocodeCandidate {
            pos: MapPoint::from_lat_lng_deg(lat, lng),
            formatted_address: formatted.to_owned(),
        }]
    }

    /// Two addresses on either side of downtown Toronto and a venue
    /// provider knowing `venue_count` restaurants around the middle.
    pub fn toronto_fixture(
        venue_count: usize,
    ) -> (Arc<MockGeocoder>, Arc<MockVenueGateway>) {
        let geocoder = Arc::new(MockGeocoder::default());
        geocoder.insert("A", candidate(43.65, -79.38, "A St, Toronto"));
        geocoder.insert("B", candidate(43.66, -79.40, "B Ave, Toronto"));

        let venues = Arc::new(MockVenueGateway::default());
        let nearby: Vec<_> = (0..venue_count)
            .map(|n| {
                test_support::nearby_venue(
                    &format!("v{n:02}"),
                    43.655 + 0.0001 * n as f64,
                    -79.39,
                )
            })
            .collect();
        for venue in &nearby {
            venues.insert_record(test_support::venue_record(
                venue.id.as_str(),
                venue.pos.lat().to_deg(),
                venue.pos.lng().to_deg(),
            ));
        }
        venues.insert_nearby("restaurant", nearby);
        (geocoder, venues)
    }

    pub fn services_with_store<S: konkt_core::store::KeyValueStore>(
        geocoder: Arc<MockGeocoder>,
        venues: Arc<MockVenueGateway>,
        store: S,
        clock: TokioClock,
    ) -> TestServices<S> {
        let _ = env_logger::builder().is_test(true).try_init();
        let config = Config::default();
        Services::new(geocoder, venues, store, clock, &config)
    }
}
