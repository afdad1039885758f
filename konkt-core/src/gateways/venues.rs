use async_trait::async_trait;

use konkt_entities::{
    category::Category, geo::MapPoint, geocoding::AddressSuggestion, id::Id, venue::VenueRecord,
};

use super::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct NearbySearchRequest {
    pub location: MapPoint,
    pub radius_meters: u32,
    pub category: Category,
    pub open_now: bool,
}

/// One venue as returned by a nearby search, before the core
/// attributes it to the category whose search returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyVenue {
    pub id: Id,
    pub name: String,
    pub pos: MapPoint,
    pub types: Vec<String>,
}

#[async_trait]
pub trait VenueGateway: Send + Sync {
    /// Search venues of one category around a location.
    ///
    /// A zero-result provider status is a success with an empty list,
    /// not an error.
    async fn search_nearby(&self, req: &NearbySearchRequest) -> Result<Vec<NearbyVenue>>;

    /// Fetch the venue-intrinsic details of a single venue.
    async fn venue_details(&self, id: &Id) -> Result<VenueRecord>;

    /// Autocomplete predictions for a partial address or venue name.
    async fn autocomplete(&self, input: &str) -> Result<Vec<AddressSuggestion>>;
}
