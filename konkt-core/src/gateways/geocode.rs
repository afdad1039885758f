use async_trait::async_trait;

use konkt_entities::geo::MapPoint;

use super::Result;

/// One candidate location for a forward-geocoded address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCandidate {
    pub pos: MapPoint,
    pub formatted_address: String,
}

#[async_trait]
pub trait GeocodingGateway: Send + Sync {
    /// Forward-geocode a free-text address.
    ///
    /// An empty candidate list means the provider does not know the
    /// address; a provider error status is reported as
    /// [`super::Error::Provider`].
    async fn resolve_address(&self, address: &str) -> Result<Vec<GeocodeCandidate>>;
}
