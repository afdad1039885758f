// The provider wire format: a places-style JSON API with an explicit
// status field that distinguishes "no results" from errors.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use konkt_core::gateways::{geocode::GeocodeCandidate, venues::NearbyVenue, Error, Result};
use konkt_entities::{
    geo::MapPoint,
    geocoding::AddressSuggestion,
    venue::{OpeningPeriods, VenueRecord},
};

pub const STATUS_OK: &str = "OK";
pub const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";

/// The detail fields requested from the provider.
pub const DETAIL_FIELDS: &[&str] = &[
    "name",
    "formatted_address",
    "geometry",
    "rating",
    "user_ratings_total",
    "opening_hours",
    "website",
    "price_level",
    "types",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireLocation {
    pub lat: f64,
    pub lng: f64,
}

impl From<MapPoint> for WireLocation {
    fn from(from: MapPoint) -> Self {
        let (lat, lng) = from.to_lat_lng_deg();
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireGeometry {
    pub location: WireLocation,
}

impl WireGeometry {
    fn try_into_point(self) -> Result<MapPoint> {
        let WireLocation { lat, lng } = self.location;
        MapPoint::try_from_lat_lng_deg(lat, lng)
            .ok_or_else(|| Error::Transport(anyhow!("invalid coordinates: {lat},{lng}")))
    }
}

#[derive(Debug, Serialize)]
pub struct GeocodeRequest<'a> {
    pub address: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct WireGeocodeCandidate {
    pub geometry: WireGeometry,
    pub formatted_address: String,
}

impl WireGeocodeCandidate {
    pub fn try_into_candidate(self) -> Result<GeocodeCandidate> {
        let Self {
            geometry,
            formatted_address,
        } = self;
        Ok(GeocodeCandidate {
            pos: geometry.try_into_point()?,
            formatted_address,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<WireGeocodeCandidate>,
}

#[derive(Debug, Serialize)]
pub struct NearbyRequest<'a> {
    pub location: WireLocation,
    pub radius: u32,
    #[serde(rename = "type")]
    pub venue_type: &'a str,
    #[serde(rename = "openNow", skip_serializing_if = "std::ops::Not::not")]
    pub open_now: bool,
}

#[derive(Debug, Deserialize)]
pub struct WireNearbyVenue {
    pub place_id: String,
    pub name: String,
    pub geometry: WireGeometry,
    #[serde(default)]
    pub types: Vec<String>,
}

impl WireNearbyVenue {
    pub fn try_into_venue(self) -> Result<NearbyVenue> {
        let Self {
            place_id,
            name,
            geometry,
            types,
        } = self;
        Ok(NearbyVenue {
            id: place_id.into(),
            name,
            pos: geometry.try_into_point()?,
            types,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NearbyResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<WireNearbyVenue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireOpeningHours {
    #[serde(default)]
    pub weekday_text: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireVenueDetails {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub formatted_address: String,
    pub geometry: WireGeometry,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u32>,
    pub price_level: Option<u8>,
    pub opening_hours: Option<WireOpeningHours>,
    pub website: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

impl WireVenueDetails {
    pub fn try_into_record(self) -> Result<VenueRecord> {
        let Self {
            place_id,
            name,
            formatted_address,
            geometry,
            rating,
            user_ratings_total,
            price_level,
            opening_hours,
            website,
            types,
        } = self;
        let primary_type = types
            .first()
            .cloned()
            .unwrap_or_else(|| "establishment".to_owned());
        Ok(VenueRecord {
            id: place_id.into(),
            name,
            formatted_address,
            pos: geometry.try_into_point()?,
            rating: rating.unwrap_or_default(),
            review_count: user_ratings_total.unwrap_or_default(),
            price_level,
            opening_periods: opening_hours.and_then(|oh| OpeningPeriods::new(oh.weekday_text)),
            website,
            primary_type,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DetailsResponse {
    pub status: String,
    pub result: Option<WireVenueDetails>,
}

#[derive(Debug, Deserialize)]
pub struct WirePrediction {
    pub place_id: String,
    pub description: String,
}

impl WirePrediction {
    pub fn into_suggestion(self) -> AddressSuggestion {
        let Self {
            place_id,
            description,
        } = self;
        AddressSuggestion {
            id: place_id.into(),
            description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteResponse {
    pub status: String,
    #[serde(default)]
    pub predictions: Vec<WirePrediction>,
}
