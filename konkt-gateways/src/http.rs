use async_trait::async_trait;
use reqwest::Url;

use konkt_core::gateways::{
    geocode::{GeocodeCandidate, GeocodingGateway},
    venues::{NearbySearchRequest, NearbyVenue, VenueGateway},
    Error, Result,
};
use konkt_entities::{geocoding::AddressSuggestion, id::Id, venue::VenueRecord};

use crate::wire::*;

/// HTTP client for the places-style provider API.
///
/// Timeouts are not enforced here: the core wraps every call in its
/// own hard timeout and cancels the request by dropping the future.
#[derive(Debug, Clone)]
pub struct HttpProviderGateway {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpProviderGateway {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|err| Error::Transport(err.into()))?;
        if let Some(api_key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", api_key);
        }
        Ok(url)
    }
}

/// Accept the response body on a success status, fail otherwise.
fn check_status(status: &str) -> Result<bool> {
    match status {
        STATUS_OK => Ok(true),
        STATUS_ZERO_RESULTS => Ok(false),
        other => Err(Error::Provider(other.to_owned())),
    }
}

#[async_trait]
impl GeocodingGateway for HttpProviderGateway {
    async fn resolve_address(&self, address: &str) -> Result<Vec<GeocodeCandidate>> {
        let url = self.endpoint("geocode")?;
        let response: GeocodeResponse = self
            .client
            .post(url)
            .json(&GeocodeRequest { address })
            .send()
            .await
            .map_err(|err| Error::Transport(err.into()))?
            .error_for_status()
            .map_err(|err| Error::Transport(err.into()))?
            .json()
            .await
            .map_err(|err| Error::Transport(err.into()))?;

        if !check_status(&response.status)? {
            return Ok(Vec::new());
        }
        response
            .results
            .into_iter()
            .map(WireGeocodeCandidate::try_into_candidate)
            .collect()
    }
}

#[async_trait]
impl VenueGateway for HttpProviderGateway {
    async fn search_nearby(&self, req: &NearbySearchRequest) -> Result<Vec<NearbyVenue>> {
        let url = self.endpoint("places/nearby")?;
        let body = NearbyRequest {
            location: req.location.into(),
            radius: req.radius_meters,
            venue_type: req.category.as_str(),
            open_now: req.open_now,
        };
        let response: NearbyResponse = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| Error::Transport(err.into()))?
            .error_for_status()
            .map_err(|err| Error::Transport(err.into()))?
            .json()
            .await
            .map_err(|err| Error::Transport(err.into()))?;

        if !check_status(&response.status)? {
            log::debug!("No {} venues around {}", req.category, req.location);
            return Ok(Vec::new());
        }
        response
            .results
            .into_iter()
            .map(WireNearbyVenue::try_into_venue)
            .collect()
    }

    async fn venue_details(&self, id: &Id) -> Result<VenueRecord> {
        let mut url = self.endpoint(&format!("places/details/{id}"))?;
        url.query_pairs_mut()
            .append_pair("fields", &DETAIL_FIELDS.join(","));
        let response: DetailsResponse = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| Error::Transport(err.into()))?
            .error_for_status()
            .map_err(|err| Error::Transport(err.into()))?
            .json()
            .await
            .map_err(|err| Error::Transport(err.into()))?;

        check_status(&response.status)?;
        let details = response
            .result
            .ok_or_else(|| Error::Provider("missing result".to_owned()))?;
        details.try_into_record()
    }

    async fn autocomplete(&self, input: &str) -> Result<Vec<AddressSuggestion>> {
        let mut url = self.endpoint("places/autocomplete")?;
        url.query_pairs_mut().append_pair("input", input);
        let response: AutocompleteResponse = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| Error::Transport(err.into()))?
            .error_for_status()
            .map_err(|err| Error::Transport(err.into()))?
            .json()
            .await
            .map_err(|err| Error::Transport(err.into()))?;

        if !check_status(&response.status)? {
            return Ok(Vec::new());
        }
        Ok(response
            .predictions
            .into_iter()
            .map(WirePrediction::into_suggestion)
            .collect())
    }
}
