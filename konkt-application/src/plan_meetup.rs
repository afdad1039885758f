use std::sync::Arc;

use konkt_core::{
    clock::Clock,
    gateways::{geocode::GeocodingGateway, venues::VenueGateway},
    quota::QuotaError,
    store::KeyValueStore,
    usecases::{
        AddressResolver, Error as CoreError, SearchFilters, SearchResultSet, VenuePager,
        VenueSearchRequest,
    },
};
use konkt_entities::{
    geocoding::GeocodeResult,
    meeting::{Bias, MeetingPoint},
    venue::VenueDetail,
};

use crate::{error::AppError, services::Services, Result};

#[derive(Debug, Clone)]
pub struct MeetupRequest {
    pub your_address: String,
    pub their_address: String,
    pub bias: Bias,
    pub filters: SearchFilters,
}

/// The full outcome of a planned meetup: both resolved endpoints, the
/// derived meeting point, the deduplicated venue set with its
/// enriched first page, and a pager for the remaining pages.
#[derive(Debug)]
pub struct MeetupPlan<V, S, C> {
    pub you: GeocodeResult,
    pub them: GeocodeResult,
    pub meeting_point: MeetingPoint,
    pub result_set: SearchResultSet,
    pub first_page: Vec<VenueDetail>,
    pub pager: VenuePager<V, S, C>,
    pub remaining_searches: u32,
}

/// Geocode both addresses, derive the meeting point under the
/// requested bias, and search venues around it.
///
/// The two geocode calls run concurrently since they are independent.
/// When the pair collides with the quota tracker's min-interval check
/// the loser is retried once after the suggested delay; any other
/// failure of either address fails the whole plan.
pub async fn plan_meetup<G, V, S, C>(
    services: &Services<G, V, S, C>,
    request: &MeetupRequest,
) -> Result<MeetupPlan<V, S, C>>
where
    G: GeocodingGateway + 'static,
    V: VenueGateway + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
{
    let (you, them) = tokio::join!(
        resolve_spaced(&services.resolver, &request.your_address),
        resolve_spaced(&services.resolver, &request.their_address),
    );
    let (you, them) = (you?, them?);

    let meeting_point = MeetingPoint::derive(you.pos, them.pos, request.bias);
    log::debug!(
        "Meeting point for bias {} is {}",
        request.bias,
        meeting_point.pos
    );

    let search_request = VenueSearchRequest {
        meeting_point,
        categories: services.categories.clone(),
        radius_meters: services.radius_meters,
        filters: request.filters,
    };
    let search = services.orchestrator.search(&search_request).await?;
    if let Some(partial) = search
        .result_set
        .partial_failure(search_request.categories.len())
    {
        log::warn!("Venue search degraded: {partial}");
    }

    let result_set = search.result_set.clone();
    let first_page = search.first_page.clone();
    let pager = VenuePager::from_search(
        search,
        Arc::clone(&services.enricher),
        meeting_point.pos,
        services.page_size,
    );

    Ok(MeetupPlan {
        you,
        them,
        meeting_point,
        result_set,
        first_page,
        pager,
        remaining_searches: services.remaining_searches(),
    })
}

/// Resolve one address, absorbing at most one min-interval rejection
/// caused by the concurrently issued partner call. The resolver
/// itself never retries; this caller decides to.
async fn resolve_spaced<G, S, C>(
    resolver: &AddressResolver<G, S, C>,
    address: &str,
) -> Result<GeocodeResult>
where
    G: GeocodingGateway,
    S: KeyValueStore,
    C: Clock,
{
    match resolver.resolve(address).await {
        Err(CoreError::RateLimited(QuotaError::TooFrequent { retry_after })) => {
            tokio::time::sleep(retry_after).await;
            resolver.resolve(address).await.map_err(AppError::from)
        }
        other => other.map_err(AppError::from),
    }
}
