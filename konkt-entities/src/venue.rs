use serde::{Deserialize, Serialize};

use crate::{category::Category, geo::*, id::Id};

/// Minimal venue data as returned by a nearby search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueSummary {
    pub id: Id,
    pub name: String,
    pub pos: MapPoint,
    /// The category whose search returned this venue first.
    pub category: Category,
    pub types: Vec<String>,
}

/// Weekday opening periods as human-readable lines.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpeningPeriods(Vec<String>);

impl OpeningPeriods {
    pub fn new(lines: Vec<String>) -> Option<Self> {
        let lines: Vec<_> = lines
            .into_iter()
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(Self(lines))
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }
}

/// Venue-intrinsic details, cached keyed by id independent of any
/// search context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueRecord {
    pub id: Id,
    pub name: String,
    pub formatted_address: String,
    pub pos: MapPoint,
    pub rating: f64,
    pub review_count: u32,
    pub price_level: Option<u8>,
    pub opening_periods: Option<OpeningPeriods>,
    pub website: Option<String>,
    pub primary_type: String,
}

/// A detail-enriched venue as displayed to the user: the intrinsic
/// record plus the straight-line distance from the meeting point of
/// the search it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueDetail {
    pub id: Id,
    pub name: String,
    pub formatted_address: String,
    pub pos: MapPoint,
    pub rating: f64,
    pub review_count: u32,
    pub price_level: Option<u8>,
    pub opening_periods: Option<OpeningPeriods>,
    pub website: Option<String>,
    pub primary_type: String,
    pub distance: Distance,
}

impl From<(VenueRecord, Distance)> for VenueDetail {
    fn from(from: (VenueRecord, Distance)) -> Self {
        let (
            VenueRecord {
                id,
                name,
                formatted_address,
                pos,
                rating,
                review_count,
                price_level,
                opening_periods,
                website,
                primary_type,
            },
            distance,
        ) = from;
        Self {
            id,
            name,
            formatted_address,
            pos,
            rating,
            review_count,
            price_level,
            opening_periods,
            website,
            primary_type,
            distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_periods_reject_blank_input() {
        assert_eq!(None, OpeningPeriods::new(vec![]));
        assert_eq!(None, OpeningPeriods::new(vec!["  ".into()]));
        let periods = OpeningPeriods::new(vec!["Mon: 9:00-17:00".into(), " ".into()]).unwrap();
        assert_eq!(1, periods.lines().len());
    }
}
