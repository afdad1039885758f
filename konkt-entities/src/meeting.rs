use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::geo::MapPoint;

/// How the meeting point is weighted between the two endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bias {
    /// Closer to the first endpoint ("closer to you").
    CloserToYou,
    #[default]
    Middle,
    /// Closer to the second endpoint ("closer to them").
    CloserToThem,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BiasParseError;

impl Bias {
    /// How far a biased point is shifted from the favoured endpoint
    /// towards the other one. Tunable, not derived.
    pub const FRACTION: f64 = 0.25;

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CloserToYou => "you",
            Self::Middle => "middle",
            Self::CloserToThem => "them",
        }
    }
}

impl FromStr for Bias {
    type Err = BiasParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "you" => Ok(Self::CloserToYou),
            "middle" => Ok(Self::Middle),
            "them" => Ok(Self::CloserToThem),
            _ => Err(BiasParseError),
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str(self.as_str())
    }
}

/// The derived point where both parties meet.
///
/// Recomputed whenever either endpoint or the bias changes and never
/// persisted independently of its inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeetingPoint {
    pub pos: MapPoint,
    pub bias: Bias,
}

impl MeetingPoint {
    /// Derive the meeting point from the two endpoints under `bias`.
    ///
    /// `Middle` is the planar midpoint; the biased variants sit at
    /// [`Bias::FRACTION`] of the way from the favoured endpoint towards
    /// the other one.
    pub fn derive(you: MapPoint, them: MapPoint, bias: Bias) -> Self {
        let pos = match bias {
            Bias::Middle => MapPoint::midpoint(you, them),
            Bias::CloserToYou => MapPoint::interpolate(you, them, Bias::FRACTION),
            Bias::CloserToThem => MapPoint::interpolate(them, you, Bias::FRACTION),
        };
        Self { pos, bias }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_bias_is_the_midpoint() {
        let you = MapPoint::from_lat_lng_deg(43.65, -79.38);
        let them = MapPoint::from_lat_lng_deg(43.66, -79.40);
        let mp = MeetingPoint::derive(you, them, Bias::Middle);
        let (lat, lng) = mp.pos.to_lat_lng_deg();
        assert!((lat - 43.655).abs() < 1e-9);
        assert!((lng - -79.39).abs() < 1e-9);
    }

    #[test]
    fn biased_points_are_symmetric() {
        let you = MapPoint::from_lat_lng_deg(0.0, 0.0);
        let them = MapPoint::from_lat_lng_deg(10.0, 0.0);
        let closer_you = MeetingPoint::derive(you, them, Bias::CloserToYou);
        let closer_them = MeetingPoint::derive(you, them, Bias::CloserToThem);
        assert_eq!((2.5, 0.0), closer_you.pos.to_lat_lng_deg());
        assert_eq!((7.5, 0.0), closer_them.pos.to_lat_lng_deg());
    }

    #[test]
    fn parse_bias() {
        assert_eq!(Ok(Bias::CloserToYou), "you".parse());
        assert_eq!(Ok(Bias::Middle), "middle".parse());
        assert_eq!(Ok(Bias::CloserToThem), "them".parse());
        assert_eq!(Err(BiasParseError), "middleish".parse::<Bias>());
    }
}
