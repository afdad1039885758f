use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Geographical latitude in degrees, guaranteed to be finite
/// and within [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LatCoord(f64);

impl LatCoord {
    const DEG_MIN: f64 = -90.0;
    const DEG_MAX: f64 = 90.0;

    pub const fn min() -> Self {
        Self(Self::DEG_MIN)
    }

    pub const fn max() -> Self {
        Self(Self::DEG_MAX)
    }

    pub const fn to_deg(self) -> f64 {
        self.0
    }

    pub fn to_rad(self) -> f64 {
        self.0.to_radians()
    }

    pub fn from_deg<T: Into<f64>>(deg: T) -> Self {
        let deg = deg.into();
        debug_assert!(deg >= Self::DEG_MIN);
        debug_assert!(deg <= Self::DEG_MAX);
        Self(deg)
    }

    /// Fails on NaN and out-of-range values.
    pub fn try_from_deg<T: Into<f64>>(deg: T) -> Option<Self> {
        let deg = deg.into();
        if deg >= Self::DEG_MIN && deg <= Self::DEG_MAX {
            Some(Self(deg))
        } else {
            None
        }
    }
}

impl std::fmt::Display for LatCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.to_deg())
    }
}

/// Geographical longitude in degrees, guaranteed to be finite
/// and within [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LngCoord(f64);

impl LngCoord {
    const DEG_MIN: f64 = -180.0;
    const DEG_MAX: f64 = 180.0;

    pub const fn min() -> Self {
        Self(Self::DEG_MIN)
    }

    pub const fn max() -> Self {
        Self(Self::DEG_MAX)
    }

    pub const fn to_deg(self) -> f64 {
        self.0
    }

    pub fn to_rad(self) -> f64 {
        self.0.to_radians()
    }

    pub fn from_deg<T: Into<f64>>(deg: T) -> Self {
        let deg = deg.into();
        debug_assert!(deg >= Self::DEG_MIN);
        debug_assert!(deg <= Self::DEG_MAX);
        Self(deg)
    }

    /// Fails on NaN and out-of-range values.
    pub fn try_from_deg<T: Into<f64>>(deg: T) -> Option<Self> {
        let deg = deg.into();
        if deg >= Self::DEG_MIN && deg <= Self::DEG_MAX {
            Some(Self(deg))
        } else {
            None
        }
    }
}

impl std::fmt::Display for LngCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.to_deg())
    }
}

/// A geographical location on a (flat) map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPoint {
    lat: LatCoord,
    lng: LngCoord,
}

impl MapPoint {
    pub const fn new(lat: LatCoord, lng: LngCoord) -> Self {
        Self { lat, lng }
    }

    pub const fn lat(self) -> LatCoord {
        self.lat
    }

    pub const fn lng(self) -> LngCoord {
        self.lng
    }

    pub fn to_lat_lng_deg(self) -> (f64, f64) {
        (self.lat.to_deg(), self.lng.to_deg())
    }

    pub fn to_lat_lng_rad(self) -> (f64, f64) {
        (self.lat.to_rad(), self.lng.to_rad())
    }

    pub fn from_lat_lng_deg<LAT: Into<f64>, LNG: Into<f64>>(lat: LAT, lng: LNG) -> Self {
        Self::new(LatCoord::from_deg(lat), LngCoord::from_deg(lng))
    }

    pub fn try_from_lat_lng_deg<LAT: Into<f64>, LNG: Into<f64>>(
        lat: LAT,
        lng: LNG,
    ) -> Option<Self> {
        match (LatCoord::try_from_deg(lat), LngCoord::try_from_deg(lng)) {
            (Some(lat), Some(lng)) => Some(Self::new(lat, lng)),
            _ => None,
        }
    }

    /// The arithmetic mean of both coordinate pairs.
    ///
    /// This is a planar approximation that is only reasonable for the
    /// short spans this system targets. It is NOT geodesically exact
    /// for antipodal or very long spans.
    pub fn midpoint(p1: MapPoint, p2: MapPoint) -> MapPoint {
        Self::interpolate(p1, p2, 0.5)
    }

    /// The point at `fraction` (within [0, 1]) of the way from `p1`
    /// towards `p2`, using the same planar approximation as
    /// [`MapPoint::midpoint`].
    pub fn interpolate(p1: MapPoint, p2: MapPoint, fraction: f64) -> MapPoint {
        debug_assert!((0.0..=1.0).contains(&fraction));
        let (lat1, lng1) = p1.to_lat_lng_deg();
        let (lat2, lng2) = p2.to_lat_lng_deg();
        Self::from_lat_lng_deg(
            lat1 + (lat2 - lat1) * fraction,
            lng1 + (lng2 - lng1) * fraction,
        )
    }
}

impl std::fmt::Display for MapPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

#[derive(Serialize, Deserialize)]
struct LatLngDeg {
    lat: f64,
    lng: f64,
}

impl Serialize for MapPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (lat, lng) = self.to_lat_lng_deg();
        LatLngDeg { lat, lng }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MapPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let LatLngDeg { lat, lng } = LatLngDeg::deserialize(deserializer)?;
        Self::try_from_lat_lng_deg(lat, lng)
            .ok_or_else(|| de::Error::custom(format!("invalid coordinates: {lat},{lng}")))
    }
}

/// A non-negative distance in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Distance(f64);

impl Distance {
    pub const fn infinite() -> Self {
        Self(f64::INFINITY)
    }

    pub const fn from_meters(meters: f64) -> Self {
        Self(meters)
    }

    pub const fn to_meters(self) -> f64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 >= 0.0
    }
}

const MEAN_EARTH_RADIUS: Distance = Distance::from_meters(6_371_000.0);

impl MapPoint {
    /// Calculate the great-circle distance on the surface of the earth
    /// using the haversine formula.
    /// Reference: https://en.wikipedia.org/wiki/Haversine_formula
    pub fn distance(p1: MapPoint, p2: MapPoint) -> Distance {
        let (lat1_rad, lng1_rad) = p1.to_lat_lng_rad();
        let (lat2_rad, lng2_rad) = p2.to_lat_lng_rad();

        let dlat_half_sin = ((lat2_rad - lat1_rad) / 2.0).sin();
        let dlng_half_sin = ((lng2_rad - lng1_rad) / 2.0).sin();

        let a = dlat_half_sin * dlat_half_sin
            + lat1_rad.cos() * lat2_rad.cos() * dlng_half_sin * dlng_half_sin;
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        Distance::from_meters(MEAN_EARTH_RADIUS.to_meters() * c)
    }
}
