use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::geo::geo_math::haversine_distance;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub lat: f64,
    pub lon: f64,
}

impl GeoCoordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Maps an arbitrary (finite) lat/lon onto lat [-90, 90], lon [-180, 180).
    ///
    /// Latitudes past a pole are reflected back and the longitude moved to the
    /// opposite meridian, so the result names the same position on the sphere.
    pub fn normalized(self) -> Self {
        let mut lat = (self.lat + 180.0).rem_euclid(360.0) - 180.0;
        let mut lon = self.lon;

        if lat > 90.0 {
            lat = 180.0 - lat;
            lon += 180.0;
        } else if lat < -90.0 {
            lat = -180.0 - lat;
            lon += 180.0;
        }

        let lon = (lon + 180.0).rem_euclid(360.0) - 180.0;
        Self { lat, lon }
    }

    /// Great-circle distance in meters.
    pub fn distance_to(&self, other: &GeoCoordinate) -> f64 {
        haversine_distance(self.lat, self.lon, other.lat, other.lon)
    }
}

impl fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// A named point. The identifier never changes once created; the coordinate
/// is replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    id: Arc<str>,
    coordinate: GeoCoordinate,
}

impl Point {
    pub fn new(id: impl Into<Arc<str>>, coordinate: GeoCoordinate) -> Self {
        Self {
            id: id.into(),
            coordinate,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn coordinate(&self) -> GeoCoordinate {
        self.coordinate
    }

    pub fn lat(&self) -> f64 {
        self.coordinate.lat
    }

    pub fn lon(&self) -> f64 {
        self.coordinate.lon
    }

    /// Same identity, new position. The id is shared, not copied.
    pub fn moved_to(&self, coordinate: GeoCoordinate) -> Self {
        Self {
            id: Arc::clone(&self.id),
            coordinate,
        }
    }
}
