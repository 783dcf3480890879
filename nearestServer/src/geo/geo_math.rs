//! Pure geographic helpers: haversine distance and uniform disk sampling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::config::constants::{EARTH_RADIUS_M, METERS_PER_DEGREE};
use crate::data::poi::GeoCoordinate;
use crate::error::GeneratorError;

/// Great-circle distance in meters between two lat/lon pairs given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    // Rounding can push `a` just outside [0, 1] for identical or antipodal points
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Draws a point uniformly from a disk of `radius_m` meters around the center.
///
/// The radius is converted to degrees with the flat 111300 m/degree
/// approximation, then sampled as `r * sqrt(u)` so that points are not
/// clustered toward the center.
pub fn random_point_in_disk<R: Rng + ?Sized>(
    rng: &mut R,
    center_lat: f64,
    center_lon: f64,
    radius_m: f64,
) -> Result<GeoCoordinate, GeneratorError> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(GeneratorError::InvalidRadius(radius_m));
    }

    let radius_deg = radius_m / METERS_PER_DEGREE;
    let u: f64 = rng.gen();
    let v: f64 = rng.gen();

    let w = radius_deg * u.sqrt();
    let t = 2.0 * PI * v;
    let lat = center_lat + w * t.sin();
    let lon = center_lon + w * t.cos();

    if !lat.is_finite() || !lon.is_finite() {
        return Err(GeneratorError::NonFinite { lat, lon });
    }

    Ok(GeoCoordinate::new(lat, lon).normalized())
}

/// Disk sampler with its own generator, seeded once and drawn from repeatedly.
#[derive(Debug, Clone)]
pub struct DiskSampler {
    center: GeoCoordinate,
    radius_m: f64,
    rng: StdRng,
}

impl DiskSampler {
    pub fn new(center: GeoCoordinate, radius_m: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { center, radius_m, rng }
    }

    pub fn center(&self) -> GeoCoordinate {
        self.center
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn sample(&mut self) -> Result<GeoCoordinate, GeneratorError> {
        random_point_in_disk(&mut self.rng, self.center.lat, self.center.lon, self.radius_m)
    }
}
