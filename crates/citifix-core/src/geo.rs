//! Coordinates and great-circle distance

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Decimal places kept for stored coordinates
const COORD_SCALE: f64 = 1e8;

/// A point on the globe, stored with 8 decimal places
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Validate ranges and round to fixed precision
    pub fn new(latitude: f64, longitude: f64) -> crate::Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(crate::Error::Validation(format!(
                "latitude must be between -90 and 90, got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(crate::Error::Validation(format!(
                "longitude must be between -180 and 180, got {longitude}"
            )));
        }
        Ok(Self {
            latitude: round_to(latitude, COORD_SCALE),
            longitude: round_to(longitude, COORD_SCALE),
        })
    }

    /// Great-circle distance in kilometers (spherical law of cosines)
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlon = other.longitude.to_radians() - self.longitude.to_radians();

        // Rounding can push the cosine slightly past 1 for identical points
        let cos = (lat1.cos() * lat2.cos() * dlon.cos() + lat1.sin() * lat2.sin()).clamp(-1.0, 1.0);
        EARTH_RADIUS_KM * cos.acos()
    }

    pub fn within_km(&self, other: &Coordinates, radius_km: f64) -> bool {
        self.distance_km(other) < radius_km
    }

    /// Grid cell used for hotspot grouping (3 decimals, roughly 100 m)
    pub fn rounded(&self, decimals: i32) -> (f64, f64) {
        let scale = 10f64.powi(decimals);
        (
            round_to(self.latitude, scale),
            round_to(self.longitude, scale),
        )
    }
}

fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}

/// Axis-aligned latitude/longitude box, bounds inclusive
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> crate::Result<Self> {
        if min_latitude > max_latitude || min_longitude > max_longitude {
            return Err(crate::Error::Validation(
                "bounding box minimum exceeds maximum".into(),
            ));
        }
        Ok(Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        })
    }

    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&point.longitude)
    }
}
