//! Great-circle distance and bounding-box math.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of latitude.
const KM_PER_DEGREE: f64 = 111.32;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Haversine distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Self) -> f64 {
        haversine_km(*self, *other)
    }
}

/// Great-circle distance between two positions in kilometres.
pub fn haversine_km(a: Location, b: Location) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Rectangular geographic filter sent to list endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Box of `radius_km` around `center`, clamped to valid coordinates.
    ///
    /// The longitude span widens with latitude; near the poles it covers the
    /// full range.
    pub fn around(center: Location, radius_km: f64) -> Self {
        let radius_km = radius_km.max(0.0);
        let d_lat = radius_km / KM_PER_DEGREE;
        let cos_lat = center.latitude.to_radians().cos().abs();
        let d_lon = if cos_lat < 1e-6 {
            180.0
        } else {
            (radius_km / (KM_PER_DEGREE * cos_lat)).min(180.0)
        };

        Self {
            min_lon: (center.longitude - d_lon).max(-180.0),
            min_lat: (center.latitude - d_lat).max(-90.0),
            max_lon: (center.longitude + d_lon).min(180.0),
            max_lat: (center.latitude + d_lat).min(90.0),
        }
    }

    pub fn contains(&self, location: Location) -> bool {
        (self.min_lat..=self.max_lat).contains(&location.latitude)
            && (self.min_lon..=self.max_lon).contains(&location.longitude)
    }

    /// Wire format: `minLon,minLat,maxLon,maxLat`.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIENNA: Location = Location::new(48.2082, 16.3738);
    const GRAZ: Location = Location::new(47.0707, 15.4395);

    #[test]
    fn distance_to_self_is_zero() {
        assert!(haversine_km(VIENNA, VIENNA).abs() < f64::EPSILON);
    }

    #[test]
    fn distance_is_symmetric() {
        let there = haversine_km(VIENNA, GRAZ);
        let back = haversine_km(GRAZ, VIENNA);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn distance_matches_known_value() {
        // Vienna to Graz is roughly 145 km as the crow flies.
        let distance = VIENNA.distance_km(&GRAZ);
        assert!((140.0..150.0).contains(&distance), "got {distance}");
    }

    #[test]
    fn bounding_box_contains_center() {
        let bbox = BoundingBox::around(VIENNA, 10.0);
        assert!(bbox.contains(VIENNA));
        assert!(!bbox.contains(GRAZ));
        assert!(bbox.min_lat < bbox.max_lat);
        assert!(bbox.min_lon < bbox.max_lon);
    }

    #[test]
    fn bounding_box_clamps_near_pole() {
        let bbox = BoundingBox::around(Location::new(89.99, 0.0), 50.0);
        assert!((bbox.max_lat - 90.0).abs() < f64::EPSILON);
        assert!((bbox.min_lon + 180.0).abs() < f64::EPSILON);
        assert!((bbox.max_lon - 180.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wire_format_orders_lon_before_lat() {
        let bbox = BoundingBox {
            min_lon: 1.5,
            min_lat: 2.0,
            max_lon: 3.25,
            max_lat: 4.0,
        };
        assert_eq!(bbox.to_wire(), "1.5,2,3.25,4");
    }
}
