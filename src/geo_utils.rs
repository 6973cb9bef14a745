//! # Geographic Utilities
//!
//! Core geographic and angular computation for GPS track analysis.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`initial_bearing`] | Initial great-circle bearing, degrees [0, 360) |
//! | [`signed_angle_diff`] | Shortest signed arc between two headings |
//! | [`circular_diff`] | Absolute angular separation, degrees [0, 180] |
//! | [`circular_mean`] | Vector (trigonometric) mean of headings |
//! | [`meters_to_degrees`] | Meters to longitude degrees at a latitude |
//! | [`meters_to_degrees_lat`] | Meters to latitude degrees |
//! | [`mps_to_knots`] | Meters per second to knots |
//!
//! All coordinates are WGS84 latitude/longitude in degrees, the native output
//! of GPS receivers. Headings are compass degrees: 0° north, 90° east.
//!
//! The circular helpers exist because headings wrap: the arithmetic mean of
//! 359° and 1° is 180°, the circular mean is 0°. Every average or distance
//! over headings in this crate goes through them.

use crate::GeoPoint;
use geo::{Bearing, Distance, Haversine, Point};

/// Meters per second to knots conversion factor (1 kn = 0.514444 m/s).
pub const MPS_TO_KNOTS: f64 = 1.943_844_492_440_604_6;

// =============================================================================
// Distance and Bearing
// =============================================================================

/// Great-circle distance between two GPS points in meters, via the
/// haversine formula on a spherical Earth.
///
/// Non-finite coordinates yield 0.0 rather than propagating NaN; callers
/// validate points before trusting distances.
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    if !p1.is_valid() || !p2.is_valid() {
        return 0.0;
    }
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Initial great-circle bearing from `p1` to `p2`, in compass degrees
/// normalized to [0, 360).
#[inline]
pub fn initial_bearing(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::bearing(point1, point2).rem_euclid(360.0)
}

// =============================================================================
// Circular Statistics
// =============================================================================

/// Shortest signed arc from heading `from` to heading `to`, in degrees,
/// normalized to (-180, 180]. Positive means a clockwise (starboard) turn.
#[inline]
pub fn signed_angle_diff(from: f64, to: f64) -> f64 {
    let diff = (to - from).rem_euclid(360.0);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Absolute angular separation between two headings, degrees [0, 180].
#[inline]
pub fn circular_diff(a: f64, b: f64) -> f64 {
    signed_angle_diff(a, b).abs()
}

/// Vector mean of a set of headings, in degrees [0, 360).
///
/// Handles the 0°/360° wraparound that breaks arithmetic means. Returns
/// `None` for an empty slice or when the headings cancel out (resultant
/// vector of length ~0, where no mean direction exists).
pub fn circular_mean(headings: &[f64]) -> Option<f64> {
    if headings.is_empty() {
        return None;
    }

    let (sin_sum, cos_sum) = headings.iter().fold((0.0_f64, 0.0_f64), |(s, c), h| {
        let r = h.to_radians();
        (s + r.sin(), c + r.cos())
    });

    let magnitude = (sin_sum * sin_sum + cos_sum * cos_sum).sqrt();
    if magnitude < 1e-9 {
        return None;
    }

    Some(sin_sum.atan2(cos_sum).to_degrees().rem_euclid(360.0))
}

/// Mean direction of an accumulated sine/cosine pair, degrees [0, 360).
/// Streaming counterpart of [`circular_mean`] for callers that keep their
/// own running vector sums.
#[inline]
pub fn vector_heading(sin_sum: f64, cos_sum: f64) -> Option<f64> {
    let magnitude = (sin_sum * sin_sum + cos_sum * cos_sum).sqrt();
    if magnitude < 1e-9 {
        return None;
    }
    Some(sin_sum.atan2(cos_sum).to_degrees().rem_euclid(360.0))
}

// =============================================================================
// Unit Conversion
// =============================================================================

/// Convert meters to approximate longitude degrees at a given latitude.
///
/// At the equator 1° of longitude is about 111,320 m, shrinking with
/// cos(latitude). Clamped near the poles where longitude degrees degenerate.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

/// Convert meters to approximate latitude degrees (1° ≈ 111,320 m,
/// latitude-independent to first order).
#[inline]
pub fn meters_to_degrees_lat(meters: f64) -> f64 {
    meters / 111_320.0
}

/// Convert meters per second to knots.
#[inline]
pub fn mps_to_knots(mps: f64) -> f64 {
    mps * MPS_TO_KNOTS
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GeoPoint::new(54.3233, 10.1228);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_symmetric() {
        let a = GeoPoint::new(54.3233, 10.1228);
        let b = GeoPoint::new(54.4000, 10.2000);
        assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
    }

    #[test]
    fn test_haversine_distance_nyc_london() {
        // New York to London is approximately 5,570 km
        let nyc = GeoPoint::new(40.7128, -74.0060);
        let london = GeoPoint::new(51.5074, -0.1278);
        let dist = haversine_distance(&nyc, &london);
        assert!(approx_eq(dist, 5_570_226.0, 1000.0), "got {dist}");
    }

    #[test]
    fn test_haversine_distance_short_range() {
        // Statue of Liberty to the Empire State Building, ~8.24 km
        let liberty = GeoPoint::new(40.6892, -74.0445);
        let empire = GeoPoint::new(40.7484, -73.9857);
        let dist = haversine_distance(&liberty, &empire);
        assert!(approx_eq(dist, 8_240.0, 15.0), "got {dist}");
    }

    #[test]
    fn test_haversine_distance_non_finite_is_zero() {
        let p = GeoPoint::new(54.3233, 10.1228);
        let bad = GeoPoint::new(f64::NAN, 10.1228);
        assert_eq!(haversine_distance(&p, &bad), 0.0);
        assert_eq!(haversine_distance(&bad, &p), 0.0);
    }

    #[test]
    fn test_initial_bearing_cardinal_directions() {
        let origin = GeoPoint::new(54.0, 10.0);
        let north = GeoPoint::new(54.1, 10.0);
        let east = GeoPoint::new(54.0, 10.1);
        let south = GeoPoint::new(53.9, 10.0);

        assert!(approx_eq(initial_bearing(&origin, &north), 0.0, 0.5));
        assert!(approx_eq(initial_bearing(&origin, &east), 90.0, 0.5));
        assert!(approx_eq(initial_bearing(&origin, &south), 180.0, 0.5));
    }

    #[test]
    fn test_initial_bearing_range() {
        let origin = GeoPoint::new(54.0, 10.0);
        let west = GeoPoint::new(54.0, 9.9);
        let b = initial_bearing(&origin, &west);
        assert!((0.0..360.0).contains(&b));
        assert!(approx_eq(b, 270.0, 0.5));
    }

    #[test]
    fn test_signed_angle_diff() {
        assert_eq!(signed_angle_diff(10.0, 30.0), 20.0);
        assert_eq!(signed_angle_diff(30.0, 10.0), -20.0);
        assert_eq!(signed_angle_diff(350.0, 10.0), 20.0);
        assert_eq!(signed_angle_diff(10.0, 350.0), -20.0);
        assert_eq!(signed_angle_diff(0.0, 180.0), 180.0);
    }

    #[test]
    fn test_circular_diff_wraps() {
        assert_eq!(circular_diff(359.0, 1.0), 2.0);
        assert_eq!(circular_diff(90.0, 270.0), 180.0);
    }

    #[test]
    fn test_circular_mean_wraparound() {
        let mean = circular_mean(&[359.0, 1.0]).unwrap();
        assert!(approx_eq(mean, 0.0, 1e-6) || approx_eq(mean, 360.0, 1e-6));
    }

    #[test]
    fn test_circular_mean_simple() {
        let mean = circular_mean(&[80.0, 100.0]).unwrap();
        assert!(approx_eq(mean, 90.0, 1e-6));
    }

    #[test]
    fn test_circular_mean_empty_and_degenerate() {
        assert!(circular_mean(&[]).is_none());
        // Opposite headings cancel; no mean direction exists
        assert!(circular_mean(&[0.0, 180.0]).is_none());
    }

    #[test]
    fn test_meters_to_degrees() {
        // At the equator 111.32 km is one degree
        assert!(approx_eq(meters_to_degrees(111_320.0, 0.0), 1.0, 0.01));
        // Same distance spans more longitude degrees at higher latitude
        assert!(meters_to_degrees(111_320.0, 54.0) > 1.0);
        assert!(approx_eq(meters_to_degrees_lat(111_320.0), 1.0, 1e-9));
    }

    #[test]
    fn test_mps_to_knots() {
        assert!(approx_eq(mps_to_knots(0.514444), 1.0, 1e-6));
        assert_eq!(mps_to_knots(0.0), 0.0);
    }
}
