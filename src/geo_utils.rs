//! # Geographic Utilities
//!
//! Great-circle distance between a user and the spots around them.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points in meters |
//! | [`distance_km`] | Great-circle distance in kilometers on a 6,371 km sphere |
//! | [`format_distance`] | Short distance label for a spot ("350m", "2.4km") |
//!
//! ## Example
//!
//! ```rust
//! use spot_finder::geo_utils;
//!
//! // Seoul City Hall to Gyeongbokgung
//! let d = geo_utils::distance_km(37.5665, 126.9780, 37.5796, 126.9770);
//! assert!(d > 1.0 && d < 2.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a spherical Earth. The `geo` crate computes
//! the central angle on its mean radius (6,371,008.8 m); [`distance_km`] rescales that
//! onto a 6,371 km sphere so labels match the values the data source publishes.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)

use geo::{Distance, Haversine, Point};

use crate::{GpsPoint, Spot};

/// Earth radius used for spot distances, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// Mean radius `geo::Haversine` measures on
const GEO_MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface.
///
/// # Example
///
/// ```rust
/// use spot_finder::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Great-circle distance in kilometers between two coordinates given in degrees.
///
/// Always `>= 0`, exactly 0 for identical coordinates, and symmetric in its
/// arguments. Callers are responsible for passing valid degrees.
#[inline]
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let meters = haversine_distance(&GpsPoint::new(lat1, lng1), &GpsPoint::new(lat2, lng2));
    meters / GEO_MEAN_EARTH_RADIUS_M * EARTH_RADIUS_KM
}

/// Distance in kilometers from the user to a spot.
#[inline]
pub fn distance_to_spot_km(user: &GpsPoint, spot: &Spot) -> f64 {
    distance_km(user.latitude, user.longitude, spot.latitude, spot.longitude)
}

/// Format a distance in kilometers for display.
///
/// Below 1 km the value is rendered as whole meters, otherwise with one decimal
/// place in kilometers.
pub fn format_km(distance: f64) -> String {
    if distance < 1.0 {
        return format!("{}m", (distance * 1000.0).round() as i64);
    }
    // Exact ties at one decimal are odd multiples of 0.25; round those up, not to even
    let quarters = distance * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 == 1.0 {
        format!("{:.1}km", distance + 0.05)
    } else {
        format!("{:.1}km", distance)
    }
}

/// Distance label from the user to a spot, or an empty string without a location.
///
/// # Example
///
/// ```rust
/// use spot_finder::{Category, GpsPoint, Spot, format_distance};
///
/// let spot = Spot::new("s1", 37.5665, 126.9780, Category::Cafe);
/// assert_eq!(format_distance(None, &spot), "");
/// assert_eq!(format_distance(Some(GpsPoint::new(37.5665, 126.9780)), &spot), "0m");
/// ```
pub fn format_distance(user_location: Option<GpsPoint>, spot: &Spot) -> String {
    match user_location {
        Some(user) => format_km(distance_to_spot_km(&user, spot)),
        None => String::new(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
