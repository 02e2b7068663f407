//! Great-circle distance and speed between fixes.

use chrono::{DateTime, Duration, Utc};
use realtime::{Result, validation};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Haversine distance between two points, in km.
#[must_use]
pub fn distance(lat_a: f64, lng_a: f64, lat_b: f64, lng_b: f64) -> f64 {
    let dlat = (lat_b - lat_a).to_radians();
    let dlng = (lng_b - lng_a).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat_a.to_radians().cos() * lat_b.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// A validated geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting values outside the geographic range.
    ///
    /// # Errors
    ///
    /// Returns a validation error when latitude or longitude is out of range
    /// or not a number.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(MIN_LAT..=MAX_LAT).contains(&latitude) {
            return Err(validation!("Invalid latitude: {}", latitude));
        }
        if !(MIN_LON..=MAX_LON).contains(&longitude) {
            return Err(validation!("Invalid longitude: {}", longitude));
        }
        Ok(Self { latitude, longitude })
    }

    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// A single timestamped observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub coordinate: Coordinate,
    pub time: DateTime<Utc>,
}

/// Instantaneous speed in km/h between two fixes.
///
/// `None` when there is no previous fix or time has not strictly advanced.
#[must_use]
pub fn speed(previous: Option<&Fix>, current: &Fix) -> Option<f64> {
    let previous = previous?;
    if current.time <= previous.time {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let hours = (current.time - previous.time).num_milliseconds() as f64 / 3_600_000.0;
    Some(previous.coordinate.distance_to(&current.coordinate) / hours)
}

/// Time needed to cover `distance_km` at `speed_kmh`.
#[must_use]
pub fn eta(distance_km: f64, speed_kmh: Option<f64>) -> Option<Duration> {
    let speed = speed_kmh.filter(|speed| speed.is_finite() && *speed > 0.0)?;

    #[allow(clippy::cast_possible_truncation)]
    let millis = (distance_km.max(0.0) / speed * 3_600_000.0).round() as i64;
    Some(Duration::milliseconds(millis))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const AUCKLAND: (f64, f64) = (-36.8485, 174.7633);
    const WELLINGTON: (f64, f64) = (-41.2865, 174.7762);

    fn fix(latitude: f64, longitude: f64, secs: i64) -> Fix {
        Fix {
            coordinate: Coordinate { latitude, longitude },
            time: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let there = distance(AUCKLAND.0, AUCKLAND.1, WELLINGTON.0, WELLINGTON.1);
        let back = distance(WELLINGTON.0, WELLINGTON.1, AUCKLAND.0, AUCKLAND.1);

        assert!((there - back).abs() < 1e-9);
        // ~493 km as the crow flies
        assert!((there - 493.0).abs() < 5.0, "got {there}");
    }

    #[test]
    fn coincident_points() {
        assert!(distance(AUCKLAND.0, AUCKLAND.1, AUCKLAND.0, AUCKLAND.1).abs() < f64::EPSILON);
    }

    #[test]
    fn one_degree_of_latitude() {
        let km = distance(0.0, 0.0, 1.0, 0.0);
        assert!((km - 111.19).abs() < 0.01, "got {km}");
    }

    #[test]
    fn coordinate_range() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn no_previous_fix() {
        assert_eq!(speed(None, &fix(0.0, 0.0, 0)), None);
    }

    #[test]
    fn time_must_advance() {
        let previous = fix(0.0, 0.0, 10);
        assert_eq!(speed(Some(&previous), &fix(0.01, 0.0, 10)), None);
        assert_eq!(speed(Some(&previous), &fix(0.01, 0.0, 5)), None);
    }

    #[test]
    fn speed_over_an_hour() {
        let previous = fix(0.0, 0.0, 0);
        let current = fix(1.0, 0.0, 3_600);
        let kmh = speed(Some(&previous), &current).unwrap();
        assert!((kmh - 111.19).abs() < 0.01, "got {kmh}");
    }

    #[test]
    fn eta_needs_positive_speed() {
        assert_eq!(eta(10.0, None), None);
        assert_eq!(eta(10.0, Some(0.0)), None);
        assert_eq!(eta(10.0, Some(-3.0)), None);
        assert_eq!(eta(10.0, Some(20.0)), Some(Duration::minutes(30)));
    }
}
