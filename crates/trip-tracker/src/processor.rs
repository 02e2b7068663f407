//! Position update processor.
//!
//! Turns one reported fix into a [`TripDelta`] and persists it. The whole
//! read, derive and write cycle for a trip runs under that trip's lock, so
//! concurrent reports for the same trip are applied one after the other and
//! never lose a stop passage.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use realtime::{Error, Result, incomplete, not_found, validation};
use tracing::{info, warn};

use crate::config::Config;
use crate::geo::{self, Coordinate, Fix};
use crate::locks::KeyLocker;
use crate::model::{Position, ResolvedRoute, StopVisit, Trip, TripDelta};
use crate::provider::Provider;

/// A position report as received from a driver device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionReport {
    pub trip_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl PositionReport {
    #[must_use]
    pub fn new(trip_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            trip_id: Some(trip_id.into()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            timestamp: None,
        }
    }

    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Checks the caller-supplied fields.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the trip id or coordinates are missing
    /// or the coordinates are out of range.
    pub fn validate(&self) -> Result<(&str, Coordinate)> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(validation!("Latitude and longitude are required"));
        };
        let coordinate = Coordinate::new(latitude, longitude)?;

        let Some(trip_id) = self.trip_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
        else {
            return Err(validation!("Scheduled bus ID is required"));
        };

        Ok((trip_id, coordinate))
    }
}

#[derive(Debug, Clone)]
pub struct Processor<P: Provider> {
    config: Arc<Config>,
    provider: P,
    locker: KeyLocker,
}

impl<P: Provider> Processor<P> {
    pub fn new(config: Arc<Config>, provider: P) -> Self {
        Self { config, provider, locker: KeyLocker::new() }
    }

    /// Validates the report, derives progress and persists it atomically.
    ///
    /// # Errors
    ///
    /// * `Validation` for missing or out-of-range input, or a fix rejected by
    ///   the route deviation policy.
    /// * `TripNotFound` / `IncompleteRoute` when reference data is missing.
    /// * `TransientStore` when the store fails; nothing is applied.
    pub async fn process(&self, report: &PositionReport) -> Result<Trip> {
        let (trip_id, coordinate) = report.validate()?;
        let fix = Fix { coordinate, time: report.timestamp.unwrap_or_else(|| self.provider.now()) };

        let _guard = self.locker.lock(self.config.trip_lock_key(trip_id)).await;

        let Some(trip) = self.provider.trip(trip_id).await.map_err(|e| Error::store(&e))? else {
            warn!(monotonic_counter.trip_not_found = 1, trip = %trip_id);
            return Err(not_found!("Scheduled bus {} not found", trip_id));
        };

        let Some(route) = self.provider.route(&trip.route_id).await.map_err(|e| Error::store(&e))?
        else {
            warn!(monotonic_counter.incomplete_route = 1, trip = %trip_id, route = %trip.route_id);
            return Err(incomplete!("Route {} of scheduled bus {} not found", trip.route_id, trip_id));
        };
        let resolved = route.resolve().inspect_err(|e| {
            warn!(monotonic_counter.incomplete_route = 1, trip = %trip_id, error = %e);
        })?;

        let delta = derive(&trip, &resolved, &fix, &self.config)?;
        let updated = self.provider.apply(trip_id, &delta).await.map_err(|e| Error::store(&e))?;

        info!(
            monotonic_counter.position_updates = 1,
            trip = %trip_id,
            completion = delta.completion_percentage,
            stops_logged = delta.stop_visits.len(),
        );

        Ok(updated)
    }
}

/// Derives the state delta for one fix.
///
/// Distance traveled is anchored to the route origin and distance remaining
/// is measured directly to the destination, so each fix corrects the noise
/// of the one before it.
///
/// # Errors
///
/// Returns a validation error when a maximum route deviation is configured
/// and the fix is farther than that from every stop of the route.
pub fn derive(
    trip: &Trip, route: &ResolvedRoute<'_>, fix: &Fix, config: &Config,
) -> Result<TripDelta> {
    let current = &fix.coordinate;

    if let Some(max_deviation) = config.max_route_deviation_km {
        let nearest = route
            .stops
            .iter()
            .map(|stop| stop.coordinate().distance_to(current))
            .fold(f64::INFINITY, f64::min);
        if nearest > max_deviation {
            warn!(monotonic_counter.rejected_fixes = 1, trip = %trip.id, nearest_stop_km = nearest);
            return Err(validation!(
                "Position is {:.3} km from route {}, more than the {} km allowed",
                nearest,
                route.id,
                max_deviation
            ));
        }
    }

    let distance_traveled = route.origin.coordinate().distance_to(current);
    let distance_remaining = current.distance_to(&route.destination.coordinate()).max(0.0);

    let raw_completion = distance_traveled / route.total_distance * 100.0;
    if !(0.0..=100.0).contains(&raw_completion) {
        warn!(
            monotonic_counter.clamped_fixes = 1,
            trip = %trip.id,
            completion = raw_completion,
            "fix outside route envelope"
        );
    }
    let completion_percentage = raw_completion.clamp(0.0, 100.0);

    let speed = geo::speed(trip.last_fix().as_ref(), fix);
    let estimated_arrival = geo::eta(distance_remaining, speed.or(trip.progress.speed))
        .and_then(|remaining| fix.time.checked_add_signed(remaining));

    let stop_visits: Vec<StopVisit> = route
        .stops
        .iter()
        .filter(|stop| stop.coordinate().distance_to(current) < config.stop_proximity_km)
        .filter(|stop| !trip.stop_log.contains(&stop.id))
        .map(|stop| StopVisit { stop_id: stop.id.clone(), timestamp: fix.time })
        .collect();

    let logs = |stop_id: &str| stop_visits.iter().any(|visit| visit.stop_id == stop_id);
    let actual_departure =
        (trip.actual_departure.is_none() && logs(&route.origin.id)).then_some(fix.time);
    let actual_arrival =
        (trip.actual_arrival.is_none() && logs(&route.destination.id)).then_some(fix.time);

    Ok(TripDelta {
        position: Position {
            latitude: current.latitude,
            longitude: current.longitude,
            last_update_time: fix.time,
        },
        distance_traveled,
        distance_remaining,
        completion_percentage,
        speed,
        stop_visits,
        estimated_arrival,
        actual_departure,
        actual_arrival,
    })
}
