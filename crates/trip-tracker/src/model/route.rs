use realtime::{Result, incomplete};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// A route stop, as held by the reference data store.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub sequence: Option<u32>,
}

impl Stop {
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate { latitude: self.latitude, longitude: self.longitude }
    }
}

/// A route with its stops populated. Any field the reference data may have
/// left unset is optional here; [`Route::resolve`] checks completeness.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    /// Planned distance in km.
    #[serde(default)]
    pub total_distance: Option<f64>,
}

/// A route whose origin, destination and planned distance are known.
#[derive(Debug, Clone)]
pub struct ResolvedRoute<'a> {
    pub id: &'a str,
    /// Stops in route sequence.
    pub stops: Vec<&'a Stop>,
    pub origin: &'a Stop,
    pub destination: &'a Stop,
    pub total_distance: f64,
}

impl Route {
    /// Checks the route is usable for progress derivation.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteRoute` naming the first missing piece: stops, origin,
    /// destination, or a positive total distance.
    ///
    /// Stops are ordered by `sequence` when every stop carries one, and kept
    /// in stored order otherwise.
    pub fn resolve(&self) -> Result<ResolvedRoute<'_>> {
        if self.stops.is_empty() {
            return Err(incomplete!("Route {} has no stops", self.id));
        }

        let origin = self.member("origin", self.origin.as_deref())?;
        let destination = self.member("destination", self.destination.as_deref())?;

        let Some(total_distance) =
            self.total_distance.filter(|distance| distance.is_finite() && *distance > 0.0)
        else {
            return Err(incomplete!("Route {} has no positive total distance", self.id));
        };

        let mut stops: Vec<&Stop> = self.stops.iter().collect();
        if stops.iter().all(|stop| stop.sequence.is_some()) {
            stops.sort_by_key(|stop| stop.sequence);
        }

        Ok(ResolvedRoute { id: &self.id, stops, origin, destination, total_distance })
    }

    /// Whether the stop is part of this route's sequence.
    #[must_use]
    pub fn serves(&self, stop_id: &str) -> bool {
        self.stops.iter().any(|stop| stop.id == stop_id)
    }

    fn member(&self, role: &str, stop_id: Option<&str>) -> Result<&Stop> {
        let Some(stop_id) = stop_id.filter(|id| !id.is_empty()) else {
            return Err(incomplete!("Route {} has no {} stop", self.id, role));
        };
        self.stops.iter().find(|stop| stop.id == stop_id).ok_or_else(|| {
            incomplete!("Route {} {} stop {} is not one of its stops", self.id, role, stop_id)
        })
    }
}
