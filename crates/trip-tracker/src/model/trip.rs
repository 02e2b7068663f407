use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, Fix};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TripStatus {
    #[default]
    Scheduled,
    OnRoute,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub last_update_time: DateTime<Utc>,
}

impl Position {
    #[must_use]
    pub const fn fix(&self) -> Fix {
        Fix {
            coordinate: Coordinate { latitude: self.latitude, longitude: self.longitude },
            time: self.last_update_time,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Distance from the route origin, in km.
    pub distance_traveled: f64,
    /// Distance to the route destination, in km.
    pub distance_remaining: f64,
    pub completion_percentage: f64,
    /// Last derived speed in km/h.
    #[serde(default)]
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StopVisit {
    pub stop_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Insertion-ordered stop passages with at most one entry per stop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<StopVisit>", into = "Vec<StopVisit>")]
pub struct StopLog {
    visits: Vec<StopVisit>,
    seen: HashSet<String>,
}

impl StopLog {
    /// Appends the visit unless the stop is already logged.
    pub fn insert(&mut self, visit: StopVisit) -> bool {
        if !self.seen.insert(visit.stop_id.clone()) {
            return false;
        }
        self.visits.push(visit);
        true
    }

    #[must_use]
    pub fn contains(&self, stop_id: &str) -> bool {
        self.seen.contains(stop_id)
    }

    #[must_use]
    pub fn visits(&self) -> &[StopVisit] {
        &self.visits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }
}

impl PartialEq for StopLog {
    fn eq(&self, other: &Self) -> bool {
        self.visits == other.visits
    }
}

impl From<Vec<StopVisit>> for StopLog {
    fn from(visits: Vec<StopVisit>) -> Self {
        let mut log = Self::default();
        for visit in visits {
            log.insert(visit);
        }
        log
    }
}

impl From<StopLog> for Vec<StopVisit> {
    fn from(log: StopLog) -> Self {
        log.visits
    }
}

/// One scheduled run of a bus along a route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub route_id: String,
    pub bus_id: String,
    #[serde(default)]
    pub driver_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub scheduled_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub stop_log: StopLog,
    #[serde(default)]
    pub status: TripStatus,
}

impl Trip {
    #[must_use]
    pub fn new(
        id: impl Into<String>, route_id: impl Into<String>, bus_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            route_id: route_id.into(),
            bus_id: bus_id.into(),
            driver_id: None,
            created_at,
            scheduled_departure: None,
            scheduled_arrival: None,
            actual_departure: None,
            actual_arrival: None,
            estimated_arrival: None,
            position: None,
            progress: Progress::default(),
            stop_log: StopLog::default(),
            status: TripStatus::Scheduled,
        }
    }

    /// The last accepted fix, if any.
    #[must_use]
    pub fn last_fix(&self) -> Option<Fix> {
        self.position.as_ref().map(Position::fix)
    }

    /// Merges a delta into the trip.
    ///
    /// Stop membership is re-checked here so a stale delta cannot create a
    /// duplicate entry. A delta older than the stored position leaves
    /// position and progress as they are, and only contributes stop visits
    /// and first departure/arrival stamps.
    /// Returns the number of stop visits actually appended.
    pub fn apply(&mut self, delta: &TripDelta) -> usize {
        let stale = self
            .position
            .as_ref()
            .is_some_and(|previous| delta.position.last_update_time < previous.last_update_time);

        if !stale {
            self.position = Some(delta.position);
            self.progress.distance_traveled = delta.distance_traveled;
            self.progress.distance_remaining = delta.distance_remaining;
            self.progress.completion_percentage = delta.completion_percentage;
            if delta.speed.is_some() {
                self.progress.speed = delta.speed;
            }
            if delta.estimated_arrival.is_some() {
                self.estimated_arrival = delta.estimated_arrival;
            }
        }
        if self.actual_departure.is_none() {
            self.actual_departure = delta.actual_departure;
        }
        if self.actual_arrival.is_none() {
            self.actual_arrival = delta.actual_arrival;
        }

        let mut appended = 0;
        for visit in &delta.stop_visits {
            if self.stop_log.insert(visit.clone()) {
                appended += 1;
            }
        }
        appended
    }
}

/// The single atomic write produced by one position update.
#[derive(Debug, Clone, PartialEq)]
pub struct TripDelta {
    pub position: Position,
    pub distance_traveled: f64,
    pub distance_remaining: f64,
    pub completion_percentage: f64,
    /// `None` leaves the stored speed unchanged.
    pub speed: Option<f64>,
    /// Stops to append, in route sequence.
    pub stop_visits: Vec<StopVisit>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
}
