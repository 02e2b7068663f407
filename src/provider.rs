//! In-memory trip store backing the service.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use realtime::SystemTime;
use serde::{Deserialize, Serialize};
use tracing::info;
use trip_tracker::{Route, Time, Trip, TripDelta, TripFilter, TripStore};

/// Reference data and trips loaded at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub trips: Vec<Trip>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    trips: Arc<DashMap<String, Trip>>,
    routes: Arc<DashMap<String, Route>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the store named by `url`: `memory://` starts empty and
    /// `file://<path>` seeds it from a JSON [`Snapshot`].
    ///
    /// # Errors
    ///
    /// Returns an error for an unsupported scheme or an unreadable snapshot.
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("memory:") {
            return Ok(Self::new());
        }
        let Some(path) = url.strip_prefix("file://") else {
            bail!("unsupported store url: {url}");
        };

        let data = fs::read_to_string(path).with_context(|| format!("reading snapshot {path}"))?;
        let snapshot: Snapshot =
            serde_json::from_str(&data).with_context(|| format!("parsing snapshot {path}"))?;
        info!(path, routes = snapshot.routes.len(), trips = snapshot.trips.len(), "snapshot loaded");

        Ok(Self::from_snapshot(snapshot))
    }

    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for route in snapshot.routes {
            store.insert_route(route);
        }
        for trip in snapshot.trips {
            store.insert_trip(trip);
        }
        store
    }

    pub fn insert_route(&self, route: Route) {
        self.routes.insert(route.id.clone(), route);
    }

    pub fn insert_trip(&self, trip: Trip) {
        self.trips.insert(trip.id.clone(), trip);
    }
}

impl Time for MemoryStore {
    fn now(&self) -> DateTime<Utc> {
        SystemTime.now()
    }
}

impl TripStore for MemoryStore {
    async fn trip(&self, trip_id: &str) -> Result<Option<Trip>> {
        Ok(self.trips.get(trip_id).map(|trip| trip.clone()))
    }

    async fn route(&self, route_id: &str) -> Result<Option<Route>> {
        Ok(self.routes.get(route_id).map(|route| route.clone()))
    }

    async fn apply(&self, trip_id: &str, delta: &TripDelta) -> Result<Trip> {
        // the entry stays locked for the whole merge
        let mut trip =
            self.trips.get_mut(trip_id).ok_or_else(|| anyhow!("trip {trip_id} not in store"))?;
        trip.apply(delta);
        Ok(trip.clone())
    }

    async fn routes_serving(&self, stop_id: &str) -> Result<Vec<String>> {
        Ok(self
            .routes
            .iter()
            .filter(|route| route.serves(stop_id))
            .map(|route| route.id.clone())
            .collect())
    }

    async fn trips(&self, filter: &TripFilter) -> Result<Vec<Trip>> {
        Ok(self.trips.iter().filter(|trip| filter.matches(trip)).map(|trip| trip.clone()).collect())
    }

    async fn roster(&self) -> Result<Vec<Trip>> {
        let mut trips: Vec<Trip> = self.trips.iter().map(|trip| trip.clone()).collect();
        trips.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(trips)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use trip_tracker::{Position, StopVisit, TripStatus};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn snapshot() -> Snapshot {
        serde_json::from_value(json!({
            "routes": [{
                "id": "r1",
                "stops": [
                    {"id": "a", "latitude": 0.0, "longitude": 0.0},
                    {"id": "b", "latitude": 0.0, "longitude": 0.1}
                ],
                "origin": "a",
                "destination": "b",
                "totalDistance": 11.1
            }],
            "trips": [
                {"id": "t2", "routeId": "r1", "busId": "bus-2", "createdAt": "2023-11-14T22:15:00Z"},
                {"id": "t1", "routeId": "r1", "busId": "bus-1", "createdAt": "2023-11-14T22:10:00Z",
                 "status": "onRoute"},
                {"id": "t3", "routeId": "r9", "busId": "bus-3", "createdAt": "2023-11-14T22:20:00Z"}
            ]
        }))
        .expect("snapshot should deserialize")
    }

    fn delta(stop: &str) -> TripDelta {
        TripDelta {
            position: Position { latitude: 0.0, longitude: 0.0, last_update_time: at(0) },
            distance_traveled: 0.0,
            distance_remaining: 11.1,
            completion_percentage: 0.0,
            speed: None,
            stop_visits: vec![StopVisit { stop_id: stop.to_string(), timestamp: at(0) }],
            estimated_arrival: None,
            actual_departure: None,
            actual_arrival: None,
        }
    }

    #[tokio::test]
    async fn roster_in_creation_order() {
        let store = MemoryStore::from_snapshot(snapshot());
        let roster = store.roster().await.expect("should read");

        let ids: Vec<_> = roster.iter().map(|trip| trip.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn serving_routes_and_filter() {
        let store = MemoryStore::from_snapshot(snapshot());

        assert_eq!(store.routes_serving("b").await.expect("should read"), vec!["r1".to_string()]);
        assert!(store.routes_serving("z").await.expect("should read").is_empty());

        let filter = TripFilter {
            route_ids: Some(vec!["r1".to_string()]),
            statuses: Some(vec![TripStatus::OnRoute]),
        };
        let trips = store.trips(&filter).await.expect("should read");
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].id, "t1");
    }

    #[tokio::test]
    async fn apply_merges_and_returns_trip() {
        let store = MemoryStore::from_snapshot(snapshot());

        store.apply("t1", &delta("a")).await.expect("should apply");
        let trip = store.apply("t1", &delta("a")).await.expect("should apply");

        assert_eq!(trip.stop_log.len(), 1);
        assert_eq!(store.trip("t1").await.expect("should read"), Some(trip));
    }

    #[tokio::test]
    async fn apply_to_unknown_trip_fails() {
        let store = MemoryStore::new();
        assert!(store.apply("nope", &delta("a")).await.is_err());
    }

    #[test]
    fn store_urls() {
        assert!(MemoryStore::from_url("memory://").is_ok());
        assert!(MemoryStore::from_url("mongodb://localhost/bus").is_err());
        assert!(MemoryStore::from_url("file:///does/not/exist.json").is_err());
    }

    #[test]
    fn snapshot_from_file() {
        let path = std::env::temp_dir().join(format!("bus-tracking-{}.json", std::process::id()));
        fs::write(&path, serde_json::to_vec(&snapshot()).expect("should serialize"))
            .expect("should write");

        let store = MemoryStore::from_url(&format!("file://{}", path.display()))
            .expect("should load snapshot");
        let _ = fs::remove_file(&path);

        assert_eq!(store.trips.len(), 3);
        assert_eq!(store.routes.len(), 1);
    }
}
