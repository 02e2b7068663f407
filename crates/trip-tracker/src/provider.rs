//! # Provider
//!
//! External data interfaces the host application implements for the crate.

use anyhow::Result;
pub use realtime::Time;

use crate::model::{Route, Trip, TripDelta, TripStatus};

/// Provider entry point implemented by the host application.
pub trait Provider: TripStore + Time + Clone + 'static {}

impl<T> Provider for T where T: TripStore + Time + Clone + 'static {}

/// Selection criteria for [`TripStore::trips`]. `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripFilter {
    pub route_ids: Option<Vec<String>>,
    pub statuses: Option<Vec<TripStatus>>,
}

impl TripFilter {
    #[must_use]
    pub fn matches(&self, trip: &Trip) -> bool {
        self.route_ids.as_ref().is_none_or(|ids| ids.contains(&trip.route_id))
            && self.statuses.as_ref().is_none_or(|statuses| statuses.contains(&trip.status))
    }
}

/// The `TripStore` trait is the persistence gateway to the document store
/// holding trips and route reference data.
pub trait TripStore: Send + Sync {
    /// Fetch a trip by id.
    fn trip(&self, trip_id: &str) -> impl Future<Output = Result<Option<Trip>>> + Send;

    /// Fetch a route with its stops populated.
    fn route(&self, route_id: &str) -> impl Future<Output = Result<Option<Route>>> + Send;

    /// Apply a delta to a trip as one atomic write and return the refreshed
    /// trip. Implementations must never leave a partially applied delta.
    fn apply(
        &self, trip_id: &str, delta: &TripDelta,
    ) -> impl Future<Output = Result<Trip>> + Send;

    /// Ids of routes whose stop sequence contains the stop.
    fn routes_serving(&self, stop_id: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Trips matching the filter, in any order.
    fn trips(&self, filter: &TripFilter) -> impl Future<Output = Result<Vec<Trip>>> + Send;

    /// Every trip currently held, for full-state broadcasts.
    fn roster(&self) -> impl Future<Output = Result<Vec<Trip>>> + Send;
}
