//! Trips serving a stop.

use std::sync::Arc;

use realtime::{Error, Result, validation};
use tracing::debug;

use crate::config::Config;
use crate::model::{Page, Trip, TripStatus};
use crate::provider::{Provider, TripFilter};

/// A stop query as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopQuery {
    pub stop_id: Option<String>,
    /// Restricts results to these statuses. `None` or empty means any.
    pub statuses: Option<Vec<TripStatus>>,
    /// 1-based page number.
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl StopQuery {
    #[must_use]
    pub fn stop(stop_id: impl Into<String>) -> Self {
        Self { stop_id: Some(stop_id.into()), ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub struct StopQueryFilter<P: Provider> {
    config: Arc<Config>,
    provider: P,
}

impl<P: Provider> StopQueryFilter<P> {
    pub const fn new(config: Arc<Config>, provider: P) -> Self {
        Self { config, provider }
    }

    /// Returns the trips on routes serving the stop, ordered by creation time
    /// and paginated.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no stop id is given, or
    /// `TransientStore` when the store cannot be read.
    pub async fn query(&self, query: &StopQuery) -> Result<Page<Trip>> {
        let Some(stop_id) = query.stop_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
        else {
            return Err(validation!("Bus stop ID is required"));
        };

        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));

        let route_ids =
            self.provider.routes_serving(stop_id).await.map_err(|e| Error::store(&e))?;
        if route_ids.is_empty() {
            debug!(stop = %stop_id, "no routes serve stop");
            return Ok(Page::paginate(Vec::new(), page, page_size));
        }

        let filter = TripFilter {
            route_ids: Some(route_ids),
            statuses: query.statuses.clone().filter(|statuses| !statuses.is_empty()),
        };
        let mut trips = self.provider.trips(&filter).await.map_err(|e| Error::store(&e))?;
        trips.retain(|trip| filter.matches(trip));
        trips.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        debug!(stop = %stop_id, matched = trips.len(), page, page_size);
        Ok(Page::paginate(trips, page, page_size))
    }
}
