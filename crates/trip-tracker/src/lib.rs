//! # Trip Tracker
//!
//! Derives trip progress from live vehicle fixes, persists it through a
//! [`TripStore`] and fans refreshed state out to connected observers.

pub mod broadcast;
pub mod config;
pub mod geo;
pub mod locks;
pub mod model;
pub mod processor;
pub mod provider;
pub mod stop_query;
pub mod workflow;

pub use self::broadcast::{Broadcaster, Delivery, ObserverId, Subscription};
pub use self::config::Config;
pub use self::model::*;
pub use self::processor::{PositionReport, Processor};
pub use self::provider::{Provider, Time, TripFilter, TripStore};
pub use self::stop_query::{StopQuery, StopQueryFilter};
pub use self::workflow::{Outcome, Tracker};
