//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use chrono::{DateTime, Utc};

/// The `Time` trait supplies the wall clock used to timestamp fixes.
pub trait Time: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl Time for SystemTime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
