use std::env;

/// Distance below which a vehicle is considered to be at a stop, in km.
pub const DEFAULT_STOP_PROXIMITY_KM: f64 = 0.05;
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_OBSERVER_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub stop_proximity_km: f64,
    /// Fixes farther than this from every stop of the route are rejected.
    /// `None` accepts them and clamps the derived percentage.
    pub max_route_deviation_km: Option<f64>,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub observer_queue_capacity: usize,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        let stop_proximity_km = env_f64("STOP_PROXIMITY_KM", DEFAULT_STOP_PROXIMITY_KM);
        let max_route_deviation_km = env::var("MAX_ROUTE_DEVIATION_KM")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| *value > 0.0);
        let max_page_size = env_usize("MAX_PAGE_SIZE", MAX_PAGE_SIZE).max(1);
        let default_page_size =
            env_usize("DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE).clamp(1, max_page_size);
        let observer_queue_capacity =
            env_usize("OBSERVER_QUEUE_CAPACITY", DEFAULT_OBSERVER_QUEUE_CAPACITY).max(1);

        Self {
            stop_proximity_km,
            max_route_deviation_km,
            default_page_size,
            max_page_size,
            observer_queue_capacity,
        }
    }

    #[must_use]
    pub fn trip_lock_key(&self, trip_id: &str) -> String {
        format!("trip:{trip_id}")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stop_proximity_km: DEFAULT_STOP_PROXIMITY_KM,
            max_route_deviation_km: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            observer_queue_capacity: DEFAULT_OBSERVER_QUEUE_CAPACITY,
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|value| value.parse::<f64>().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|value| value.parse::<usize>().ok()).unwrap_or(default)
}
