//! Wire messages exchanged with connected clients.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use realtime::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::model::{Page, Trip, TripStatus};

/// Frames accepted from clients, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Inbound {
    /// A driver device reporting the bus position.
    LocationUpdate {
        #[serde(default)]
        scheduled_bus_id: Option<String>,
        #[serde(default)]
        latitude: Option<f64>,
        #[serde(default)]
        longitude: Option<f64>,
        /// Device fix time. Receipt time is used when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Which trips serve a stop.
    BusStopRequest {
        #[serde(default)]
        bus_stop_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<Vec<TripStatus>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_size: Option<usize>,
    },
}

impl Inbound {
    /// Decodes a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` when the frame is not a known message.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(frame)?)
    }
}

/// Frames pushed to clients, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    /// Full-state roster fanned out after every accepted position update.
    BusUpdate { buses: Vec<Trip> },

    /// Reply to a [`Inbound::BusStopRequest`].
    BusStopResponse { buses: Page<Trip> },
}

impl Outbound {
    /// Serializes the frame once for delivery to any number of observers.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if serialization fails.
    pub fn encode(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| Error::Internal(format!("failed to serialize outbound frame: {e}")))
    }
}

/// Error frame returned to the sender of a failed message only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReply {
    pub error: String,
}

impl ErrorReply {
    /// # Errors
    ///
    /// Returns `Internal` if serialization fails.
    pub fn encode(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| Error::Internal(format!("failed to serialize error frame: {e}")))
    }
}

impl From<&Error> for ErrorReply {
    fn from(err: &Error) -> Self {
        Self { error: err.reply_message() }
    }
}
