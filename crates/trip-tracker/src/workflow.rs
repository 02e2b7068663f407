//! Dispatch of inbound client frames.

use std::sync::Arc;

use bytes::Bytes;
use realtime::{Error, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::broadcast::{Broadcaster, Delivery, Subscription};
use crate::config::Config;
use crate::model::{ErrorReply, Inbound, Outbound, Trip};
use crate::processor::{PositionReport, Processor};
use crate::provider::Provider;
use crate::stop_query::{StopQuery, StopQueryFilter};

const FALLBACK_REPLY: &[u8] = br#"{"error":"Failed to process request"}"#;

/// What handling one frame produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A position update was applied and the roster fanned out. The sender
    /// gets no direct reply.
    Broadcast(Delivery),

    /// A frame for the sender only: a stop query page or an error.
    Reply(Bytes),
}

/// Owns the tracking pipeline shared by every connection.
#[derive(Debug, Clone)]
pub struct Tracker<P: Provider> {
    provider: P,
    processor: Processor<P>,
    stop_query: StopQueryFilter<P>,
    broadcaster: Broadcaster,
    /// Held from roster read to broadcast so frames go out in read order.
    fan_out_turn: Arc<Mutex<()>>,
}

impl<P: Provider> Tracker<P> {
    pub fn new(config: Arc<Config>, provider: P) -> Self {
        Self {
            broadcaster: Broadcaster::new(config.observer_queue_capacity),
            processor: Processor::new(Arc::clone(&config), provider.clone()),
            stop_query: StopQueryFilter::new(config, provider.clone()),
            fan_out_turn: Arc::new(Mutex::new(())),
            provider,
        }
    }

    /// Registers a connection for `busUpdate` broadcasts.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    #[must_use]
    pub fn observers(&self) -> usize {
        self.broadcaster.observers()
    }

    /// Current state of a single trip.
    ///
    /// # Errors
    ///
    /// Returns `TransientStore` when the store cannot be read.
    pub async fn trip(&self, trip_id: &str) -> Result<Option<Trip>> {
        self.provider.trip(trip_id).await.map_err(|e| Error::store(&e))
    }

    /// Handles one text frame. Failures never escape: they become an error
    /// reply for the sender.
    pub async fn handle(&self, frame: &[u8]) -> Outcome {
        match self.dispatch(frame).await {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    Error::TransientStore(_) | Error::Internal(_) => {
                        error!(monotonic_counter.failed_frames = 1, code = err.code(), error = %err);
                    }
                    _ => warn!(monotonic_counter.rejected_frames = 1, code = err.code(), error = %err),
                }
                let reply = ErrorReply::from(&err)
                    .encode()
                    .unwrap_or_else(|_| Bytes::from_static(FALLBACK_REPLY));
                Outcome::Reply(reply)
            }
        }
    }

    async fn dispatch(&self, frame: &[u8]) -> Result<Outcome> {
        match Inbound::decode(frame)? {
            Inbound::LocationUpdate { scheduled_bus_id, latitude, longitude, timestamp } => {
                let report =
                    PositionReport { trip_id: scheduled_bus_id, latitude, longitude, timestamp };
                let trip = self.processor.process(&report).await?;
                Ok(Outcome::Broadcast(self.fan_out(trip).await?))
            }
            Inbound::BusStopRequest { bus_stop_id, status, page, page_size } => {
                let query = StopQuery { stop_id: bus_stop_id, statuses: status, page, page_size };
                let buses = self.stop_query.query(&query).await?;
                debug!(total = buses.total_docs, page = buses.page, "stop query answered");
                Ok(Outcome::Reply(Outbound::BusStopResponse { buses }.encode()?))
            }
        }
    }

    /// Broadcasts the full roster, or just `updated` when the roster cannot be
    /// read. The last frame sent always reflects every update applied before
    /// it.
    async fn fan_out(&self, updated: Trip) -> Result<Delivery> {
        let _turn = self.fan_out_turn.lock().await;
        let trip_id = updated.id.clone();
        let buses = match self.provider.roster().await {
            Ok(roster) => roster,
            Err(err) => {
                warn!(trip = %trip_id, error = %err, "roster unavailable, broadcasting updated trip only");
                vec![updated]
            }
        };

        let frame = Outbound::BusUpdate { buses }.encode()?;
        let delivery = self.broadcaster.broadcast(&frame);
        info!(
            monotonic_counter.bus_updates = 1,
            trip = %trip_id,
            delivered = delivery.delivered,
        );

        Ok(delivery)
    }
}
