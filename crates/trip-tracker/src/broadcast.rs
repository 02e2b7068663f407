//! Fanout of encoded frames to every connected observer.
//!
//! Observers share one bounded ring of recent frames and sending never waits
//! on a reader. An observer that falls behind loses its oldest unread frames
//! and resumes from the oldest one still held, so the newest frame always
//! reaches it.

use std::fmt;

use bytes::Bytes;
use tokio::sync::broadcast::{self, error::{RecvError, TryRecvError}};
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_CAPACITY: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Observers registered when the frame was queued.
    pub delivered: usize,
}

#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Bytes>,
}

impl Broadcaster {
    /// Creates a broadcaster that holds up to `capacity` unread frames per
    /// observer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.clamp(1, MAX_CAPACITY));
        Self { tx }
    }

    /// Registers a new observer. Dropping the returned subscription
    /// unregisters it.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let id = ObserverId(Uuid::new_v4());
        let rx = self.tx.subscribe();
        debug!(observer = %id, observers = self.tx.receiver_count(), "observer registered");

        Subscription { id, rx, skipped: 0 }
    }

    /// Queues `frame` for every registered observer without waiting.
    pub fn broadcast(&self, frame: &Bytes) -> Delivery {
        // an error only means nobody is listening
        let delivered = self.tx.send(frame.clone()).unwrap_or_default();
        Delivery { delivered }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observers(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// An observer's receiving end.
#[derive(Debug)]
pub struct Subscription {
    id: ObserverId,
    rx: broadcast::Receiver<Bytes>,
    skipped: u64,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Frames overwritten before this observer read them.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Waits for the next frame. Returns `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(RecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Takes the next queued frame, if any.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.try_recv() {
                Ok(frame) => return Some(frame),
                Err(TryRecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    fn lagged(&mut self, skipped: u64) {
        self.skipped += skipped;
        warn!(monotonic_counter.dropped_frames = skipped, observer = %self.id, "observer lagging");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(observer = %self.id, skipped = self.skipped, "observer unregistered");
    }
}
