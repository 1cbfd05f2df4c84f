//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`ProgressBus`] is the publish/subscribe hub that tells status streams
//! the progress record changed. Events carry only metadata; subscribers
//! re-read the record from the tracker, so a subscriber that misses
//! intermediate events still converges on the latest state.

use serde::Serialize;
use tokio::sync::broadcast;
use trainhub_core::progress::TrainingStatus;
use trainhub_core::types::JobId;

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// Notification that the shared progress record changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Tracker revision the change produced.
    pub revision: u64,
    /// Job the change belongs to.
    pub job_id: Option<JobId>,
    /// Status after the change.
    pub status: TrainingStatus,
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// What a subscriber receives from [`Subscription::recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The next event in publish order.
    Event(ProgressEvent),
    /// The subscriber fell behind and `n` events were discarded. The
    /// record itself is still current, so the subscriber should re-read it.
    Lagged(u64),
}

/// A live subscription to a [`ProgressBus`].
///
/// Unsubscribing is dropping the value; [`ProgressBus::subscriber_count`]
/// drops with it.
pub struct Subscription {
    rx: broadcast::Receiver<ProgressEvent>,
}

impl Subscription {
    /// Wait for the next delivery.
    ///
    /// Returns `None` once the bus has been dropped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        match self.rx.recv().await {
            Ok(event) => Some(Delivery::Event(event)),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!(missed = n, "Progress subscriber lagged");
                Some(Delivery::Lagged(n))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressBus
// ---------------------------------------------------------------------------

/// Default buffer capacity per subscriber.
const DEFAULT_CAPACITY: usize = 64;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers independently
/// receive every published [`ProgressEvent`]. Publishing never waits for a
/// subscriber: when a subscriber's buffer is full its oldest events are
/// dropped and it observes [`Delivery::Lagged`]. The newest events are never
/// the ones discarded, so a terminal-status event always reaches every
/// subscriber that is still listening.
///
/// # Usage
///
/// ```rust
/// use trainhub_core::progress::TrainingStatus;
/// use trainhub_events::{ProgressBus, ProgressEvent};
///
/// let bus = ProgressBus::default();
/// let _sub = bus.subscribe();
///
/// bus.publish(ProgressEvent {
///     revision: 1,
///     job_id: None,
///     status: TrainingStatus::Started,
/// });
/// ```
pub struct ProgressBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    /// Create a bus with a specific per-subscriber capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: ProgressEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Register a new subscriber. It sees events published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
