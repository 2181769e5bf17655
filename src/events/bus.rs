//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so that the coordinator, its registry and
//! every service can publish without blocking the inbound-message path.
//!
//! ```text
//! Publishers (many):                      Consumer (one):
//!   Coordinator ──┐
//!   EventManager ─┼──────► Bus ───────► subscriber listener ────► SubscriberSet
//!   Cooldown ─────┤  (broadcast chan)     (in Coordinator)
//!   Spawner ──────┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never awaits.
//! - **Bounded capacity**: one ring buffer shared by all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` items.
//! - **No persistence**: events sent with no receivers are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; every clone publishes into the same ring buffer.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    /// A bus sized for standalone services (tests, services without a coordinator).
    fn default() -> Self {
        Self::new(256)
    }
}
