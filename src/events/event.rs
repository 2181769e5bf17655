//! # Runtime events emitted by the coordinator and services.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: registration, readiness, shutdown phases
//! - **Reward events**: keyed event transitions and claims
//! - **Grant events**: reputation and capture grants
//! - **Subscriber events**: overflow and panics inside subscriber workers
//!
//! The [`Event`] struct carries optional metadata (service name, key, user, amount, reason).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use botvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ClaimGranted)
//!     .with_key(42)
//!     .with_user(7)
//!     .with_amount(12);
//!
//! assert_eq!(ev.kind, EventKind::ClaimGranted);
//! assert_eq!(ev.key, Some(42));
//! assert_eq!(ev.amount, Some(12));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `service` (subscriber name), `reason` (panic message)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `service` (subscriber name), `reason` ("full" / "closed")
    SubscriberOverflow,

    // === Lifecycle events ===
    /// A service was added to the registry.
    ///
    /// Sets: `service`
    ServiceRegistered,

    /// A service declared it has no pending obligations.
    ///
    /// Sets: `service`
    ServiceReady,

    /// A service call failed or panicked; the batch continues.
    ///
    /// Sets: `service`, `reason`
    ServiceFailed,

    /// A service finished disconnecting within the window.
    ///
    /// Sets: `service`
    ServiceDisconnected,

    /// Shutdown began.
    ShutdownRequested,

    /// Every service reported ready before the readiness window closed.
    ///
    /// Sets: `elapsed_ms`
    AllReady,

    /// The readiness window closed with services still busy.
    ///
    /// Sets: `reason` (comma separated service names)
    ReadinessTimeout,

    /// Every service disconnected within the shutdown budget.
    ///
    /// Sets: `elapsed_ms`
    AllStoppedWithin,

    /// The shutdown budget ran out; remaining disconnects were abandoned.
    ///
    /// Sets: `reason` (comma separated service names)
    GraceExceeded,

    // === Reward events ===
    /// Message threshold reached, delay timer armed.
    ///
    /// Sets: `key`, `elapsed_ms` (armed delay)
    EventQueued,

    /// Event became redeemable.
    ///
    /// Sets: `key`, `amount` (pot at start)
    EventArrived,

    /// Event resolved and its key reset.
    ///
    /// Sets: `key`, `amount` (participants count)
    EventDeparted,

    /// A claim was granted.
    ///
    /// Sets: `key`, `user`, `amount`, `reason` ("request" / "rude")
    ClaimGranted,

    /// A claim was rejected as greedy.
    ///
    /// Sets: `key`, `user`
    ClaimRejected,

    // === Grant events ===
    /// A reputation point was given.
    ///
    /// Sets: `user` (granter), `key` (target user)
    ReputationGranted,

    /// A creature spawned in a channel.
    ///
    /// Sets: `key`
    CreatureSpawned,

    /// A creature was captured or wandered off.
    ///
    /// Sets: `key`, `user` (captor, if any)
    CreatureDespawned,

    /// A member join was attributed to an inviter.
    ///
    /// Sets: `key` (guild), `user` (inviter)
    InviteCredited,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the service (or subscriber), if applicable.
    pub service: Option<Arc<str>>,
    /// Scheduling key (channel or guild id).
    pub key: Option<u64>,
    /// User id involved.
    pub user: Option<u64>,
    /// Amount granted, pot size or count, depending on kind.
    pub amount: Option<u64>,
    /// Human-readable reason (errors, names, overflow details).
    pub reason: Option<Arc<str>>,
    /// Duration in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            key: None,
            user: None,
            amount: None,
            reason: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a service name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches a scheduling key.
    #[inline]
    pub fn with_key(mut self, key: u64) -> Self {
        self.key = Some(key);
        self
    }

    /// Attaches a user id.
    #[inline]
    pub fn with_user(mut self, user: u64) -> Self {
        self.user = Some(user);
        self
    }

    /// Attaches an amount.
    #[inline]
    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.elapsed_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_reason(info)
    }
}
