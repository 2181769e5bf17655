//! # Service registry: append-only records plus readiness flags.
//!
//! ## Architecture
//! ```text
//! Coordinator::register(S) ──► Registry.insert(ServiceId::of::<S>(), Arc<S>)
//! HostContext::mark_ready(id) ──► flag.store(true) ──► Notify ──► shutdown waiter
//! Coordinator::shutdown ──► close() ──► snapshot() ──► wait_all_ready() ──► clear()
//! ```
//!
//! ## Rules
//! - Registration is append-only and rejected once `close()` was called
//! - Readiness flags are atomics; they can be set before the service registers
//! - A flag only moves `false → true` during a shutdown; a late `false` answer never
//!   overwrites a readiness signal that already arrived

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::Notify;

use crate::core::service::{Service, ServiceId};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};

/// One registered service.
#[derive(Clone)]
pub(crate) struct Entry {
    pub id: ServiceId,
    pub name: &'static str,
    pub service: Arc<dyn Service>,
}

#[derive(Default)]
struct Slot {
    ready: Arc<AtomicBool>,
    order: u64,
    entry: Option<Entry>,
}

/// Registry of services and their readiness.
pub(crate) struct Registry {
    slots: DashMap<ServiceId, Slot>,
    next_order: AtomicU64,
    closed: AtomicBool,
    changed: Notify,
    bus: Bus,
}

impl Registry {
    /// Creates an empty, open registry.
    pub fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            slots: DashMap::new(),
            next_order: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            changed: Notify::new(),
            bus,
        })
    }

    /// Adds a service record with `ready = false` (unless it signalled early).
    pub fn insert<S: Service>(&self, service: Arc<S>) -> Result<ServiceId, RuntimeError> {
        let id = ServiceId::of::<S>();
        let name = service.name();
        if self.is_closed() {
            return Err(RuntimeError::RegistrationClosed { service: name });
        }

        let mut slot = self.slots.entry(id).or_default();
        if slot.entry.is_some() {
            return Err(RuntimeError::AlreadyRegistered { service: name });
        }
        slot.order = self.next_order.fetch_add(1, Ordering::Relaxed);
        slot.entry = Some(Entry { id, name, service });
        drop(slot);

        self.bus
            .publish(Event::new(EventKind::ServiceRegistered).with_service(name));
        Ok(id)
    }

    /// Sets a service's readiness flag and wakes the shutdown waiter.
    pub fn mark_ready(&self, id: ServiceId) {
        let name = {
            let slot = self.slots.entry(id).or_default();
            slot.ready.store(true, Ordering::Release);
            slot.entry.as_ref().map(|e| e.name)
        };
        let mut ev = Event::new(EventKind::ServiceReady);
        if let Some(name) = name {
            ev = ev.with_service(name);
        }
        self.bus.publish(ev);
        self.changed.notify_waiters();
    }

    /// Records a `can_disconnect` answer without clearing an earlier readiness signal.
    pub fn record_answer(&self, id: ServiceId, ready: bool) {
        if ready {
            self.mark_ready(id);
        }
    }

    /// Returns a service's readiness flag (`false` for unknown ids).
    pub fn is_ready(&self, id: ServiceId) -> bool {
        self.slots
            .get(&id)
            .map(|s| s.ready.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Returns true when every registered service is ready.
    pub fn all_ready(&self) -> bool {
        self.slots
            .iter()
            .filter(|s| s.entry.is_some())
            .all(|s| s.ready.load(Ordering::Acquire))
    }

    /// Names of registered services that are not ready, in registration order.
    pub fn not_ready(&self) -> Vec<&'static str> {
        self.snapshot()
            .into_iter()
            .filter(|e| !self.is_ready(e.id))
            .map(|e| e.name)
            .collect()
    }

    /// Waits until every registered service is ready.
    ///
    /// Not bounded by itself; callers race it against a deadline.
    pub async fn wait_all_ready(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.all_ready() {
                return;
            }
            notified.await;
        }
    }

    /// Registered services in registration order.
    pub fn snapshot(&self) -> Vec<Entry> {
        let mut entries: Vec<(u64, Entry)> = self
            .slots
            .iter()
            .filter_map(|s| s.entry.clone().map(|e| (s.order, e)))
            .collect();
        entries.sort_unstable_by_key(|(order, _)| *order);
        entries.into_iter().map(|(_, e)| e).collect()
    }

    /// Rejects further registrations.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drops every record after a full shutdown.
    pub fn clear(&self) {
        self.slots.clear();
    }
}
