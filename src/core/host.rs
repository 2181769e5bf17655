//! Handle that services use to talk back to the coordinator.

use std::sync::Arc;

use crate::core::registry::Registry;
use crate::core::service::{Service, ServiceId};
use crate::events::{Bus, Event};

/// Cheap, cloneable handle to the coordinator a service is registered with.
///
/// Handed to [`Service::can_disconnect`]; a service that is busy keeps a clone and calls
/// [`mark_ready`](Self::mark_ready) once its last obligation is resolved.
#[derive(Clone)]
pub struct HostContext {
    registry: Arc<Registry>,
    bus: Bus,
}

impl HostContext {
    pub(crate) fn new(registry: Arc<Registry>, bus: Bus) -> Self {
        Self { registry, bus }
    }

    /// Signals that the service identified by `id` may be disconnected.
    ///
    /// Safe to call from any task, at any time, any number of times.
    pub fn mark_ready(&self, id: ServiceId) {
        self.registry.mark_ready(id);
    }

    /// Same as [`mark_ready`](Self::mark_ready) for service type `S`.
    pub fn mark_ready_for<S: Service>(&self) {
        self.registry.mark_ready(ServiceId::of::<S>());
    }

    /// Whether the coordinator stopped accepting registrations.
    pub fn is_shutting_down(&self) -> bool {
        self.registry.is_closed()
    }

    /// Publishes an event on the coordinator's bus.
    pub fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    /// The coordinator's bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}
