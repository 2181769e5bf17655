use std::sync::Arc;

use crate::{
    collab::Gateway,
    config::CoordinatorConfig,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};
use super::{coordinator::Coordinator, registry::Registry};

/// Builder for a [`Coordinator`] with optional subscribers and a host gateway.
pub struct CoordinatorBuilder {
    cfg: CoordinatorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    gateway: Option<Arc<dyn Gateway>>,
}

impl CoordinatorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: CoordinatorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            gateway: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle and reward events through dedicated workers
    /// with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the host-owned gateway, torn down after every service stopped.
    pub fn with_gateway(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Builds the coordinator and starts the subscriber workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Arc<Coordinator> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let registry = Registry::new(bus.clone());

        let coord = Arc::new(Coordinator::new_internal(
            self.cfg,
            bus,
            subs,
            registry,
            self.gateway,
        ));
        coord.subscriber_listener();
        coord
    }
}
