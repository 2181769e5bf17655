//! # Coordinator: service registry, event fan-out and bounded shutdown.
//!
//! The [`Coordinator`] owns the event bus, a [`SubscriberSet`] and the service registry.
//! It never blocks on a single service: every service call runs as its own task and the
//! whole shutdown is bounded by one deadline.
//!
//! ## High-level architecture
//! ```text
//! register(Arc<S>) ──► Registry (ServiceId::of::<S>() → record, ready = false)
//!
//! Event flow:
//!   Service ── publish(Event) ──► Bus ──► Coordinator listener ──► SubscriberSet::emit(Event)
//!
//! Shutdown path (one deadline = start + timeout):
//!   shutdown(graceful, timeout)
//!     ├─► Registry.close()                         (later registrations fail fast)
//!     ├─► Bus.publish(ShutdownRequested)
//!     ├─► graceful: readiness phase until start + timeout/2
//!     │      ├─ spawn can_disconnect(host) per service (JoinSet, panic isolated)
//!     │      ├─ wait for every flag (answers + HostContext::mark_ready)
//!     │      ├─ Ok       → Bus.publish(AllReady)
//!     │      └─ deadline → Bus.publish(ReadinessTimeout) (busy services listed)
//!     ├─► disconnect phase until start + timeout
//!     │      ├─ spawn disconnect(host) per service (JoinSet, panic isolated)
//!     │      ├─ Ok       → Bus.publish(AllStoppedWithin)
//!     │      └─ deadline → Bus.publish(GraceExceeded), remaining tasks detached
//!     └─► Gateway::disconnect()                    (host-owned, after the window)
//! ```
//!
//! Timeouts are reported in [`ShutdownReport`], not raised as errors.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use botvisor::{CoordinatorBuilder, CoordinatorConfig, HostContext, Service, ServiceError};
//!
//! struct Idle;
//!
//! #[async_trait]
//! impl Service for Idle {
//!     fn name(&self) -> &'static str { "idle" }
//!     async fn can_disconnect(&self, _host: &HostContext) -> bool { true }
//!     async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> { Ok(()) }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coord = CoordinatorBuilder::new(CoordinatorConfig::default()).build();
//!     coord.register(Arc::new(Idle))?;
//!
//!     let report = coord.shutdown(true, Duration::from_secs(2)).await?;
//!     assert!(report.all_ready);
//!     assert!(report.abandoned.is_empty());
//!     Ok(())
//! }
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

use crate::collab::Gateway;
use crate::config::CoordinatorConfig;
use crate::core::host::HostContext;
use crate::core::registry::{Entry, Registry};
use crate::core::service::{Service, ServiceId};
use crate::core::signal;
use crate::error::{RuntimeError, ServiceError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{SubscriberSet, panic_message};

/// A service call that failed or panicked.
#[derive(Debug)]
pub struct ServiceFailure {
    /// Name of the failing service.
    pub service: &'static str,
    /// What went wrong.
    pub error: ServiceError,
}

/// Outcome of [`Coordinator::shutdown`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Every service reported ready before the readiness window closed.
    ///
    /// Always `false` for a non-graceful shutdown with at least one service.
    pub all_ready: bool,
    /// Services still busy when the readiness window closed.
    pub not_ready: Vec<&'static str>,
    /// Services whose `can_disconnect`/`disconnect` failed or panicked.
    pub failed: Vec<ServiceFailure>,
    /// Services whose `disconnect` was still running at the deadline.
    pub abandoned: Vec<&'static str>,
    /// Wall time spent inside the window (excludes host teardown).
    pub elapsed: Duration,
}

/// Coordinates registered services, event delivery and bounded shutdown.
pub struct Coordinator {
    cfg: CoordinatorConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: Arc<Registry>,
    gateway: Option<Arc<dyn Gateway>>,
}

impl Coordinator {
    pub(crate) fn new_internal(
        cfg: CoordinatorConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        registry: Arc<Registry>,
        gateway: Option<Arc<dyn Gateway>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            registry,
            gateway,
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    pub(crate) fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Registers a service; its readiness flag starts `false`.
    ///
    /// # Errors
    /// - [`RuntimeError::RegistrationClosed`] once shutdown has begun
    /// - [`RuntimeError::AlreadyRegistered`] for a second instance of the same type
    pub fn register<S: Service>(&self, service: Arc<S>) -> Result<ServiceId, RuntimeError> {
        self.registry.insert(service)
    }

    /// Sets a service's readiness flag. Callable from any task at any time.
    pub fn mark_ready(&self, id: ServiceId) {
        self.registry.mark_ready(id);
    }

    /// Returns a handle services can keep to signal readiness later.
    pub fn host(&self) -> HostContext {
        HostContext::new(Arc::clone(&self.registry), self.bus.clone())
    }

    /// The event bus shared with services.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runtime configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.cfg
    }

    /// Calls [`Service::start`] on every registered service concurrently.
    ///
    /// A failing service is reported and does not stop the others.
    pub async fn start(&self) -> Vec<ServiceFailure> {
        let host = self.host();
        let mut set = JoinSet::new();
        for entry in self.registry.snapshot() {
            let host = host.clone();
            set.spawn(async move {
                let res = AssertUnwindSafe(entry.service.start(&host))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|p| {
                        Err(ServiceError::Panicked {
                            info: panic_message(p.as_ref()),
                        })
                    });
                (entry.name, res)
            });
        }

        let mut failed = Vec::new();
        while let Some(joined) = set.join_next().await {
            let Ok((service, res)) = joined else { continue };
            if let Err(error) = res {
                self.publish_failure(service, &error);
                failed.push(ServiceFailure { service, error });
            }
        }
        failed
    }

    /// Waits for an OS termination signal, then shuts down with the configured grace.
    pub async fn run_until_signal(&self) -> Result<ShutdownReport, RuntimeError> {
        if let Err(e) = signal::wait_for_shutdown_signal().await {
            // Without signal handlers there is nothing to wait for; shut down right away.
            self.bus.publish(
                Event::new(EventKind::ShutdownRequested).with_reason(format!("signal: {e}")),
            );
        }
        self.shutdown(self.cfg.graceful, self.cfg.grace).await
    }

    /// Shuts every registered service down within `timeout`.
    ///
    /// With `graceful`, services are first polled with `can_disconnect` and given up to
    /// half of `timeout` to become ready; the disconnect phase gets what is left. Without
    /// it, the whole budget goes to the disconnect phase. Services still disconnecting at
    /// the deadline are abandoned. The gateway is torn down last.
    ///
    /// # Errors
    /// [`RuntimeError::HostTeardown`] when the gateway fails to disconnect.
    pub async fn shutdown(
        &self,
        graceful: bool,
        timeout: Duration,
    ) -> Result<ShutdownReport, RuntimeError> {
        let started = Instant::now();
        let deadline = started + timeout;

        self.registry.close();
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        let services = self.registry.snapshot();
        let host = self.host();
        let mut report = ShutdownReport::default();

        if graceful {
            self.await_readiness(&services, &host, started + timeout / 2, &mut report)
                .await;
        } else {
            report.all_ready = services.is_empty();
        }

        self.disconnect_all(&services, &host, deadline, &mut report)
            .await;
        report.elapsed = started.elapsed();
        self.registry.clear();

        if let Some(gateway) = &self.gateway {
            gateway
                .disconnect()
                .await
                .map_err(|error| RuntimeError::HostTeardown { error })?;
        }
        Ok(report)
    }

    /// Readiness phase: polls every service and waits for all flags until `until`.
    async fn await_readiness(
        &self,
        services: &[Entry],
        host: &HostContext,
        until: Instant,
        report: &mut ShutdownReport,
    ) {
        let mut polls = JoinSet::new();
        for entry in services {
            let service = Arc::clone(&entry.service);
            let host = host.clone();
            let (id, name) = (entry.id, entry.name);
            polls.spawn(async move {
                let answer = AssertUnwindSafe(service.can_disconnect(&host))
                    .catch_unwind()
                    .await
                    .map_err(|p| panic_message(p.as_ref()));
                (id, name, answer)
            });
        }

        let started = Instant::now();
        let registry = &self.registry;
        let mut failed = Vec::new();
        let settled = async {
            while let Some(joined) = polls.join_next().await {
                match joined {
                    Ok((id, _, Ok(answer))) => registry.record_answer(id, answer),
                    Ok((_, service, Err(info))) => failed.push(ServiceFailure {
                        service,
                        error: ServiceError::Panicked { info },
                    }),
                    Err(_) => {}
                }
            }
            registry.wait_all_ready().await;
        };
        let in_time = time::timeout_at(until, settled).await.is_ok();
        // Late answers are still useful to the services that captured `host`; let them finish.
        polls.detach_all();

        for failure in &failed {
            self.publish_failure(failure.service, &failure.error);
        }
        report.failed.extend(failed);

        if in_time {
            report.all_ready = true;
            self.bus
                .publish(Event::new(EventKind::AllReady).with_elapsed(started.elapsed()));
        } else {
            report.not_ready = registry.not_ready();
            self.bus.publish(
                Event::new(EventKind::ReadinessTimeout).with_reason(report.not_ready.join(",")),
            );
        }
    }

    /// Disconnect phase: disconnects every service concurrently until `deadline`.
    async fn disconnect_all(
        &self,
        services: &[Entry],
        host: &HostContext,
        deadline: Instant,
        report: &mut ShutdownReport,
    ) {
        let started = Instant::now();
        let mut set = JoinSet::new();
        for entry in services {
            let service = Arc::clone(&entry.service);
            let host = host.clone();
            let name = entry.name;
            set.spawn(async move {
                let res = AssertUnwindSafe(service.disconnect(&host))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|p| {
                        Err(ServiceError::Panicked {
                            info: panic_message(p.as_ref()),
                        })
                    });
                (name, res)
            });
        }

        let mut pending: Vec<&'static str> = services.iter().map(|e| e.name).collect();
        let mut failed = Vec::new();
        let bus = &self.bus;
        let drained = async {
            while let Some(joined) = set.join_next().await {
                let Ok((service, res)) = joined else { continue };
                pending.retain(|n| *n != service);
                match res {
                    Ok(()) => {
                        bus.publish(Event::new(EventKind::ServiceDisconnected).with_service(service))
                    }
                    Err(error) => failed.push(ServiceFailure { service, error }),
                }
            }
        };
        let in_time = time::timeout_at(deadline, drained).await.is_ok();

        for failure in &failed {
            self.publish_failure(failure.service, &failure.error);
        }
        report.failed.extend(failed);

        if in_time {
            self.bus.publish(
                Event::new(EventKind::AllStoppedWithin).with_elapsed(started.elapsed()),
            );
        } else {
            set.detach_all();
            self.bus
                .publish(Event::new(EventKind::GraceExceeded).with_reason(pending.join(",")));
            report.abandoned = pending;
        }
    }

    fn publish_failure(&self, service: &'static str, error: &ServiceError) {
        self.bus.publish(
            Event::new(EventKind::ServiceFailed)
                .with_service(service)
                .with_reason(error.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::CollabResult;
    use crate::core::CoordinatorBuilder;
    use crate::error::CollabError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Quick(Arc<AtomicUsize>);

    #[async_trait]
    impl Service for Quick {
        fn name(&self) -> &'static str {
            "quick"
        }
        async fn can_disconnect(&self, _host: &HostContext) -> bool {
            true
        }
        async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Busy until `release` is called, then marks itself ready.
    struct Busy {
        host: Mutex<Option<HostContext>>,
        disconnected: AtomicBool,
    }

    impl Busy {
        fn new() -> Self {
            Self {
                host: Mutex::new(None),
                disconnected: AtomicBool::new(false),
            }
        }

        fn release(&self) {
            if let Some(host) = self.host.lock().unwrap().take() {
                host.mark_ready_for::<Busy>();
            }
        }
    }

    #[async_trait]
    impl Service for Busy {
        fn name(&self) -> &'static str {
            "busy"
        }
        async fn can_disconnect(&self, host: &HostContext) -> bool {
            *self.host.lock().unwrap() = Some(host.clone());
            false
        }
        async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
            self.disconnected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Hangs;

    #[async_trait]
    impl Service for Hangs {
        fn name(&self) -> &'static str {
            "hangs"
        }
        async fn can_disconnect(&self, _host: &HostContext) -> bool {
            futures::future::pending().await
        }
        async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
            futures::future::pending().await
        }
    }

    struct Explodes;

    #[async_trait]
    impl Service for Explodes {
        fn name(&self) -> &'static str {
            "explodes"
        }
        async fn can_disconnect(&self, _host: &HostContext) -> bool {
            true
        }
        async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
            panic!("boom");
        }
    }

    struct Fails;

    #[async_trait]
    impl Service for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }
        async fn start(&self, _host: &HostContext) -> Result<(), ServiceError> {
            Err(ServiceError::Fatal {
                error: "no token".into(),
            })
        }
        async fn can_disconnect(&self, _host: &HostContext) -> bool {
            true
        }
        async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
            Err(ServiceError::collaborator("write", CollabError::new("disk full")))
        }
    }

    struct FlakyGateway;

    #[async_trait]
    impl Gateway for FlakyGateway {
        async fn disconnect(&self) -> CollabResult<()> {
            Err(CollabError::new("socket closed"))
        }
    }

    fn coordinator() -> Arc<Coordinator> {
        CoordinatorBuilder::new(CoordinatorConfig::default()).build()
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_waits_for_late_readiness() {
        let coord = coordinator();
        let busy = Arc::new(Busy::new());
        let count = Arc::new(AtomicUsize::new(0));
        coord.register(Arc::clone(&busy)).unwrap();
        coord.register(Arc::new(Quick(Arc::clone(&count)))).unwrap();

        let releaser = {
            let busy = Arc::clone(&busy);
            tokio::spawn(async move {
                time::sleep(Duration::from_secs(3)).await;
                busy.release();
            })
        };

        let started = Instant::now();
        let report = coord.shutdown(true, Duration::from_secs(10)).await.unwrap();
        releaser.await.unwrap();

        assert!(report.all_ready);
        assert!(report.not_ready.is_empty());
        assert!(report.abandoned.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(busy.disconnected.load(Ordering::SeqCst));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_bounded_when_services_hang() {
        let coord = coordinator();
        let count = Arc::new(AtomicUsize::new(0));
        coord.register(Arc::new(Hangs)).unwrap();
        coord.register(Arc::new(Busy::new())).unwrap();
        coord.register(Arc::new(Quick(Arc::clone(&count)))).unwrap();

        let started = Instant::now();
        let report = coord.shutdown(true, Duration::from_secs(4)).await.unwrap();

        assert!(started.elapsed() <= Duration::from_secs(4));
        assert!(!report.all_ready);
        assert_eq!(report.not_ready, vec!["hangs", "busy"]);
        assert_eq!(report.abandoned, vec!["hangs"]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_graceful_skips_readiness() {
        let coord = coordinator();
        let busy = Arc::new(Busy::new());
        coord.register(Arc::clone(&busy)).unwrap();

        let report = coord.shutdown(false, Duration::from_secs(4)).await.unwrap();
        assert!(!report.all_ready);
        assert!(busy.host.lock().unwrap().is_none(), "can_disconnect must not be called");
        assert!(busy.disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_and_panicking_disconnects_are_isolated() {
        let coord = coordinator();
        let count = Arc::new(AtomicUsize::new(0));
        coord.register(Arc::new(Explodes)).unwrap();
        coord.register(Arc::new(Fails)).unwrap();
        coord.register(Arc::new(Quick(Arc::clone(&count)))).unwrap();

        let report = coord.shutdown(true, Duration::from_secs(2)).await.unwrap();
        let mut failed: Vec<_> = report.failed.iter().map(|f| f.service).collect();
        failed.sort_unstable();
        assert_eq!(failed, vec!["explodes", "fails"]);
        assert!(report.abandoned.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn registration_after_shutdown_fails_fast() {
        let coord = coordinator();
        coord.shutdown(true, Duration::from_secs(1)).await.unwrap();
        let err = coord
            .register(Arc::new(Quick(Arc::new(AtomicUsize::new(0)))))
            .unwrap_err();
        assert_eq!(err.as_label(), "runtime_registration_closed");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_abandons_everything_at_once() {
        let coord = coordinator();
        coord.register(Arc::new(Hangs)).unwrap();
        let report = coord.shutdown(true, Duration::ZERO).await.unwrap();
        assert_eq!(report.abandoned, vec!["hangs"]);
        assert_eq!(report.elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn start_reports_failures_without_stopping_others() {
        let coord = coordinator();
        coord.register(Arc::new(Fails)).unwrap();
        coord.register(Arc::new(Quick(Arc::new(AtomicUsize::new(0))))).unwrap();
        let failed = coord.start().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].service, "fails");
        assert_eq!(failed[0].error.as_label(), "service_fatal");
    }

    #[tokio::test(start_paused = true)]
    async fn gateway_failure_surfaces_after_services_stop() {
        let coord = CoordinatorBuilder::new(CoordinatorConfig::default())
            .with_gateway(Arc::new(FlakyGateway))
            .build();
        let count = Arc::new(AtomicUsize::new(0));
        coord.register(Arc::new(Quick(Arc::clone(&count)))).unwrap();

        let err = coord.shutdown(true, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_host_teardown");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
