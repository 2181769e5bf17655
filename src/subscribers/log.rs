//! # LogWriter: forwards runtime events to `tracing`.
//!
//! A subscriber that renders every [`Event`] as a structured `tracing` record.
//! Failures and abandoned work log at `warn`, transitions at `info`, the rest at `debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO botvisor: service-registered service="snacks"
//! INFO botvisor: event-arrived key=381889909113225237 pot=40
//! WARN botvisor: grace-exceeded abandoned="snacks"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let service = e.service.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::SubscriberPanicked => {
                warn!(target: "botvisor", subscriber = service, info = reason, "subscriber-panicked");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "botvisor", subscriber = service, reason, "subscriber-overflow");
            }
            EventKind::ServiceRegistered => {
                info!(target: "botvisor", service, "service-registered");
            }
            EventKind::ServiceReady => {
                debug!(target: "botvisor", service, "service-ready");
            }
            EventKind::ServiceFailed => {
                warn!(target: "botvisor", service, err = reason, "service-failed");
            }
            EventKind::ServiceDisconnected => {
                info!(target: "botvisor", service, "service-disconnected");
            }
            EventKind::ShutdownRequested => {
                info!(target: "botvisor", "shutdown-requested");
            }
            EventKind::AllReady => {
                info!(target: "botvisor", elapsed_ms = ?e.elapsed_ms, "all-ready");
            }
            EventKind::ReadinessTimeout => {
                warn!(target: "botvisor", busy = reason, "readiness-timeout");
            }
            EventKind::AllStoppedWithin => {
                info!(target: "botvisor", elapsed_ms = ?e.elapsed_ms, "all-stopped-within-grace");
            }
            EventKind::GraceExceeded => {
                warn!(target: "botvisor", abandoned = reason, "grace-exceeded");
            }
            EventKind::EventQueued => {
                debug!(target: "botvisor", key = ?e.key, delay_ms = ?e.elapsed_ms, "event-queued");
            }
            EventKind::EventArrived => {
                info!(target: "botvisor", key = ?e.key, pot = ?e.amount, "event-arrived");
            }
            EventKind::EventDeparted => {
                info!(target: "botvisor", key = ?e.key, participants = ?e.amount, "event-departed");
            }
            EventKind::ClaimGranted => {
                debug!(
                    target: "botvisor",
                    key = ?e.key, user = ?e.user, amount = ?e.amount, kind = reason,
                    "claim-granted"
                );
            }
            EventKind::ClaimRejected => {
                debug!(target: "botvisor", key = ?e.key, user = ?e.user, "claim-rejected");
            }
            EventKind::ReputationGranted => {
                debug!(target: "botvisor", from = ?e.user, to = ?e.key, "reputation-granted");
            }
            EventKind::CreatureSpawned => {
                debug!(target: "botvisor", key = ?e.key, "creature-spawned");
            }
            EventKind::CreatureDespawned => {
                debug!(target: "botvisor", key = ?e.key, captor = ?e.user, "creature-despawned");
            }
            EventKind::InviteCredited => {
                debug!(target: "botvisor", guild = ?e.key, inviter = ?e.user, "invite-credited");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
