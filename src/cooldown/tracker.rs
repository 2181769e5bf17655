//! # Cooldown-gated reputation grants.
//!
//! ```text
//! grant(user, target)
//!   ├─ lock user's ledger ─► earliest slot ≤ now? ── no ──► GrantResult { success: false, earliest }
//!   │                          └─ yes: slot := now + cooldown, re-sort   (reservation)
//!   ├─ unlock
//!   ├─ add_reputation(target) + write(User)
//!   │     └─ write failed ─► remove_reputation(target), restore slot ─► Err
//!   └─ GrantResult { success: true, new earliest slot }
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::collab::{ConfigStore, WriteScope};
use crate::config::CooldownConfig;
use crate::cooldown::ledger::Ledger;
use crate::core::{HostContext, Service};
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};

/// Outcome of [`CooldownTracker::grant`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrantResult {
    /// Whether the point was given.
    pub success: bool,
    /// When the granter can give a point again.
    pub next_available: SystemTime,
}

/// Per-user ledgers of reusable reputation slots.
pub struct CooldownTracker {
    ledgers: DashMap<u64, Ledger>,
    cfg: CooldownConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn ConfigStore>,
    bus: Bus,
}

impl CooldownTracker {
    /// Creates a tracker with empty ledgers.
    pub fn new(
        cfg: CooldownConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn ConfigStore>,
        bus: Bus,
    ) -> Arc<Self> {
        Arc::new(Self {
            ledgers: DashMap::new(),
            cfg,
            clock,
            store,
            bus,
        })
    }

    /// Whether `user` has a free slot now.
    pub fn can_grant(&self, user: u64) -> bool {
        self.available(user) >= 1
    }

    /// Number of free slots of `user` now.
    pub fn available(&self, user: u64) -> usize {
        let now = self.clock.now();
        self.ledger(user, now).available(now)
    }

    /// Earliest time `user` has a free slot.
    pub fn next_available(&self, user: u64) -> SystemTime {
        self.ledger(user, self.clock.now()).earliest()
    }

    /// Gives `target` one reputation point on behalf of `user`.
    ///
    /// # Errors
    /// Persistence failures are returned after the granter's slot is restored.
    pub async fn grant(&self, user: u64, target: u64) -> Result<GrantResult, ServiceError> {
        let now = self.clock.now();
        let taken = {
            let mut ledger = self
                .ledgers
                .entry(user)
                .or_insert_with(|| Ledger::new(self.cfg.slots_clamped(), now));
            match ledger.take(now, self.cfg.cooldown) {
                Some(taken) => taken,
                None => {
                    return Ok(GrantResult {
                        success: false,
                        next_available: ledger.earliest(),
                    });
                }
            }
        };

        if let Err(e) = self.persist(target).await {
            if let Some(mut ledger) = self.ledgers.get_mut(&user) {
                ledger.restore(taken);
            }
            return Err(e);
        }

        debug!(user, target, "reputation granted");
        self.bus.publish(
            Event::new(EventKind::ReputationGranted)
                .with_user(user)
                .with_key(target),
        );
        Ok(GrantResult {
            success: true,
            next_available: self.next_available(user),
        })
    }

    async fn persist(&self, target: u64) -> Result<(), ServiceError> {
        self.store
            .add_reputation(target)
            .await
            .map_err(|e| ServiceError::collaborator("add_reputation", e))?;
        if let Err(e) = self.store.write(WriteScope::User).await {
            if let Err(undo) = self.store.remove_reputation(target).await {
                warn!(target, error = %undo, "reputation point not taken back");
            }
            return Err(ServiceError::collaborator("write", e));
        }
        Ok(())
    }

    fn ledger(&self, user: u64, now: SystemTime) -> dashmap::mapref::one::Ref<'_, u64, Ledger> {
        self.ledgers
            .entry(user)
            .or_insert_with(|| Ledger::new(self.cfg.slots_clamped(), now))
            .downgrade()
    }
}

#[async_trait]
impl Service for CooldownTracker {
    fn name(&self) -> &'static str {
        "cooldown-tracker"
    }

    async fn can_disconnect(&self, _host: &HostContext) -> bool {
        true
    }

    async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::MemoryStore;
    use std::time::Duration;

    const HOUR: Duration = Duration::from_secs(3_600);

    fn tracker(slots: usize) -> (Arc<CooldownTracker>, Arc<ManualClock>, Arc<MemoryStore>, SystemTime) {
        let t0 = SystemTime::UNIX_EPOCH + HOUR * 1_000;
        let clock = Arc::new(ManualClock::new(t0));
        let store = MemoryStore::new();
        let cfg = CooldownConfig {
            cooldown: HOUR * 24,
            slots,
        };
        let tracker = CooldownTracker::new(cfg, clock.clone(), store.clone(), Bus::default());
        (tracker, clock, store, t0)
    }

    #[tokio::test]
    async fn single_slot_daily_cooldown() {
        let (tracker, clock, store, t0) = tracker(1);
        assert!(tracker.can_grant(1));
        assert_eq!(tracker.next_available(1), t0);

        let first = tracker.grant(1, 2).await.unwrap();
        assert_eq!(first, GrantResult { success: true, next_available: t0 + HOUR * 24 });
        assert!(!tracker.can_grant(1));

        clock.advance(HOUR);
        let second = tracker.grant(1, 2).await.unwrap();
        assert_eq!(second, GrantResult { success: false, next_available: t0 + HOUR * 24 });

        clock.advance(HOUR * 23 + Duration::from_secs(1));
        assert!(tracker.grant(1, 2).await.unwrap().success);
        assert_eq!(store.reputation(2), 2);
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn extra_slots_keep_granting() {
        let (tracker, clock, _, t0) = tracker(2);
        let first = tracker.grant(1, 2).await.unwrap();
        assert!(first.success);
        assert_eq!(first.next_available, t0);
        assert!(tracker.can_grant(1));
        assert_eq!(tracker.available(1), 1);

        clock.advance(HOUR);
        let second = tracker.grant(1, 3).await.unwrap();
        assert_eq!(second.next_available, t0 + HOUR * 24);
        assert!(!tracker.can_grant(1));
    }

    #[tokio::test]
    async fn failed_write_restores_the_slot() {
        let (tracker, _, store, t0) = tracker(1);
        store.fail_writes(true);
        let err = tracker.grant(1, 2).await.unwrap_err();
        assert_eq!(err.as_label(), "service_collaborator");
        assert!(tracker.can_grant(1));
        assert_eq!(tracker.next_available(1), t0);
        assert_eq!(store.reputation(2), 0);

        store.fail_writes(false);
        assert!(tracker.grant(1, 2).await.unwrap().success);
        assert_eq!(store.reputation(2), 1);
        assert!(!tracker.can_grant(1));
    }

    #[tokio::test]
    async fn concurrent_grants_use_one_slot() {
        let (tracker, _, store, _) = tracker(1);
        let (a, b) = tokio::join!(tracker.grant(1, 2), tracker.grant(1, 3));
        let successes = [a.unwrap(), b.unwrap()].iter().filter(|r| r.success).count();
        assert_eq!(successes, 1);
        assert_eq!(store.reputation(2) + store.reputation(3), 1);
    }
}
