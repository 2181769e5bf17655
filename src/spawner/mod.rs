//! # Creature spawns: one loose creature per channel, captured once or wandering off.
//!
//! ```text
//! spawn(channel, message, duration) ──► Loose ──capture(user)──► credited, message deleted
//!                                         │
//!                                         └──(despawn timer)──► "wandered away", message deleted
//! ```
//! A capture first claims the creature under the channel's entry lock and stops its timer.
//! The message is only deleted once the credit is written; a failed write puts the
//! creature back with the time it had left.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::collab::{ChatClient, ConfigStore, WriteScope};
use crate::core::{HostContext, Service};
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};
use crate::timer;

/// Message sent when a creature leaves on its own.
pub const DEFAULT_DESPAWN_MESSAGE: &str = "The creature wandered away again";

#[derive(Default)]
struct SpawnState {
    creature: Option<u64>,
    /// A capture is writing its credit.
    claimed: bool,
    ends_at: Option<Instant>,
    generation: u64,
    timer: Option<CancellationToken>,
}

impl SpawnState {
    /// Removes the creature if it is still the one from `generation` (any, when `None`).
    fn take(&mut self, generation: Option<u64>) -> Option<u64> {
        if generation.is_some_and(|g| g != self.generation) {
            return None;
        }
        let creature = self.creature.take()?;
        self.stop_timer();
        self.claimed = false;
        self.ends_at = None;
        Some(creature)
    }

    /// Cancels the despawn timer and invalidates anything holding the old generation.
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.generation += 1;
    }

    fn arm(&mut self, token: CancellationToken) -> u64 {
        self.timer = Some(token);
        self.generation += 1;
        self.generation
    }
}

/// Per-channel creature spawns.
pub struct SpawnTracker {
    chat: Arc<dyn ChatClient>,
    store: Arc<dyn ConfigStore>,
    despawn_message: String,
    bus: Bus,
    states: DashMap<u64, SpawnState>,
    root: CancellationToken,
    disconnecting: AtomicBool,
    host: Mutex<Option<HostContext>>,
}

impl SpawnTracker {
    /// Creates a tracker that announces natural despawns with `despawn_message`.
    pub fn new(
        chat: Arc<dyn ChatClient>,
        store: Arc<dyn ConfigStore>,
        despawn_message: impl Into<String>,
        bus: Bus,
    ) -> Arc<Self> {
        Arc::new(Self {
            chat,
            store,
            despawn_message: despawn_message.into(),
            bus,
            states: DashMap::new(),
            root: CancellationToken::new(),
            disconnecting: AtomicBool::new(false),
            host: Mutex::new(None),
        })
    }

    /// Whether a creature is loose in the channel.
    pub fn is_loose(&self, channel: u64) -> bool {
        self.states.get(&channel).is_some_and(|st| st.creature.is_some())
    }

    /// Whether a creature may spawn in the channel.
    pub fn can_spawn(&self, channel: u64) -> bool {
        !self.disconnecting.load(Ordering::Acquire) && !self.is_loose(channel)
    }

    /// Registers `message` as the channel's creature; it wanders off after `duration`.
    pub fn spawn(self: &Arc<Self>, channel: u64, message: u64, duration: Duration) -> bool {
        let token = self.root.child_token();
        let generation = {
            let mut st = self.states.entry(channel).or_default();
            if st.creature.is_some() || self.disconnecting.load(Ordering::Acquire) {
                return false;
            }
            st.creature = Some(message);
            st.ends_at = Some(Instant::now() + duration);
            st.arm(token.clone())
        };

        debug!(channel, message, ?duration, "creature spawned");
        self.bus
            .publish(Event::new(EventKind::CreatureSpawned).with_key(channel));
        self.schedule_despawn(channel, generation, token, duration);
        true
    }

    /// Captures the channel's creature for `user`.
    ///
    /// Returns `false` when nothing was loose (or someone else was faster).
    ///
    /// # Errors
    /// A failing credit or write is returned and the creature stays loose until its
    /// original despawn time.
    pub async fn capture(self: &Arc<Self>, channel: u64, user: u64) -> Result<bool, ServiceError> {
        let claim = {
            let Some(mut st) = self.states.get_mut(&channel) else {
                return Ok(false);
            };
            if st.creature.is_none() || st.claimed {
                return Ok(false);
            }
            st.claimed = true;
            st.stop_timer();
            st.generation
        };

        if let Err(e) = self.persist(user).await {
            self.release(channel, claim);
            return Err(e);
        }

        // A forced despawn may have removed the message already; the credit stands.
        if let Some(message) = self.take(channel, Some(claim)) {
            self.delete(channel, message).await;
        }
        debug!(channel, user, "creature captured");
        self.bus.publish(
            Event::new(EventKind::CreatureDespawned)
                .with_key(channel)
                .with_user(user),
        );
        self.signal_if_idle();
        Ok(true)
    }

    /// Removes the channel's creature without crediting anyone.
    pub async fn despawn(&self, channel: u64) -> bool {
        let Some(message) = self.take(channel, None) else {
            return false;
        };
        self.delete(channel, message).await;
        self.bus
            .publish(Event::new(EventKind::CreatureDespawned).with_key(channel));
        self.signal_if_idle();
        true
    }

    async fn persist(&self, user: u64) -> Result<(), ServiceError> {
        self.store
            .add_creature(user)
            .await
            .map_err(|e| ServiceError::collaborator("add_creature", e))?;
        if let Err(e) = self.store.write(WriteScope::User).await {
            if let Err(undo) = self.store.remove_creature(user).await {
                warn!(user, error = %undo, "creature credit not taken back");
            }
            return Err(ServiceError::collaborator("write", e));
        }
        Ok(())
    }

    /// Puts a claimed creature back with the despawn time it had left.
    fn release(self: &Arc<Self>, channel: u64, claim: u64) {
        let token = self.root.child_token();
        let (generation, left) = {
            let Some(mut st) = self.states.get_mut(&channel) else {
                return;
            };
            if st.generation != claim || !st.claimed {
                return;
            }
            st.claimed = false;
            let left = st
                .ends_at
                .map_or(Duration::ZERO, |end| end.saturating_duration_since(Instant::now()));
            (st.arm(token.clone()), left)
        };
        self.schedule_despawn(channel, generation, token, left);
    }

    fn schedule_despawn(
        self: &Arc<Self>,
        channel: u64,
        generation: u64,
        token: CancellationToken,
        delay: Duration,
    ) {
        let this = Arc::clone(self);
        timer::schedule(delay, token, async move {
            if let Err(e) = this.wander_off(channel, generation).await {
                warn!(channel, error = %e, "creature despawn failed");
            }
        });
    }

    async fn wander_off(&self, channel: u64, generation: u64) -> Result<(), ServiceError> {
        let Some(message) = self.take(channel, Some(generation)) else {
            return Ok(());
        };
        self.bus
            .publish(Event::new(EventKind::CreatureDespawned).with_key(channel));
        let sent = self
            .chat
            .send_message(channel, &self.despawn_message)
            .await
            .map_err(|e| ServiceError::collaborator("send_message", e));
        self.delete(channel, message).await;
        self.signal_if_idle();
        sent
    }

    fn take(&self, channel: u64, generation: Option<u64>) -> Option<u64> {
        self.states.get_mut(&channel)?.take(generation)
    }

    async fn delete(&self, channel: u64, message: u64) {
        if let Err(e) = self.chat.delete_message(channel, message).await {
            warn!(channel, message, error = %e, "creature message not deleted");
        }
    }

    fn signal_if_idle(&self) {
        if !self.disconnecting.load(Ordering::Acquire)
            || self.states.iter().any(|st| st.creature.is_some())
        {
            return;
        }
        let host = self.host.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(host) = host {
            host.mark_ready_for::<Self>();
        }
    }
}

#[async_trait]
impl Service for SpawnTracker {
    fn name(&self) -> &'static str {
        "spawn-tracker"
    }

    async fn can_disconnect(&self, host: &HostContext) -> bool {
        *self.host.lock().unwrap_or_else(|e| e.into_inner()) = Some(host.clone());
        self.disconnecting.store(true, Ordering::Release);
        !self.states.iter().any(|st| st.creature.is_some())
    }

    async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
        self.disconnecting.store(true, Ordering::Release);
        self.root.cancel();
        self.states.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::core::CoordinatorBuilder;
    use crate::testing::{FakeChat, MemoryStore};

    fn tracker() -> (Arc<SpawnTracker>, Arc<FakeChat>, Arc<MemoryStore>) {
        let chat = FakeChat::new();
        let store = MemoryStore::new();
        let tracker = SpawnTracker::new(
            chat.clone(),
            store.clone(),
            DEFAULT_DESPAWN_MESSAGE,
            Bus::default(),
        );
        (tracker, chat, store)
    }

    #[tokio::test(start_paused = true)]
    async fn one_creature_per_channel() {
        let (tracker, _, _) = tracker();
        assert!(tracker.spawn(5, 100, Duration::from_secs(60)));
        assert!(!tracker.can_spawn(5));
        assert!(!tracker.spawn(5, 101, Duration::from_secs(60)));
        assert!(tracker.spawn(6, 102, Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn capture_credits_once_and_cancels_despawn() {
        let (tracker, chat, store) = tracker();
        tracker.spawn(5, 100, Duration::from_secs(60));

        let (a, b) = tokio::join!(tracker.capture(5, 1), tracker.capture(5, 2));
        assert_ne!(a.unwrap(), b.unwrap());
        assert_eq!(store.creatures(1) + store.creatures(2), 1);
        assert_eq!(chat.deleted(), vec![(5, 100)]);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(chat.sent_in(5).is_empty());
        assert!(tracker.can_spawn(5));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_keeps_the_creature_loose() {
        let (tracker, chat, store) = tracker();
        tracker.spawn(5, 100, Duration::from_secs(60));

        store.fail_writes(true);
        let err = tracker.capture(5, 1).await.unwrap_err();
        assert_eq!(err.as_label(), "service_collaborator");
        assert!(tracker.is_loose(5));
        assert_eq!(store.creatures(1), 0);
        assert!(chat.deleted().is_empty());

        store.fail_writes(false);
        assert!(tracker.capture(5, 1).await.unwrap());
        assert_eq!(store.creatures(1), 1);
        assert_eq!(chat.deleted(), vec![(5, 100)]);
        assert!(!tracker.is_loose(5));
    }

    #[tokio::test(start_paused = true)]
    async fn released_creature_keeps_its_despawn_time() {
        let (tracker, chat, store) = tracker();
        tracker.spawn(5, 100, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(10)).await;
        store.fail_writes(true);
        assert!(tracker.capture(5, 1).await.is_err());

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert!(tracker.is_loose(5));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!tracker.is_loose(5));
        assert_eq!(chat.sent_in(5), vec![DEFAULT_DESPAWN_MESSAGE]);
        assert_eq!(store.creatures(1), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn creature_wanders_off_after_duration() {
        let (tracker, chat, _) = tracker();
        tracker.spawn(5, 100, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!tracker.is_loose(5));
        assert_eq!(chat.sent_in(5), vec![DEFAULT_DESPAWN_MESSAGE]);
        assert_eq!(chat.deleted(), vec![(5, 100)]);
        assert!(!tracker.capture(5, 1).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_remove_a_new_creature() {
        let (tracker, chat, _) = tracker();
        tracker.spawn(5, 100, Duration::from_secs(30));
        assert!(tracker.despawn(5).await);
        tracker.spawn(5, 200, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(tracker.is_loose(5));
        assert!(chat.sent_in(5).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_loose_creature() {
        let coord = CoordinatorBuilder::new(CoordinatorConfig::default()).build();
        let chat = FakeChat::new();
        let tracker = SpawnTracker::new(chat.clone(), MemoryStore::new(), "bye", coord.bus().clone());
        coord.register(Arc::clone(&tracker)).unwrap();
        tracker.spawn(5, 100, Duration::from_secs(4));

        let report = coord.shutdown(true, Duration::from_secs(20)).await.unwrap();
        assert!(report.all_ready);
        assert_eq!(chat.sent_in(5), vec!["bye"]);
        assert!(!tracker.can_spawn(6));
    }
}
