//! # Keyed event manager: one reward event state machine per channel.
//!
//! ```text
//!            on_message × messages_required
//!   Idle ───────────────────────────────────► Queued ──(delay timer)──► Active
//!    ▲                                          │                         │
//!    │            disconnecting / lookup failed │                         │ duration timer
//!    └──────────────────────────────────────────┴─────────────────────────┘ stop_event
//!                                                                           disconnect
//! ```
//!
//! ## Rules
//! - Every transition happens under the channel's entry lock; no lock is held across
//!   an await, so state is re-validated after every suspension
//! - Timers capture `(channel, generation)` only; a timer whose generation moved on is a no-op
//! - A claim reserves the user and the pot bonus under the lock, persists without it,
//!   then commits (or rolls back on a failed write)
//! - While disconnecting, no event is queued or activated, and the manager marks
//!   itself ready once no channel is active

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use rand::seq::IndexedRandom;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collab::{ChatClient, ConfigStore, InboundMessage, WriteScope};
use crate::config::{ChannelConfig, EventManagerConfig};
use crate::core::{HostContext, Service};
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};
use crate::rewards::allocator::{self, Award};
use crate::rewards::kind::RewardKind;
use crate::rewards::phrases::PhraseBook;
use crate::rewards::state::EventState;
use crate::timer;

/// How a message was classified against an active event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimKind {
    /// Not a claim (or no event active).
    None,
    /// Polite request; credited with an allocator amount.
    Request,
    /// Rude request; credited with one unit.
    Rude,
    /// Asked again after being credited; nothing granted.
    Greedy,
}

/// Result of [`EventManager::handle_message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimOutcome {
    /// Classification.
    pub kind: ClaimKind,
    /// Amount credited (0 unless `Request`/`Rude`).
    pub amount: u64,
}

impl ClaimOutcome {
    fn none() -> Self {
        Self {
            kind: ClaimKind::None,
            amount: 0,
        }
    }
}

struct Reservation<K> {
    kind: K,
    award: Award,
    rude: bool,
    last_second: bool,
    generation: u64,
}

enum Decision<K> {
    Greedy(K),
    Grant(Reservation<K>),
}

/// Per-channel randomized reward events.
pub struct EventManager<K> {
    chat: Arc<dyn ChatClient>,
    store: Arc<dyn ConfigStore>,
    phrases: PhraseBook<K>,
    cfg: EventManagerConfig,
    bus: Bus,
    states: DashMap<u64, EventState<K>>,
    root: CancellationToken,
    disconnecting: AtomicBool,
    host: Mutex<Option<HostContext>>,
}

impl<K: RewardKind> EventManager<K> {
    /// Creates a manager with its own phrase book and an empty state table.
    pub fn new(
        chat: Arc<dyn ChatClient>,
        store: Arc<dyn ConfigStore>,
        phrases: PhraseBook<K>,
        cfg: EventManagerConfig,
        bus: Bus,
    ) -> Arc<Self> {
        Arc::new(Self {
            chat,
            store,
            phrases,
            cfg,
            bus,
            states: DashMap::new(),
            root: CancellationToken::new(),
            disconnecting: AtomicBool::new(false),
            host: Mutex::new(None),
        })
    }

    /// Counts a message towards the channel's threshold and queues an event once it is met.
    ///
    /// Returns `true` when this message armed the delay timer.
    pub async fn on_message(self: &Arc<Self>, msg: &InboundMessage) -> bool {
        if msg.author_is_bot {
            return false;
        }
        let Some(cfg) = self.store.channel_config(msg.channel).await else {
            return false;
        };
        let key = msg.channel;

        let armed = {
            let mut st = self.states.entry(key).or_default();
            st.messages_since_reset += 1;
            if st.messages_since_reset < cfg.messages_required
                || !st.is_idle()
                || self.is_disconnecting()
            {
                None
            } else {
                st.has_begun = true;
                let token = self.root.child_token();
                Some((st.arm(token.clone()), token))
            }
        };
        let Some((generation, token)) = armed else {
            return false;
        };

        let delay = allocator::delay(&mut rand::rng(), &cfg);
        debug!(channel = key, ?delay, "reward event queued");
        self.bus
            .publish(Event::new(EventKind::EventQueued).with_key(key).with_elapsed(delay));

        let this = Arc::clone(self);
        timer::schedule(delay, token, async move {
            if let Err(e) = this.activate(key, generation, cfg, None).await {
                warn!(channel = key, error = %e, "reward event failed to arrive");
            }
        });
        true
    }

    /// Starts an event of `kind` right away, skipping the message threshold and delay.
    ///
    /// Returns `false` when the channel is not configured, already active, or the
    /// manager is disconnecting.
    pub async fn start_event(self: &Arc<Self>, channel: u64, kind: K) -> Result<bool, ServiceError> {
        let Some(cfg) = self.store.channel_config(channel).await else {
            return Ok(false);
        };
        let generation = {
            let mut st = self.states.entry(channel).or_default();
            if st.is_active || self.is_disconnecting() {
                return Ok(false);
            }
            st.has_begun = true;
            st.arm(self.root.child_token())
        };
        Arc::clone(self).activate(channel, generation, cfg, Some(kind)).await
    }

    /// Ends the channel's active event now. Returns `false` if none was active.
    pub async fn stop_event(&self, channel: u64) -> Result<bool, ServiceError> {
        let generation = match self.states.get(&channel) {
            Some(st) if st.is_active => st.generation,
            _ => return Ok(false),
        };
        self.resolve(channel, generation).await
    }

    /// Classifies a message against the channel's active event and grants rewards.
    ///
    /// # Errors
    /// A failing balance update or write is returned; the user is then not recorded
    /// as a participant and the pot bonus goes back to the pot.
    pub async fn handle_message(&self, msg: &InboundMessage) -> Result<ClaimOutcome, ServiceError> {
        let (key, user) = (msg.channel, msg.author);
        if msg.author_is_bot || !self.is_active(key) {
            return Ok(ClaimOutcome::none());
        }
        let Some(cfg) = self.store.channel_config(key).await else {
            return Ok(ClaimOutcome::none());
        };

        let decision = {
            let Some(mut st) = self.states.get_mut(&key) else {
                return Ok(ClaimOutcome::none());
            };
            let Some(kind) = st.reward_kind.filter(|_| st.is_active) else {
                return Ok(ClaimOutcome::none());
            };
            let Some(phrases) = self.phrases.get(kind) else {
                return Ok(ClaimOutcome::none());
            };
            let text = msg.content.as_str();
            let last_second = st
                .ends_at
                .is_some_and(|end| end.saturating_duration_since(Instant::now()) <= self.cfg.last_chance);

            if st.participants.contains(&user) || st.pending.contains(&user) {
                if !phrases.is_greedy(text) {
                    return Ok(ClaimOutcome::none());
                }
                Decision::Greedy(kind)
            } else if phrases.is_rude(text) {
                st.pending.insert(user);
                Decision::Grant(Reservation {
                    kind,
                    award: Award { base: 1, bonus: 0 },
                    rude: true,
                    last_second,
                    generation: st.generation,
                })
            } else if phrases.is_agree(text) {
                let claimants = st.claimants();
                let award = allocator::amount(&mut rand::rng(), &cfg, claimants, &mut st.pot);
                st.pending.insert(user);
                Decision::Grant(Reservation {
                    kind,
                    award,
                    rude: false,
                    last_second,
                    generation: st.generation,
                })
            } else {
                return Ok(ClaimOutcome::none());
            }
        };

        match decision {
            Decision::Greedy(kind) => {
                self.bus.publish(
                    Event::new(EventKind::ClaimRejected)
                        .with_key(key)
                        .with_user(user),
                );
                let reply = self.phrases.greed_reply(kind, &mut rand::rng(), &msg.author_name);
                self.announce(key, reply).await;
                Ok(ClaimOutcome {
                    kind: ClaimKind::Greedy,
                    amount: 0,
                })
            }
            Decision::Grant(grant) => self.grant(msg, grant).await,
        }
    }

    async fn grant(&self, msg: &InboundMessage, grant: Reservation<K>) -> Result<ClaimOutcome, ServiceError> {
        let (key, user) = (msg.channel, msg.author);
        let total = grant.award.total();
        let persisted = self.persist(user, grant.kind, total).await;

        if let Some(mut st) = self.states.get_mut(&key) {
            if st.generation == grant.generation {
                st.pending.remove(&user);
                match persisted {
                    Ok(()) => {
                        st.participants.insert(user);
                    }
                    Err(_) => st.pot += grant.award.bonus,
                }
            }
        }
        persisted?;

        let kind = if grant.rude {
            ClaimKind::Rude
        } else {
            ClaimKind::Request
        };
        debug!(channel = key, user, amount = total, ?kind, "reward granted");
        self.bus.publish(
            Event::new(EventKind::ClaimGranted)
                .with_key(key)
                .with_user(user)
                .with_amount(total)
                .with_reason(if grant.rude { "rude" } else { "request" }),
        );

        let reply = if grant.rude {
            self.phrases.rude_reply(grant.kind, &mut rand::rng(), &msg.author_name)
        } else {
            self.phrases.give(
                grant.kind,
                &mut rand::rng(),
                &msg.author_name,
                total,
                grant.last_second,
            )
        };
        self.announce(key, reply).await;
        Ok(ClaimOutcome {
            kind,
            amount: total,
        })
    }

    /// Credits the balance and writes it; a failed write takes the credit back.
    async fn persist(&self, user: u64, kind: K, amount: u64) -> Result<(), ServiceError> {
        self.store
            .add_reward(user, kind.name(), amount)
            .await
            .map_err(|e| ServiceError::collaborator("add_reward", e))?;
        if let Err(e) = self.store.write(WriteScope::User).await {
            if let Err(undo) = self.store.remove_reward(user, kind.name(), amount).await {
                warn!(user, amount, error = %undo, "reward credit not taken back");
            }
            return Err(ServiceError::collaborator("write", e));
        }
        Ok(())
    }

    /// Queued → Active. Runs from the delay timer or from `start_event`.
    async fn activate(
        self: Arc<Self>,
        key: u64,
        generation: u64,
        cfg: ChannelConfig,
        kind: Option<K>,
    ) -> Result<bool, ServiceError> {
        if !self.is_queued(key, generation) {
            return Ok(false);
        }
        if self.is_disconnecting() {
            self.abandon(key, generation);
            return Ok(false);
        }

        let eligible = match self.chat.eligible_users(key).await {
            Ok(users) => users.len() as u64,
            Err(e) => {
                self.abandon(key, generation);
                return Err(ServiceError::collaborator("eligible_users", e));
            }
        };

        let picked = {
            let mut rng = rand::rng();
            kind.or_else(|| K::variants().choose(&mut rng).copied())
                .map(|k| {
                    (
                        k,
                        allocator::pot_size(&mut rng, &cfg, eligible),
                        allocator::duration(&mut rng, &cfg),
                    )
                })
        };
        let Some((kind, pot, duration)) = picked else {
            self.abandon(key, generation);
            return Ok(false);
        };

        let token = self.root.child_token();
        let active = {
            let Some(mut st) = self.states.get_mut(&key) else {
                return Ok(false);
            };
            if st.generation != generation || !st.has_begun || st.is_active {
                return Ok(false);
            }
            if self.is_disconnecting() {
                st.reset();
                drop(st);
                self.signal_if_idle();
                return Ok(false);
            }
            st.is_active = true;
            st.reward_kind = Some(kind);
            st.pot = pot;
            st.pot_at_start = pot;
            st.ends_at = Some(Instant::now() + duration);
            st.arm(token.clone())
        };

        let this = Arc::clone(&self);
        timer::schedule(duration, token, async move {
            if let Err(e) = this.resolve(key, active).await {
                warn!(channel = key, error = %e, "reward event failed to depart");
            }
        });

        info!(channel = key, reward = kind.name(), pot, ?duration, "reward event arrived");
        self.bus.publish(
            Event::new(EventKind::EventArrived)
                .with_key(key)
                .with_amount(pot)
                .with_reason(kind.name()),
        );

        let text = self.phrases.arrival(kind, &mut rand::rng());
        if let Some(text) = text {
            self.chat
                .send_message(key, &text)
                .await
                .map_err(|e| ServiceError::collaborator("send_message", e))?;
        }
        Ok(true)
    }

    /// Active → Idle. A no-op unless `generation` is the live active generation.
    async fn resolve(&self, key: u64, generation: u64) -> Result<bool, ServiceError> {
        let (kind, participants, bonus_paid) = {
            let Some(mut st) = self.states.get_mut(&key) else {
                return Ok(false);
            };
            if !st.is_active || st.generation != generation {
                return Ok(false);
            }
            // Claims still being written count: they commit after the reset.
            let departed = (
                st.reward_kind,
                st.claimants() as usize,
                st.pot_at_start.saturating_sub(st.pot),
            );
            st.reset();
            departed
        };

        info!(channel = key, participants, bonus_paid, "reward event departed");
        self.bus.publish(
            Event::new(EventKind::EventDeparted)
                .with_key(key)
                .with_amount(participants as u64),
        );

        let text = kind.and_then(|k| self.phrases.departure(k, &mut rand::rng(), participants > 0));
        let sent = match text {
            Some(text) => self
                .chat
                .send_message(key, &text)
                .await
                .map_err(|e| ServiceError::collaborator("send_message", e)),
            None => Ok(()),
        };
        self.signal_if_idle();
        sent.map(|()| true)
    }

    /// Drops a queued event that cannot arrive.
    fn abandon(&self, key: u64, generation: u64) {
        if let Some(mut st) = self.states.get_mut(&key) {
            if st.generation == generation {
                st.reset();
            }
        }
        self.signal_if_idle();
    }

    async fn announce(&self, key: u64, text: Option<String>) {
        let Some(text) = text else { return };
        if let Err(e) = self.chat.send_message(key, &text).await {
            warn!(channel = key, error = %e, "announcement not delivered");
        }
    }

    fn signal_if_idle(&self) {
        if !self.is_disconnecting() || self.any_active() {
            return;
        }
        let host = self.host.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(host) = host {
            host.mark_ready_for::<Self>();
        }
    }

    fn is_queued(&self, key: u64, generation: u64) -> bool {
        self.states
            .get(&key)
            .is_some_and(|st| st.generation == generation && st.has_begun && !st.is_active)
    }

    fn any_active(&self) -> bool {
        self.states.iter().any(|st| st.is_active)
    }

    fn is_disconnecting(&self) -> bool {
        self.disconnecting.load(Ordering::Acquire)
    }

    /// Whether the channel has an event queued or active.
    pub fn is_started(&self, channel: u64) -> bool {
        self.states.get(&channel).is_some_and(|st| st.has_begun)
    }

    /// Whether the channel's event is redeemable.
    pub fn is_active(&self, channel: u64) -> bool {
        self.states.get(&channel).is_some_and(|st| st.is_active)
    }

    /// Whether a new event may be queued in the channel.
    pub fn can_start_event(&self, channel: u64) -> bool {
        !self.is_disconnecting() && self.states.get(&channel).is_none_or(|st| st.is_idle())
    }

    /// Reward kind of the channel's active event.
    pub fn reward_kind(&self, channel: u64) -> Option<K> {
        self.states.get(&channel).and_then(|st| st.reward_kind)
    }

    /// Users credited in the channel's current event, ascending.
    pub fn participants(&self, channel: u64) -> Vec<u64> {
        let mut users: Vec<u64> = self
            .states
            .get(&channel)
            .map(|st| st.participants.iter().copied().collect())
            .unwrap_or_default();
        users.sort_unstable();
        users
    }

    /// Remaining early-bird pot of the channel's current event.
    pub fn pot(&self, channel: u64) -> u64 {
        self.states.get(&channel).map_or(0, |st| st.pot)
    }

    /// Balances of one reward kind, highest first.
    pub async fn leaderboard(&self, kind: K) -> Vec<(u64, u64)> {
        allocator::leaderboard(self.store.scores(kind.name()).await).collect()
    }
}

#[async_trait]
impl<K: RewardKind> Service for EventManager<K> {
    fn name(&self) -> &'static str {
        "event-manager"
    }

    async fn can_disconnect(&self, host: &HostContext) -> bool {
        *self.host.lock().unwrap_or_else(|e| e.into_inner()) = Some(host.clone());
        self.disconnecting.store(true, Ordering::Release);
        !self.any_active()
    }

    async fn disconnect(&self, _host: &HostContext) -> Result<(), ServiceError> {
        self.disconnecting.store(true, Ordering::Release);
        let active: Vec<(u64, u64)> = self
            .states
            .iter()
            .filter(|st| st.is_active)
            .map(|st| (*st.key(), st.generation))
            .collect();

        let mut first_err = None;
        for (key, generation) in active {
            if let Err(e) = self.resolve(key, generation).await {
                warn!(channel = key, error = %e, "forced departure failed");
                first_err.get_or_insert(e);
            }
        }
        self.root.cancel();
        self.states.clear();
        first_err.map_or(Ok(()), Err)
    }
}
