//! # botvisor
//!
//! **Botvisor** coordinates the lifecycle of a message-driven bot's background services
//! and schedules the short-lived, per-channel events those services run.
//!
//! It provides a lifecycle coordinator with a bounded graceful shutdown, a keyed event
//! manager for randomized reward drops, a rolling-window cooldown tracker, and two smaller
//! keyed services (creature spawns, invite attribution).
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐  ┌─────────────────┐  ┌────────────────┐  ┌───────────────┐
//!     │ EventManager │  │ CooldownTracker │  │  SpawnTracker  │  │ InviteTracker │
//!     │ (keyed drops)│  │ (rolling slots) │  │ (keyed spawns) │  │ (join credit) │
//!     └──────┬───────┘  └───────┬─────────┘  └───────┬────────┘  └──────┬────────┘
//!            │ impl Service     │                    │                  │
//!            ▼                  ▼                    ▼                  ▼
//! ┌──────────────────────────────────────────────────────────────────────────────┐
//! │  Coordinator                                                                 │
//! │  - Registry (ServiceId → service, readiness flag)                            │
//! │  - Bus (broadcast events)                                                    │
//! │  - SubscriberSet (fans out to user subscribers)                              │
//! │  - Gateway (host connection, torn down last)                                 │
//! └──────────────────────────────────┬───────────────────────────────────────────┘
//!                                    ▼
//!                        ┌────────────────────────┐
//!                        │  subscriber_listener   │
//!                        └───────────┬────────────┘
//!                          ┌─────────┼─────────┐
//!                          ▼         ▼         ▼
//!                      LogWriter  metrics   custom
//! ```
//!
//! ### Keyed events
//! ```text
//! message ──► on_message ──► Idle ──(threshold, eligible)──► Queued ──(delay)──► Active
//!                                                                                   │
//!   handle_message ──► reserve ──► persist ──► commit / rollback                    │
//!                                                                                   ▼
//!                                              Idle ◄──(duration)── resolve + departure
//! ```
//! Every timer carries `(key, generation)`; a timer whose generation is stale does nothing.
//!
//! ### Shutdown
//! ```text
//! shutdown(graceful, timeout)
//!   ├─► close registry, publish ShutdownRequested
//!   ├─► graceful: can_disconnect per service, wait for readiness until timeout/2
//!   ├─► disconnect per service until timeout
//!   └─► Gateway::disconnect
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                          |
//! |-------------------|----------------------------------------------------------------|---------------------------------------------|
//! | **Lifecycle**     | Register services, start them, shut them down within a budget. | [`Coordinator`], [`Service`], [`HostContext`] |
//! | **Reward events** | Keyed, timer-driven reward drops with an early-bird pot.       | [`EventManager`], [`RewardKind`], [`allocator`] |
//! | **Cooldowns**     | N grants per rolling window, per user.                         | [`CooldownTracker`], [`Clock`]              |
//! | **Spawns/Invites**| Creature spawns and invite attribution.                        | [`SpawnTracker`], [`InviteTracker`]         |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom).           | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for the coordinator, services and collaborators.  | [`RuntimeError`], [`ServiceError`]          |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber that forwards events to `tracing`.
//!
//! ## Example
//! ```rust
//! use rand::{SeedableRng, rngs::StdRng};
//! use botvisor::{ChannelConfig, allocator};
//!
//! let cfg = ChannelConfig { amount: 1, early_bird_pot_size: 2, ..ChannelConfig::default() };
//! let mut rng = StdRng::seed_from_u64(7);
//! let mut pot = 10;
//!
//! // Two early birds: the first takes half the pot, the second the rest.
//! assert_eq!(allocator::amount(&mut rng, &cfg, 0, &mut pot).total(), 1 + 5);
//! assert_eq!(allocator::amount(&mut rng, &cfg, 1, &mut pot).total(), 1 + 5);
//! assert_eq!(allocator::amount(&mut rng, &cfg, 2, &mut pot).total(), 1);
//! ```

mod clock;
mod collab;
mod config;
mod cooldown;
mod core;
mod error;
mod events;
mod invites;
mod rewards;
mod spawner;
mod subscribers;
mod timer;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use clock::{Clock, ManualClock, SystemClock};
pub use collab::{ChatClient, CollabResult, ConfigStore, Gateway, InboundMessage, InviteInfo, WriteScope};
pub use config::{ChannelConfig, CooldownConfig, CoordinatorConfig, EventManagerConfig};
pub use cooldown::{CooldownTracker, GrantResult};
pub use core::{
    Coordinator, CoordinatorBuilder, HostContext, Service, ServiceFailure, ServiceId, ShutdownReport,
};
pub use error::{CollabError, RuntimeError, ServiceError};
pub use events::{Bus, Event, EventKind};
pub use invites::InviteTracker;
pub use rewards::allocator;
pub use rewards::{
    Award, ClaimKind, ClaimOutcome, EventManager, PhraseBook, Phrases, RewardKind, Snack,
};
pub use spawner::{DEFAULT_DESPAWN_MESSAGE, SpawnTracker};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: a subscriber that forwards runtime events to `tracing`.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
