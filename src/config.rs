//! # Runtime and service configuration.
//!
//! - [`CoordinatorConfig`] drives the lifecycle coordinator (shutdown window, bus size).
//! - [`ChannelConfig`] is the per-channel reward event configuration read from the config store.
//! - [`CooldownConfig`] sizes the reputation cooldown ledger.
//! - [`EventManagerConfig`] tunes the keyed event manager.
//!
//! ## Sentinel values
//! - `grace = 0s` → no waiting at all: services are asked to disconnect and abandoned at once
//! - `slots = 0` → clamped to 1 (a ledger always has at least one slot)
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use botvisor::CoordinatorConfig;
//!
//! let mut cfg = CoordinatorConfig::default();
//! cfg.grace = Duration::from_secs(10);
//! cfg.graceful = false;
//!
//! assert_eq!(cfg.readiness_window(), Duration::ZERO);
//! ```

use std::time::Duration;

/// Configuration of the [`Coordinator`](crate::Coordinator).
///
/// ## Field semantics
/// - `grace`: total wall-clock budget of a shutdown (readiness + disconnect phases)
/// - `graceful`: whether [`Coordinator::run_until_signal`](crate::Coordinator::run_until_signal)
///   polls services for readiness before disconnecting them
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Maximum time a shutdown may take before remaining services are abandoned.
    pub grace: Duration,

    /// Poll services with `can_disconnect` before disconnecting them.
    pub graceful: bool,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl CoordinatorConfig {
    /// Returns the share of `grace` spent waiting for readiness.
    ///
    /// Half of the budget when graceful, nothing otherwise.
    #[inline]
    pub fn readiness_window(&self) -> Duration {
        if self.graceful {
            self.grace / 2
        } else {
            Duration::ZERO
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for CoordinatorConfig {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `graceful = true`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            graceful: true,
            bus_capacity: 1024,
        }
    }
}

/// Reward event configuration of one channel.
///
/// Immutable input owned by the config store. Time values are milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Channel id this configuration belongs to.
    pub channel: u64,
    /// Upper bound of the base amount handed out per claim.
    pub amount: u64,
    /// Approximate event duration (ms).
    pub duration: u64,
    /// How much `duration` varies (ms).
    pub duration_variance: u64,
    /// Human messages required before an event is queued.
    pub messages_required: u64,
    /// Delay between queueing and arrival (ms).
    pub delay: u64,
    /// How much `delay` varies (ms).
    pub delay_variance: u64,
    /// Base early-bird pot per eligible user.
    pub early_bird_pot: u64,
    /// How much `early_bird_pot` varies.
    pub early_bird_pot_variance: u64,
    /// How many claimants share the early-bird pot.
    pub early_bird_pot_size: u64,
}

/// Configuration of the reputation [`CooldownTracker`](crate::CooldownTracker).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CooldownConfig {
    /// Time a used slot stays unavailable.
    pub cooldown: Duration,
    /// Number of reusable slots per user.
    pub slots: usize,
}

impl CooldownConfig {
    /// Returns the slot count clamped to a minimum of 1.
    #[inline]
    pub fn slots_clamped(&self) -> usize {
        self.slots.max(1)
    }
}

impl Default for CooldownConfig {
    /// One slot per day.
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(24 * 60 * 60),
            slots: 1,
        }
    }
}

/// Tuning of the [`EventManager`](crate::EventManager).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventManagerConfig {
    /// Trailing window before expiry where grants use the last-chance message.
    pub last_chance: Duration,
}

impl Default for EventManagerConfig {
    fn default() -> Self {
        Self {
            last_chance: Duration::from_secs(2),
        }
    }
}
