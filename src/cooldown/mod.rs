//! Reputation cooldowns: a ledger of `N` reusable slots per user.

mod ledger;
mod tracker;

pub use tracker::{CooldownTracker, GrantResult};
