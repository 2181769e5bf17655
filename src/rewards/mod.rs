//! # Randomized per-channel reward events.
//!
//! - [`allocator`]: pure amount, pot and timer computations
//! - [`EventManager`]: the keyed state machine and claim handling
//! - [`PhraseBook`]: injected phrase sets and announcement templates
//! - [`RewardKind`]: the closed set of rewards an event can hand out

pub mod allocator;
mod kind;
mod manager;
mod phrases;
mod state;

pub use allocator::Award;
pub use kind::{RewardKind, Snack};
pub use manager::{ClaimKind, ClaimOutcome, EventManager};
pub use phrases::{PhraseBook, Phrases};
