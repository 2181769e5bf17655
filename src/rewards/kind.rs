//! Reward kinds handed out by an [`EventManager`](crate::EventManager).

use std::fmt::Debug;
use std::hash::Hash;

/// A closed set of reward kinds; one is picked at random per event.
pub trait RewardKind: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every kind, in a stable order.
    fn variants() -> &'static [Self];

    /// Display and storage name of the kind.
    fn name(&self) -> &'static str;
}

/// Ready-made reward kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Snack {
    /// Cookies.
    Cookie,
    /// Pretzels.
    Pretzel,
    /// Cupcakes.
    Cupcake,
}

impl RewardKind for Snack {
    fn variants() -> &'static [Self] {
        &[Snack::Cookie, Snack::Pretzel, Snack::Cupcake]
    }

    fn name(&self) -> &'static str {
        match self {
            Snack::Cookie => "cookies",
            Snack::Pretzel => "pretzels",
            Snack::Cupcake => "cupcakes",
        }
    }
}
