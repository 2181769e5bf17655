//! Per-channel event record.

use std::collections::HashSet;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// State of one channel's reward event.
///
/// Only mutated under the manager's entry lock; never held across an await.
#[derive(Debug)]
pub(crate) struct EventState<K> {
    pub messages_since_reset: u64,
    /// Delay (or duration) timer armed.
    pub has_begun: bool,
    pub is_active: bool,
    pub reward_kind: Option<K>,
    pub pot: u64,
    pub pot_at_start: u64,
    pub participants: HashSet<u64>,
    /// Users whose grant is being persisted.
    pub pending: HashSet<u64>,
    /// Bumped on every arm, activation and reset; timers and reservations compare it.
    pub generation: u64,
    pub timer: Option<CancellationToken>,
    pub ends_at: Option<Instant>,
}

impl<K> Default for EventState<K> {
    fn default() -> Self {
        Self {
            messages_since_reset: 0,
            has_begun: false,
            is_active: false,
            reward_kind: None,
            pot: 0,
            pot_at_start: 0,
            participants: HashSet::new(),
            pending: HashSet::new(),
            generation: 0,
            timer: None,
            ends_at: None,
        }
    }
}

impl<K> EventState<K> {
    /// Idle with no timer, no messages and nobody credited.
    pub fn is_idle(&self) -> bool {
        !self.has_begun && !self.is_active
    }

    /// Number of users already positioned in the early-bird order.
    pub fn claimants(&self) -> u64 {
        (self.participants.len() + self.pending.len()) as u64
    }

    /// Replaces the armed timer, cancelling the previous one.
    pub fn arm(&mut self, token: CancellationToken) -> u64 {
        if let Some(old) = self.timer.replace(token) {
            old.cancel();
        }
        self.generation += 1;
        self.generation
    }

    /// Resets the record in place; stale timers and reservations become no-ops.
    pub fn reset(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_cancels_timer_and_bumps_generation() {
        let mut st = EventState::<u8>::default();
        let token = CancellationToken::new();
        let armed = st.arm(token.clone());
        st.has_begun = true;
        st.is_active = true;
        st.participants.insert(3);

        st.reset();
        assert!(token.is_cancelled());
        assert!(st.is_idle());
        assert!(st.participants.is_empty());
        assert_eq!(st.generation, armed + 1);
    }

    #[test]
    fn rearming_cancels_previous_timer() {
        let mut st = EventState::<u8>::default();
        let first = CancellationToken::new();
        st.arm(first.clone());
        st.arm(CancellationToken::new());
        assert!(first.is_cancelled());
    }
}
