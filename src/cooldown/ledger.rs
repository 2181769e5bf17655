//! Fixed-size, ascending set of cooldown slots.

use std::time::{Duration, SystemTime};

/// `N` reusable slots; `slots[0]` is always the earliest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Ledger {
    slots: Vec<SystemTime>,
}

/// A slot taken by [`Ledger::take`], used to undo it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Taken {
    pub previous: SystemTime,
    pub until: SystemTime,
}

impl Ledger {
    /// `n` slots (at least one), all available at `now`.
    pub fn new(n: usize, now: SystemTime) -> Self {
        Self {
            slots: vec![now; n.max(1)],
        }
    }

    pub fn earliest(&self) -> SystemTime {
        self.slots[0]
    }

    pub fn available(&self, now: SystemTime) -> usize {
        self.slots.iter().take_while(|s| **s <= now).count()
    }

    /// Takes the earliest slot if it is free, moving it to `now + cooldown`.
    pub fn take(&mut self, now: SystemTime, cooldown: Duration) -> Option<Taken> {
        if self.earliest() > now {
            return None;
        }
        let taken = Taken {
            previous: self.slots[0],
            until: now + cooldown,
        };
        self.slots[0] = taken.until;
        self.slots.sort_unstable();
        Some(taken)
    }

    /// Undoes a [`take`](Self::take).
    pub fn restore(&mut self, taken: Taken) {
        if let Some(slot) = self.slots.iter_mut().find(|s| **s == taken.until) {
            *slot = taken.previous;
            self.slots.sort_unstable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3_600);

    #[test]
    fn slots_stay_sorted() {
        let t0 = SystemTime::UNIX_EPOCH + HOUR * 100;
        let mut ledger = Ledger::new(3, t0);
        assert_eq!(ledger.available(t0), 3);

        ledger.take(t0, HOUR * 5).unwrap();
        ledger.take(t0 + HOUR, HOUR).unwrap();
        assert_eq!(ledger.earliest(), t0);
        assert_eq!(ledger.available(t0), 1);
        assert!(ledger.slots.windows(2).all(|w| w[0] <= w[1]));

        ledger.take(t0 + HOUR, HOUR).unwrap();
        assert!(ledger.take(t0 + HOUR, HOUR).is_none());
        assert_eq!(ledger.earliest(), t0 + HOUR * 2);
    }

    #[test]
    fn restore_undoes_take() {
        let t0 = SystemTime::UNIX_EPOCH;
        let mut ledger = Ledger::new(2, t0);
        let before = ledger.clone();
        let taken = ledger.take(t0, HOUR).unwrap();
        ledger.restore(taken);
        assert_eq!(ledger, before);
    }

    #[test]
    fn zero_slots_is_clamped() {
        let ledger = Ledger::new(0, SystemTime::UNIX_EPOCH);
        assert_eq!(ledger.slots.len(), 1);
    }
}
