//! Lamport clock and request priority.
//!
//! Every requester owns one [`LamportClock`]. Originating a request ticks it;
//! every inbound protocol message carrying a clock is observed before any
//! decision is made on it, so the clock never runs behind a value it has
//! seen.
//!
//! The value is a `u64` and never wraps. An advance that would overflow
//! fails and leaves the clock where it was.
//!
//! Contention is resolved with [`RequestStamp`]: `(clock, id)` compared
//! lexicographically. Lower stamps win. IDs are unique, so the order is
//! total and no two live requests ever compare equal.

use std::fmt;

use pairlock_proto::ParticipantId;

/// Per-requester logical clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LamportClock {
    value: u64,
}

impl LamportClock {
    /// Clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `value`.
    pub fn starting_at(value: u64) -> Self {
        Self { value }
    }

    /// Current value.
    pub fn now(&self) -> u64 {
        self.value
    }

    /// Local event: advance by one and return the new value.
    ///
    /// `None` if the clock is already at `u64::MAX`.
    pub fn tick(&mut self) -> Option<u64> {
        self.value = self.value.checked_add(1)?;
        Some(self.value)
    }

    /// Receive event: jump past `remote` and return the new value.
    ///
    /// `None` if `remote` or the local value is `u64::MAX`.
    pub fn observe(&mut self, remote: u64) -> Option<u64> {
        self.value = self.value.max(remote).checked_add(1)?;
        Some(self.value)
    }
}

/// Priority key of a pending critical-section request.
///
/// Field order matters: the derived `Ord` compares `clock` first and breaks
/// ties on `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestStamp {
    /// Clock value when the request was issued
    pub clock: u64,
    /// Requester that issued it
    pub id: ParticipantId,
}

impl RequestStamp {
    /// Create a stamp.
    pub const fn new(clock: u64, id: ParticipantId) -> Self {
        Self { clock, id }
    }

    /// Whether `self` has priority over `other`.
    pub fn precedes(&self, other: &Self) -> bool {
        self < other
    }
}

impl fmt::Display for RequestStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.clock, self.id)
    }
}
