//! Selective receive.
//!
//! Transports deliver messages in arrival order, but the protocol sometimes
//! needs "the next message from `p`" or "the next message of kind `k`". The
//! mailbox buffers arrivals and hands out the oldest match, so per-sender
//! FIFO order is preserved for every filter.

use std::collections::VecDeque;

use pairlock_proto::{Message, MessageKind, ParticipantId};

/// Source and kind constraints for a receive. `None` matches anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Required sender
    pub source: Option<ParticipantId>,
    /// Required kind
    pub kind: Option<MessageKind>,
}

impl MessageFilter {
    /// Matches every message.
    pub const ANY: Self = Self { source: None, kind: None };

    /// Messages from `source`.
    pub const fn from_source(source: ParticipantId) -> Self {
        Self { source: Some(source), kind: None }
    }

    /// Messages of `kind`.
    pub const fn of_kind(kind: MessageKind) -> Self {
        Self { source: None, kind: Some(kind) }
    }

    /// Narrow to `kind`.
    #[must_use]
    pub const fn and_kind(self, kind: MessageKind) -> Self {
        Self { kind: Some(kind), ..self }
    }

    /// Whether `message` passes.
    pub fn matches(&self, message: &Message) -> bool {
        self.source.is_none_or(|s| s == message.from)
            && self.kind.is_none_or(|k| k == message.kind())
    }
}

/// Buffer of received but unconsumed messages.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    pending: VecDeque<Message>,
}

impl Mailbox {
    /// Empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer an arrival.
    pub fn push(&mut self, message: Message) {
        self.pending.push_back(message);
    }

    /// Sender and kind of the oldest buffered message, without consuming it.
    pub fn probe(&self) -> Option<(ParticipantId, MessageKind)> {
        self.pending.front().map(|m| (m.from, m.kind()))
    }

    /// Remove and return the oldest message passing `filter`.
    pub fn take(&mut self, filter: MessageFilter) -> Option<Message> {
        let index = self.pending.iter().position(|m| filter.matches(m))?;
        self.pending.remove(index)
    }
}
