//! Transport abstraction.
//!
//! The protocol needs reliable delivery that is FIFO per sender/receiver
//! pair, a non-blocking probe, and a receive that can filter by sender and
//! kind. Nothing else: no global ordering, no timeouts.
//!
//! Production runs use an in-process channel network, simulations use
//! turmoil TCP. Both build selective receive on [`crate::mailbox::Mailbox`].

use std::io;

use async_trait::async_trait;
use pairlock_proto::{Message, MessageKind, ParticipantId, ProtocolError};
use thiserror::Error;

use crate::mailbox::MessageFilter;

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The network is gone; no more messages will arrive.
    #[error("transport closed")]
    Closed,

    /// No route to this participant.
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed frame on the wire.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),
}

/// Point-to-point messaging for one participant.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Participant this endpoint belongs to.
    fn local_id(&self) -> ParticipantId;

    /// Queue `message` for delivery to `message.to`.
    ///
    /// Returns once the message is handed to the network; delivery is not
    /// acknowledged.
    async fn send(&mut self, message: Message) -> Result<(), TransportError>;

    /// Sender and kind of the oldest available message, without consuming
    /// it. Never blocks.
    fn probe(&mut self) -> Option<(ParticipantId, MessageKind)>;

    /// Consume the oldest available message passing `filter`. Never blocks.
    fn try_receive(&mut self, filter: MessageFilter) -> Option<Message>;

    /// Consume the oldest message passing `filter`, waiting for one to
    /// arrive.
    ///
    /// Cancel safe: dropping the future loses no message.
    async fn receive(&mut self, filter: MessageFilter) -> Result<Message, TransportError>;
}
