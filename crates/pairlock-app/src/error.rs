//! Runtime errors.

use pairlock_core::{
    error::{GroupError, RequesterError, ResponderError},
    transport::TransportError,
};
use thiserror::Error;

/// Fatal runtime failure.
///
/// Rejected inbound messages are not fatal and never surface here; they are
/// logged and dropped.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Participant does not fit the group layout.
    #[error(transparent)]
    Group(#[from] GroupError),

    /// Requester operation out of order.
    #[error(transparent)]
    Requester(#[from] RequesterError),

    /// Responder failure.
    #[error(transparent)]
    Responder(#[from] ResponderError),

    /// Network failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
