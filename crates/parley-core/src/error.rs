//! Broker error types.
//!
//! Every error is scoped to the single event that caused it. Runtimes log
//! the error and keep serving the connection; nothing here is fatal to the
//! broker or to other connections.

use parley_proto::MessageStatus;
use thiserror::Error;

use crate::session::ConnectionId;

/// Errors returned by [`crate::Broker::process_event`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Event received before `authenticate`. The event is dropped; the
    /// connection stays open.
    #[error("authentication required before {event} on {connection}")]
    AuthenticationRequired {
        /// Offending connection
        connection: ConnectionId,
        /// Event that was dropped
        event: &'static str,
    },

    /// Malformed send, typing, read, or group request. Dropped with no
    /// broadcast and no `message_sent` confirmation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// `authenticate` on a connection that is already bound.
    #[error("{connection} is already bound to user {user_id}")]
    DuplicateConnection {
        /// Connection that was already bound
        connection: ConnectionId,
        /// User it is bound to
        user_id: String,
    },

    /// Event for a connection the broker never saw opened (or already
    /// closed).
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// Message status change that would skip or reverse the lifecycle.
    #[error("illegal status transition for {message_id}: {from} -> {to}")]
    IllegalTransition {
        /// Message
        message_id: String,
        /// Current status
        from: MessageStatus,
        /// Requested status
        to: MessageStatus,
    },

    /// Status change for a message that is not (or no longer) retained.
    #[error("unknown message: {0}")]
    UnknownMessage(String),
}

impl BrokerError {
    /// Returns true if the error was caused by client input rather than
    /// broker state.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired { .. }
                | Self::InvalidRequest(_)
                | Self::DuplicateConnection { .. }
        )
    }
}
