//! Server error types.

use parley_core::BrokerError;
use parley_proto::ProtocolError;
use thiserror::Error;

/// Errors raised by the production runtime.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid configuration (bind address, TLS material).
    ///
    /// Fatal at startup. Fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network or QUIC failure.
    ///
    /// Fatal for the affected connection; the endpoint keeps serving others.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed bytes from a client.
    ///
    /// Framing errors close the connection; payload errors drop one event.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Runtime bookkeeping failed, e.g. the coordinator stopped.
    #[error("internal error: {0}")]
    Internal(String),

    /// Error returned by the broker for one event.
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use parley_core::ConnectionId;

    use super::*;

    #[test]
    fn display_includes_layer() {
        let err = ServerError::Config("missing key".into());
        assert_eq!(err.to_string(), "configuration error: missing key");

        let err = ServerError::from(BrokerError::UnknownConnection(ConnectionId(4)));
        assert!(err.to_string().starts_with("broker error: "));
    }

    #[test]
    fn io_errors_are_transport_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");

        assert!(matches!(ServerError::from(io), ServerError::Transport(_)));
    }
}
