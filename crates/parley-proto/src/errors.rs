//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while framing or decoding protocol messages.
///
/// Framing errors (`FrameTooLarge`, `FrameTruncated`, `InvalidEventName`)
/// leave the stream position undefined and should close the connection.
/// Payload errors (`CborDecode`) only affect the one event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame body exceeds [`crate::Frame::MAX_FRAME_SIZE`]
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Claimed or actual body size
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Event name longer than 255 bytes
    #[error("event name too long: {0} bytes")]
    EventNameTooLong(usize),

    /// Event name bytes are not UTF-8
    #[error("event name is not valid UTF-8")]
    InvalidEventName,

    /// Frame body shorter than its own header claims
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    FrameTruncated {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Payload could not be serialized
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// Payload of a known event did not match its schema
    #[error("invalid payload for {event}: {reason}")]
    CborDecode {
        /// Event whose payload failed to decode
        event: String,
        /// Decoder message
        reason: String,
    },
}

impl ProtocolError {
    /// Returns true if the byte stream can no longer be trusted.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::FrameTooLarge { .. } | Self::FrameTruncated { .. } | Self::InvalidEventName
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_errors_are_classified() {
        assert!(ProtocolError::FrameTooLarge { size: 10, max: 5 }.is_framing());
        assert!(ProtocolError::InvalidEventName.is_framing());
        assert!(
            !ProtocolError::CborDecode { event: "send_message".into(), reason: "eof".into() }
                .is_framing()
        );
    }

    #[test]
    fn display_includes_context() {
        let err = ProtocolError::CborDecode { event: "join_group".into(), reason: "eof".into() };
        assert_eq!(err.to_string(), "invalid payload for join_group: eof");
    }
}
