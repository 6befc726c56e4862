//! Frame type and stream decoder.
//!
//! A `Frame` is the transport-layer packet: an event name and the raw CBOR
//! bytes of its payload. Routing code never needs to deserialize the payload
//! to know which event it carries.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::{ProtocolError, Result};

/// Complete protocol frame.
///
/// Layout on the wire:
/// `[body_len: u32 BE] [event_len: u8] [event: UTF-8] [payload: CBOR]`
/// where `body_len` counts everything after the prefix.
///
/// # Invariants
///
/// - `event.len() <= 255` and `body_len <= MAX_FRAME_SIZE`. Both are enforced
///   by [`Frame::encode`]; [`FrameDecoder`] rejects oversized bodies before
///   buffering them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event name (e.g. `send_message`)
    pub event: String,
    /// Raw payload bytes (already CBOR-encoded)
    pub payload: Bytes,
}

impl Frame {
    /// Size of the big-endian length prefix.
    pub const LENGTH_PREFIX: usize = 4;

    /// Largest accepted frame body.
    pub const MAX_FRAME_SIZE: usize = 64 * 1024;

    /// Create a frame from an event name and encoded payload.
    #[must_use]
    pub fn new(event: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self { event: event.into(), payload: payload.into() }
    }

    /// Length of the body (everything after the length prefix).
    pub fn body_len(&self) -> usize {
        1 + self.event.len() + self.payload.len()
    }

    /// Encode frame into buffer.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EventNameTooLong` if the event name exceeds 255 bytes
    /// - `ProtocolError::FrameTooLarge` if the body exceeds `MAX_FRAME_SIZE`
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let event_len = u8::try_from(self.event.len())
            .map_err(|_| ProtocolError::EventNameTooLong(self.event.len()))?;

        let body_len = self.body_len();
        if body_len > Self::MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge { size: body_len, max: Self::MAX_FRAME_SIZE });
        }

        dst.put_u32(body_len as u32);
        dst.put_u8(event_len);
        dst.put_slice(self.event.as_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(Self::LENGTH_PREFIX + self.body_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a frame body (the bytes after the length prefix).
    pub fn decode_body(mut body: Bytes) -> Result<Self> {
        if body.is_empty() {
            return Err(ProtocolError::FrameTruncated { expected: 1, actual: 0 });
        }

        let event_len = usize::from(body.get_u8());
        if body.len() < event_len {
            return Err(ProtocolError::FrameTruncated { expected: event_len, actual: body.len() });
        }

        let event_bytes = body.split_to(event_len);
        let event = std::str::from_utf8(&event_bytes)
            .map_err(|_| ProtocolError::InvalidEventName)?
            .to_owned();

        Ok(Self { event, payload: body })
    }
}

/// Incremental decoder for a stream of length-prefixed frames.
///
/// Feed arbitrary chunks with [`FrameDecoder::extend`] and drain complete
/// frames with [`FrameDecoder::next_frame`]. After a framing error the
/// decoder must be discarded along with the connection.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the transport.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed by a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(prefix) = self.buf.get(..Frame::LENGTH_PREFIX) else {
            return Ok(None);
        };

        let mut len_bytes = [0u8; Frame::LENGTH_PREFIX];
        len_bytes.copy_from_slice(prefix);
        let body_len = u32::from_be_bytes(len_bytes) as usize;

        if body_len > Frame::MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: body_len,
                max: Frame::MAX_FRAME_SIZE,
            });
        }

        if self.buf.len() < Frame::LENGTH_PREFIX + body_len {
            return Ok(None);
        }

        self.buf.advance(Frame::LENGTH_PREFIX);
        let body = self.buf.split_to(body_len).freeze();
        Frame::decode_body(body).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_writes_length_prefix() {
        let frame = Frame::new("ping", Bytes::from_static(b"\xa0"));
        let bytes = frame.to_bytes().unwrap();

        assert_eq!(&bytes[..4], &6u32.to_be_bytes());
        assert_eq!(bytes[4], 4);
        assert_eq!(&bytes[5..9], b"ping");
        assert_eq!(&bytes[9..], b"\xa0");
    }

    #[test]
    fn decoder_waits_for_complete_frame() {
        let frame = Frame::new("typing_start", Bytes::from_static(b"abc"));
        let bytes = frame.to_bytes().unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.extend(&bytes[..7]);
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.extend(&bytes[7..]);
        assert_eq!(decoder.next_frame().unwrap(), Some(frame));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn decoder_yields_back_to_back_frames() {
        let a = Frame::new("a", Bytes::from_static(b"1"));
        let b = Frame::new("b", Bytes::new());

        let mut decoder = FrameDecoder::new();
        decoder.extend(&a.to_bytes().unwrap());
        decoder.extend(&b.to_bytes().unwrap());

        assert_eq!(decoder.next_frame().unwrap(), Some(a));
        assert_eq!(decoder.next_frame().unwrap(), Some(b));
        assert_eq!(decoder.next_frame().unwrap(), None);
    }

    #[test]
    fn decoder_rejects_oversized_prefix() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&((Frame::MAX_FRAME_SIZE as u32) + 1).to_be_bytes());

        let err = decoder.next_frame().unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let frame = Frame::new("send_message", vec![0u8; Frame::MAX_FRAME_SIZE]);
        assert!(matches!(frame.to_bytes(), Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn encode_rejects_long_event_name() {
        let frame = Frame::new("x".repeat(256), Bytes::new());
        assert_eq!(frame.to_bytes(), Err(ProtocolError::EventNameTooLong(256)));
    }

    #[test]
    fn decode_body_rejects_truncated_event_name() {
        let body = Bytes::from_static(b"\x05abc");
        assert!(matches!(Frame::decode_body(body), Err(ProtocolError::FrameTruncated { .. })));
    }

    #[test]
    fn decode_body_rejects_non_utf8_event() {
        let body = Bytes::from_static(b"\x02\xff\xfe");
        assert_eq!(Frame::decode_body(body), Err(ProtocolError::InvalidEventName));
    }
}
