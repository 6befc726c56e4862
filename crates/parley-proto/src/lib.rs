//! Parley wire protocol.
//!
//! Defines the events exchanged between chat clients and the broker and the
//! framing used to carry them over a byte stream.
//!
//! # Layers
//!
//! - [`Frame`]: transport packet, an event name plus raw CBOR payload bytes.
//!   The length-prefixed layout is described on [`Frame::encode`].
//! - [`ClientMessage`] / [`ServerMessage`]: typed views over a frame, one
//!   variant per event name. Decoding an unknown event name yields `None`
//!   rather than an error so newer clients never break older brokers.
//!
//! Payload field names are camelCase and chat kinds travel in a `type` field,
//! so a JSON rendering of any payload matches what browser clients expect.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
mod frame;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::{Frame, FrameDecoder};
pub use payloads::{
    ClientMessage, ServerMessage,
    chat::{
        Broadcast, ChatKind, MarkAsRead, Message, MessageSent, MessageStatus, MessageStatusUpdate,
        MessagesRead, SendMessage,
    },
    events,
    presence::{
        Authenticate, GroupMembershipNotice, GroupRef, OnlineUser, TypingNotice, TypingRequest,
        UserPresence,
    },
};

/// ALPN protocol identifier negotiated by the QUIC transport.
pub const ALPN_PROTOCOL: &[u8] = b"parley/1";
