//! CBOR-encoded protocol messages.
//!
//! The event name in the [`Frame`] identifies the payload type, so only the
//! inner struct is serialized (no variant tag in CBOR). [`ClientMessage`]
//! covers everything a client may send, [`ServerMessage`] everything the
//! broker pushes.
//!
//! # Invariants
//!
//! Each variant maps to exactly one event name (enforced by match
//! exhaustiveness in `event()` and `from_frame()`).

pub mod chat;
pub mod presence;

use serde::{Serialize, de::DeserializeOwned};

use self::{
    chat::{
        Broadcast, MarkAsRead, Message, MessageSent, MessageStatusUpdate, MessagesRead,
        SendMessage,
    },
    presence::{
        Authenticate, GroupMembershipNotice, GroupRef, OnlineUser, TypingNotice, TypingRequest,
        UserPresence,
    },
};
use crate::{
    Frame,
    errors::{ProtocolError, Result},
};

/// Event names used on the wire.
pub mod events {
    /// Client: bind identity to connection
    pub const AUTHENTICATE: &str = "authenticate";
    /// Client: send a chat message
    pub const SEND_MESSAGE: &str = "send_message";
    /// Both directions: typing started
    pub const TYPING_START: &str = "typing_start";
    /// Both directions: typing stopped
    pub const TYPING_STOP: &str = "typing_stop";
    /// Client: mark a conversation read
    pub const MARK_AS_READ: &str = "mark_as_read";
    /// Client: subscribe to a group
    pub const JOIN_GROUP: &str = "join_group";
    /// Client: unsubscribe from a group
    pub const LEAVE_GROUP: &str = "leave_group";

    /// Server: online user snapshot after authentication
    pub const ONLINE_USERS: &str = "online_users";
    /// Server: new chat message
    pub const NEW_MESSAGE: &str = "new_message";
    /// Server: send confirmation
    pub const MESSAGE_SENT: &str = "message_sent";
    /// Server: delivered/read transition
    pub const MESSAGE_STATUS_UPDATE: &str = "message_status_update";
    /// Server: user came online
    pub const USER_ONLINE: &str = "user_online";
    /// Server: user went offline
    pub const USER_OFFLINE: &str = "user_offline";
    /// Server: conversation read receipt
    pub const MESSAGES_READ: &str = "messages_read";
    /// Server: member joined a group
    pub const USER_JOINED_GROUP: &str = "user_joined_group";
    /// Server: member left a group
    pub const USER_LEFT_GROUP: &str = "user_left_group";
    /// Server: global announcement
    pub const BROADCAST_MESSAGE: &str = "broadcast_message";
}

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Bind an identity; must precede all other events
    Authenticate(Authenticate),
    /// Send a chat message
    SendMessage(SendMessage),
    /// Typing started or refreshed
    TypingStart(TypingRequest),
    /// Typing stopped
    TypingStop(TypingRequest),
    /// Mark a conversation as read
    MarkAsRead(MarkAsRead),
    /// Join a group room
    JoinGroup(GroupRef),
    /// Leave a group room
    LeaveGroup(GroupRef),
}

impl ClientMessage {
    /// Wire event name.
    pub const fn event(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => events::AUTHENTICATE,
            Self::SendMessage(_) => events::SEND_MESSAGE,
            Self::TypingStart(_) => events::TYPING_START,
            Self::TypingStop(_) => events::TYPING_STOP,
            Self::MarkAsRead(_) => events::MARK_AS_READ,
            Self::JoinGroup(_) => events::JOIN_GROUP,
            Self::LeaveGroup(_) => events::LEAVE_GROUP,
        }
    }

    /// Encode into a frame.
    pub fn to_frame(&self) -> Result<Frame> {
        let event = self.event();
        match self {
            Self::Authenticate(inner) => encode(event, inner),
            Self::SendMessage(inner) => encode(event, inner),
            Self::TypingStart(inner) | Self::TypingStop(inner) => encode(event, inner),
            Self::MarkAsRead(inner) => encode(event, inner),
            Self::JoinGroup(inner) | Self::LeaveGroup(inner) => encode(event, inner),
        }
    }

    /// Decode a frame sent by a client.
    ///
    /// Returns `Ok(None)` for event names this protocol version does not
    /// know; callers ignore those.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>> {
        let message = match frame.event.as_str() {
            events::AUTHENTICATE => Self::Authenticate(decode(frame)?),
            events::SEND_MESSAGE => Self::SendMessage(decode(frame)?),
            events::TYPING_START => Self::TypingStart(decode(frame)?),
            events::TYPING_STOP => Self::TypingStop(decode(frame)?),
            events::MARK_AS_READ => Self::MarkAsRead(decode(frame)?),
            events::JOIN_GROUP => Self::JoinGroup(decode(frame)?),
            events::LEAVE_GROUP => Self::LeaveGroup(decode(frame)?),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

/// Events the broker pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Snapshot of online users, sent once after authentication
    OnlineUsers(Vec<OnlineUser>),
    /// A message addressed to one of the recipient's rooms
    NewMessage(Message),
    /// Send confirmation to the originating connection
    MessageSent(MessageSent),
    /// Delivered/read transition
    MessageStatusUpdate(MessageStatusUpdate),
    /// Someone started typing
    TypingStart(TypingNotice),
    /// Someone stopped typing (explicitly or by expiry)
    TypingStop(TypingNotice),
    /// A user came online
    UserOnline(UserPresence),
    /// A user went offline
    UserOffline(UserPresence),
    /// A conversation was read
    MessagesRead(MessagesRead),
    /// A member joined a group
    UserJoinedGroup(GroupMembershipNotice),
    /// A member left a group
    UserLeftGroup(GroupMembershipNotice),
    /// Server-wide announcement
    Broadcast(Broadcast),
}

impl ServerMessage {
    /// Wire event name.
    pub const fn event(&self) -> &'static str {
        match self {
            Self::OnlineUsers(_) => events::ONLINE_USERS,
            Self::NewMessage(_) => events::NEW_MESSAGE,
            Self::MessageSent(_) => events::MESSAGE_SENT,
            Self::MessageStatusUpdate(_) => events::MESSAGE_STATUS_UPDATE,
            Self::TypingStart(_) => events::TYPING_START,
            Self::TypingStop(_) => events::TYPING_STOP,
            Self::UserOnline(_) => events::USER_ONLINE,
            Self::UserOffline(_) => events::USER_OFFLINE,
            Self::MessagesRead(_) => events::MESSAGES_READ,
            Self::UserJoinedGroup(_) => events::USER_JOINED_GROUP,
            Self::UserLeftGroup(_) => events::USER_LEFT_GROUP,
            Self::Broadcast(_) => events::BROADCAST_MESSAGE,
        }
    }

    /// Encode into a frame.
    pub fn to_frame(&self) -> Result<Frame> {
        let event = self.event();
        match self {
            Self::OnlineUsers(inner) => encode(event, inner),
            Self::NewMessage(inner) => encode(event, inner),
            Self::MessageSent(inner) => encode(event, inner),
            Self::MessageStatusUpdate(inner) => encode(event, inner),
            Self::TypingStart(inner) | Self::TypingStop(inner) => encode(event, inner),
            Self::UserOnline(inner) | Self::UserOffline(inner) => encode(event, inner),
            Self::MessagesRead(inner) => encode(event, inner),
            Self::UserJoinedGroup(inner) | Self::UserLeftGroup(inner) => encode(event, inner),
            Self::Broadcast(inner) => encode(event, inner),
        }
    }

    /// Decode a frame pushed by the broker. `Ok(None)` for unknown events.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>> {
        let message = match frame.event.as_str() {
            events::ONLINE_USERS => Self::OnlineUsers(decode(frame)?),
            events::NEW_MESSAGE => Self::NewMessage(decode(frame)?),
            events::MESSAGE_SENT => Self::MessageSent(decode(frame)?),
            events::MESSAGE_STATUS_UPDATE => Self::MessageStatusUpdate(decode(frame)?),
            events::TYPING_START => Self::TypingStart(decode(frame)?),
            events::TYPING_STOP => Self::TypingStop(decode(frame)?),
            events::USER_ONLINE => Self::UserOnline(decode(frame)?),
            events::USER_OFFLINE => Self::UserOffline(decode(frame)?),
            events::MESSAGES_READ => Self::MessagesRead(decode(frame)?),
            events::USER_JOINED_GROUP => Self::UserJoinedGroup(decode(frame)?),
            events::USER_LEFT_GROUP => Self::UserLeftGroup(decode(frame)?),
            events::BROADCAST_MESSAGE => Self::Broadcast(decode(frame)?),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

fn encode<T: Serialize>(event: &str, inner: &T) -> Result<Frame> {
    let mut payload = Vec::new();
    ciborium::ser::into_writer(inner, &mut payload)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(Frame::new(event, payload))
}

fn decode<T: DeserializeOwned>(frame: &Frame) -> Result<T> {
    ciborium::de::from_reader(&frame.payload[..]).map_err(|e| ProtocolError::CborDecode {
        event: frame.event.clone(),
        reason: e.to_string(),
    })
}
