//! Chat message payload types.
//!
//! These payloads carry user-visible messages, their delivery status, and
//! read receipts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversation kind: a direct chat between two users or a named group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// One-to-one conversation
    Individual,
    /// Group conversation
    Group,
}

impl ChatKind {
    /// Wire name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a message.
///
/// # Invariants
///
/// Status only moves forward one step at a time:
/// `sending -> sent -> delivered -> (read | failed)`. `read` and `failed` are
/// terminal. [`MessageStatus::can_advance_to`] is the single source of truth
/// for legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Accepted locally, not yet confirmed by the broker
    Sending,
    /// Accepted by the broker
    Sent,
    /// Pushed to at least one live recipient connection
    Delivered,
    /// Recipient reported the message as read
    Read,
    /// Delivery abandoned
    Failed,
}

impl MessageStatus {
    /// Whether `next` is the legal successor of `self`.
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Sending, Self::Sent)
                | (Self::Sent, Self::Delivered)
                | (Self::Delivered, Self::Read)
                | (Self::Delivered, Self::Failed)
        )
    }

    /// Position in the lifecycle. Terminal states share the highest rank.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Sending => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read | Self::Failed => 3,
        }
    }

    /// No further transitions are possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Read | Self::Failed)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A chat message as stored by the broker and pushed to clients.
///
/// Exactly one of `receiver_id` / `group_id` is set, matching `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Globally unique, immutable message ID
    pub id: String,
    /// Author
    pub sender_id: String,
    /// Recipient user for individual messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    /// Target group for group messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Message text
    pub content: String,
    /// Unix milliseconds when the broker accepted the message
    pub timestamp: u64,
    /// Conversation kind
    #[serde(rename = "type")]
    pub kind: ChatKind,
    /// Current delivery status
    pub status: MessageStatus,
}

/// `send_message` request from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Claimed author. Empty means "the authenticated user".
    #[serde(default)]
    pub sender_id: String,
    /// Recipient for individual messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    /// Target group for group messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Message text
    pub content: String,
    /// Conversation kind
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

/// `message_sent` confirmation, sent only to the originating connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSent {
    /// Accepted message
    pub message_id: String,
    /// Always `sent` at confirmation time
    pub status: MessageStatus,
}

/// `message_status_update` for delivered/read transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStatusUpdate {
    /// Message whose status changed
    pub message_id: String,
    /// New status
    pub status: MessageStatus,
}

/// `mark_as_read` request from a client.
///
/// Individual chats name the counterpart via `chatId` or `senderId`; group
/// chats via `groupId` or `chatId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsRead {
    /// Conversation kind
    #[serde(rename = "type")]
    pub kind: ChatKind,
    /// Conversation identifier (counterpart user or group)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Counterpart user for individual chats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// Group for group chats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl MarkAsRead {
    /// Counterpart user (individual) or group (group) being marked read.
    pub fn target(&self) -> Option<&str> {
        let target = match self.kind {
            ChatKind::Individual => self.chat_id.as_ref().or(self.sender_id.as_ref()),
            ChatKind::Group => self.group_id.as_ref().or(self.chat_id.as_ref()),
        };
        target.map(String::as_str).filter(|id| !id.is_empty())
    }
}

/// `messages_read` notification, one per `mark_as_read` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesRead {
    /// User who read the conversation
    pub reader_id: String,
    /// Conversation kind
    pub chat_type: ChatKind,
    /// Counterpart user (individual) or group ID
    pub chat_id: String,
}

/// Server-wide announcement (`broadcast_message`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    /// Announcement text
    pub content: String,
    /// Unix milliseconds
    pub timestamp: u64,
}
