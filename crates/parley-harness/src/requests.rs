//! Builders for client events.

use parley_proto::{
    Authenticate, ChatKind, ClientMessage, GroupRef, MarkAsRead, SendMessage, TypingRequest,
};

/// `authenticate`.
pub fn authenticate(user_id: &str, name: &str) -> ClientMessage {
    ClientMessage::Authenticate(Authenticate { id: user_id.into(), name: name.into() })
}

/// Individual `send_message` to `receiver_id`.
pub fn direct(receiver_id: &str, content: &str) -> ClientMessage {
    ClientMessage::SendMessage(SendMessage {
        sender_id: String::new(),
        receiver_id: Some(receiver_id.into()),
        group_id: None,
        content: content.into(),
        kind: ChatKind::Individual,
    })
}

/// Group `send_message` to `group_id`.
pub fn group(group_id: &str, content: &str) -> ClientMessage {
    ClientMessage::SendMessage(SendMessage {
        sender_id: String::new(),
        receiver_id: None,
        group_id: Some(group_id.into()),
        content: content.into(),
        kind: ChatKind::Group,
    })
}

fn typing(kind: ChatKind, target: &str) -> TypingRequest {
    let (receiver_id, group_id) = match kind {
        ChatKind::Individual => (Some(target.to_string()), None),
        ChatKind::Group => (None, Some(target.to_string())),
    };
    TypingRequest { kind, receiver_id, group_id, target_id: None }
}

/// `typing_start` in a direct chat with `receiver_id`.
pub fn typing_start_direct(receiver_id: &str) -> ClientMessage {
    ClientMessage::TypingStart(typing(ChatKind::Individual, receiver_id))
}

/// `typing_start` in a group.
pub fn typing_start_group(group_id: &str) -> ClientMessage {
    ClientMessage::TypingStart(typing(ChatKind::Group, group_id))
}

/// `typing_stop` in a direct chat with `receiver_id`.
pub fn typing_stop_direct(receiver_id: &str) -> ClientMessage {
    ClientMessage::TypingStop(typing(ChatKind::Individual, receiver_id))
}

/// `typing_stop` in a group.
pub fn typing_stop_group(group_id: &str) -> ClientMessage {
    ClientMessage::TypingStop(typing(ChatKind::Group, group_id))
}

/// `mark_as_read` for the direct chat with `counterpart_id`.
pub fn read_direct(counterpart_id: &str) -> ClientMessage {
    ClientMessage::MarkAsRead(MarkAsRead {
        kind: ChatKind::Individual,
        chat_id: Some(counterpart_id.into()),
        sender_id: None,
        group_id: None,
    })
}

/// `mark_as_read` for a group.
pub fn read_group(group_id: &str) -> ClientMessage {
    ClientMessage::MarkAsRead(MarkAsRead {
        kind: ChatKind::Group,
        chat_id: None,
        sender_id: None,
        group_id: Some(group_id.into()),
    })
}

/// `join_group`.
pub fn join(group_id: &str) -> ClientMessage {
    ClientMessage::JoinGroup(GroupRef::Id(group_id.into()))
}

/// `leave_group`.
pub fn leave(group_id: &str) -> ClientMessage {
    ClientMessage::LeaveGroup(GroupRef::Id(group_id.into()))
}
