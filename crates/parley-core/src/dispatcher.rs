//! Message dispatcher.
//!
//! Validates send requests, assigns IDs and timestamps, resolves the target
//! connections through room membership, and owns every message's delivery
//! status.
//!
//! # Routing
//!
//! - Individual: `members_of(user:receiver) ∪ members_of(user:sender)`. The
//!   sender's personal room gets an echo so all of the sender's devices see
//!   the message.
//! - Group: `members_of(group:id)` minus the connection the message came
//!   from. The sender's other devices receive it like any member.
//!
//! # Status
//!
//! Every transition goes through [`MessageStatus::can_advance_to`], so a
//! message can never be observed moving backwards.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use parley_proto::{ChatKind, Message, MessageStatus, SendMessage};

use crate::{
    config::BrokerConfig,
    error::BrokerError,
    room::{RoomKey, RoomMembership},
    session::{ConnectionId, Identity, SessionRegistry},
};

/// Outcome of an accepted send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// The message as pushed in `new_message` (status `sent`)
    pub message: Message,
    /// Connections that receive `new_message`, in fan-out order
    pub recipients: Vec<ConnectionId>,
    /// A live recipient other than the sender echo was reached
    pub delivered: bool,
    /// Connections that receive the `delivered` status update
    pub status_recipients: Vec<ConnectionId>,
}

/// Conversation a message belongs to, for read receipts and history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Conversation {
    /// Unordered pair of user IDs, stored sorted
    Direct(String, String),
    Group(String),
}

impl Conversation {
    fn direct(a: &str, b: &str) -> Self {
        if a <= b {
            Self::Direct(a.to_string(), b.to_string())
        } else {
            Self::Direct(b.to_string(), a.to_string())
        }
    }

    fn of(message: &Message) -> Option<Self> {
        match message.kind {
            ChatKind::Individual => {
                message.receiver_id.as_deref().map(|to| Self::direct(&message.sender_id, to))
            },
            ChatKind::Group => message.group_id.clone().map(Self::Group),
        }
    }

    fn for_room(reader_id: &str, room: &RoomKey) -> Self {
        match room.kind() {
            ChatKind::Individual => Self::direct(reader_id, room.id()),
            ChatKind::Group => Self::Group(room.id().to_string()),
        }
    }
}

/// Retained message IDs of one conversation, oldest first.
#[derive(Debug, Default)]
struct Thread {
    ids: VecDeque<String>,
    /// Recency stamp, the key of this thread in `Dispatcher::recency`
    last_used: Option<u64>,
}

/// Validated routing target of a send request.
enum Route {
    Direct(String),
    Group(String),
}

/// Message validation, routing, and status tracking.
///
/// Retains the most recent `history_limit` messages per conversation so read
/// receipts can advance their status, across at most `max_conversations`
/// conversations. Older messages and the least recently used conversations
/// are evicted and become unknown to the dispatcher.
#[derive(Debug)]
pub struct Dispatcher {
    instance: u64,
    next_seq: u64,
    max_content_len: usize,
    max_id_len: usize,
    history_limit: usize,
    max_conversations: usize,
    messages: HashMap<String, Message>,
    conversations: HashMap<Conversation, Thread>,
    /// Recency stamp to conversation, oldest first
    recency: BTreeMap<u64, Conversation>,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// `instance` is mixed into every message ID so IDs from different
    /// broker runs do not collide.
    pub fn new(instance: u64, config: &BrokerConfig) -> Self {
        Self {
            instance,
            next_seq: 0,
            max_content_len: config.max_content_len,
            max_id_len: config.max_id_len,
            history_limit: config.history_limit.max(1),
            max_conversations: config.max_conversations.max(1),
            messages: HashMap::new(),
            conversations: HashMap::new(),
            recency: BTreeMap::new(),
        }
    }

    /// Validate a send request from `sender_id`.
    ///
    /// # Errors
    ///
    /// [`BrokerError::InvalidRequest`] if the claimed sender is not the
    /// authenticated user, the content is blank or too long, the
    /// receiver/group fields do not match the kind, or the target ID is too
    /// long.
    pub fn validate(&self, sender_id: &str, request: &SendMessage) -> Result<(), BrokerError> {
        self.route(sender_id, request).map(|_| ())
    }

    fn route(&self, sender_id: &str, request: &SendMessage) -> Result<Route, BrokerError> {
        if !request.sender_id.is_empty() && request.sender_id != sender_id {
            return Err(BrokerError::InvalidRequest(format!(
                "sender {} does not match authenticated user {sender_id}",
                request.sender_id
            )));
        }
        if request.content.trim().is_empty() {
            return Err(BrokerError::InvalidRequest("message content is empty".into()));
        }
        if request.content.len() > self.max_content_len {
            return Err(BrokerError::InvalidRequest(format!(
                "message content is {} bytes, limit is {}",
                request.content.len(),
                self.max_content_len
            )));
        }

        let receiver = non_empty(request.receiver_id.as_deref());
        let group = non_empty(request.group_id.as_deref());

        let route = match (request.kind, receiver, group) {
            (ChatKind::Individual, Some(receiver), None) => Route::Direct(receiver.to_string()),
            (ChatKind::Group, None, Some(group)) => Route::Group(group.to_string()),
            (kind, ..) => {
                return Err(BrokerError::InvalidRequest(format!(
                    "{kind} message must set exactly one of {}",
                    match kind {
                        ChatKind::Individual => "receiverId",
                        ChatKind::Group => "groupId",
                    }
                )));
            },
        };

        let target = match &route {
            Route::Direct(id) | Route::Group(id) => id,
        };
        if target.len() > self.max_id_len {
            return Err(BrokerError::InvalidRequest(format!(
                "target id is {} bytes, limit is {}",
                target.len(),
                self.max_id_len
            )));
        }

        Ok(route)
    }

    /// Accept a message arriving on `origin` and compute its fan-out.
    ///
    /// `origin` gets `message_sent` from the caller instead of the group
    /// copy; every other connection of the sender is a regular recipient.
    /// The message is `sent` once this returns. If `delivered` is set on the
    /// result, the stored message has already advanced to `delivered`.
    ///
    /// # Errors
    ///
    /// See [`Self::validate`]. Nothing is stored on error.
    pub fn send(
        &mut self,
        sender: &Identity,
        origin: ConnectionId,
        request: SendMessage,
        timestamp: u64,
        sessions: &SessionRegistry,
        rooms: &RoomMembership,
    ) -> Result<Dispatch, BrokerError> {
        let route = self.route(&sender.id, &request)?;

        let (receiver_id, group_id) = match &route {
            Route::Direct(receiver) => (Some(receiver.clone()), None),
            Route::Group(group) => (None, Some(group.clone())),
        };
        let mut message = Message {
            id: self.next_id(),
            sender_id: sender.id.clone(),
            receiver_id,
            group_id,
            content: request.content,
            timestamp,
            kind: request.kind,
            status: MessageStatus::Sending,
        };
        transition(&mut message, MessageStatus::Sent)?;

        let sender_room = RoomKey::personal(sender.id.as_str());
        let sender_connections = rooms.connections_in(&sender_room, sessions, None);

        let (recipients, delivered) = match &route {
            Route::Direct(receiver) => {
                let receiver_room = RoomKey::personal(receiver.as_str());
                let reached = rooms.connections_in(&receiver_room, sessions, None);
                let delivered = !reached.is_empty();
                (merge(reached, &sender_connections), delivered)
            },
            Route::Group(group) => {
                let group_room = RoomKey::group(group.as_str());
                let others = rooms.connections_in(&group_room, sessions, Some(sender.id.as_str()));
                let delivered = !others.is_empty();
                let recipients = rooms
                    .connections_in(&group_room, sessions, None)
                    .into_iter()
                    .filter(|connection| *connection != origin)
                    .collect();
                (recipients, delivered)
            },
        };

        let pushed = message.clone();
        let status_recipients = if delivered {
            transition(&mut message, MessageStatus::Delivered)?;
            merge(recipients.clone(), &sender_connections)
        } else {
            Vec::new()
        };

        self.store(message);

        Ok(Dispatch { message: pushed, recipients, delivered, status_recipients })
    }

    /// Advance a retained message to `next`.
    ///
    /// Returns the previous status.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::UnknownMessage`] if the message is not retained
    /// - [`BrokerError::IllegalTransition`] if `next` is not the legal
    ///   successor of the current status
    pub fn advance(
        &mut self,
        message_id: &str,
        next: MessageStatus,
    ) -> Result<MessageStatus, BrokerError> {
        let message = self
            .messages
            .get_mut(message_id)
            .ok_or_else(|| BrokerError::UnknownMessage(message_id.to_string()))?;
        let previous = message.status;
        transition(message, next)?;
        Ok(previous)
    }

    /// Mark a conversation read on behalf of `reader_id`.
    ///
    /// Individual: messages from the counterpart `room.id()` addressed to
    /// the reader. Group: messages in the group not authored by the reader.
    /// Messages still `sent` pass through `delivered`. Returns the IDs that
    /// became `read`; calling again returns an empty list.
    pub fn mark_read(&mut self, reader_id: &str, room: &RoomKey) -> Vec<String> {
        let conversation = Conversation::for_room(reader_id, room);
        let Some(thread) = self.conversations.get(&conversation) else {
            return Vec::new();
        };

        let mut read = Vec::new();
        for id in &thread.ids {
            let Some(message) = self.messages.get_mut(id) else {
                continue;
            };
            let addressed_to_reader = match room.kind() {
                ChatKind::Individual => {
                    message.sender_id == room.id()
                        && message.receiver_id.as_deref() == Some(reader_id)
                },
                ChatKind::Group => message.sender_id != reader_id,
            };
            if !addressed_to_reader {
                continue;
            }

            if message.status == MessageStatus::Sent {
                message.status = MessageStatus::Delivered;
            }
            if message.status.can_advance_to(MessageStatus::Read) {
                message.status = MessageStatus::Read;
                read.push(id.clone());
            }
        }
        read
    }

    /// Retained message by ID.
    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.get(message_id)
    }

    /// Retained messages between `user_id` and `room`, oldest first.
    pub fn history(&self, user_id: &str, room: &RoomKey) -> Vec<&Message> {
        self.conversations
            .get(&Conversation::for_room(user_id, room))
            .into_iter()
            .flat_map(|thread| &thread.ids)
            .filter_map(|id| self.messages.get(id))
            .collect()
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Number of tracked conversations.
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Check if no messages are retained.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn next_id(&mut self) -> String {
        let seq = self.next_seq;
        self.next_seq += 1;
        format!("msg-{:016x}-{seq:x}", self.instance)
    }

    fn store(&mut self, message: Message) {
        let Some(conversation) = Conversation::of(&message) else {
            return;
        };
        // next_seq only grows, so it doubles as a recency stamp
        let stamp = self.next_seq;
        let thread = self.conversations.entry(conversation.clone()).or_default();
        if let Some(previous) = thread.last_used.replace(stamp) {
            self.recency.remove(&previous);
        }
        self.recency.insert(stamp, conversation);

        thread.ids.push_back(message.id.clone());
        while thread.ids.len() > self.history_limit {
            if let Some(evicted) = thread.ids.pop_front() {
                self.messages.remove(&evicted);
            }
        }
        self.messages.insert(message.id.clone(), message);

        while self.conversations.len() > self.max_conversations {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            if let Some(thread) = self.conversations.remove(&oldest) {
                for id in thread.ids {
                    self.messages.remove(&id);
                }
            }
        }
    }
}

fn transition(message: &mut Message, next: MessageStatus) -> Result<(), BrokerError> {
    if !message.status.can_advance_to(next) {
        return Err(BrokerError::IllegalTransition {
            message_id: message.id.clone(),
            from: message.status,
            to: next,
        });
    }
    message.status = next;
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Append `extra` to `base`, skipping connections already present.
fn merge(mut base: Vec<ConnectionId>, extra: &[ConnectionId]) -> Vec<ConnectionId> {
    let mut seen: HashSet<_> = base.iter().copied().collect();
    base.extend(extra.iter().copied().filter(|connection| seen.insert(*connection)));
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        sessions: SessionRegistry,
        rooms: RoomMembership,
        dispatcher: Dispatcher,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                sessions: SessionRegistry::new(),
                rooms: RoomMembership::new(),
                dispatcher: Dispatcher::new(0xabc, &BrokerConfig::default()),
            }
        }

        fn connect(&mut self, connection: u64, user_id: &str) {
            self.sessions
                .authenticate(ConnectionId(connection), Identity::new(user_id, user_id), 0)
                .unwrap();
            self.rooms.join(user_id, RoomKey::personal(user_id));
            self.rooms.join(user_id, RoomKey::group("general"));
        }

        /// Send from the sender's first connection.
        fn send(&mut self, from: &str, request: SendMessage) -> Result<Dispatch, BrokerError> {
            let origin = self
                .sessions
                .get(from)
                .and_then(|session| session.connections().next())
                .unwrap_or(ConnectionId(0));
            self.send_on(origin, from, request)
        }

        fn send_on(
            &mut self,
            origin: ConnectionId,
            from: &str,
            request: SendMessage,
        ) -> Result<Dispatch, BrokerError> {
            let sender = Identity::new(from, from);
            self.dispatcher.send(&sender, origin, request, 1_000, &self.sessions, &self.rooms)
        }
    }

    fn direct(to: &str, content: &str) -> SendMessage {
        SendMessage {
            sender_id: String::new(),
            receiver_id: Some(to.into()),
            group_id: None,
            content: content.into(),
            kind: ChatKind::Individual,
        }
    }

    fn group(group_id: &str, content: &str) -> SendMessage {
        SendMessage {
            sender_id: String::new(),
            receiver_id: None,
            group_id: Some(group_id.into()),
            content: content.into(),
            kind: ChatKind::Group,
        }
    }

    #[test]
    fn rejects_blank_content() {
        let fixture = Fixture::new();
        let result = fixture.dispatcher.validate("u1", &direct("u2", "   "));
        assert!(matches!(result, Err(BrokerError::InvalidRequest(_))));
    }

    #[test]
    fn rejects_mismatched_target_fields() {
        let fixture = Fixture::new();

        let mut both = direct("u2", "hi");
        both.group_id = Some("general".into());
        assert!(fixture.dispatcher.validate("u1", &both).is_err());

        let mut neither = group("general", "hi");
        neither.group_id = None;
        assert!(fixture.dispatcher.validate("u1", &neither).is_err());

        let mut wrong_kind = direct("u2", "hi");
        wrong_kind.kind = ChatKind::Group;
        assert!(fixture.dispatcher.validate("u1", &wrong_kind).is_err());

        let mut empty_receiver = direct("", "hi");
        empty_receiver.receiver_id = Some(String::new());
        assert!(fixture.dispatcher.validate("u1", &empty_receiver).is_err());
    }

    #[test]
    fn rejects_spoofed_sender() {
        let fixture = Fixture::new();
        let mut request = direct("u2", "hi");
        request.sender_id = "u3".into();

        assert!(fixture.dispatcher.validate("u1", &request).is_err());

        request.sender_id = "u1".into();
        assert!(fixture.dispatcher.validate("u1", &request).is_ok());
    }

    #[test]
    fn rejects_oversized_content() {
        let fixture = Fixture::new();
        let request = direct("u2", &"x".repeat(BrokerConfig::default().max_content_len + 1));
        assert!(fixture.dispatcher.validate("u1", &request).is_err());
    }

    #[test]
    fn invalid_send_stores_nothing() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");

        assert!(fixture.send("u1", direct("u2", "")).is_err());
        assert!(fixture.dispatcher.is_empty());
    }

    #[test]
    fn individual_send_reaches_both_personal_rooms() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");
        fixture.connect(2, "u2");

        let dispatch = fixture.send("u1", direct("u2", "hi")).unwrap();

        assert_eq!(dispatch.recipients, vec![ConnectionId(2), ConnectionId(1)]);
        assert!(dispatch.delivered);
        assert_eq!(dispatch.message.status, MessageStatus::Sent);
        assert_eq!(dispatch.message.timestamp, 1_000);
        assert_eq!(
            fixture.dispatcher.message(&dispatch.message.id).unwrap().status,
            MessageStatus::Delivered
        );
    }

    #[test]
    fn offline_receiver_leaves_message_sent() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");

        let dispatch = fixture.send("u1", direct("u2", "hi")).unwrap();

        assert_eq!(dispatch.recipients, vec![ConnectionId(1)]);
        assert!(!dispatch.delivered);
        assert!(dispatch.status_recipients.is_empty());
        assert_eq!(
            fixture.dispatcher.message(&dispatch.message.id).unwrap().status,
            MessageStatus::Sent
        );
    }

    #[test]
    fn group_send_excludes_sending_connection() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");
        fixture.connect(2, "u2");
        fixture.connect(3, "u3");

        let dispatch = fixture.send("u2", group("general", "hello")).unwrap();

        assert_eq!(dispatch.recipients, vec![ConnectionId(1), ConnectionId(3)]);
        assert_eq!(dispatch.status_recipients, vec![
            ConnectionId(1),
            ConnectionId(3),
            ConnectionId(2)
        ]);
    }

    #[test]
    fn group_send_reaches_senders_other_devices() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");
        fixture.connect(2, "u2");
        fixture.connect(3, "u2");

        let dispatch = fixture.send_on(ConnectionId(2), "u2", group("general", "hello")).unwrap();

        assert_eq!(dispatch.recipients, vec![ConnectionId(1), ConnectionId(3)]);
        assert_eq!(dispatch.status_recipients, vec![
            ConnectionId(1),
            ConnectionId(3),
            ConnectionId(2)
        ]);
    }

    #[test]
    fn group_send_with_only_own_devices_is_not_delivered() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");
        fixture.connect(2, "u1");

        let dispatch = fixture.send_on(ConnectionId(1), "u1", group("general", "echo?")).unwrap();

        assert_eq!(dispatch.recipients, vec![ConnectionId(2)]);
        assert!(!dispatch.delivered);
        assert!(dispatch.status_recipients.is_empty());
    }

    #[test]
    fn rejects_oversized_target_id() {
        let fixture = Fixture::new();
        let long = "x".repeat(BrokerConfig::default().max_id_len + 1);

        assert!(fixture.dispatcher.validate("u1", &direct(&long, "hi")).is_err());
        assert!(fixture.dispatcher.validate("u1", &group(&long, "hi")).is_err());
    }

    #[test]
    fn least_recently_used_conversation_is_evicted() {
        let config = BrokerConfig { max_conversations: 2, ..Default::default() };
        let mut fixture = Fixture::new();
        fixture.dispatcher = Dispatcher::new(1, &config);
        fixture.connect(1, "u1");

        let to_a = fixture.send("u1", direct("a", "1")).unwrap().message.id;
        let to_b = fixture.send("u1", direct("b", "2")).unwrap().message.id;
        fixture.send("u1", direct("a", "3")).unwrap();
        fixture.send("u1", direct("c", "4")).unwrap();

        assert_eq!(fixture.dispatcher.conversation_count(), 2);
        assert!(fixture.dispatcher.message(&to_b).is_none());
        assert!(fixture.dispatcher.message(&to_a).is_some());
        assert!(fixture.dispatcher.history("u1", &RoomKey::personal("b")).is_empty());
    }

    #[test]
    fn group_send_to_unknown_group_is_accepted() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");

        let dispatch = fixture.send("u1", group("nowhere", "anyone?")).unwrap();

        assert!(dispatch.recipients.is_empty());
        assert!(!dispatch.delivered);
    }

    #[test]
    fn message_ids_are_unique() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");

        let a = fixture.send("u1", group("general", "one")).unwrap();
        let b = fixture.send("u1", group("general", "two")).unwrap();

        assert_ne!(a.message.id, b.message.id);
    }

    #[test]
    fn advance_rejects_backwards_and_skips() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");
        fixture.connect(2, "u2");
        let id = fixture.send("u1", direct("u2", "hi")).unwrap().message.id;

        assert!(matches!(
            fixture.dispatcher.advance(&id, MessageStatus::Sent),
            Err(BrokerError::IllegalTransition { .. })
        ));
        assert_eq!(
            fixture.dispatcher.advance(&id, MessageStatus::Read),
            Ok(MessageStatus::Delivered)
        );
        assert!(fixture.dispatcher.advance(&id, MessageStatus::Failed).is_err());
        assert_eq!(
            fixture.dispatcher.advance("missing", MessageStatus::Read),
            Err(BrokerError::UnknownMessage("missing".into()))
        );
    }

    #[test]
    fn mark_read_individual_only_touches_counterpart_messages() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");
        fixture.connect(2, "u2");
        let incoming = fixture.send("u1", direct("u2", "to u2")).unwrap().message.id;
        let outgoing = fixture.send("u2", direct("u1", "to u1")).unwrap().message.id;

        let read = fixture.dispatcher.mark_read("u2", &RoomKey::personal("u1"));

        assert_eq!(read, vec![incoming.clone()]);
        assert_eq!(fixture.dispatcher.message(&incoming).unwrap().status, MessageStatus::Read);
        assert_eq!(fixture.dispatcher.message(&outgoing).unwrap().status, MessageStatus::Delivered);
    }

    #[test]
    fn mark_read_advances_sent_through_delivered() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");
        let id = fixture.send("u1", direct("u2", "later")).unwrap().message.id;

        let read = fixture.dispatcher.mark_read("u2", &RoomKey::personal("u1"));

        assert_eq!(read, vec![id.clone()]);
        assert_eq!(fixture.dispatcher.message(&id).unwrap().status, MessageStatus::Read);
    }

    #[test]
    fn mark_read_group_is_idempotent() {
        let mut fixture = Fixture::new();
        fixture.connect(1, "u1");
        fixture.connect(2, "u2");
        fixture.send("u1", group("general", "a")).unwrap();
        fixture.send("u2", group("general", "b")).unwrap();
        fixture.send("u1", group("general", "c")).unwrap();

        let first = fixture.dispatcher.mark_read("u2", &RoomKey::group("general"));
        let second = fixture.dispatcher.mark_read("u2", &RoomKey::group("general"));

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        let own = fixture
            .dispatcher
            .history("u2", &RoomKey::group("general"))
            .into_iter()
            .find(|m| m.sender_id == "u2")
            .unwrap();
        assert_eq!(own.status, MessageStatus::Delivered);
    }

    #[test]
    fn history_evicts_oldest_beyond_limit() {
        let config = BrokerConfig { history_limit: 2, ..Default::default() };
        let mut fixture = Fixture::new();
        fixture.dispatcher = Dispatcher::new(1, &config);
        fixture.connect(1, "u1");

        let first = fixture.send("u1", group("general", "1")).unwrap().message.id;
        fixture.send("u1", group("general", "2")).unwrap();
        fixture.send("u1", group("general", "3")).unwrap();

        assert!(fixture.dispatcher.message(&first).is_none());
        assert_eq!(fixture.dispatcher.len(), 2);
        let contents: Vec<_> = fixture
            .dispatcher
            .history("u1", &RoomKey::group("general"))
            .into_iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["2", "3"]);
    }
}
