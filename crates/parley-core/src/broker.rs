//! Broker driver and connection gateway.
//!
//! Ties together the session registry, room membership, the dispatcher, and
//! typing indicators. The broker performs no I/O: each [`BrokerEvent`] is
//! turned into an ordered list of [`BrokerAction`]s that the runtime executes.
//!
//! Connections move through two states: open (unauthenticated, no rooms)
//! and bound (authenticated, in their personal room and the default group).
//! Every event other than `authenticate` is rejected on an unauthenticated
//! connection.

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use parley_proto::{
    Authenticate, Broadcast, ChatKind, ClientMessage, GroupMembershipNotice, MarkAsRead, Message,
    MessageSent, MessageStatus, MessageStatusUpdate, MessagesRead, OnlineUser, SendMessage,
    ServerMessage, TypingNotice, TypingRequest, UserPresence,
};

use crate::{
    config::BrokerConfig,
    dispatcher::Dispatcher,
    env::Environment,
    error::BrokerError,
    presence::{TypingIndicator, TypingKey, TypingTracker, TypingTransition},
    room::{RoomKey, RoomMembership},
    session::{BindOutcome, ConnectionId, Identity, Session, SessionRegistry, Unbound},
};

/// Events the broker processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// A transport connection was accepted
    ConnectionOpened {
        /// Unique connection ID assigned by the runtime
        connection: ConnectionId,
    },

    /// A decoded client event arrived on a connection
    MessageReceived {
        /// Connection that sent the event
        connection: ConnectionId,
        /// The event
        message: ClientMessage,
    },

    /// A connection was closed (by peer, error, or shutdown)
    ConnectionClosed {
        /// Connection that was closed
        connection: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// A timer armed by [`BrokerAction::ScheduleTimer`] fired
    TimerFired {
        /// Timer that fired
        timer: TimerKey,
        /// Generation the timer was armed with
        generation: u64,
    },
}

/// Actions the broker produces.
///
/// Runtimes MUST execute them in order; per-room FIFO delivery depends on it.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerAction {
    /// Push an event to one connection
    Send {
        /// Target connection
        connection: ConnectionId,
        /// Event to push
        message: ServerMessage,
    },

    /// Close a connection
    Close {
        /// Connection to close
        connection: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Arm (or re-arm) a timer. Replaces any pending timer with the same key.
    ScheduleTimer {
        /// Timer key
        timer: TimerKey,
        /// Generation to report back in [`BrokerEvent::TimerFired`]
        generation: u64,
        /// Delay from now
        after: Duration,
    },

    /// Cancel a pending timer, if any
    CancelTimer {
        /// Timer key
        timer: TimerKey,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// When the event occurred
        timestamp: Instant,
    },
}

/// Log levels for broker actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Timers the broker asks the runtime to arm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Automatic expiry of a typing indicator
    TypingExpiry(TypingKey),
}

/// Action-based chat broker.
pub struct Broker<E: Environment> {
    /// Open connections, authenticated or not
    connections: HashSet<ConnectionId>,
    sessions: SessionRegistry,
    rooms: RoomMembership,
    dispatcher: Dispatcher,
    typing: TypingTracker,
    env: E,
    config: BrokerConfig,
}

impl<E: Environment> Broker<E> {
    /// Create a new broker.
    pub fn new(env: E, config: BrokerConfig) -> Self {
        let dispatcher = Dispatcher::new(env.random_u64(), &config);
        Self {
            connections: HashSet::new(),
            sessions: SessionRegistry::new(),
            rooms: RoomMembership::new(),
            dispatcher,
            typing: TypingTracker::new(),
            env,
            config,
        }
    }

    /// Process a broker event and return actions to execute.
    ///
    /// # Errors
    ///
    /// Errors are scoped to this event. State is unchanged and the runtime
    /// should log the error and carry on.
    pub fn process_event(&mut self, event: BrokerEvent) -> Result<Vec<BrokerAction>, BrokerError> {
        match event {
            BrokerEvent::ConnectionOpened { connection } => {
                Ok(self.handle_connection_opened(connection))
            },
            BrokerEvent::MessageReceived { connection, message } => {
                self.handle_message(connection, message)
            },
            BrokerEvent::ConnectionClosed { connection, reason } => {
                Ok(self.handle_connection_closed(connection, &reason))
            },
            BrokerEvent::TimerFired { timer, generation } => {
                Ok(self.handle_timer(timer, generation))
            },
        }
    }

    fn handle_connection_opened(&mut self, connection: ConnectionId) -> Vec<BrokerAction> {
        if self.connections.contains(&connection) {
            return vec![self.log(LogLevel::Warn, format!("{connection} opened twice, ignoring"))];
        }

        if self.connections.len() >= self.config.max_connections {
            return vec![
                BrokerAction::Close { connection, reason: "max connections exceeded".to_string() },
                self.log(
                    LogLevel::Warn,
                    format!("rejected {connection}: {} connections open", self.connections.len()),
                ),
            ];
        }

        self.connections.insert(connection);
        vec![self.log(LogLevel::Debug, format!("{connection} opened"))]
    }

    fn handle_message(
        &mut self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        if !self.connections.contains(&connection) {
            return Err(BrokerError::UnknownConnection(connection));
        }

        let event = message.event();
        match message {
            ClientMessage::Authenticate(request) => self.handle_authenticate(connection, request),
            ClientMessage::SendMessage(request) => {
                let identity = self.require_identity(connection, event)?;
                self.handle_send(connection, &identity, request)
            },
            ClientMessage::TypingStart(request) => {
                let identity = self.require_identity(connection, event)?;
                self.handle_typing_start(&identity, &request)
            },
            ClientMessage::TypingStop(request) => {
                let identity = self.require_identity(connection, event)?;
                self.handle_typing_stop(&identity, &request)
            },
            ClientMessage::MarkAsRead(request) => {
                let identity = self.require_identity(connection, event)?;
                self.handle_mark_as_read(&identity, &request)
            },
            ClientMessage::JoinGroup(group) => {
                let identity = self.require_identity(connection, event)?;
                self.handle_join_group(&identity, group.group_id())
            },
            ClientMessage::LeaveGroup(group) => {
                let identity = self.require_identity(connection, event)?;
                self.handle_leave_group(&identity, group.group_id())
            },
        }
    }

    fn require_identity(
        &self,
        connection: ConnectionId,
        event: &'static str,
    ) -> Result<Identity, BrokerError> {
        self.sessions
            .identity_of(connection)
            .cloned()
            .ok_or(BrokerError::AuthenticationRequired { connection, event })
    }

    fn handle_authenticate(
        &mut self,
        connection: ConnectionId,
        request: Authenticate,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        let user_id = request.id.trim();
        if user_id.is_empty() {
            return Err(BrokerError::InvalidRequest("authenticate requires a user id".into()));
        }
        self.check_id("user id", user_id)?;
        let display_name =
            if request.name.trim().is_empty() { user_id } else { request.name.as_str() };
        if display_name.len() > self.config.max_name_len {
            return Err(BrokerError::InvalidRequest(format!(
                "display name is {} bytes, limit is {}",
                display_name.len(),
                self.config.max_name_len
            )));
        }
        let identity = Identity::new(user_id, display_name);

        let now_ms = self.env.wall_clock_millis();
        let outcome = self.sessions.authenticate(connection, identity.clone(), now_ms)?;

        self.rooms.join(&identity.id, RoomKey::personal(identity.id.as_str()));
        self.rooms.join(&identity.id, RoomKey::group(self.config.default_group.as_str()));

        let mut actions = Vec::new();
        if outcome == BindOutcome::CameOnline {
            let presence = UserPresence {
                user_id: identity.id.clone(),
                user_name: identity.display_name.clone(),
            };
            let online = ServerMessage::UserOnline(presence);
            actions.extend(fan_out(self.sessions.bound_connections(), &online));
        }
        // Paged so each snapshot frame fits; never empty, the caller is online
        let online = self.sessions.list_online();
        for page in online.chunks(self.config.online_users_page_len()) {
            actions.push(BrokerAction::Send {
                connection,
                message: ServerMessage::OnlineUsers(page.to_vec()),
            });
        }
        actions.push(self.log(
            LogLevel::Info,
            format!("{connection} authenticated as {} ({outcome:?})", identity.id),
        ));

        Ok(actions)
    }

    fn handle_send(
        &mut self,
        connection: ConnectionId,
        sender: &Identity,
        request: SendMessage,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        let now_ms = self.env.wall_clock_millis();
        let dispatch =
            self.dispatcher.send(sender, connection, request, now_ms, &self.sessions, &self.rooms)?;
        let message_id = dispatch.message.id.clone();

        let mut actions = vec![BrokerAction::Send {
            connection,
            message: ServerMessage::MessageSent(MessageSent {
                message_id: message_id.clone(),
                status: MessageStatus::Sent,
            }),
        }];

        actions.extend(fan_out(dispatch.recipients, &ServerMessage::NewMessage(dispatch.message)));

        if dispatch.delivered {
            let update = ServerMessage::MessageStatusUpdate(MessageStatusUpdate {
                message_id: message_id.clone(),
                status: MessageStatus::Delivered,
            });
            actions.extend(fan_out(dispatch.status_recipients, &update));
        }

        actions.push(self.log(
            LogLevel::Debug,
            format!("{} sent {message_id} (delivered={})", sender.id, dispatch.delivered),
        ));

        Ok(actions)
    }

    /// Reject IDs longer than the configured limit.
    fn check_id(&self, what: &str, id: &str) -> Result<(), BrokerError> {
        if id.len() > self.config.max_id_len {
            return Err(BrokerError::InvalidRequest(format!(
                "{what} is {} bytes, limit is {}",
                id.len(),
                self.config.max_id_len
            )));
        }
        Ok(())
    }

    fn typing_key(
        &self,
        identity: &Identity,
        request: &TypingRequest,
    ) -> Result<TypingKey, BrokerError> {
        let target = request
            .target()
            .ok_or_else(|| BrokerError::InvalidRequest("typing request has no target".into()))?;
        self.check_id("typing target", target)?;
        Ok(TypingKey::new(identity.id.as_str(), RoomKey::new(request.kind, target)))
    }

    fn handle_typing_start(
        &mut self,
        identity: &Identity,
        request: &TypingRequest,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        let key = self.typing_key(identity, request)?;
        let now_ms = self.env.wall_clock_millis();

        let transition = self.typing.start(key.clone(), &identity.display_name, now_ms);

        let mut actions = vec![BrokerAction::ScheduleTimer {
            timer: TimerKey::TypingExpiry(key.clone()),
            generation: transition.generation(),
            after: self.config.typing_timeout,
        }];

        if let TypingTransition::Started { .. } = transition {
            let notice = typing_notice(&key, &identity.display_name);
            actions.extend(self.typing_fan_out(&key, ServerMessage::TypingStart(notice)));
        }

        Ok(actions)
    }

    fn handle_typing_stop(
        &mut self,
        identity: &Identity,
        request: &TypingRequest,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        let key = self.typing_key(identity, request)?;

        match self.typing.stop(&key) {
            Some(indicator) => Ok(self.typing_stopped(key, &indicator)),
            None => Ok(vec![self.log(
                LogLevel::Debug,
                format!("typing_stop from idle {} in {}", key.user_id, key.room),
            )]),
        }
    }

    /// Cancel the expiry timer and broadcast `typing_stop` for an indicator
    /// that was just removed explicitly.
    fn typing_stopped(&self, key: TypingKey, indicator: &TypingIndicator) -> Vec<BrokerAction> {
        let notice = typing_notice(&key, &indicator.user_name);
        let mut actions = self.typing_fan_out(&key, ServerMessage::TypingStop(notice));
        actions.insert(0, BrokerAction::CancelTimer { timer: TimerKey::TypingExpiry(key) });
        actions
    }

    fn typing_fan_out(&self, key: &TypingKey, message: ServerMessage) -> Vec<BrokerAction> {
        let typist = Some(key.user_id.as_str());
        let recipients = self.rooms.connections_in(&key.room, &self.sessions, typist);
        fan_out(recipients, &message)
    }

    fn handle_timer(&mut self, timer: TimerKey, generation: u64) -> Vec<BrokerAction> {
        match timer {
            TimerKey::TypingExpiry(key) => match self.typing.expire(&key, generation) {
                Some(indicator) => {
                    let notice = typing_notice(&key, &indicator.user_name);
                    let mut actions = self.typing_fan_out(&key, ServerMessage::TypingStop(notice));
                    actions.push(self.log(
                        LogLevel::Debug,
                        format!("typing expired for {} in {}", key.user_id, key.room),
                    ));
                    actions
                },
                None => vec![self.log(
                    LogLevel::Debug,
                    format!(
                        "stale typing timer for {} in {} (generation {generation})",
                        key.user_id, key.room
                    ),
                )],
            },
        }
    }

    fn handle_mark_as_read(
        &mut self,
        reader: &Identity,
        request: &MarkAsRead,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        let target = request
            .target()
            .ok_or_else(|| BrokerError::InvalidRequest("mark_as_read has no chat id".into()))?;
        self.check_id("chat id", target)?;
        let room = RoomKey::new(request.kind, target);

        let read = self.dispatcher.mark_read(&reader.id, &room);

        let notice = ServerMessage::MessagesRead(MessagesRead {
            reader_id: reader.id.clone(),
            chat_type: request.kind,
            chat_id: target.to_string(),
        });
        let mut actions = fan_out(self.rooms.connections_in(&room, &self.sessions, None), &notice);
        actions.push(self.log(
            LogLevel::Debug,
            format!("{} read {} message(s) in {room}", reader.id, read.len()),
        ));

        Ok(actions)
    }

    fn handle_join_group(
        &mut self,
        identity: &Identity,
        group_id: &str,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        if group_id.trim().is_empty() {
            return Err(BrokerError::InvalidRequest("join_group requires a group id".into()));
        }
        self.check_id("group id", group_id)?;
        let room = RoomKey::group(group_id);

        if !self.rooms.join(&identity.id, room.clone()) {
            return Ok(vec![self.log(
                LogLevel::Debug,
                format!("{} already in {room}", identity.id),
            )]);
        }

        let notice = ServerMessage::UserJoinedGroup(membership_notice(identity, group_id));
        let mut actions = fan_out(self.rooms.connections_in(&room, &self.sessions, None), &notice);
        actions.push(self.log(LogLevel::Info, format!("{} joined {room}", identity.id)));

        Ok(actions)
    }

    fn handle_leave_group(
        &mut self,
        identity: &Identity,
        group_id: &str,
    ) -> Result<Vec<BrokerAction>, BrokerError> {
        if group_id.trim().is_empty() {
            return Err(BrokerError::InvalidRequest("leave_group requires a group id".into()));
        }
        self.check_id("group id", group_id)?;
        let room = RoomKey::group(group_id);

        if !self.rooms.leave(&identity.id, &room) {
            return Ok(vec![self.log(
                LogLevel::Debug,
                format!("{} not in {room}, nothing to leave", identity.id),
            )]);
        }

        let mut actions = Vec::new();
        let key = TypingKey::new(identity.id.as_str(), room.clone());
        if let Some(indicator) = self.typing.stop(&key) {
            actions.extend(self.typing_stopped(key, &indicator));
        }

        let notice = ServerMessage::UserLeftGroup(membership_notice(identity, group_id));
        actions.extend(fan_out(self.rooms.connections_in(&room, &self.sessions, None), &notice));
        actions.push(self.log(LogLevel::Info, format!("{} left {room}", identity.id)));

        Ok(actions)
    }

    /// Closing is idempotent: unknown or already-closed connections only log.
    fn handle_connection_closed(
        &mut self,
        connection: ConnectionId,
        reason: &str,
    ) -> Vec<BrokerAction> {
        let was_open = self.connections.remove(&connection);
        let now_ms = self.env.wall_clock_millis();

        let Some(Unbound { identity, went_offline }) = self.sessions.unbind(connection, now_ms)
        else {
            let level = if was_open { LogLevel::Debug } else { LogLevel::Warn };
            let state = if was_open { "unauthenticated" } else { "unknown" };
            return vec![self.log(level, format!("{state} {connection} closed: {reason}"))];
        };

        let mut actions = Vec::new();
        if went_offline {
            for (key, indicator) in self.typing.clear_user(&identity.id) {
                actions.extend(self.typing_stopped(key, &indicator));
            }

            let presence = UserPresence {
                user_id: identity.id.clone(),
                user_name: identity.display_name.clone(),
            };
            let offline = ServerMessage::UserOffline(presence);
            actions.extend(fan_out(self.sessions.bound_connections(), &offline));
        }

        actions.push(self.log(
            LogLevel::Debug,
            format!("{connection} ({}) closed: {reason}, offline={went_offline}", identity.id),
        ));

        actions
    }

    /// Push `message` to every live connection of a user.
    pub fn notify_user(&self, user_id: &str, message: ServerMessage) -> Vec<BrokerAction> {
        let connections: Vec<_> =
            self.sessions.get(user_id).map(|s| s.connections().collect()).unwrap_or_default();
        fan_out(connections, &message)
    }

    /// Push `message` to every live connection of every member of a group.
    pub fn notify_group(&self, group_id: &str, message: ServerMessage) -> Vec<BrokerAction> {
        let room = RoomKey::group(group_id);
        fan_out(self.rooms.connections_in(&room, &self.sessions, None), &message)
    }

    /// Announce `content` to every authenticated connection.
    pub fn broadcast(&self, content: impl Into<String>) -> Vec<BrokerAction> {
        let message = ServerMessage::Broadcast(Broadcast {
            content: content.into(),
            timestamp: self.env.wall_clock_millis(),
        });
        fan_out(self.sessions.bound_connections(), &message)
    }

    /// Snapshot of online users, sorted by ID.
    pub fn list_online(&self) -> Vec<OnlineUser> {
        self.sessions.list_online()
    }

    /// Session for a user, online or not.
    pub fn session(&self, user_id: &str) -> Option<&Session> {
        self.sessions.get(user_id)
    }

    /// Members of a room, sorted by user ID.
    pub fn members_of(&self, room: &RoomKey) -> Vec<String> {
        self.rooms.members_of(room).map(str::to_string).collect()
    }

    /// Retained message by ID.
    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.dispatcher.message(message_id)
    }

    /// Typing indicator for `user_id` in `room`, if active.
    pub fn typing_indicator(&self, user_id: &str, room: &RoomKey) -> Option<&TypingIndicator> {
        self.typing.get(&TypingKey::new(user_id, room.clone()))
    }

    /// Check if a connection has authenticated.
    pub fn is_authenticated(&self, connection: ConnectionId) -> bool {
        self.sessions.user_of(connection).is_some()
    }

    /// Number of open connections, authenticated or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Room membership.
    pub fn rooms(&self) -> &RoomMembership {
        &self.rooms
    }

    /// Broker configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    fn log(&self, level: LogLevel, message: String) -> BrokerAction {
        BrokerAction::Log { level, message, timestamp: self.env.now() }
    }
}

fn fan_out(connections: Vec<ConnectionId>, message: &ServerMessage) -> Vec<BrokerAction> {
    connections
        .into_iter()
        .map(|connection| BrokerAction::Send { connection, message: message.clone() })
        .collect()
}

fn typing_notice(key: &TypingKey, user_name: &str) -> TypingNotice {
    let group_id = match key.room.kind() {
        ChatKind::Individual => None,
        ChatKind::Group => Some(key.room.id().to_string()),
    };
    TypingNotice {
        user_id: key.user_id.clone(),
        user_name: user_name.to_string(),
        chat_type: key.room.kind(),
        group_id,
    }
}

fn membership_notice(identity: &Identity, group_id: &str) -> GroupMembershipNotice {
    GroupMembershipNotice {
        user_id: identity.id.clone(),
        user_name: identity.display_name.clone(),
        group_id: group_id.to_string(),
    }
}
