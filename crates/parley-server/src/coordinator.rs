//! Broker coordinator.
//!
//! A single Tokio task owns the [`Broker`] and every piece of mutable broker
//! state. Connection tasks talk to it through a [`CoordinatorHandle`]: client
//! events, closes, and read-only queries are commands on one channel, so
//! mutations are serialized and queries always observe a consistent state.
//!
//! Actions are executed in the order the broker returns them. Sends land on
//! a bounded per-connection [`Outbound`] queue drained by that connection's
//! writer task. The coordinator never waits on a queue: a client that lets
//! its queue fill up is closed as a slow consumer, so it can neither stall
//! other clients nor grow memory without limit.
//!
//! Typing expiry timers are spawned sleeps that report back as
//! [`BrokerEvent::TimerFired`]. Re-arming or cancelling a timer aborts the
//! pending task; a late fire that slips past the abort is discarded by the
//! broker's generation check.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parley_core::{
    Broker, BrokerAction, BrokerEvent, ConnectionId, Environment, LogLevel, RoomKey, Session,
    TimerKey,
};
use parley_proto::{ClientMessage, OnlineUser, ServerMessage};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot,
    },
    task::{AbortHandle, JoinHandle},
};

use crate::error::ServerError;

/// Item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Write an event to the client
    Event(ServerMessage),
    /// Close the connection after flushing earlier events
    Close(String),
}

/// Events queued for one connection before it is closed as a slow consumer.
pub const OUTBOUND_CAPACITY: usize = 1024;

/// Sending half of a connection's outbound queue.
pub type OutboundSender = mpsc::Sender<Outbound>;

/// Receiving half of a connection's outbound queue.
pub type OutboundReceiver = mpsc::Receiver<Outbound>;

/// Create an outbound queue holding [`OUTBOUND_CAPACITY`] items.
pub fn outbound_queue() -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

enum Command {
    Open { connection: ConnectionId, outbound: OutboundSender },
    Receive { connection: ConnectionId, message: ClientMessage },
    Close { connection: ConnectionId, reason: String },
    TimerFired { timer: TimerKey, generation: u64 },
    NotifyUser { user_id: String, message: ServerMessage },
    NotifyGroup { group_id: String, message: ServerMessage },
    Broadcast { content: String },
    ListOnline(oneshot::Sender<Vec<OnlineUser>>),
    Session { user_id: String, reply: oneshot::Sender<Option<Session>> },
    MembersOf { room: RoomKey, reply: oneshot::Sender<Vec<String>> },
    Shutdown,
}

/// Cloneable handle to a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    next_connection: Arc<AtomicU64>,
}

impl CoordinatorHandle {
    /// Allocate an ID for a freshly accepted connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a connection and its outbound queue.
    pub fn open(
        &self,
        connection: ConnectionId,
        outbound: OutboundSender,
    ) -> Result<(), ServerError> {
        self.send(Command::Open { connection, outbound })
    }

    /// Deliver a decoded client event.
    pub fn receive(
        &self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), ServerError> {
        self.send(Command::Receive { connection, message })
    }

    /// Report that a connection ended.
    pub fn close(
        &self,
        connection: ConnectionId,
        reason: impl Into<String>,
    ) -> Result<(), ServerError> {
        self.send(Command::Close { connection, reason: reason.into() })
    }

    /// Push an event to every connection of a user.
    pub fn notify_user(
        &self,
        user_id: impl Into<String>,
        message: ServerMessage,
    ) -> Result<(), ServerError> {
        self.send(Command::NotifyUser { user_id: user_id.into(), message })
    }

    /// Push an event to every connection of every member of a group.
    pub fn notify_group(
        &self,
        group_id: impl Into<String>,
        message: ServerMessage,
    ) -> Result<(), ServerError> {
        self.send(Command::NotifyGroup { group_id: group_id.into(), message })
    }

    /// Announce `content` to every authenticated connection.
    pub fn broadcast(&self, content: impl Into<String>) -> Result<(), ServerError> {
        self.send(Command::Broadcast { content: content.into() })
    }

    /// Users currently online, sorted by ID.
    pub async fn list_online(&self) -> Result<Vec<OnlineUser>, ServerError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::ListOnline(reply))?;
        response.await.map_err(|_| stopped())
    }

    /// Session of a user, online or not.
    pub async fn session(
        &self,
        user_id: impl Into<String>,
    ) -> Result<Option<Session>, ServerError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Session { user_id: user_id.into(), reply })?;
        response.await.map_err(|_| stopped())
    }

    /// Members of a room, sorted by user ID.
    pub async fn members_of(&self, room: RoomKey) -> Result<Vec<String>, ServerError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::MembersOf { room, reply })?;
        response.await.map_err(|_| stopped())
    }

    /// Ask the coordinator to close every connection and stop.
    pub fn shutdown(&self) -> Result<(), ServerError> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<(), ServerError> {
        self.commands.send(command).map_err(|_| stopped())
    }
}

fn stopped() -> ServerError {
    ServerError::Internal("coordinator stopped".to_string())
}

/// Owner of the broker and of every connection's outbound queue.
pub struct Coordinator<E: Environment> {
    broker: Broker<E>,
    outbound: HashMap<ConnectionId, OutboundSender>,
    timers: HashMap<TimerKey, (u64, AbortHandle)>,
    handle: CoordinatorHandle,
}

impl<E: Environment> Coordinator<E> {
    /// Spawn the coordinator task on the current Tokio runtime.
    pub fn spawn(broker: Broker<E>) -> (CoordinatorHandle, JoinHandle<()>) {
        let (commands, inbox) = mpsc::unbounded_channel();
        let handle = CoordinatorHandle { commands, next_connection: Arc::new(AtomicU64::new(1)) };

        let coordinator = Self {
            broker,
            outbound: HashMap::new(),
            timers: HashMap::new(),
            handle: handle.clone(),
        };

        (handle, tokio::spawn(coordinator.run(inbox)))
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        // The coordinator holds a sender for timer callbacks, so the inbox
        // only ends on an explicit shutdown.
        while let Some(command) = inbox.recv().await {
            if matches!(command, Command::Shutdown) {
                break;
            }
            self.handle_command(command);
        }

        self.shutdown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Open { connection, outbound } => {
                self.outbound.insert(connection, outbound);
                self.process(BrokerEvent::ConnectionOpened { connection });
            },
            Command::Receive { connection, message } => {
                self.process(BrokerEvent::MessageReceived { connection, message });
            },
            Command::Close { connection, reason } => {
                // Already torn down if the broker closed it first
                if self.outbound.remove(&connection).is_some() {
                    self.process(BrokerEvent::ConnectionClosed { connection, reason });
                }
            },
            Command::TimerFired { timer, generation } => {
                if self.timers.get(&timer).is_some_and(|(armed, _)| *armed == generation) {
                    self.timers.remove(&timer);
                }
                self.process(BrokerEvent::TimerFired { timer, generation });
            },
            Command::NotifyUser { user_id, message } => {
                let actions = self.broker.notify_user(&user_id, message);
                self.execute(actions);
            },
            Command::NotifyGroup { group_id, message } => {
                let actions = self.broker.notify_group(&group_id, message);
                self.execute(actions);
            },
            Command::Broadcast { content } => {
                let actions = self.broker.broadcast(content);
                self.execute(actions);
            },
            Command::ListOnline(reply) => {
                let _ = reply.send(self.broker.list_online());
            },
            Command::Session { user_id, reply } => {
                let _ = reply.send(self.broker.session(&user_id).cloned());
            },
            Command::MembersOf { room, reply } => {
                let _ = reply.send(self.broker.members_of(&room));
            },
            Command::Shutdown => {},
        }
    }

    fn process(&mut self, event: BrokerEvent) {
        match self.broker.process_event(event) {
            Ok(actions) => self.execute(actions),
            Err(e) if e.is_client_error() => tracing::debug!(error = %e, "rejected client event"),
            Err(e) => tracing::warn!(error = %e, "broker event failed"),
        }
    }

    fn execute(&mut self, actions: Vec<BrokerAction>) {
        let mut queue: VecDeque<_> = actions.into();

        while let Some(action) = queue.pop_front() {
            match action {
                BrokerAction::Send { connection, message } => {
                    let Some(outbound) = self.outbound.get(&connection) else {
                        let event = message.event();
                        tracing::debug!(%connection, event, "send to closed connection");
                        continue;
                    };
                    match outbound.try_send(Outbound::Event(message)) {
                        Ok(()) => {},
                        Err(TrySendError::Full(_)) => {
                            tracing::warn!(%connection, "outbound queue full, closing");
                            let reason = "slow consumer".to_string();
                            queue.push_front(BrokerAction::Close { connection, reason });
                        },
                        Err(TrySendError::Closed(_)) => {
                            tracing::debug!(%connection, "writer gone, dropping event");
                        },
                    }
                },
                BrokerAction::Close { connection, reason } => {
                    // A full queue cannot take the close; dropping the sender
                    // still ends the writer once it drains
                    if let Some(outbound) = self.outbound.remove(&connection) {
                        let _ = outbound.try_send(Outbound::Close(reason.clone()));
                    }
                    let event = BrokerEvent::ConnectionClosed { connection, reason };
                    match self.broker.process_event(event) {
                        Ok(actions) => queue.extend(actions),
                        Err(e) => tracing::warn!(%connection, error = %e, "close failed"),
                    }
                },
                BrokerAction::ScheduleTimer { timer, generation, after } => {
                    let env = self.broker.env().clone();
                    let handle = self.handle.clone();
                    let key = timer.clone();
                    let task = tokio::spawn(async move {
                        env.sleep(after).await;
                        let _ = handle.send(Command::TimerFired { timer: key, generation });
                    });

                    if let Some((_, previous)) =
                        self.timers.insert(timer, (generation, task.abort_handle()))
                    {
                        previous.abort();
                    }
                },
                BrokerAction::CancelTimer { timer } => {
                    if let Some((_, pending)) = self.timers.remove(&timer) {
                        pending.abort();
                    }
                },
                BrokerAction::Log { level, message, .. } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
            }
        }
    }

    fn shutdown(&mut self) {
        for (_, (_, pending)) in self.timers.drain() {
            pending.abort();
        }
        for (_, outbound) in self.outbound.drain() {
            let _ = outbound.try_send(Outbound::Close("server shutting down".to_string()));
        }
        tracing::info!("coordinator stopped");
    }
}
