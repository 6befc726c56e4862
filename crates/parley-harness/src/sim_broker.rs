//! Simulated broker runtime.
//!
//! `SimBroker` wraps [`Broker`] the same way the production server does, but
//! executes actions in memory: pushed events land in per-connection outboxes
//! and timers fire when the test advances virtual time. Tests drive it
//! explicitly; nothing runs in the background.

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use parley_core::{
    Broker, BrokerAction, BrokerConfig, BrokerError, BrokerEvent, ConnectionId, LogLevel, TimerKey,
};
use parley_proto::{Authenticate, ClientMessage, MessageStatus, ServerMessage};

use crate::{SimEnv, invariants::SystemSnapshot};

/// Timer armed by the broker, in virtual time since the env was created.
#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    deadline: Duration,
    generation: u64,
}

/// In-memory runtime for a [`Broker`] on a [`SimEnv`].
pub struct SimBroker {
    broker: Broker<SimEnv>,
    env: SimEnv,
    /// Events pushed to each connection, in delivery order
    outboxes: HashMap<ConnectionId, Vec<ServerMessage>>,
    /// Connections closed by the broker, with reason
    closed: HashMap<ConnectionId, String>,
    timers: HashMap<TimerKey, PendingTimer>,
    /// Statuses each connection observed per message
    observed: HashMap<(ConnectionId, String), Vec<MessageStatus>>,
    next_connection: u64,
}

impl SimBroker {
    /// Create a broker with default config.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, BrokerConfig::default())
    }

    /// Create a broker with custom config.
    pub fn with_config(seed: u64, config: BrokerConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        Self {
            broker: Broker::new(env.clone(), config),
            env,
            outboxes: HashMap::new(),
            closed: HashMap::new(),
            timers: HashMap::new(),
            observed: HashMap::new(),
            next_connection: 1,
        }
    }

    /// Open a new unauthenticated connection.
    pub fn open(&mut self) -> ConnectionId {
        let connection = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.outboxes.insert(connection, Vec::new());

        if let Err(e) = self.process(BrokerEvent::ConnectionOpened { connection }) {
            tracing::warn!(%connection, error = %e, "open failed");
        }
        connection
    }

    /// Open a connection and authenticate it as `user_id`.
    ///
    /// # Panics
    ///
    /// If authentication is rejected.
    #[allow(clippy::panic, reason = "test harness surfaces rejections as test failures")]
    pub fn connect(&mut self, user_id: &str, name: &str) -> ConnectionId {
        let connection = self.open();
        let request = Authenticate { id: user_id.to_string(), name: name.to_string() };
        self.send(connection, ClientMessage::Authenticate(request))
            .unwrap_or_else(|e| panic!("authenticating {user_id} on {connection} failed: {e}"));
        connection
    }

    /// Deliver a client event from `connection`.
    ///
    /// # Errors
    ///
    /// The broker's error for this event. Nothing was pushed.
    pub fn send(
        &mut self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), BrokerError> {
        self.process(BrokerEvent::MessageReceived { connection, message })
    }

    /// Close a connection from the client side.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        let event =
            BrokerEvent::ConnectionClosed { connection, reason: "client disconnected".into() };
        if let Err(e) = self.process(event) {
            tracing::warn!(%connection, error = %e, "disconnect failed");
        }
    }

    /// Advance virtual time, firing every timer that comes due on the way.
    ///
    /// Timers fire in deadline order with the clock set to their deadline.
    pub fn advance(&mut self, duration: Duration) {
        let target = self.env.elapsed() + duration;

        while let Some((timer, pending)) = self.next_due(target) {
            self.timers.remove(&timer);
            let now = self.env.elapsed();
            if pending.deadline > now {
                self.env.advance(pending.deadline - now);
            }

            let event = BrokerEvent::TimerFired { timer, generation: pending.generation };
            if let Err(e) = self.process(event) {
                tracing::warn!(error = %e, "timer event failed");
            }
        }

        let now = self.env.elapsed();
        if target > now {
            self.env.advance(target - now);
        }
    }

    fn next_due(&self, target: Duration) -> Option<(TimerKey, PendingTimer)> {
        self.timers
            .iter()
            .filter(|(_, pending)| pending.deadline <= target)
            .min_by_key(|(_, pending)| (pending.deadline, pending.generation))
            .map(|(timer, pending)| (timer.clone(), *pending))
    }

    /// Execute actions produced outside event processing, e.g. by
    /// [`Broker::notify_user`].
    pub fn execute(&mut self, actions: Vec<BrokerAction>) {
        let mut queue: VecDeque<_> = actions.into();

        while let Some(action) = queue.pop_front() {
            match action {
                BrokerAction::Send { connection, message } => self.deliver(connection, message),
                BrokerAction::Close { connection, reason } => {
                    self.closed.insert(connection, reason.clone());
                    let event = BrokerEvent::ConnectionClosed { connection, reason };
                    match self.broker.process_event(event) {
                        Ok(actions) => queue.extend(actions),
                        Err(e) => tracing::warn!(%connection, error = %e, "close failed"),
                    }
                },
                BrokerAction::ScheduleTimer { timer, generation, after } => {
                    let deadline = self.env.elapsed() + after;
                    self.timers.insert(timer, PendingTimer { deadline, generation });
                },
                BrokerAction::CancelTimer { timer } => {
                    self.timers.remove(&timer);
                },
                BrokerAction::Log { level, message, .. } => log(level, &message),
            }
        }
    }

    fn process(&mut self, event: BrokerEvent) -> Result<(), BrokerError> {
        let actions = self.broker.process_event(event)?;
        self.execute(actions);
        Ok(())
    }

    fn deliver(&mut self, connection: ConnectionId, message: ServerMessage) {
        if self.closed.contains_key(&connection) {
            return;
        }

        let observed = match &message {
            ServerMessage::NewMessage(m) => Some((m.id.clone(), m.status)),
            ServerMessage::MessageSent(s) => Some((s.message_id.clone(), s.status)),
            ServerMessage::MessageStatusUpdate(u) => Some((u.message_id.clone(), u.status)),
            _ => None,
        };
        if let Some((message_id, status)) = observed {
            self.observed.entry((connection, message_id)).or_default().push(status);
        }

        self.outboxes.entry(connection).or_default().push(message);
    }

    /// Events pushed to a connection so far.
    pub fn outbox(&self, connection: ConnectionId) -> &[ServerMessage] {
        self.outboxes.get(&connection).map(Vec::as_slice).unwrap_or_default()
    }

    /// Drain a connection's outbox.
    pub fn take_outbox(&mut self, connection: ConnectionId) -> Vec<ServerMessage> {
        self.outboxes.get_mut(&connection).map(std::mem::take).unwrap_or_default()
    }

    /// Drain every outbox.
    pub fn clear_outboxes(&mut self) {
        self.outboxes.values_mut().for_each(Vec::clear);
    }

    /// Event names pushed to a connection so far.
    pub fn events(&self, connection: ConnectionId) -> Vec<&'static str> {
        self.outbox(connection).iter().map(ServerMessage::event).collect()
    }

    /// Close reason if the broker closed this connection.
    pub fn close_reason(&self, connection: ConnectionId) -> Option<&str> {
        self.closed.get(&connection).map(String::as_str)
    }

    /// Number of armed timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Statuses `connection` observed for `message_id`, in order.
    pub fn observed_statuses(
        &self,
        connection: ConnectionId,
        message_id: &str,
    ) -> &[MessageStatus] {
        let key = (connection, message_id.to_string());
        self.observed.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Underlying broker.
    pub fn broker(&self) -> &Broker<SimEnv> {
        &self.broker
    }

    /// Simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Snapshot broker state and client observations for invariant checks.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_broker(&self.broker).with_observed_statuses(self.observed.clone())
    }
}

fn log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!("{}", message),
        LogLevel::Info => tracing::info!("{}", message),
        LogLevel::Warn => tracing::warn!("{}", message),
        LogLevel::Error => tracing::error!("{}", message),
    }
}
