//! Session registry.
//!
//! Maps a user identity to the set of live connections bound to it. A user
//! is online exactly when that set is non-empty; the registry never stores a
//! separate online flag that could drift from the connection set.
//!
//! Sessions are retained after going offline so `last_seen` survives
//! reconnects.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use parley_proto::OnlineUser;

use crate::error::BrokerError;

/// Opaque identifier of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user ID
    pub id: String,
    /// Display name, refreshed on every authenticate
    pub display_name: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { id: id.into(), display_name: display_name.into() }
    }

    /// Entry for the `online_users` snapshot.
    pub fn to_online_user(&self) -> OnlineUser {
        OnlineUser { id: self.id.clone(), name: self.display_name.clone() }
    }
}

/// Per-user session state.
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
    connections: BTreeSet<ConnectionId>,
    last_seen: u64,
}

impl Session {
    /// User identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Online iff at least one live connection is bound.
    pub fn is_online(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Live connections, in ascending ID order.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().copied()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Unix milliseconds of the last connect or disconnect.
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }
}

/// Result of binding a connection to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// First live connection for this user: offline -> online
    CameOnline,
    /// User already had other live connections
    AlreadyOnline,
}

/// Result of unbinding a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unbound {
    /// Identity the connection was bound to
    pub identity: Identity,
    /// That was the user's last connection: online -> offline
    pub went_offline: bool,
}

/// Identity to connections registry.
///
/// # Invariants
///
/// - A connection is bound to at most one user
/// - `user_of(c) == Some(u)` iff `c` is in `get(u).connections()`
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    bindings: HashMap<ConnectionId, String>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `connection` to `identity`, creating the session on first sight.
    ///
    /// Refreshes the display name and `last_seen`.
    ///
    /// # Errors
    ///
    /// [`BrokerError::DuplicateConnection`] if the connection is already
    /// bound (to this or another user). Registry state is unchanged.
    pub fn authenticate(
        &mut self,
        connection: ConnectionId,
        identity: Identity,
        now_ms: u64,
    ) -> Result<BindOutcome, BrokerError> {
        if let Some(user_id) = self.bindings.get(&connection) {
            return Err(BrokerError::DuplicateConnection { connection, user_id: user_id.clone() });
        }

        let session = self.sessions.entry(identity.id.clone()).or_insert_with(|| Session {
            identity: identity.clone(),
            connections: BTreeSet::new(),
            last_seen: now_ms,
        });

        let outcome =
            if session.is_online() { BindOutcome::AlreadyOnline } else { BindOutcome::CameOnline };

        session.identity.display_name = identity.display_name;
        session.connections.insert(connection);
        session.last_seen = now_ms;
        self.bindings.insert(connection, identity.id);

        Ok(outcome)
    }

    /// Remove `connection` from whichever session it is bound to.
    ///
    /// Returns `None` for connections that never authenticated.
    pub fn unbind(&mut self, connection: ConnectionId, now_ms: u64) -> Option<Unbound> {
        let user_id = self.bindings.remove(&connection)?;
        let session = self.sessions.get_mut(&user_id)?;

        session.connections.remove(&connection);
        session.last_seen = now_ms;

        Some(Unbound { identity: session.identity.clone(), went_offline: !session.is_online() })
    }

    /// Session for a user, online or not.
    pub fn get(&self, user_id: &str) -> Option<&Session> {
        self.sessions.get(user_id)
    }

    /// User bound to a connection.
    pub fn user_of(&self, connection: ConnectionId) -> Option<&str> {
        self.bindings.get(&connection).map(String::as_str)
    }

    /// Identity bound to a connection.
    pub fn identity_of(&self, connection: ConnectionId) -> Option<&Identity> {
        self.user_of(connection).and_then(|user_id| self.get(user_id)).map(Session::identity)
    }

    /// Check if a user has at least one live connection.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.get(user_id).is_some_and(Session::is_online)
    }

    /// Snapshot of online users, sorted by ID.
    pub fn list_online(&self) -> Vec<OnlineUser> {
        let mut online: Vec<_> = self
            .sessions
            .values()
            .filter(|session| session.is_online())
            .map(|session| session.identity.to_online_user())
            .collect();
        online.sort();
        online
    }

    /// Every authenticated connection, in ascending ID order.
    pub fn bound_connections(&self) -> Vec<ConnectionId> {
        let mut connections: Vec<_> = self.bindings.keys().copied().collect();
        connections.sort_unstable();
        connections
    }

    /// Iterate over all sessions, online or not.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Number of known sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of online users.
    pub fn online_count(&self) -> usize {
        self.sessions.values().filter(|session| session.is_online()).count()
    }
}
