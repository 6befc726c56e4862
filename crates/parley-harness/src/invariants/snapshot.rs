//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the broker at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parley_core::{Broker, ConnectionId, Environment, RoomKey, SessionRegistry};
use parley_proto::MessageStatus;

/// Snapshot of the entire broker state plus client-side observations.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-user session state.
    pub sessions: Vec<SessionSnapshot>,
    /// Members of every non-empty room, as reported by the room side.
    pub rooms: Vec<RoomSnapshot>,
    /// `(user, room)` pairs as reported by the user side.
    pub memberships: BTreeSet<(String, RoomKey)>,
    /// Statuses each connection observed per message, in arrival order.
    pub observed_statuses: HashMap<(ConnectionId, String), Vec<MessageStatus>>,
}

impl SystemSnapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the broker's current state.
    pub fn from_broker<E: Environment>(broker: &Broker<E>) -> Self {
        let sessions = SessionSnapshot::all(broker.sessions());

        let mut memberships = BTreeSet::new();
        let mut rooms: BTreeMap<RoomKey, BTreeSet<String>> = BTreeMap::new();
        for session in &sessions {
            for room in broker.rooms().rooms_of(&session.user_id) {
                memberships.insert((session.user_id.clone(), room.clone()));
                rooms.entry(room.clone()).or_insert_with(|| {
                    broker.rooms().members_of(room).map(str::to_string).collect()
                });
            }
        }

        let rooms =
            rooms.into_iter().map(|(room, members)| RoomSnapshot { room, members }).collect();

        Self { sessions, rooms, memberships, observed_statuses: HashMap::new() }
    }

    /// Attach client-side status observations.
    pub fn with_observed_statuses(
        mut self,
        observed: HashMap<(ConnectionId, String), Vec<MessageStatus>>,
    ) -> Self {
        self.observed_statuses = observed;
        self
    }
}

/// Snapshot of one user's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// User ID.
    pub user_id: String,
    /// Reported online flag.
    pub online: bool,
    /// Bound connections.
    pub connections: Vec<ConnectionId>,
    /// Unix milliseconds of last connect or disconnect.
    pub last_seen: u64,
}

impl SessionSnapshot {
    fn all(registry: &SessionRegistry) -> Vec<Self> {
        let mut sessions: Vec<_> = registry
            .sessions()
            .map(|session| Self {
                user_id: session.identity().id.clone(),
                online: session.is_online(),
                connections: session.connections().collect(),
                last_seen: session.last_seen(),
            })
            .collect();
        sessions.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        sessions
    }
}

/// Snapshot of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room key.
    pub room: RoomKey,
    /// Member user IDs.
    pub members: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let snapshot = SystemSnapshot::empty();
        assert!(snapshot.sessions.is_empty());
        assert!(snapshot.rooms.is_empty());
    }
}
