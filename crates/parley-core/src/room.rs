//! Room membership.
//!
//! A room is either a user's personal room (`user:<id>`) or a named group
//! (`group:<id>`). Membership is tracked per user rather than per
//! connection, so every connection of a member receives room traffic and a
//! new connection inherits the user's rooms.
//!
//! Groups have no separate lifecycle: a group exists while it has members
//! and is created implicitly by the first join.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use parley_proto::ChatKind;

use crate::session::{ConnectionId, SessionRegistry};

/// Routing key of a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey {
    kind: ChatKind,
    id: String,
}

impl RoomKey {
    /// Room for a conversation of `kind` with target `id`.
    pub fn new(kind: ChatKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    /// Personal room of a user.
    pub fn personal(user_id: impl Into<String>) -> Self {
        Self::new(ChatKind::Individual, user_id)
    }

    /// Room of a named group.
    pub fn group(group_id: impl Into<String>) -> Self {
        Self::new(ChatKind::Group, group_id)
    }

    /// Personal or group.
    pub fn kind(&self) -> ChatKind {
        self.kind
    }

    /// User ID (personal) or group ID (group).
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChatKind::Individual => write!(f, "user:{}", self.id),
            ChatKind::Group => write!(f, "group:{}", self.id),
        }
    }
}

/// Bidirectional room <-> member mapping.
///
/// # Invariants
///
/// - `u` in `members_of(r)` iff `r` in `rooms_of(u)`
/// - No empty member sets are retained
#[derive(Debug, Default)]
pub struct RoomMembership {
    members: HashMap<RoomKey, BTreeSet<String>>,
    rooms: HashMap<String, BTreeSet<RoomKey>>,
}

impl RoomMembership {
    /// Create empty membership.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to a room. Returns false if already a member.
    pub fn join(&mut self, user_id: &str, room: RoomKey) -> bool {
        let joined = self.members.entry(room.clone()).or_default().insert(user_id.to_string());
        if joined {
            self.rooms.entry(user_id.to_string()).or_default().insert(room);
        }
        joined
    }

    /// Remove a user from a room. Returns false if not a member.
    pub fn leave(&mut self, user_id: &str, room: &RoomKey) -> bool {
        let Some(members) = self.members.get_mut(room) else {
            return false;
        };
        if !members.remove(user_id) {
            return false;
        }
        if members.is_empty() {
            self.members.remove(room);
        }

        if let Some(rooms) = self.rooms.get_mut(user_id) {
            rooms.remove(room);
            if rooms.is_empty() {
                self.rooms.remove(user_id);
            }
        }
        true
    }

    /// Check if a user is a member of a room.
    pub fn is_member(&self, user_id: &str, room: &RoomKey) -> bool {
        self.members.get(room).is_some_and(|members| members.contains(user_id))
    }

    /// Members of a room, in ascending user ID order.
    pub fn members_of(&self, room: &RoomKey) -> impl Iterator<Item = &str> {
        self.members.get(room).into_iter().flatten().map(String::as_str)
    }

    /// Rooms a user belongs to.
    pub fn rooms_of(&self, user_id: &str) -> impl Iterator<Item = &RoomKey> {
        self.rooms.get(user_id).into_iter().flatten()
    }

    /// Number of members in a room.
    pub fn member_count(&self, room: &RoomKey) -> usize {
        self.members.get(room).map_or(0, BTreeSet::len)
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.members.len()
    }

    /// Live connections of every member of `room`, skipping `exclude_user`.
    ///
    /// Offline members contribute nothing. Connections are unique: each
    /// connection is bound to exactly one user.
    pub fn connections_in(
        &self,
        room: &RoomKey,
        sessions: &SessionRegistry,
        exclude_user: Option<&str>,
    ) -> Vec<ConnectionId> {
        self.members_of(room)
            .filter(|user_id| Some(*user_id) != exclude_user)
            .filter_map(|user_id| sessions.get(user_id))
            .flat_map(|session| session.connections())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Identity;

    #[test]
    fn room_key_display() {
        assert_eq!(RoomKey::personal("u1").to_string(), "user:u1");
        assert_eq!(RoomKey::group("general").to_string(), "group:general");
    }

    #[test]
    fn join_is_idempotent() {
        let mut rooms = RoomMembership::new();

        assert!(rooms.join("u1", RoomKey::group("g")));
        assert!(!rooms.join("u1", RoomKey::group("g")));

        assert_eq!(rooms.member_count(&RoomKey::group("g")), 1);
        assert_eq!(rooms.rooms_of("u1").count(), 1);
    }

    #[test]
    fn last_leave_drops_room() {
        let mut rooms = RoomMembership::new();
        rooms.join("u1", RoomKey::group("g"));
        rooms.join("u2", RoomKey::group("g"));

        assert!(rooms.leave("u1", &RoomKey::group("g")));
        assert_eq!(rooms.room_count(), 1);
        assert!(!rooms.is_member("u1", &RoomKey::group("g")));

        assert!(rooms.leave("u2", &RoomKey::group("g")));
        assert_eq!(rooms.room_count(), 0);
        assert_eq!(rooms.rooms_of("u2").count(), 0);
    }

    #[test]
    fn leave_non_member_is_noop() {
        let mut rooms = RoomMembership::new();
        rooms.join("u1", RoomKey::group("g"));

        assert!(!rooms.leave("u2", &RoomKey::group("g")));
        assert!(!rooms.leave("u1", &RoomKey::group("other")));
        assert_eq!(rooms.member_count(&RoomKey::group("g")), 1);
    }

    #[test]
    fn personal_and_group_keys_do_not_collide() {
        let mut rooms = RoomMembership::new();
        rooms.join("u1", RoomKey::personal("x"));
        rooms.join("u2", RoomKey::group("x"));

        assert_eq!(rooms.members_of(&RoomKey::personal("x")).collect::<Vec<_>>(), vec!["u1"]);
        assert_eq!(rooms.members_of(&RoomKey::group("x")).collect::<Vec<_>>(), vec!["u2"]);
    }

    #[test]
    fn connections_in_skips_excluded_and_offline_members() {
        let mut sessions = SessionRegistry::new();
        sessions.authenticate(ConnectionId(1), Identity::new("u1", "A"), 0).unwrap();
        sessions.authenticate(ConnectionId(2), Identity::new("u2", "B"), 0).unwrap();
        sessions.authenticate(ConnectionId(3), Identity::new("u2", "B"), 0).unwrap();

        let mut rooms = RoomMembership::new();
        for user in ["u1", "u2", "u3"] {
            rooms.join(user, RoomKey::group("g"));
        }

        let all = rooms.connections_in(&RoomKey::group("g"), &sessions, None);
        assert_eq!(all, vec![ConnectionId(1), ConnectionId(2), ConnectionId(3)]);

        let others = rooms.connections_in(&RoomKey::group("g"), &sessions, Some("u1"));
        assert_eq!(others, vec![ConnectionId(2), ConnectionId(3)]);
    }
}
