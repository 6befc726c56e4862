//! Standard broker invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::{BTreeSet, HashMap};

use parley_proto::ChatKind;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A user is online iff at least one live connection is bound, and every
/// connection is bound to at most one user.
pub struct OnlineIffConnected;

impl Invariant for OnlineIffConnected {
    fn name(&self) -> &'static str {
        "online_iff_connected"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut owners = HashMap::new();
        for session in &state.sessions {
            if session.online == session.connections.is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "user {}: online={} with {} connection(s)",
                        session.user_id,
                        session.online,
                        session.connections.len()
                    ),
                });
            }
            for connection in &session.connections {
                if let Some(other) = owners.insert(*connection, &session.user_id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{connection} bound to both {other} and {}",
                            session.user_id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Room-side and user-side membership views agree.
///
/// `u` is in `members_of(r)` iff `r` is in `rooms_of(u)`.
pub struct MembershipSymmetry;

impl Invariant for MembershipSymmetry {
    fn name(&self) -> &'static str {
        "membership_symmetry"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let from_rooms: BTreeSet<_> = state
            .rooms
            .iter()
            .flat_map(|room| room.members.iter().map(|user| (user.clone(), room.room.clone())))
            .collect();

        if from_rooms != state.memberships {
            let missing: Vec<_> = from_rooms.symmetric_difference(&state.memberships).collect();
            return Err(Violation {
                invariant: self.name(),
                message: format!("membership views disagree on {missing:?}"),
            });
        }
        Ok(())
    }
}

/// A personal room `user:x` only ever contains `x`.
pub struct PersonalRoomOwnership;

impl Invariant for PersonalRoomOwnership {
    fn name(&self) -> &'static str {
        "personal_room_ownership"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in state.rooms.iter().filter(|room| room.room.kind() == ChatKind::Individual) {
            if room.members.iter().any(|member| member != room.room.id()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{} has members {:?}", room.room, room.members),
                });
            }
        }
        Ok(())
    }
}

/// Statuses observed by any connection never move backwards.
///
/// For each `(connection, message)`, the sequence of statuses seen in
/// `new_message`, `message_sent`, and `message_status_update` events is
/// non-decreasing in lifecycle rank.
pub struct StatusMonotonicity;

impl Invariant for StatusMonotonicity {
    fn name(&self) -> &'static str {
        "status_monotonicity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for ((connection, message_id), history) in &state.observed_statuses {
            for window in history.windows(2) {
                if window[1].rank() < window[0].rank() {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{connection} saw {message_id} go {} -> {}",
                            window[0], window[1]
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use parley_core::{ConnectionId, RoomKey};
    use parley_proto::MessageStatus;

    use super::*;
    use crate::invariants::{RoomSnapshot, SessionSnapshot};

    fn session(user_id: &str, online: bool, connections: &[u64]) -> SessionSnapshot {
        SessionSnapshot {
            user_id: user_id.into(),
            online,
            connections: connections.iter().copied().map(ConnectionId).collect(),
            last_seen: 0,
        }
    }

    #[test]
    fn online_without_connections_violates() {
        let state =
            SystemSnapshot { sessions: vec![session("u1", true, &[])], ..Default::default() };
        assert!(OnlineIffConnected.check(&state).is_err());
    }

    #[test]
    fn shared_connection_violates() {
        let state = SystemSnapshot {
            sessions: vec![session("u1", true, &[1]), session("u2", true, &[1])],
            ..Default::default()
        };
        assert!(OnlineIffConnected.check(&state).is_err());
    }

    #[test]
    fn consistent_sessions_pass() {
        let state = SystemSnapshot {
            sessions: vec![session("u1", true, &[1, 2]), session("u2", false, &[])],
            ..Default::default()
        };
        assert!(OnlineIffConnected.check(&state).is_ok());
    }

    #[test]
    fn asymmetric_membership_violates() {
        let room = RoomKey::group("g");
        let state = SystemSnapshot {
            rooms: vec![RoomSnapshot { room: room.clone(), members: ["u1".to_string()].into() }],
            memberships: [("u2".to_string(), room)].into(),
            ..Default::default()
        };
        assert!(MembershipSymmetry.check(&state).is_err());
    }

    #[test]
    fn foreign_member_in_personal_room_violates() {
        let state = SystemSnapshot {
            rooms: vec![RoomSnapshot {
                room: RoomKey::personal("u1"),
                members: ["u1".to_string(), "u2".to_string()].into(),
            }],
            ..Default::default()
        };
        assert!(PersonalRoomOwnership.check(&state).is_err());
    }

    #[test]
    fn backwards_status_violates() {
        let mut state = SystemSnapshot::empty();
        state.observed_statuses.insert((ConnectionId(1), "m".into()), vec![
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Sent,
        ]);
        assert!(StatusMonotonicity.check(&state).is_err());
    }
}
